mod access_unit;

pub use access_unit::AccessUnitDecoder;

use crate::error::DecodeError;
use crate::events::VideoPacket;
use crate::frame::DecodedFrame;

/// Turns compressed video packets into frames
///
/// `decode` is synchronous and calls `on_frame` zero or more times before
/// returning. A decoder may hold bytes across calls when a frame spans several
/// packets. Frames passed to `on_frame` before an error is returned are valid.
pub trait VideoDecoder: Send {
    fn decode(
        &mut self,
        packet: &VideoPacket,
        on_frame: &mut dyn FnMut(DecodedFrame),
    ) -> Result<(), DecodeError>;

    /// Emit whatever is still buffered at end of stream
    fn flush(&mut self, _on_frame: &mut dyn FnMut(DecodedFrame)) {}
}

/// NAL unit type from its header byte
pub fn nal_type(header: u8) -> u8 {
    header & 0x1F
}

/// Whether the NAL type carries slice data
pub fn is_vcl(nal_type: u8) -> bool {
    (1..=5).contains(&nal_type)
}

/// Locate the next Annex-B start code at or after `from`
///
/// Returns the offset where the start code begins (including the leading zero
/// of a four byte code) and its length.
pub fn find_start_code(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    if buf.len() < 3 {
        return None;
    }

    let mut i = from;
    while i + 3 <= buf.len() {
        if buf[i] == 0 && buf[i + 1] == 0 && buf[i + 2] == 1 {
            if i > from && buf[i - 1] == 0 {
                return Some((i - 1, 4));
            }
            return Some((i, 3));
        }
        i += 1;
    }
    None
}

/// Split a complete Annex-B buffer into NAL unit payloads (start codes stripped)
pub fn split_nal_units(buf: &[u8]) -> Vec<&[u8]> {
    let mut units = Vec::new();
    let mut cursor = match find_start_code(buf, 0) {
        Some((pos, len)) => pos + len,
        None => return units,
    };

    while cursor < buf.len() {
        match find_start_code(buf, cursor) {
            Some((pos, len)) => {
                if pos > cursor {
                    units.push(&buf[cursor..pos]);
                }
                cursor = pos + len;
            }
            None => {
                units.push(&buf[cursor..]);
                break;
            }
        }
    }
    units
}
