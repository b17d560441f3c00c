use crate::events::VideoPacket;
use bytes::{BufMut, Bytes, BytesMut};

const START_CODE: [u8; 4] = [0, 0, 0, 1];
const NAL_SPS: u8 = 0x67;
const NAL_PPS: u8 = 0x68;
const NAL_IDR: u8 = 0x65;
const NAL_SLICE: u8 = 0x41;

/// Generator of a fake Annex-B H.264 stream cut into wire-sized packets
///
/// Every access unit starts a slice with `first_mb_in_slice == 0`, and an IDR
/// preceded by SPS/PPS is emitted every `gop_length` frames, so a decoder that
/// splits on access unit boundaries sees one frame per generated unit. Payload
/// bytes never contain `00 00`, which keeps start codes unambiguous.
pub struct SyntheticStream {
    frame_number: u64,
    gop_length: u64,
    max_packet_size: usize,
    pending: Bytes,
}

impl SyntheticStream {
    pub fn new(gop_length: u64, max_packet_size: usize) -> Self {
        Self {
            frame_number: 0,
            gop_length: gop_length.max(1),
            max_packet_size: max_packet_size.max(16),
            pending: Bytes::new(),
        }
    }

    /// Number of access units generated so far
    pub fn frames_generated(&self) -> u64 {
        self.frame_number
    }

    /// Next wire packet; a fresh access unit is generated when the previous one is used up
    pub fn next_packet(&mut self) -> VideoPacket {
        if self.pending.is_empty() {
            self.pending = self.next_access_unit();
        }

        let take = self.pending.len().min(self.max_packet_size);
        VideoPacket::new(self.pending.split_to(take))
    }

    fn next_access_unit(&mut self) -> Bytes {
        let keyframe = self.frame_number % self.gop_length == 0;
        let mut unit = BytesMut::new();

        if keyframe {
            put_nal(&mut unit, NAL_SPS, &[0x42, 0xC0, 0x1F, 0x8C, 0x8D, 0x40]);
            put_nal(&mut unit, NAL_PPS, &[0xCE, 0x3C, 0x80]);
        }

        let header = if keyframe { NAL_IDR } else { NAL_SLICE };
        let size = if keyframe { 4_000 } else { 1_200 };
        // Leading 1 bit encodes first_mb_in_slice == 0
        let seed = (self.frame_number as u8) | 0x01;
        let mut body = Vec::with_capacity(size);
        body.push(0x88);
        body.extend((0..size).map(|i| seed.wrapping_add(i as u8) | 0x01));
        put_nal(&mut unit, header, &body);

        self.frame_number += 1;
        unit.freeze()
    }
}

fn put_nal(buf: &mut BytesMut, header: u8, payload: &[u8]) {
    buf.put_slice(&START_CODE);
    buf.put_u8(header);
    buf.put_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packets_respect_max_size() {
        let mut stream = SyntheticStream::new(30, 1460);
        for _ in 0..20 {
            let packet = stream.next_packet();
            assert!(!packet.is_empty());
            assert!(packet.len() <= 1460);
        }
    }

    #[test]
    fn test_keyframe_starts_with_parameter_sets() {
        let mut stream = SyntheticStream::new(30, 4096);
        let first = stream.next_packet();
        assert_eq!(&first.as_bytes()[..5], &[0, 0, 0, 1, NAL_SPS]);
        assert_eq!(stream.frames_generated(), 1);
    }
}
