use super::{find_start_code, is_vcl, nal_type, VideoDecoder};
use crate::error::DecodeError;
use crate::events::VideoPacket;
use crate::frame::{DecodedFrame, FrameFormat};
use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

const DEFAULT_MAX_ACCESS_UNIT_BYTES: usize = 4 * 1024 * 1024;

/// Reassembles an Annex-B H.264 packet stream into coded access units
///
/// One [`DecodedFrame`] is emitted per access unit, with the unit's bytes as
/// payload. A unit is complete when the next one starts: a parameter set, SEI
/// or delimiter NAL, or a slice with `first_mb_in_slice == 0`, arriving after
/// the current unit already holds slice data.
pub struct AccessUnitDecoder {
    width: u32,
    height: u32,
    max_access_unit_bytes: usize,
    pending: BytesMut,
    access_unit: BytesMut,
    has_vcl: bool,
    next_frame_id: u64,
    nal_units_seen: u64,
}

impl AccessUnitDecoder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            max_access_unit_bytes: DEFAULT_MAX_ACCESS_UNIT_BYTES,
            pending: BytesMut::new(),
            access_unit: BytesMut::new(),
            has_vcl: false,
            next_frame_id: 0,
            nal_units_seen: 0,
        }
    }

    pub fn with_max_access_unit_bytes(mut self, limit: usize) -> Self {
        self.max_access_unit_bytes = limit;
        self
    }

    pub fn nal_units_seen(&self) -> u64 {
        self.nal_units_seen
    }

    pub fn frames_emitted(&self) -> u64 {
        self.next_frame_id
    }

    fn push_nal(
        &mut self,
        nal: &[u8],
        code_len: usize,
        on_frame: &mut dyn FnMut(DecodedFrame),
    ) -> Result<(), DecodeError> {
        let Some(&header) = nal.get(code_len) else {
            return Ok(());
        };

        let kind = nal_type(header);
        self.nal_units_seen += 1;
        trace!("NAL type {} ({} bytes)", kind, nal.len());

        let first_mb_zero = nal.get(code_len + 1).is_some_and(|b| b & 0x80 != 0);
        let starts_new_unit = self.has_vcl
            && match kind {
                1 | 5 => first_mb_zero,
                6..=9 => true,
                _ => false,
            };

        if starts_new_unit {
            self.emit(on_frame);
        }

        if self.access_unit.len() + nal.len() > self.max_access_unit_bytes {
            self.access_unit.clear();
            self.has_vcl = false;
            return Err(DecodeError::Oversized {
                limit: self.max_access_unit_bytes,
            });
        }

        self.access_unit.extend_from_slice(nal);
        if is_vcl(kind) {
            self.has_vcl = true;
        }
        Ok(())
    }

    fn emit(&mut self, on_frame: &mut dyn FnMut(DecodedFrame)) {
        let data = self.access_unit.split().freeze();
        let frame = DecodedFrame::new(
            self.next_frame_id,
            FrameFormat::H264AccessUnit,
            self.width,
            self.height,
            data,
        );
        debug!("Access unit {} complete ({} bytes)", frame.id, frame.data.len());
        self.next_frame_id += 1;
        self.has_vcl = false;
        on_frame(frame);
    }
}

impl VideoDecoder for AccessUnitDecoder {
    fn decode(
        &mut self,
        packet: &VideoPacket,
        on_frame: &mut dyn FnMut(DecodedFrame),
    ) -> Result<(), DecodeError> {
        self.pending.extend_from_slice(packet.as_bytes());
        let mut result = Ok(());

        loop {
            let Some((start, code_len)) = find_start_code(&self.pending, 0) else {
                // Keep a possible partial start code at the tail
                let garbage = self.pending.len().saturating_sub(3);
                if garbage > 0 {
                    self.pending.advance(garbage);
                    result = Err(DecodeError::Malformed {
                        details: format!("{} bytes without a start code", garbage),
                    });
                }
                break;
            };

            if start > 0 {
                self.pending.advance(start);
                result = Err(DecodeError::Malformed {
                    details: format!("skipped {} bytes before start code", start),
                });
                continue;
            }

            let Some((next, _)) = find_start_code(&self.pending, code_len) else {
                if self.pending.len() > self.max_access_unit_bytes {
                    self.pending.clear();
                    self.access_unit.clear();
                    self.has_vcl = false;
                    result = Err(DecodeError::Oversized {
                        limit: self.max_access_unit_bytes,
                    });
                }
                break;
            };

            let nal = self.pending.split_to(next);
            if let Err(e) = self.push_nal(&nal, code_len, on_frame) {
                result = Err(e);
            }
        }

        result
    }

    fn flush(&mut self, on_frame: &mut dyn FnMut(DecodedFrame)) {
        if let Some((0, code_len)) = find_start_code(&self.pending, 0) {
            let nal = self.pending.split();
            let _ = self.push_nal(&nal, code_len, on_frame);
        }
        self.pending.clear();

        if self.has_vcl {
            self.emit(on_frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SyntheticStream;

    fn decode_all(decoder: &mut AccessUnitDecoder, packets: &[VideoPacket]) -> Vec<DecodedFrame> {
        let mut frames = Vec::new();
        for packet in packets {
            decoder
                .decode(packet, &mut |frame| frames.push(frame))
                .unwrap();
        }
        frames
    }

    #[test]
    fn test_synthetic_stream_yields_one_frame_per_unit() {
        let mut stream = SyntheticStream::new(5, 512);
        let packets: Vec<_> = (0..60).map(|_| stream.next_packet()).collect();
        let generated = stream.frames_generated();

        let mut decoder = AccessUnitDecoder::new(960, 720);
        let mut frames = decode_all(&mut decoder, &packets);
        decoder.flush(&mut |frame| frames.push(frame));

        // The last generated unit may be cut mid-way, flush still emits it
        assert_eq!(frames.len() as u64, generated);
        let ids: Vec<u64> = frames.iter().map(|f| f.id).collect();
        assert_eq!(ids, (0..generated).collect::<Vec<_>>());
        assert!(frames.iter().all(|f| f.format == FrameFormat::H264AccessUnit));
    }

    #[test]
    fn test_frame_spanning_packets_is_emitted_on_next_unit() {
        let mut decoder = AccessUnitDecoder::new(960, 720);
        let first = VideoPacket::from(vec![0, 0, 0, 1, 0x65, 0x88, 0x11]);
        let tail = VideoPacket::from(vec![0x12, 0x13]);
        let second = VideoPacket::from(vec![0, 0, 0, 1, 0x41, 0x88, 0x21, 0, 0, 0, 1, 0x41, 0x88]);

        let frames = decode_all(&mut decoder, &[first, tail]);
        assert!(frames.is_empty());

        let mut frames = decode_all(&mut decoder, &[second]);
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].data.as_ref(),
            &[0, 0, 0, 1, 0x65, 0x88, 0x11, 0x12, 0x13]
        );

        // The final slice has no successor yet; flush closes both remaining units
        decoder.flush(&mut |frame| frames.push(frame));
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].data.as_ref(), &[0, 0, 0, 1, 0x41, 0x88, 0x21]);
        assert_eq!(frames[2].data.as_ref(), &[0, 0, 0, 1, 0x41, 0x88]);
    }

    #[test]
    fn test_leading_garbage_is_reported_and_skipped() {
        let mut decoder = AccessUnitDecoder::new(960, 720);
        let mut frames = Vec::new();

        let corrupt = VideoPacket::from(vec![0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 1, 0x65, 0x88]);
        let result = decoder.decode(&corrupt, &mut |frame| frames.push(frame));
        assert!(matches!(result, Err(DecodeError::Malformed { .. })));

        let next = VideoPacket::from(vec![0, 0, 1, 0x41, 0x88, 0, 0, 1, 0x41, 0x88]);
        decoder.decode(&next, &mut |frame| frames.push(frame)).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data.as_ref(), &[0, 0, 1, 0x65, 0x88]);
    }

    #[test]
    fn test_oversized_unit_is_dropped() {
        let mut decoder = AccessUnitDecoder::new(960, 720).with_max_access_unit_bytes(8);
        let mut frames = Vec::new();
        let big = VideoPacket::from(vec![0, 0, 1, 0x65, 0x88, 1, 2, 3, 4, 5, 6, 7, 0, 0, 1, 0x41]);
        let result = decoder.decode(&big, &mut |frame| frames.push(frame));
        assert_eq!(result, Err(DecodeError::Oversized { limit: 8 }));
        assert!(frames.is_empty());
    }
}
