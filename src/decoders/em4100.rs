//! EM4100 (ASK, Manchester, 64-bit frame) decoder.
//!
//! Three instances run in parallel, one per supported half-bit period
//! (`64`, `128`, `256` us, corresponding to bit rates RF/16, RF/32, RF/64).

use std::collections::VecDeque;

use crate::event::{Edge, EdgeEvent};
use crate::registry::{Decoder, Features, ProtocolDescriptor};
use crate::tag::TagInfo;

static DESCRIPTOR: ProtocolDescriptor = ProtocolDescriptor {
    name: "EM4100",
    manufacturer: "EM Microelectronic",
    data_size: 5,
    features: Features::ASK,
};

/// Bound on the number of normalized half-bit edges held between batches.
/// Exceeding it means the decoder has lost sync badly enough that a full
/// reset is cheaper than continuing to chase it.
const PENDING_MAX: usize = 60;

const FRAME_BITS: u8 = 64;
const PREAMBLE_BITS: usize = 9;
const ROWS: usize = 10;
const COLUMNS: usize = 4;

pub struct Em4100Decoder {
    half_bit_us: u16,
    pending: VecDeque<EdgeEvent>,
    frame: u64,
    frame_bits: u8,
}

impl Em4100Decoder {
    /// `bitrate` is one of 16, 32, 64 (RF/n); half-bit period is `bitrate * 4` us.
    pub fn new(bitrate: u16) -> Self {
        Self {
            half_bit_us: bitrate * 4,
            pending: VecDeque::with_capacity(PENDING_MAX),
            frame: 0,
            frame_bits: 0,
        }
    }

    fn bitrate(&self) -> u16 {
        self.half_bit_us / 4
    }

    fn is_half(&self, t_us: u16) -> bool {
        let t = t_us as f32;
        let th = self.half_bit_us as f32;
        t > 0.75 * th && t < 1.60 * th
    }

    fn is_full(&self, t_us: u16) -> bool {
        let t = t_us as f32;
        let th = self.half_bit_us as f32;
        t > 1.60 * th && t < 2.60 * th
    }

    fn is_full_bit_sum(&self, sum_us: u32) -> bool {
        let t = sum_us as f32;
        let th = self.half_bit_us as f32;
        t > 1.60 * th && t < 2.60 * th
    }

    /// Step 1: classify one raw edge into one or two half-bit events.
    fn normalize(&self, event: EdgeEvent) -> (EdgeEvent, Option<EdgeEvent>) {
        if self.is_half(event.t_us) {
            (EdgeEvent::new(self.half_bit_us, event.edge), None)
        } else if self.is_full(event.t_us) {
            (
                EdgeEvent::new(self.half_bit_us, event.edge),
                Some(EdgeEvent::new(self.half_bit_us, event.edge)),
            )
        } else {
            (event, None)
        }
    }

    fn partial_reset(&mut self) {
        self.frame = 0;
        self.frame_bits = 0;
    }

    fn full_reset(&mut self) {
        self.frame = 0;
        self.frame_bits = 0;
        self.pending.clear();
    }

    fn bit_at(frame: u64, i: usize) -> u8 {
        ((frame >> (63 - i)) & 1) as u8
    }

    fn is_valid(frame: u64) -> bool {
        let preamble = frame >> (64 - PREAMBLE_BITS);
        if preamble != (1u64 << PREAMBLE_BITS) - 1 {
            return false;
        }
        for c in 0..COLUMNS {
            let mut parity = 0u8;
            for r in 0..ROWS {
                parity ^= Self::bit_at(frame, PREAMBLE_BITS + r * 5 + c);
            }
            parity ^= Self::bit_at(frame, PREAMBLE_BITS + ROWS * 5 + c);
            if parity != 0 {
                return false;
            }
        }
        for r in 0..ROWS {
            let base = PREAMBLE_BITS + r * 5;
            let mut parity = 0u8;
            for b in 0..5 {
                parity ^= Self::bit_at(frame, base + b);
            }
            if parity != 0 {
                return false;
            }
        }
        Self::bit_at(frame, 63) == 0
    }

    fn extract_uid(frame: u64) -> [u8; 5] {
        let mut nibbles = [0u8; ROWS];
        for (r, nibble) in nibbles.iter_mut().enumerate() {
            let base = PREAMBLE_BITS + r * 5;
            *nibble = (Self::bit_at(frame, base) << 3)
                | (Self::bit_at(frame, base + 1) << 2)
                | (Self::bit_at(frame, base + 2) << 1)
                | Self::bit_at(frame, base + 3);
        }
        let mut uid = [0u8; 5];
        for i in 0..5 {
            uid[i] = (nibbles[2 * i] << 4) | nibbles[2 * i + 1];
        }
        uid
    }

    /// Try to consume leading pairs from `pending`, updating frame state.
    /// Returns `Some(tag)` the moment a valid 64-bit frame appears.
    fn drain_pairs(&mut self) -> Option<TagInfo> {
        while self.pending.len() >= 2 {
            let e1 = self.pending[0];
            let e2 = self.pending[1];
            let both_half = self.is_half(e1.t_us) && self.is_half(e2.t_us);
            let sum = e1.t_us as u32 + e2.t_us as u32;
            let bit = match (both_half && self.is_full_bit_sum(sum), e1.edge, e2.edge) {
                (true, Edge::Fall, Edge::Rise) => Some(1u8),
                (true, Edge::Rise, Edge::Fall) => Some(0u8),
                _ => None,
            };

            match bit {
                Some(b) => {
                    self.pending.pop_front();
                    self.pending.pop_front();
                    self.frame = (self.frame << 1) | b as u64;
                    self.frame_bits += 1;
                    if self.frame_bits == FRAME_BITS {
                        if Self::is_valid(self.frame) {
                            let uid = Self::extract_uid(self.frame);
                            let bitrate = self.bitrate();
                            self.full_reset();
                            tracing::debug!(?uid, bitrate, "EM4100 frame decoded");
                            return Some(TagInfo::em4100(uid, bitrate));
                        } else {
                            tracing::trace!("EM4100 frame failed validity check");
                            self.partial_reset();
                        }
                    }
                }
                None => {
                    self.pending.pop_front();
                    self.partial_reset();
                }
            }
        }
        None
    }
}

impl Decoder for Em4100Decoder {
    fn descriptor(&self) -> &'static ProtocolDescriptor {
        &DESCRIPTOR
    }

    fn reset(&mut self) {
        self.full_reset();
    }

    fn feed(&mut self, events: &[EdgeEvent]) -> Option<TagInfo> {
        for &raw in events {
            let (a, b) = self.normalize(raw);
            if self.pending.len() + 1 + b.is_some() as usize > PENDING_MAX {
                tracing::trace!("EM4100 pending edge buffer overflow, full reset");
                self.full_reset();
                return None;
            }
            self.pending.push_back(a);
            if let Some(b) = b {
                self.pending.push_back(b);
            }
            if let Some(tag) = self.drain_pairs() {
                return Some(tag);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoders::em4100::encode;

    /// Reconstruct the edges a capture channel would see replaying `steps`
    /// cyclically: edge `i`'s duration is the dwell of the step before it,
    /// wrapping around so every step (including the first) produces one
    /// edge, matching the waveform's own cyclic replay semantics.
    fn waveform_edges(steps: &[crate::waveform::WaveformStep]) -> Vec<EdgeEvent> {
        let len = steps.len();
        (0..len)
            .map(|i| {
                let prev = steps[(i + len - 1) % len];
                EdgeEvent::new(prev.dwell_us, Edge::from_level(steps[i].level()))
            })
            .collect()
    }

    fn decode_waveform(uid: [u8; 5], bitrate: u16) -> Option<TagInfo> {
        let waveform = encode(&uid, bitrate);
        let events = waveform_edges(waveform.steps());
        let mut decoder = Em4100Decoder::new(bitrate);
        decoder.feed(&events)
    }

    #[test]
    fn decodes_encoded_uid_round_trip() {
        let uid = [0xDE, 0xAD, 0xBE, 0xEF, 0x01];
        let tag = decode_waveform(uid, 64).expect("expected a decode");
        assert_eq!(tag.uid, uid.to_vec());
        assert_eq!(tag.bitrate, 64);
    }

    #[test]
    fn resyncs_past_garbage_prefix() {
        let uid = [0xDE, 0xAD, 0xBE, 0xEF, 0x01];
        let waveform = crate::encoders::em4100::encode(&uid, 64);
        let mut events = vec![
            EdgeEvent::new(300, Edge::Rise),
            EdgeEvent::new(400, Edge::Fall),
            EdgeEvent::new(50, Edge::Rise),
            EdgeEvent::new(600, Edge::Fall),
            EdgeEvent::new(700, Edge::Rise),
            EdgeEvent::new(200, Edge::Fall),
            EdgeEvent::new(900, Edge::Rise),
        ];
        events.extend(waveform_edges(waveform.steps()));
        let mut decoder = Em4100Decoder::new(64);
        let tag = decoder.feed(&events).expect("expected a decode after resync");
        assert_eq!(tag.uid, uid.to_vec());
    }

    #[test]
    fn rejects_frame_with_flipped_parity_bit() {
        let uid = [0xDE, 0xAD, 0xBE, 0xEF, 0x01];
        let mut waveform = crate::encoders::em4100::encode(&uid, 64);
        // Flip the level of one data step deep in the frame to corrupt a parity bit.
        waveform.flip_step_level(40);
        let events = waveform_edges(waveform.steps());
        let mut decoder = Em4100Decoder::new(64);
        assert!(decoder.feed(&events).is_none());
    }
}
