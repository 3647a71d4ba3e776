//! HID H10301 (FSK2, 96-bit framed, 26-bit Wiegand payload) decoder.

use crate::event::{Edge, EdgeEvent};
use crate::registry::{Decoder, Features, ProtocolDescriptor};
use crate::tag::TagInfo;

static DESCRIPTOR: ProtocolDescriptor = ProtocolDescriptor {
    name: "H10301",
    manufacturer: "HID",
    data_size: 3,
    features: Features::PSK,
};

const PERIOD_ZERO_US: u32 = 64;
const PERIOD_ONE_US: u32 = 80;
const PERIOD_TOL_PCT: u32 = 20;

const FRAME_BITS: u32 = 96;
pub(crate) const HEADER_BITS: u32 = 44;
pub(crate) const PREAMBLE: u64 = 0x1D;
pub(crate) const COMPANY: u64 = 0x1556;
pub(crate) const CARD_FORMAT: u64 = 0x155556;

fn within_pct(value: u32, target: u32, pct: u32) -> bool {
    let tol = target * pct / 100;
    value + tol >= target && value <= target + tol
}

pub struct H10301Decoder {
    prev_half: Option<EdgeEvent>,
    count0: u32,
    count1: u32,
    frame: u128,
    frame_bits: u32,
}

impl H10301Decoder {
    pub fn new() -> Self {
        Self {
            prev_half: None,
            count0: 0,
            count1: 0,
            frame: 0,
            frame_bits: 0,
        }
    }

    fn reset_symbol_state(&mut self) {
        self.prev_half = None;
    }

    fn reset_bit_window(&mut self) {
        self.count0 = 0;
        self.count1 = 0;
    }

    fn reset_frame(&mut self) {
        self.frame = 0;
        self.frame_bits = 0;
    }

    fn full_reset(&mut self) {
        self.reset_symbol_state();
        self.reset_bit_window();
        self.reset_frame();
    }

    /// Pair up half-periods into a symbol: `Some(true)` for a long (bit-1)
    /// period, `Some(false)` for short (bit-0), `None` if unclassifiable.
    fn symbol_feed(&mut self, half: EdgeEvent) -> Option<bool> {
        let prev = match self.prev_half {
            None => {
                self.prev_half = Some(half);
                return None;
            }
            Some(p) => p,
        };
        if prev.edge == half.edge {
            // Two same-direction halves in a row: keep the newer as the
            // reference and drop the stale one.
            self.prev_half = Some(half);
            return None;
        }
        let period = prev.t_us as u32 + half.t_us as u32;
        let is_zero = within_pct(period, PERIOD_ZERO_US, PERIOD_TOL_PCT);
        let is_one = within_pct(period, PERIOD_ONE_US, PERIOD_TOL_PCT);
        match (is_zero, is_one) {
            (true, false) => {
                self.prev_half = None;
                Some(false)
            }
            (false, true) => {
                self.prev_half = None;
                Some(true)
            }
            (true, true) => {
                let d0 = (period as i32 - PERIOD_ZERO_US as i32).abs();
                let d1 = (period as i32 - PERIOD_ONE_US as i32).abs();
                self.prev_half = None;
                Some(d1 < d0)
            }
            (false, false) => {
                // Unclassifiable pair: keep the newer half as the reference
                // and try pairing it with whatever comes next.
                self.prev_half = Some(half);
                None
            }
        }
    }

    /// Accumulate classified symbols into bits, per the oversampled-majority
    /// rule: bit 1 needs five-plus long symbols, bit 0 needs six-plus short.
    fn bit_feed(&mut self, symbol: bool) -> Option<u8> {
        if symbol {
            self.count1 += 1;
        } else {
            self.count0 += 1;
        }
        let total = self.count0 + self.count1;

        let emit_one = self.count1 >= 5 || (total >= 5 && self.count1 >= 4 && self.count0 <= 1);
        let emit_zero = self.count0 >= 6 || (total >= 6 && self.count0 >= 5 && self.count1 <= 1);

        if emit_one {
            self.reset_bit_window();
            Some(1)
        } else if emit_zero {
            self.reset_bit_window();
            Some(0)
        } else {
            None
        }
    }

    fn bit_at(frame: u128, i: u32) -> u8 {
        ((frame >> (FRAME_BITS - 1 - i)) & 1) as u8
    }

    fn field(frame: u128, start: u32, len: u32) -> u64 {
        let mut v = 0u64;
        for i in 0..len {
            v = (v << 1) | Self::bit_at(frame, start + i) as u64;
        }
        v
    }

    fn decode_payload(frame: u128) -> Option<u32> {
        let mut raw26 = 0u32;
        for i in 0..26 {
            let hi = Self::bit_at(frame, HEADER_BITS + i * 2);
            let lo = Self::bit_at(frame, HEADER_BITS + i * 2 + 1);
            let bit = match (hi, lo) {
                (0, 1) => 0u32,
                (1, 0) => 1u32,
                _ => return None,
            };
            raw26 = (raw26 << 1) | bit;
        }
        Some(raw26)
    }

    fn parity_ok(raw26: u32) -> bool {
        let low13 = raw26 & 0x1FFF; // bits 0..12
        let high13 = (raw26 >> 13) & 0x1FFF; // bits 13..25
        (low13.count_ones() % 2 == 1) && (high13.count_ones() % 2 == 0)
    }

    fn is_valid(frame: u128) -> bool {
        Self::field(frame, 0, 8) == PREAMBLE
            && Self::field(frame, 8, 14) == COMPANY
            && Self::field(frame, 22, 22) == CARD_FORMAT
    }
}

impl Default for H10301Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for H10301Decoder {
    fn descriptor(&self) -> &'static ProtocolDescriptor {
        &DESCRIPTOR
    }

    fn reset(&mut self) {
        self.full_reset();
    }

    fn feed(&mut self, events: &[EdgeEvent]) -> Option<TagInfo> {
        for &raw in events {
            let symbol = match self.symbol_feed(raw) {
                Some(s) => s,
                None => continue,
            };
            let bit = match self.bit_feed(symbol) {
                Some(b) => b,
                None => continue,
            };
            self.frame = (self.frame << 1) | bit as u128;
            self.frame_bits += 1;
            if self.frame_bits < FRAME_BITS {
                continue;
            }
            self.frame_bits = FRAME_BITS - 1; // slide the window by one bit
            if !Self::is_valid(self.frame) {
                continue;
            }
            let Some(raw26) = Self::decode_payload(self.frame) else {
                continue;
            };
            if !Self::parity_ok(raw26) {
                continue;
            }
            let facility = ((raw26 >> 17) & 0xFF) as u8;
            let card = ((raw26 >> 1) & 0xFFFF) as u16;
            tracing::debug!(facility, card, "H10301 frame decoded");
            self.full_reset();
            return Some(TagInfo::h10301([
                facility,
                (card >> 8) as u8,
                (card & 0xFF) as u8,
            ]));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoders::hid_h10301::encode;

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

    fn decode_waveform(uid: [u8; 3]) -> Option<TagInfo> {
        let waveform = encode(&uid);
        let events = waveform_edges(waveform.steps());
        let mut decoder = H10301Decoder::new();
        decoder.feed(&events)
    }

    #[test]
    fn decodes_encoded_uid_round_trip() {
        let uid = [0x2E, 0x12, 0x34];
        let tag = decode_waveform(uid).expect("expected a decode");
        assert_eq!(tag.uid, uid.to_vec());
        assert_eq!(tag.facility_code(), Some(0x2E));
        assert_eq!(tag.card_number(), Some(0x1234));
    }
}
