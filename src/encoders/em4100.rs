//! EM4100 UID -> 64-bit frame -> Manchester waveform.

use crate::waveform::{EncodedWaveform, WaveformStep};

const ROWS: usize = 10;
const COLUMNS: usize = 4;
const PREAMBLE_BITS: usize = 9;

/// Emulation-timing correction applied to the nominal half-bit period,
/// matching the firmware's empirically tuned `EMUL_EM4100_CORR`.
const EMUL_CORRECTION_US: u16 = 3;

/// Build the 64-bit EM4100 frame for a UID: preamble, ten 5-bit rows (4 data
/// bits + even row parity), four column-parity bits, and a stop bit.
pub(crate) fn build_frame64(uid: &[u8; 5]) -> u64 {
    let mut nibbles = [0u8; ROWS];
    for i in 0..5 {
        nibbles[2 * i] = uid[i] >> 4;
        nibbles[2 * i + 1] = uid[i] & 0x0F;
    }

    let mut bits = Vec::with_capacity(64);
    bits.extend(std::iter::repeat(1u8).take(PREAMBLE_BITS));

    let mut columns = [0u8; COLUMNS];
    for &nibble in &nibbles {
        let data = [
            (nibble >> 3) & 1,
            (nibble >> 2) & 1,
            (nibble >> 1) & 1,
            nibble & 1,
        ];
        for (c, &b) in data.iter().enumerate() {
            columns[c] ^= b;
        }
        let parity = data.iter().fold(0u8, |acc, &b| acc ^ b);
        bits.extend_from_slice(&data);
        bits.push(parity);
    }
    bits.extend_from_slice(&columns);
    bits.push(0); // stop bit

    debug_assert_eq!(bits.len(), 64);
    bits.iter().fold(0u64, |frame, &b| (frame << 1) | b as u64)
}

/// Encode `uid` as an EM4100 emulation waveform at the given bit rate
/// (16, 32, or 64 -> RF/n).
pub fn encode(uid: &[u8; 5], bitrate: u16) -> EncodedWaveform {
    let frame = build_frame64(uid);
    let half_bit_us = bitrate * 4 - EMUL_CORRECTION_US;

    let mut waveform = EncodedWaveform::new();
    for i in (0..64).rev() {
        let bit = (frame >> i) & 1;
        if bit == 1 {
            waveform.push(WaveformStep::high(half_bit_us));
            waveform.push(WaveformStep::low(half_bit_us));
        } else {
            waveform.push(WaveformStep::low(half_bit_us));
            waveform.push(WaveformStep::high(half_bit_us));
        }
    }
    waveform
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_has_nine_bit_preamble_and_zero_stop_bit() {
        let frame = build_frame64(&[0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(frame >> (64 - 9), 0b1_1111_1111);
        assert_eq!(frame & 1, 0);
    }

    #[test]
    fn encode_produces_128_steps() {
        let waveform = encode(&[0xDE, 0xAD, 0xBE, 0xEF, 0x01], 64);
        assert_eq!(waveform.len(), 128);
    }
}
