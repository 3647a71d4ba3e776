//! T5577 programming: config-block layout and the timed pull/gap sequence
//! used to write it over the air.

use crate::encoders::{em4100, hid_h10301};
use crate::tag::{ProtocolId, TagInfo};

// Block 0 mode-register bitfields (values from the T5577 datasheet's
// standard config layout).
const MOD_SHIFT: u32 = 12;
const MOD_MANCHESTER: u32 = 8 << MOD_SHIFT;
const MOD_FSK2A: u32 = 7 << MOD_SHIFT;

const BITRATE_SHIFT: u32 = 18;
const BITRATE_RF_16: u32 = 1 << BITRATE_SHIFT;
const BITRATE_RF_32: u32 = 2 << BITRATE_SHIFT;
const BITRATE_RF_50: u32 = 4 << BITRATE_SHIFT;
const BITRATE_RF_64: u32 = 5 << BITRATE_SHIFT;

const MAXBLOCK_SHIFT: u32 = 5;
const TRANS_BL_1_2: u32 = 2 << MAXBLOCK_SHIFT;
const TRANS_BL_1_3: u32 = 3 << MAXBLOCK_SHIFT;

fn em4100_bitrate_code(bitrate: u16) -> u32 {
    match bitrate {
        16 => BITRATE_RF_16,
        32 => BITRATE_RF_32,
        64 => BITRATE_RF_64,
        other => panic!("unsupported EM4100 bit rate {other}"),
    }
}

/// Block-0 config word plus the payload blocks to write to a T5577.
#[derive(Debug, Clone)]
pub struct T5577Program {
    pub block_data: [u32; 8],
    pub max_blocks: u32,
}

impl T5577Program {
    /// Build the program for an EM4100 tag: 64-bit frame across blocks 1-2.
    pub fn for_em4100(uid: &[u8; 5], bitrate: u16) -> Self {
        let frame = em4100::build_frame64(uid);
        let mut block_data = [0u32; 8];
        block_data[0] = MOD_MANCHESTER | em4100_bitrate_code(bitrate) | TRANS_BL_1_2;
        block_data[1] = (frame >> 32) as u32;
        block_data[2] = frame as u32;
        Self {
            block_data,
            max_blocks: 3,
        }
    }

    /// Build the program for an H10301 tag: 96-bit frame across blocks 1-3.
    pub fn for_h10301(uid: &[u8; 3]) -> Self {
        let frame = hid_h10301::build_frame96(uid);
        let mut block_data = [0u32; 8];
        block_data[0] = MOD_FSK2A | BITRATE_RF_50 | TRANS_BL_1_3;
        block_data[1] = (frame >> 64) as u32;
        block_data[2] = (frame >> 32) as u32;
        block_data[3] = frame as u32;
        Self {
            block_data,
            max_blocks: 4,
        }
    }

    /// Build the program matching a decoded [`TagInfo`].
    pub fn for_tag(tag: &TagInfo) -> Self {
        match tag.protocol {
            ProtocolId::Em4100 => {
                let mut uid = [0u8; 5];
                uid.copy_from_slice(&tag.uid[..5]);
                Self::for_em4100(&uid, tag.bitrate)
            }
            ProtocolId::H10301 => {
                let mut uid = [0u8; 3];
                uid.copy_from_slice(&tag.uid[..3]);
                Self::for_h10301(&uid)
            }
        }
    }
}

/// Timing unit: one 125 kHz carrier cycle.
pub const UNIT_US: u32 = 8;

const START_GAP: u32 = 30;
const WRITE_GAP: u32 = 18;
const DATA_0: u32 = 24;
const DATA_1: u32 = 56;
const PROGRAM: u32 = 700;
const WAIT: u32 = 400;

/// The carrier + antenna-short pull line shared by read/write/emulate.
///
/// `delay_us` is part of the interface (rather than relying on the caller
/// to sleep) so a programming run can be driven deterministically in tests.
pub trait CarrierSink {
    fn carrier_on(&mut self);
    fn carrier_off(&mut self);
    fn pull_assert(&mut self);
    fn pull_release(&mut self);
    fn delay_us(&mut self, us: u32);
}

/// Drives the timed gap sequence that commits a [`T5577Program`] to a tag.
pub struct T5577Programmer;

impl T5577Programmer {
    fn gap(sink: &mut dyn CarrierSink, units: u32) {
        sink.carrier_off();
        sink.delay_us(units * UNIT_US);
        sink.carrier_on();
    }

    fn write_bit(sink: &mut dyn CarrierSink, bit: bool) {
        sink.delay_us((if bit { DATA_1 } else { DATA_0 }) * UNIT_US);
        Self::gap(sink, WRITE_GAP);
    }

    fn write_bits_msb_first(sink: &mut dyn CarrierSink, value: u32, count: u32) {
        for i in (0..count).rev() {
            Self::write_bit(sink, (value >> i) & 1 == 1);
        }
    }

    fn write_reset(sink: &mut dyn CarrierSink) {
        Self::gap(sink, START_GAP);
        Self::write_bit(sink, true);
        Self::write_bit(sink, false);
    }

    /// Write one block of one page, with an optional 32-bit password.
    fn write_block(
        sink: &mut dyn CarrierSink,
        page: u8,
        block: u32,
        data: u32,
        lock: bool,
        password: Option<u32>,
    ) {
        sink.delay_us(WAIT * UNIT_US);
        Self::gap(sink, START_GAP);

        let opcode = match page {
            0 => 0b10,
            1 => 0b11,
            _ => panic!("T5577 page must be 0 or 1"),
        };
        Self::write_bits_msb_first(sink, opcode, 2);

        if let Some(pwd) = password {
            Self::write_bits_msb_first(sink, pwd, 32);
        }

        Self::write_bits_msb_first(sink, lock as u32, 1);
        Self::write_bits_msb_first(sink, data, 32);
        Self::write_bits_msb_first(sink, block, 3);

        sink.delay_us(PROGRAM * UNIT_US);
        sink.delay_us(WAIT * UNIT_US);
        Self::write_reset(sink);
    }

    /// Commit `program` to the tag, starting at block `start_block` of page 0.
    /// Runs as a single uninterrupted call: no internal locks or await
    /// points, matching the firmware's preemption-disabled write loop.
    pub fn execute_write(sink: &mut dyn CarrierSink, program: &T5577Program, start_block: u32) {
        sink.pull_assert();
        sink.carrier_on();

        for i in 0..program.max_blocks {
            Self::write_block(
                sink,
                0,
                start_block + i,
                program.block_data[i as usize],
                false,
                None,
            );
        }
        Self::write_reset(sink);
        sink.delay_us(1600);
        Self::gap(sink, 27);

        sink.pull_release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn em4100_block0_matches_expected_mode_register() {
        let program = T5577Program::for_em4100(&[0x01, 0x02, 0x03, 0x04, 0x05], 64);
        assert_eq!(program.block_data[0], 0x00148040);
        assert_eq!(program.max_blocks, 3);
        let frame = em4100::build_frame64(&[0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(program.block_data[1], (frame >> 32) as u32);
        assert_eq!(program.block_data[2], frame as u32);
    }

    #[test]
    fn h10301_program_has_four_blocks() {
        let program = T5577Program::for_h10301(&[0x2E, 0x12, 0x34]);
        assert_eq!(program.max_blocks, 4);
        assert_eq!(program.block_data[0], MOD_FSK2A | BITRATE_RF_50 | TRANS_BL_1_3);
    }

    struct RecordingSink {
        carrier_on_count: u32,
        carrier_off_count: u32,
        pulled: bool,
    }

    impl CarrierSink for RecordingSink {
        fn carrier_on(&mut self) {
            self.carrier_on_count += 1;
        }
        fn carrier_off(&mut self) {
            self.carrier_off_count += 1;
        }
        fn pull_assert(&mut self) {
            self.pulled = true;
        }
        fn pull_release(&mut self) {
            self.pulled = false;
        }
        fn delay_us(&mut self, _us: u32) {}
    }

    #[test]
    fn execute_write_releases_the_pull_line() {
        let program = T5577Program::for_em4100(&[0, 0, 0, 0, 0], 64);
        let mut sink = RecordingSink {
            carrier_on_count: 0,
            carrier_off_count: 0,
            pulled: false,
        };
        T5577Programmer::execute_write(&mut sink, &program, 0);
        assert!(!sink.pulled);
        assert!(sink.carrier_on_count > 0);
    }
}
