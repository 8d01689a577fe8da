//! OPL register addressing
//!
//! Base addresses for the per-operator and per-channel register files,
//! plus the fixed channel-to-operator offset table shared by every
//! OPL2-compatible chip. Per-operator addresses are formed as
//! `base + OPERATOR_OFFSETS[channel]` for the modulator slot and
//! `base + CARRIER + OPERATOR_OFFSETS[channel]` for the carrier slot.

use bitflags::bitflags;

/// Test/waveform-select enable register.
pub const TEST_WSE: u8 = 0x01;

/// Value written to [`TEST_WSE`] so the 0xE0 waveform registers take
/// effect.
pub const WSE_ENABLE: u8 = 0x20;

/// OPL3 mode enable register. Only exists on the second register bank.
pub const OPL3_MODE: u8 = 0x05;

/// Per-operator characteristic (AM/VIB/EG-type/KSR/multiplier).
pub const OP_CHARACTERISTIC: u8 = 0x20;

/// Per-operator key-scale level and output level.
pub const OP_LEVEL: u8 = 0x40;

/// Per-operator attack/decay rates.
pub const OP_ATTACK_DECAY: u8 = 0x60;

/// Per-operator sustain level / release rate.
pub const OP_SUSTAIN_RELEASE: u8 = 0x80;

/// Per-channel frequency low byte.
pub const CH_FREQUENCY: u8 = 0xA0;

/// Per-channel key-on, block (octave) and frequency high bits.
pub const CH_KEY_BLOCK: u8 = 0xB0;

/// Tremolo depth, vibrato depth and rhythm-mode register.
pub const TREMOLO_VIBRATO: u8 = 0xBD;

/// Per-channel feedback and connection.
pub const CH_FEEDBACK_CONNECTION: u8 = 0xC0;

/// Per-operator waveform select.
pub const OP_WAVEFORM: u8 = 0xE0;

/// Offset from a modulator-slot register to the matching carrier slot.
pub const CARRIER: u8 = 0x03;

/// Key-on bit of the [`CH_KEY_BLOCK`] register.
pub const KEY_ON: u8 = 0x20;

/// Channels addressable on a single chip.
pub const CHANNELS_PER_CHIP: usize = 9;

/// First-operator register offset for each of the nine channels.
///
/// The operator file skips addresses ending in 0x06/0x07 and 0x0D
/// through 0x0F, which is why the table is not a plain sequence.
pub const OPERATOR_OFFSETS: [u8; 9] = [0x00, 0x01, 0x02, 0x08, 0x09, 0x0A, 0x10, 0x11, 0x12];

bitflags! {
    /// Depth bits of the [`TREMOLO_VIBRATO`] register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DepthFlags: u8 {
        /// Deep tremolo (4.8 dB instead of 1 dB).
        const TREMOLO = 0x80;
        /// Deep vibrato (14 cents instead of 7).
        const VIBRATO = 0x40;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_offsets_are_distinct_and_increasing() {
        for window in OPERATOR_OFFSETS.windows(2) {
            assert!(
                window[0] < window[1],
                "operator offsets must be strictly increasing: {:?}",
                OPERATOR_OFFSETS
            );
        }
    }

    #[test]
    fn operator_offsets_skip_invalid_slots() {
        // Offsets 0x06, 0x07 and 0x0D-0x0F do not address operators.
        for invalid in [0x06u8, 0x07, 0x0D, 0x0E, 0x0F] {
            assert!(!OPERATOR_OFFSETS.contains(&invalid));
        }
    }

    #[test]
    fn carrier_slot_stays_inside_operator_file() {
        for offset in OPERATOR_OFFSETS {
            assert!(OP_LEVEL + offset + CARRIER < OP_ATTACK_DECAY);
        }
    }

    #[test]
    fn depth_flags_match_register_bits() {
        assert_eq!(DepthFlags::TREMOLO.bits(), 0x80);
        assert_eq!(DepthFlags::VIBRATO.bits(), 0x40);
        let both = DepthFlags::TREMOLO | DepthFlags::VIBRATO;
        assert_eq!(both.bits(), 0xC0);
    }
}
