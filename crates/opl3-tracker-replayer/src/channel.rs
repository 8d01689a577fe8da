//! Per-channel runtime state.
//!
//! One record exists per channel-track for the lifetime of playback;
//! rewind re-initializes it in place. The armed command and parameters
//! persist across ticks so continuous effects keep running between
//! rows.

/// Runtime state of one channel-track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelState {
    /// Current F-number.
    pub freq: u16,
    /// Current block (octave), 0-7.
    pub octave: u8,
    /// Tone-portamento target F-number.
    pub next_freq: u16,
    /// Tone-portamento target octave.
    pub next_octave: u8,
    /// Carrier volume, 0-63 (63 = loudest).
    pub vol_carrier: u8,
    /// Modulator volume, 0-63.
    pub vol_modulator: u8,
    /// Active instrument, 0-based.
    pub instrument: usize,
    /// Armed effect opcode (canonical numbering).
    pub command: u8,
    /// Armed first parameter.
    pub param1: u8,
    /// Armed second parameter.
    pub param2: u8,
    /// Key-on flag mirrored into the key/block register.
    pub key_on: bool,
    /// Last triggered note (1-96).
    pub note: u8,
    /// Remembered vibrato speed.
    pub vib_speed: u8,
    /// Remembered vibrato depth.
    pub vib_depth: u8,
    /// Remembered tone-portamento step.
    pub porta_speed: u8,
    /// Special-arpeggio script position.
    pub arp_pos: u8,
    /// Ticks left before the next script step.
    pub arp_speed_counter: u8,
    /// Tick-local phase counter shared by plain arpeggio and vibrato.
    pub trigger: u8,
}

impl ChannelState {
    /// Reset to the powered-on state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
