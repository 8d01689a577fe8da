//! Module data model and storage lifecycle
//!
//! Everything the engine reads during playback lives here:
//!
//! - instruments, track cells, the pattern arena and the order list
//! - the track-index table that lets patterns alias track storage
//! - dialect flags and timing configuration consumed by the interpreter
//! - the allocation operations loaders call before populating storage
//!
//! Loaders populate a [`Module`] once; the engine treats it as
//! read-only for the lifetime of playback. All storage is sized by the
//! allocation calls up front, so the per-tick path never grows or
//! bounds-checks deeply.

use bitflags::bitflags;

use crate::error::{ReplayerError, Result};

/// Order-list entries at or above this value encode a jump to
/// `entry - JUMP_MARKER`.
pub const JUMP_MARKER: u8 = 0x80;

/// Maximum order-list length.
pub const MAX_ORDER_LENGTH: usize = 128;

/// Maximum pattern count.
pub const MAX_PATTERNS: usize = 128;

/// Maximum channel-tracks per pattern: two chips of nine channels.
pub const MAX_CHANNELS: usize = 18;

/// Maximum instrument count.
pub const MAX_INSTRUMENTS: usize = 255;

bitflags! {
    /// Dialect behaviour switches set by loaders.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DialectFlags: u16 {
        /// Effect parameters are decimal digits (`p1 * 10 + p2`)
        /// instead of hex nibbles.
        const DECIMAL = 0x0001;
        /// Alternate volume semantics: full volume forced at note-on,
        /// averaged register formula.
        const FAUST = 0x0002;
        /// Suppress the key-off register write that normally precedes
        /// note-on.
        const NO_KEY_ON = 0x0004;
        /// Enable OPL3 mode on the second register bank at rewind.
        const OPL3 = 0x0008;
        /// Deep tremolo from rewind onward.
        const TREMOLO = 0x0010;
        /// Deep vibrato from rewind onward.
        const VIBRATO = 0x0020;
    }
}

/// One entry of the instrument bank.
///
/// Instruments are populated by a loader and read-only during playback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Instrument {
    /// Opaque synthesis register bytes; see the index constants below.
    pub registers: [u8; 11],
    /// Chip-wide tremolo/vibrato depth byte written at note-on.
    pub misc: u8,
    /// Signed frequency bias applied at note-on.
    pub slide: i8,
    /// First special-arpeggio script position.
    pub arp_start: u8,
    /// Ticks between special-arpeggio steps.
    pub arp_speed: u8,
    /// Load-time script position; loaders normally leave this equal to
    /// `arp_start`. Playback state lives in the channel record.
    pub arp_pos: u8,
    /// Load-time step-counter value copied into the channel at note-on.
    pub arp_speed_counter: u8,
}

impl Instrument {
    /// Feedback/connection byte, written to `0xC0 + channel`.
    pub const FEEDBACK: usize = 0;
    /// Modulator characteristic, written to `0x20 + op`.
    pub const MOD_CHARACTERISTIC: usize = 1;
    /// Carrier characteristic, written to `0x23 + op`.
    pub const CAR_CHARACTERISTIC: usize = 2;
    /// Modulator attack/decay, written to `0x60 + op`.
    pub const MOD_ATTACK_DECAY: usize = 3;
    /// Carrier attack/decay, written to `0x63 + op`.
    pub const CAR_ATTACK_DECAY: usize = 4;
    /// Modulator sustain/release, written to `0x80 + op`.
    pub const MOD_SUSTAIN_RELEASE: usize = 5;
    /// Carrier sustain/release, written to `0x83 + op`.
    pub const CAR_SUSTAIN_RELEASE: usize = 6;
    /// Modulator waveform, written to `0xE0 + op`.
    pub const MOD_WAVEFORM: usize = 7;
    /// Carrier waveform, written to `0xE3 + op`.
    pub const CAR_WAVEFORM: usize = 8;
    /// Modulator key-scale level (top two bits) and output level.
    pub const MOD_LEVEL: usize = 9;
    /// Carrier key-scale level (top two bits) and output level.
    pub const CAR_LEVEL: usize = 10;

    /// Whether the connection bit selects additive synthesis, in which
    /// case the alternate volume slides touch the modulator too.
    pub fn is_additive(&self) -> bool {
        self.registers[Self::FEEDBACK] & 0x01 != 0
    }
}

/// One row of one channel-track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackCell {
    /// 0 = none, 1-96 = chromatic step, 127 = key-off.
    pub note: u8,
    /// 1-based instrument; 0 keeps the current one.
    pub instrument: u8,
    /// Canonical effect opcode (see [`crate::commands::Command`]).
    pub command: u8,
    /// First effect parameter.
    pub param1: u8,
    /// Second effect parameter.
    pub param2: u8,
}

/// Shared special-arpeggio script tables.
///
/// Both tables are fixed 256-byte pools; positions beyond the loaded
/// script read as zero, so a script pointer parked in the tail simply
/// replays the current note.
#[derive(Debug, Clone)]
pub struct ArpeggioScript {
    /// Note list: values >= 100 are absolute notes (`value - 100`),
    /// values <= 96 are relative offsets.
    pub list: [u8; 256],
    /// Opcode list: 0 = note step, 252 = set volume, 253 = key-off,
    /// 254 = loop, 255 = hold, anything else = waveform register write.
    pub commands: [u8; 256],
}

impl Default for ArpeggioScript {
    fn default() -> Self {
        Self {
            list: [0; 256],
            commands: [0; 256],
        }
    }
}

/// A parsed tracker module.
///
/// Loaders drive the `allocate_*` operations, fill in storage through
/// the mutable accessors and set the dialect configuration; the engine
/// only ever reads.
#[derive(Debug, Clone, Default)]
pub struct Module {
    order: Vec<u8>,
    instruments: Vec<Instrument>,
    /// Track-major cell arena: `track * rows + row`.
    cells: Vec<TrackCell>,
    /// Aliasing table: `pattern * channels + channel` -> 1-based track
    /// id, 0 = no track.
    track_index: Vec<u16>,
    pattern_count: usize,
    rows_per_pattern: usize,
    channel_count: usize,
    track_count: usize,
    arpeggio: Option<Box<ArpeggioScript>>,

    /// Dialect behaviour switches.
    pub flags: DialectFlags,
    /// Bit `n` set = channel `n` participates in playback.
    pub active_channels: u32,
    /// Ticks per row at rewind.
    pub initial_speed: u8,
    /// Tempo at rewind; the refresh rate derives from this.
    pub initial_tempo: u8,
    /// Order position playback wraps to when the list is exhausted.
    pub restart_position: usize,
    /// Fixed refresh rate for dialects that ignore the tempo, in Hz.
    pub refresh_override: Option<f32>,
}

impl Module {
    /// Create an empty module with default timing (speed 6, tempo 125).
    pub fn new() -> Self {
        Self {
            active_channels: u32::MAX,
            initial_speed: 6,
            initial_tempo: 125,
            ..Self::default()
        }
    }

    /// Allocate the order list, replacing any previous one with zeros.
    pub fn allocate_order(&mut self, length: usize) -> Result<()> {
        if length == 0 {
            return Err(ReplayerError::EmptyDimension {
                what: "order list",
                dimension: "length",
            });
        }
        if length > MAX_ORDER_LENGTH {
            return Err(ReplayerError::AllocationLimit {
                what: "order list",
                requested: length,
                max: MAX_ORDER_LENGTH,
            });
        }
        self.order.clear();
        self.order.resize(length, 0);
        Ok(())
    }

    /// Allocate pattern storage, replacing any previous arena with
    /// zero-filled cells.
    ///
    /// One track per `(pattern, channel)` pair is allocated; call
    /// [`Module::build_default_track_index`] afterwards, before any
    /// aliasing overrides.
    pub fn allocate_patterns(&mut self, patterns: usize, rows: usize, channels: usize) -> Result<()> {
        if patterns == 0 || rows == 0 || channels == 0 {
            return Err(ReplayerError::EmptyDimension {
                what: "pattern storage",
                dimension: if patterns == 0 {
                    "patterns"
                } else if rows == 0 {
                    "rows"
                } else {
                    "channels"
                },
            });
        }
        if patterns > MAX_PATTERNS {
            return Err(ReplayerError::AllocationLimit {
                what: "pattern storage",
                requested: patterns,
                max: MAX_PATTERNS,
            });
        }
        if channels > MAX_CHANNELS {
            return Err(ReplayerError::AllocationLimit {
                what: "channel tracks",
                requested: channels,
                max: MAX_CHANNELS,
            });
        }

        self.pattern_count = patterns;
        self.rows_per_pattern = rows;
        self.channel_count = channels;
        self.track_count = patterns * channels;
        self.cells.clear();
        self.cells.resize(self.track_count * rows, TrackCell::default());
        self.track_index.clear();
        self.track_index.resize(self.track_count, 0);
        Ok(())
    }

    /// Allocate the instrument bank, replacing any previous one with
    /// zeroed instruments.
    pub fn allocate_instruments(&mut self, count: usize) -> Result<()> {
        if count > MAX_INSTRUMENTS {
            return Err(ReplayerError::AllocationLimit {
                what: "instrument bank",
                requested: count,
                max: MAX_INSTRUMENTS,
            });
        }
        self.instruments.clear();
        self.instruments.resize(count, Instrument::default());
        Ok(())
    }

    /// Map every `(pattern, channel)` to its own sequential track id.
    ///
    /// Must run after [`Module::allocate_patterns`]; loaders overwrite
    /// individual entries afterwards to alias tracks between patterns.
    pub fn build_default_track_index(&mut self) {
        for (slot, entry) in self.track_index.iter_mut().enumerate() {
            *entry = (slot + 1) as u16;
        }
    }

    /// Override one track-index entry.
    pub fn set_track_index(&mut self, pattern: usize, channel: usize, track: u16) -> Result<()> {
        if track as usize > self.track_count {
            return Err(ReplayerError::InvalidTrackIndex {
                track,
                pattern,
                channel,
                available: self.track_count,
            });
        }
        let slot = pattern * self.channel_count + channel;
        if slot >= self.track_index.len() {
            return Err(ReplayerError::InvalidTrackIndex {
                track,
                pattern,
                channel,
                available: self.track_count,
            });
        }
        self.track_index[slot] = track;
        Ok(())
    }

    /// 1-based track id for `(pattern, channel)`; 0 means the channel
    /// is silent in this pattern.
    pub fn track_for(&self, pattern: usize, channel: usize) -> u16 {
        if pattern >= self.pattern_count || channel >= self.channel_count {
            return 0;
        }
        self.track_index[pattern * self.channel_count + channel]
    }

    /// Cell at `row` of the 1-based `track`.
    pub fn cell(&self, track: u16, row: usize) -> &TrackCell {
        &self.cells[(track as usize - 1) * self.rows_per_pattern + row]
    }

    /// Mutable cell access for loaders.
    pub fn cell_mut(&mut self, track: u16, row: usize) -> &mut TrackCell {
        &mut self.cells[(track as usize - 1) * self.rows_per_pattern + row]
    }

    /// The order list.
    pub fn order(&self) -> &[u8] {
        &self.order
    }

    /// Mutable order-list access for loaders.
    pub fn order_mut(&mut self) -> &mut [u8] {
        &mut self.order
    }

    /// Instrument by 0-based index.
    pub fn instrument(&self, index: usize) -> Option<&Instrument> {
        self.instruments.get(index)
    }

    /// Mutable instrument access for loaders.
    pub fn instrument_mut(&mut self, index: usize) -> Option<&mut Instrument> {
        self.instruments.get_mut(index)
    }

    /// Install the shared special-arpeggio script tables.
    pub fn set_arpeggio_script(&mut self, script: ArpeggioScript) {
        self.arpeggio = Some(Box::new(script));
    }

    /// The special-arpeggio script, if the dialect supplies one.
    pub fn arpeggio(&self) -> Option<&ArpeggioScript> {
        self.arpeggio.as_deref()
    }

    /// Allocated pattern count.
    pub fn pattern_count(&self) -> usize {
        self.pattern_count
    }

    /// Rows per pattern.
    pub fn rows_per_pattern(&self) -> usize {
        self.rows_per_pattern
    }

    /// Channel-tracks per pattern.
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Allocated track count.
    pub fn track_count(&self) -> usize {
        self.track_count
    }

    /// Order-list length.
    pub fn order_length(&self) -> usize {
        self.order.len()
    }

    /// Instrument count.
    pub fn instrument_count(&self) -> usize {
        self.instruments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_track_index_is_identity() {
        let mut module = Module::new();
        module.allocate_patterns(3, 64, 4).unwrap();
        module.build_default_track_index();

        let mut expected = 1u16;
        for pattern in 0..3 {
            for channel in 0..4 {
                assert_eq!(module.track_for(pattern, channel), expected);
                expected += 1;
            }
        }
    }

    #[test]
    fn reallocation_replaces_and_zero_fills() {
        let mut module = Module::new();
        module.allocate_patterns(1, 4, 1).unwrap();
        module.build_default_track_index();
        module.cell_mut(1, 0).note = 60;

        module.allocate_patterns(1, 4, 1).unwrap();
        module.build_default_track_index();
        assert_eq!(module.cell(1, 0).note, 0);
    }

    #[test]
    fn aliasing_lets_patterns_share_tracks() {
        let mut module = Module::new();
        module.allocate_patterns(2, 8, 2).unwrap();
        module.build_default_track_index();

        // Pattern 1, channel 0 reuses pattern 0's first track.
        module.set_track_index(1, 0, 1).unwrap();
        module.cell_mut(1, 3).note = 48;
        assert_eq!(module.cell(module.track_for(1, 0), 3).note, 48);

        // Index 0 silences the channel.
        module.set_track_index(1, 1, 0).unwrap();
        assert_eq!(module.track_for(1, 1), 0);
    }

    #[test]
    fn allocation_limits_are_fatal() {
        let mut module = Module::new();
        assert!(matches!(
            module.allocate_order(MAX_ORDER_LENGTH + 1),
            Err(ReplayerError::AllocationLimit { .. })
        ));
        assert!(matches!(
            module.allocate_order(0),
            Err(ReplayerError::EmptyDimension { .. })
        ));
        assert!(matches!(
            module.allocate_patterns(1, 64, MAX_CHANNELS + 1),
            Err(ReplayerError::AllocationLimit { .. })
        ));
        assert!(matches!(
            module.allocate_instruments(MAX_INSTRUMENTS + 1),
            Err(ReplayerError::AllocationLimit { .. })
        ));
    }

    #[test]
    fn track_index_override_is_bounds_checked() {
        let mut module = Module::new();
        module.allocate_patterns(2, 8, 2).unwrap();
        module.build_default_track_index();
        assert!(matches!(
            module.set_track_index(0, 0, 5),
            Err(ReplayerError::InvalidTrackIndex { .. })
        ));
    }

    #[test]
    fn out_of_range_lookups_fall_back_to_silence() {
        let mut module = Module::new();
        module.allocate_patterns(1, 8, 2).unwrap();
        module.build_default_track_index();
        assert_eq!(module.track_for(7, 0), 0);
        assert_eq!(module.track_for(0, 9), 0);
    }
}
