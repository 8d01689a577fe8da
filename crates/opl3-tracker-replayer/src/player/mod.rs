//! Tracker playback engine
//!
//! One engine type drives every dialect: loaders configure behaviour
//! through [`Module`]'s dialect flags instead of the replayer growing
//! per-format subtypes. The tick entry point is allocation-free;
//! everything the hot path touches is sized at construction.

mod effects;
mod output;
mod tick;


use opl3::registers::{self, DepthFlags};
use opl3::OplBackend;

use crate::channel::ChannelState;
use crate::error::{ReplayerError, Result};
use crate::format::{DialectFlags, Module};

/// Row-scope bookkeeping: at most one manual position change per row.
#[derive(Default)]
pub(crate) struct RowControl {
    pub(crate) jump: Option<Jump>,
}

/// Manual position change requested by a row command.
pub(crate) enum Jump {
    /// Restart at row 0 of the given order position.
    Position(usize),
    /// Continue at the given row of the next order entry.
    Break(usize),
}

/// Generic tracker-module playback engine.
///
/// Owns the parsed [`Module`] and all per-channel runtime state, and
/// emits register writes through the [`OplBackend`] it was constructed
/// with. Exactly one [`TrackerEngine::tick`] call is expected per
/// scheduler callback, at [`TrackerEngine::refresh_rate`] Hz.
pub struct TrackerEngine<B: OplBackend> {
    pub(crate) backend: B,
    pub(crate) module: Module,
    pub(crate) channels: Vec<ChannelState>,

    pub(crate) order_pos: usize,
    pub(crate) row: usize,
    /// Ticks left before the next row is read.
    pub(crate) delay: u32,
    /// Extra frames appended to the next delay reload.
    pub(crate) pattern_delay: u32,
    pub(crate) speed: u8,
    pub(crate) tempo: u8,
    /// Current 0xBD depth bits.
    pub(crate) depth: DepthFlags,
    pub(crate) song_end: bool,
}

impl<B: OplBackend> TrackerEngine<B> {
    /// Build an engine over a populated module and rewind it.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayerError::UnallocatedModule`] if the module has
    /// no pattern storage.
    pub fn new(module: Module, backend: B) -> Result<Self> {
        if module.pattern_count() == 0 || module.channel_count() == 0 {
            return Err(ReplayerError::UnallocatedModule);
        }

        let channels = vec![ChannelState::default(); module.channel_count()];
        let mut engine = Self {
            backend,
            speed: module.initial_speed,
            tempo: module.initial_tempo,
            module,
            channels,
            order_pos: 0,
            row: 0,
            delay: 0,
            pattern_delay: 0,
            depth: DepthFlags::empty(),
            song_end: false,
        };
        engine.rewind();
        Ok(engine)
    }

    /// Reset playback to the start of the song.
    ///
    /// Re-initializes every channel, restores the module's initial
    /// speed and tempo, initializes the backend and performs the
    /// waveform-select / OPL3 / depth setup writes. Not meant to run
    /// concurrently with ticking; calling it twice in a row is
    /// harmless.
    pub fn rewind(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
        self.order_pos = 0;
        self.row = 0;
        self.delay = 0;
        self.pattern_delay = 0;
        self.speed = self.module.initial_speed;
        self.tempo = self.module.initial_tempo;
        self.song_end = false;
        self.depth = DepthFlags::empty();

        self.backend.init();
        self.backend.set_chip(0);
        self.backend
            .write(registers::TEST_WSE, registers::WSE_ENABLE);

        if self.module.flags.contains(DialectFlags::OPL3) {
            self.backend.set_chip(1);
            self.backend.write(registers::OPL3_MODE, 0x01);
            self.backend.set_chip(0);
        }

        self.depth
            .set(DepthFlags::TREMOLO, self.module.flags.contains(DialectFlags::TREMOLO));
        self.depth
            .set(DepthFlags::VIBRATO, self.module.flags.contains(DialectFlags::VIBRATO));
        if !self.depth.is_empty() {
            self.backend
                .write(registers::TREMOLO_VIBRATO, self.depth.bits());
        }
    }

    /// Number of patterns in the module.
    pub fn pattern_count(&self) -> usize {
        self.module.pattern_count()
    }

    /// Order-list entry at the current position.
    pub fn current_pattern(&self) -> usize {
        self.module
            .order()
            .get(self.order_pos)
            .copied()
            .unwrap_or(0) as usize
    }

    /// Order-list length.
    pub fn order_length(&self) -> usize {
        self.module.order_length()
    }

    /// Current order position.
    pub fn current_order(&self) -> usize {
        self.order_pos
    }

    /// Current row within the pattern.
    pub fn current_row(&self) -> usize {
        self.row
    }

    /// Current speed in ticks per row; 0 while paused.
    pub fn speed(&self) -> u8 {
        self.speed
    }

    /// Current tempo value.
    pub fn tempo(&self) -> u8 {
        self.tempo
    }

    /// Tick rate the caller should schedule, in Hz.
    ///
    /// Derived from the tempo unless the dialect fixes a rate.
    pub fn refresh_rate(&self) -> f32 {
        self.module
            .refresh_override
            .unwrap_or(self.tempo as f32 / 2.5)
    }

    /// Whether the song has reached its end at least once.
    ///
    /// Song-end is a status, not a failure: the engine keeps playing
    /// from the restart position.
    pub fn song_ended(&self) -> bool {
        self.song_end
    }

    /// Number of channels the engine drives.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Runtime state of one channel.
    pub fn channel(&self, index: usize) -> Option<&ChannelState> {
        self.channels.get(index)
    }

    /// The module being played.
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// The synthesis backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the synthesis backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub(crate) fn channel_active(&self, chan: usize) -> bool {
        self.module.active_channels & (1u32 << chan) != 0
    }

    pub(crate) fn decimal(&self) -> bool {
        self.module.flags.contains(DialectFlags::DECIMAL)
    }
}
