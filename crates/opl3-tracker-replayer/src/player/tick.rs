//! Tick processing and song advancement.
//!
//! The per-tick control flow:
//!
//! - run the continuous effect pass (every tick, held ticks included)
//! - on a held tick, decrement the delay counter and stop
//! - otherwise resolve the order position, read the row into channel
//!   state, run the row effect pass and trigger notes
//! - advance the position unless a jump or break already moved it

use opl3::OplBackend;

use super::{Jump, RowControl, TrackerEngine};
use crate::commands::Command;
use crate::format::{TrackCell, JUMP_MARKER};
use crate::frequency::{normalize_note, note_to_freq, NOTE_KEY_OFF};

impl<B: OplBackend> TrackerEngine<B> {
    /// Advance playback by one tick.
    ///
    /// Returns `true` while the song keeps playing and `false` once it
    /// has ended; the engine keeps playing from the restart position
    /// either way, so callers decide whether to stop, loop or rewind.
    /// This call never fails and never allocates.
    pub fn tick(&mut self) -> bool {
        // Speed 0 is a valid paused state, not an error.
        if self.speed == 0 {
            return !self.song_end;
        }

        self.continuous_pass();

        // Mid-row hold: no row is (re)read on held ticks.
        if self.delay > 0 {
            self.delay -= 1;
            return !self.song_end;
        }

        if !self.resolve_order() {
            // Degenerate jump: stay put, try again next tick.
            return !self.song_end;
        }

        self.row_pass();

        self.delay = (self.speed as u32).saturating_sub(1) + self.pattern_delay;
        self.pattern_delay = 0;
        !self.song_end
    }

    /// Follow jump entries from the current order position.
    ///
    /// Returns `false` without moving for a degenerate jump: a direct
    /// self-loop, or any cycle longer than the order list. Running past
    /// the end of the list marks song-end and wraps to the restart
    /// position.
    fn resolve_order(&mut self) -> bool {
        let order_len = self.module.order_length();
        if order_len == 0 {
            self.song_end = true;
            return false;
        }

        let mut pos = self.order_pos;
        let mut hops = 0;
        loop {
            if pos >= order_len {
                self.song_end = true;
                pos = self.module.restart_position.min(order_len - 1);
            }
            let entry = self.module.order()[pos];
            if entry < JUMP_MARKER {
                break;
            }

            let target = (entry - JUMP_MARKER) as usize;
            if target == pos || hops >= order_len {
                return false;
            }
            if target <= pos {
                // A backward jump closes the song's loop.
                self.song_end = true;
            }
            pos = target;
            hops += 1;
        }

        self.order_pos = pos;
        true
    }

    /// Read the current row into channel state, run row effects and
    /// trigger notes, then advance the position.
    fn row_pass(&mut self) {
        let pattern = self.module.order()[self.order_pos] as usize;
        let mut control = RowControl::default();

        for chan in 0..self.channels.len() {
            if !self.channel_active(chan) {
                continue;
            }
            let track = self.module.track_for(pattern, chan);
            if track == 0 {
                continue;
            }

            let cell = *self.module.cell(track, self.row);
            let trigger = self.read_cell(chan, &cell);
            self.row_effect(chan, &cell, &mut control);
            if trigger {
                self.play_note(chan);
            }
        }

        let rows = self.module.rows_per_pattern();
        match control.jump {
            Some(Jump::Position(target)) => {
                self.row = 0;
                self.order_pos = target;
            }
            Some(Jump::Break(row)) => {
                self.row = row.min(rows - 1);
                self.order_pos += 1;
            }
            None => {
                self.row += 1;
                if self.row >= rows {
                    self.row = 0;
                    self.order_pos += 1;
                }
            }
        }
    }

    /// Copy a cell into channel state.
    ///
    /// Returns whether the row triggers a note: cells without a note,
    /// key-off cells and tone-portamento rows (which capture a slide
    /// target instead of retriggering) do not.
    fn read_cell(&mut self, chan: usize, cell: &TrackCell) -> bool {
        {
            let ch = &mut self.channels[chan];
            if cell.instrument != 0 {
                ch.instrument = (cell.instrument - 1) as usize;
            }
            ch.command = cell.command;
            ch.param1 = cell.param1;
            ch.param2 = cell.param2;
        }

        match cell.note {
            0 => false,
            NOTE_KEY_OFF => {
                self.key_off(chan);
                false
            }
            note => {
                let portamento = matches!(
                    Command::from_opcode(cell.command),
                    Command::TonePortamento | Command::TonePortaVolumeSlide
                );
                if portamento {
                    let (freq, octave) = note_to_freq(normalize_note(note as i32));
                    let ch = &mut self.channels[chan];
                    ch.next_freq = freq;
                    ch.next_octave = octave;
                    false
                } else {
                    self.channels[chan].note = note;
                    true
                }
            }
        }
    }
}
