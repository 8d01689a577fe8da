//! Effect interpreter.
//!
//! Two dispatch passes per tick, both keyed on the channel's armed
//! `(command, param1, param2)`:
//!
//! - the continuous pass runs every tick (held ticks included) and
//!   covers arpeggio, slides, vibrato, portamento, the gated volume
//!   slides, retrigger and the special-arpeggio script interpreter
//! - the row pass runs once per freshly read row and covers parameter
//!   memorization, tempo/speed sets, volume sets, position changes,
//!   extended sub-commands, waveform and depth writes
//!
//! Unknown commands are no-ops: dialect loaders normalize unsupported
//! effects to a sentinel the interpreter ignores.

use opl3::registers::DepthFlags;
use opl3::OplBackend;

use super::{Jump, RowControl, TrackerEngine};
use crate::commands::{join_params, Command, ExtendedOp};
use crate::format::TrackCell;
use crate::frequency::{self, porta_metric, MAX_NOTE, VIBRATO_TABLE};

impl<B: OplBackend> TrackerEngine<B> {
    /// Run the continuous effects for every active channel.
    pub(super) fn continuous_pass(&mut self) {
        for chan in 0..self.channels.len() {
            if !self.channel_active(chan) {
                continue;
            }
            self.special_arpeggio(chan);
            self.continuous_effect(chan);
        }
    }

    fn continuous_effect(&mut self, chan: usize) {
        let (command, info1, info2) = {
            let ch = &self.channels[chan];
            (Command::from_opcode(ch.command), ch.param1, ch.param2)
        };
        let info = join_params(info1, info2, self.decimal());

        match command {
            Command::Arpeggio => self.plain_arpeggio(chan, info, info1, info2),
            Command::SlideUp => {
                self.slide_channel_up(chan, info);
                self.write_freq(chan);
            }
            Command::SlideDown => {
                self.slide_channel_down(chan, info);
                self.write_freq(chan);
            }
            Command::TonePortamento => self.tone_portamento(chan),
            Command::Vibrato => self.vibrato(chan),
            Command::TonePortaVolumeSlide => {
                self.tone_portamento(chan);
                self.gated_volume_slide(chan, info1, info2, false);
            }
            Command::VibratoVolumeSlide => {
                self.vibrato(chan);
                self.gated_volume_slide(chan, info1, info2, false);
            }
            Command::VolumeSlide => self.gated_volume_slide(chan, info1, info2, false),
            Command::AmdVolumeSlide => self.gated_volume_slide(chan, info1, info2, true),
            Command::Extended => {
                if ExtendedOp::from_param(info1) == ExtendedOp::RetrigNote
                    && self.delay % (info2 as u32 + 1) == 0
                {
                    self.play_note(chan);
                }
            }
            _ => {}
        }
    }

    /// Cycle note, note+param1, note+param2 over a three-tick phase.
    fn plain_arpeggio(&mut self, chan: usize, info: u16, info1: u8, info2: u8) {
        if info == 0 {
            return;
        }
        let (phase, base) = {
            let ch = &mut self.channels[chan];
            ch.trigger = if ch.trigger < 2 { ch.trigger + 1 } else { 0 };
            (ch.trigger, ch.note as i32)
        };
        let note = match phase {
            0 => base,
            1 => base + info1 as i32,
            _ => base + info2 as i32,
        };
        self.set_note(chan, note);
    }

    fn slide_channel_up(&mut self, chan: usize, amount: u16) {
        let ch = &mut self.channels[chan];
        let (mut freq, mut octave) = (ch.freq, ch.octave);
        frequency::slide_up(&mut freq, &mut octave, amount);
        ch.freq = freq;
        ch.octave = octave;
    }

    fn slide_channel_down(&mut self, chan: usize, amount: u16) {
        let ch = &mut self.channels[chan];
        let (mut freq, mut octave) = (ch.freq, ch.octave);
        frequency::slide_down(&mut freq, &mut octave, amount);
        ch.freq = freq;
        ch.octave = octave;
    }

    /// Converge on the portamento target by one step, snapping exactly
    /// on overshoot in either direction.
    fn tone_portamento(&mut self, chan: usize) {
        let (current, target, step) = {
            let ch = &self.channels[chan];
            (
                porta_metric(ch.freq, ch.octave),
                porta_metric(ch.next_freq, ch.next_octave),
                ch.porta_speed as u16,
            )
        };

        if current < target {
            self.slide_channel_up(chan, step);
            let ch = &mut self.channels[chan];
            if porta_metric(ch.freq, ch.octave) > target {
                ch.freq = ch.next_freq;
                ch.octave = ch.next_octave;
            }
        } else if current > target {
            self.slide_channel_down(chan, step);
            let ch = &mut self.channels[chan];
            if porta_metric(ch.freq, ch.octave) < target {
                ch.freq = ch.next_freq;
                ch.octave = ch.next_octave;
            }
        }
        self.write_freq(chan);
    }

    /// Triangular vibrato: the phase advances by `speed` per tick and
    /// wraps at 64; depth scales the table through `1 / (16 - depth)`.
    fn vibrato(&mut self, chan: usize) {
        let (speed, depth) = {
            let ch = &self.channels[chan];
            (ch.vib_speed, ch.vib_depth)
        };
        if speed == 0 || depth == 0 {
            return;
        }
        let scale = (16 - depth.min(14)) as u16;

        for _ in 0..speed {
            let phase = {
                let ch = &mut self.channels[chan];
                ch.trigger = (ch.trigger + 1) % 64;
                ch.trigger as usize
            };
            if phase < 16 {
                let amount = VIBRATO_TABLE[phase + 16] as u16 / scale;
                self.slide_channel_up(chan, amount);
            } else if phase < 48 {
                let amount = VIBRATO_TABLE[phase - 16] as u16 / scale;
                self.slide_channel_down(chan, amount);
            } else {
                let amount = VIBRATO_TABLE[phase - 48] as u16 / scale;
                self.slide_channel_up(chan, amount);
            }
        }
        self.write_freq(chan);
    }

    /// Volume slide gated on every fourth frame of the row.
    fn gated_volume_slide(&mut self, chan: usize, up: u8, down: u8, alternate: bool) {
        if self.delay % 4 != 0 {
            return;
        }
        if up != 0 {
            self.volume_up(chan, up, alternate);
        } else {
            self.volume_down(chan, down, alternate);
        }
        self.write_volume(chan);
    }

    pub(super) fn volume_up(&mut self, chan: usize, amount: u8, alternate: bool) {
        let modulator_too = !alternate || self.instrument_is_additive(chan);
        let ch = &mut self.channels[chan];
        ch.vol_carrier = ch.vol_carrier.saturating_add(amount).min(63);
        if modulator_too {
            ch.vol_modulator = ch.vol_modulator.saturating_add(amount).min(63);
        }
    }

    pub(super) fn volume_down(&mut self, chan: usize, amount: u8, alternate: bool) {
        let modulator_too = !alternate || self.instrument_is_additive(chan);
        let ch = &mut self.channels[chan];
        ch.vol_carrier = ch.vol_carrier.saturating_sub(amount);
        if modulator_too {
            ch.vol_modulator = ch.vol_modulator.saturating_sub(amount);
        }
    }

    fn instrument_is_additive(&self, chan: usize) -> bool {
        self.module
            .instrument(self.channels[chan].instrument)
            .map(|inst| inst.is_additive())
            .unwrap_or(false)
    }

    /// Step the shared special-arpeggio script for this channel.
    fn special_arpeggio(&mut self, chan: usize) {
        // Channels that never played a note never start their script.
        if self.channels[chan].note == 0 {
            return;
        }

        let (cmd, value, speed) = {
            let ch = &self.channels[chan];
            let Some(script) = self.module.arpeggio() else {
                return;
            };
            let Some(inst) = self.module.instrument(ch.instrument) else {
                return;
            };
            let pos = ch.arp_pos as usize;
            (script.commands[pos], script.list[pos], inst.arp_speed)
        };

        {
            let ch = &mut self.channels[chan];
            if ch.arp_speed_counter > 0 {
                ch.arp_speed_counter -= 1;
                return;
            }
        }

        match cmd {
            // Parked script: no step, no counter reload.
            255 => return,
            252 => {
                let volume = value.min(63);
                let ch = &mut self.channels[chan];
                ch.vol_carrier = volume;
                ch.vol_modulator = volume;
                self.write_volume(chan);
            }
            253 => self.key_off(chan),
            254 => {
                let ch = &mut self.channels[chan];
                ch.arp_pos = value;
                ch.arp_speed_counter = speed.saturating_sub(1);
                return;
            }
            0 => {}
            cmd => self.write_script_waveform(chan, cmd),
        }

        if cmd != 252 {
            let note = match value {
                v if v >= 100 => Some((v - 100) as i32),
                v if v <= MAX_NOTE => Some(self.channels[chan].note as i32 + v as i32),
                _ => None,
            };
            if let Some(note) = note {
                self.set_note(chan, note);
            }
        }

        let ch = &mut self.channels[chan];
        // The pointer parks at the end of the pool instead of wrapping
        // back into the script.
        ch.arp_pos = ch.arp_pos.saturating_add(1);
        ch.arp_speed_counter = speed.saturating_sub(1);
    }

    /// Run one channel's row-triggered effect.
    pub(super) fn row_effect(&mut self, chan: usize, cell: &TrackCell, control: &mut RowControl) {
        let info1 = cell.param1;
        let info2 = cell.param2;
        let info = join_params(info1, info2, self.decimal());

        match Command::from_opcode(cell.command) {
            Command::TonePortamento => {
                if info != 0 {
                    self.channels[chan].porta_speed = info.min(255) as u8;
                }
            }
            Command::Vibrato => {
                let ch = &mut self.channels[chan];
                if info1 != 0 {
                    ch.vib_speed = info1;
                }
                if info2 != 0 {
                    ch.vib_depth = info2;
                }
            }
            Command::SetTempo => {
                if info != 0 {
                    self.tempo = info.min(255) as u8;
                }
            }
            Command::NoteRelease => self.key_off(chan),
            Command::SetOperatorVolume => {
                {
                    let ch = &mut self.channels[chan];
                    if info1 != 0 {
                        ch.vol_carrier = (info1 as u16 * 7).min(63) as u8;
                    } else {
                        ch.vol_modulator = (info2 as u16 * 7).min(63) as u8;
                    }
                }
                self.write_volume(chan);
            }
            Command::PositionJump => {
                if control.jump.is_none() {
                    let target = info as usize;
                    if target < self.order_pos {
                        self.song_end = true;
                    }
                    control.jump = Some(Jump::Position(target));
                }
            }
            Command::SetVolume => {
                let volume = info.min(63) as u8;
                {
                    let ch = &mut self.channels[chan];
                    ch.vol_carrier = volume;
                    ch.vol_modulator = volume;
                }
                self.write_volume(chan);
            }
            Command::PatternBreak => {
                if control.jump.is_none() {
                    control.jump = Some(Jump::Break(info as usize));
                }
            }
            Command::Extended => self.extended_row_effect(chan, info1, info2),
            Command::Sa2Speed => {
                if info == 0 {
                    // Explicit stop.
                    self.song_end = true;
                    self.speed = 0;
                } else {
                    if info <= 0x1F {
                        self.speed = info as u8;
                    }
                    if info >= 0x32 {
                        self.tempo = info.min(255) as u8;
                    }
                    // 0x20-0x31 carries no meaning in SA2.
                }
            }
            Command::AmdSpeed => {
                if info <= 9 {
                    self.speed = info as u8;
                } else {
                    self.tempo = info.min(255) as u8;
                }
            }
            Command::RadSpeed => self.speed = info.min(255) as u8,
            Command::SetModulatorVolume => {
                if info <= 63 {
                    self.channels[chan].vol_modulator = info as u8;
                    self.write_volume(chan);
                }
            }
            Command::SetCarrierVolume => {
                if info <= 63 {
                    self.channels[chan].vol_carrier = info as u8;
                    self.write_volume(chan);
                }
            }
            Command::SetWaveform => self.set_waveform(chan, info1, info2),
            Command::ChipDepth => {
                self.depth.set(DepthFlags::TREMOLO, info1 != 0);
                self.depth.set(DepthFlags::VIBRATO, info2 != 0);
                self.write_depth(chan);
            }
            Command::PatternDelay => self.pattern_delay += info as u32,
            _ => {}
        }
    }

    fn extended_row_effect(&mut self, chan: usize, sub: u8, value: u8) {
        match ExtendedOp::from_param(sub) {
            ExtendedOp::ChipTremoloDepth => {
                self.depth.set(DepthFlags::TREMOLO, value != 0);
                self.write_depth(chan);
            }
            ExtendedOp::ChipVibratoDepth => {
                self.depth.set(DepthFlags::VIBRATO, value != 0);
                self.write_depth(chan);
            }
            // Handled by the continuous pass.
            ExtendedOp::RetrigNote => {}
            ExtendedOp::FineVolumeUp => {
                self.volume_up(chan, value, false);
                self.write_volume(chan);
            }
            ExtendedOp::FineVolumeDown => {
                self.volume_down(chan, value, false);
                self.write_volume(chan);
            }
            ExtendedOp::FineSlideUp => {
                self.slide_channel_up(chan, value as u16);
                self.write_freq(chan);
            }
            ExtendedOp::FineSlideDown => {
                self.slide_channel_down(chan, value as u16);
                self.write_freq(chan);
            }
            ExtendedOp::PatternDelayRows => {
                self.pattern_delay += value as u32 * self.speed as u32;
            }
            ExtendedOp::None => {}
        }
    }
}
