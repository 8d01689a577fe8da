//! Register-write helpers.
//!
//! Everything that actually touches the chip lives here: chip
//! selection, note-on, key-off, frequency, volume (both curves),
//! waveform and depth writes. Effect logic stays in the interpreter;
//! these helpers each end in the register writes the effect is
//! documented to issue.

use opl3::registers::{
    CARRIER, CHANNELS_PER_CHIP, CH_FEEDBACK_CONNECTION, CH_FREQUENCY, CH_KEY_BLOCK, KEY_ON,
    OPERATOR_OFFSETS, OP_ATTACK_DECAY, OP_CHARACTERISTIC, OP_LEVEL, OP_SUSTAIN_RELEASE,
    OP_WAVEFORM, TREMOLO_VIBRATO,
};
use opl3::OplBackend;

use super::TrackerEngine;
use crate::format::{DialectFlags, Instrument};
use crate::frequency::{normalize_note, note_to_freq, NOTE_KEY_OFF};

impl<B: OplBackend> TrackerEngine<B> {
    /// Select the chip owning `chan` and return the intra-chip channel
    /// number (channels 0-8 map to the first chip, 9-17 to the second).
    fn select_channel(&mut self, chan: usize) -> u8 {
        self.backend.set_chip((chan / CHANNELS_PER_CHIP) as u8);
        (chan % CHANNELS_PER_CHIP) as u8
    }

    /// Write the channel's frequency and key/block registers.
    pub(super) fn write_freq(&mut self, chan: usize) {
        let oplch = self.select_channel(chan);
        let (low, high) = {
            let ch = &self.channels[chan];
            let mut high = ((ch.freq >> 8) & 0x03) as u8 | (ch.octave << 2);
            if ch.key_on {
                high |= KEY_ON;
            }
            ((ch.freq & 0xFF) as u8, high)
        };
        self.backend.write(CH_FREQUENCY + oplch, low);
        self.backend.write(CH_KEY_BLOCK + oplch, high);
    }

    /// Drop the key-on flag and rewrite the frequency registers.
    pub(super) fn key_off(&mut self, chan: usize) {
        self.channels[chan].key_on = false;
        self.write_freq(chan);
    }

    /// Write both operator level registers from the channel volumes.
    pub(super) fn write_volume(&mut self, chan: usize) {
        let oplch = self.select_channel(chan);
        let op = OPERATOR_OFFSETS[oplch as usize];

        let (vol_carrier, vol_modulator, instrument) = {
            let ch = &self.channels[chan];
            (
                ch.vol_carrier.min(63),
                ch.vol_modulator.min(63),
                self.module
                    .instrument(ch.instrument)
                    .copied()
                    .unwrap_or_default(),
            )
        };
        let mod_level = instrument.registers[Instrument::MOD_LEVEL];
        let car_level = instrument.registers[Instrument::CAR_LEVEL];

        let (mod_reg, car_reg) = if self.module.flags.contains(DialectFlags::FAUST) {
            // Averaged attenuation between channel volume and the
            // instrument's own level bytes.
            (
                (((63 - vol_modulator) + (mod_level & 63)) / 2) | (mod_level & 0xC0),
                (((63 - vol_carrier) + (car_level & 63)) / 2) | (car_level & 0xC0),
            )
        } else {
            (
                (63 - vol_modulator) | (mod_level & 0xC0),
                (63 - vol_carrier) | (car_level & 0xC0),
            )
        };

        self.backend.write(OP_LEVEL + op, mod_reg);
        self.backend.write(OP_LEVEL + CARRIER + op, car_reg);
    }

    /// Trigger the channel's note: program the instrument, set the
    /// volume, then key the frequency on.
    pub(super) fn play_note(&mut self, chan: usize) {
        if self.module.flags.contains(DialectFlags::FAUST) {
            let ch = &mut self.channels[chan];
            ch.vol_carrier = 63;
            ch.vol_modulator = 63;
        }

        let oplch = self.select_channel(chan);
        let op = OPERATOR_OFFSETS[oplch as usize];
        let instrument = self
            .module
            .instrument(self.channels[chan].instrument)
            .copied()
            .unwrap_or_default();
        let regs = instrument.registers;

        if !self.module.flags.contains(DialectFlags::NO_KEY_ON) {
            // Silence whatever the channel was playing.
            self.backend.write(CH_KEY_BLOCK + oplch, 0);
        }

        self.backend
            .write(OP_CHARACTERISTIC + op, regs[Instrument::MOD_CHARACTERISTIC]);
        self.backend.write(
            OP_CHARACTERISTIC + CARRIER + op,
            regs[Instrument::CAR_CHARACTERISTIC],
        );

        // The volume write must land before the frequency write.
        self.write_volume(chan);

        self.backend
            .write(OP_ATTACK_DECAY + op, regs[Instrument::MOD_ATTACK_DECAY]);
        self.backend.write(
            OP_ATTACK_DECAY + CARRIER + op,
            regs[Instrument::CAR_ATTACK_DECAY],
        );
        self.backend
            .write(OP_SUSTAIN_RELEASE + op, regs[Instrument::MOD_SUSTAIN_RELEASE]);
        self.backend.write(
            OP_SUSTAIN_RELEASE + CARRIER + op,
            regs[Instrument::CAR_SUSTAIN_RELEASE],
        );
        self.backend
            .write(OP_WAVEFORM + op, regs[Instrument::MOD_WAVEFORM]);
        self.backend
            .write(OP_WAVEFORM + CARRIER + op, regs[Instrument::CAR_WAVEFORM]);
        self.backend
            .write(CH_FEEDBACK_CONNECTION + oplch, regs[Instrument::FEEDBACK]);
        self.backend.write(TREMOLO_VIBRATO, instrument.misc);

        {
            let ch = &mut self.channels[chan];
            ch.key_on = true;
            ch.arp_pos = instrument.arp_start;
            ch.arp_speed_counter = instrument.arp_speed_counter;
        }

        let note = self.channels[chan].note as i32;
        self.set_note(chan, note);
    }

    /// Look up the note, apply the instrument's slide bias and write
    /// the frequency registers. Note 127 keys the channel off instead.
    pub(super) fn set_note(&mut self, chan: usize, note: i32) {
        if note == NOTE_KEY_OFF as i32 {
            self.key_off(chan);
            return;
        }

        let (freq, octave) = note_to_freq(normalize_note(note));
        let slide = self
            .module
            .instrument(self.channels[chan].instrument)
            .map(|inst| inst.slide as i32)
            .unwrap_or(0);
        {
            let ch = &mut self.channels[chan];
            ch.freq = (freq as i32 + slide).clamp(0, 0x3FF) as u16;
            ch.octave = octave;
        }
        self.write_freq(chan);
    }

    /// Explicit waveform set; a zero parameter leaves that operator
    /// unchanged.
    pub(super) fn set_waveform(&mut self, chan: usize, carrier: u8, modulator: u8) {
        let oplch = self.select_channel(chan);
        let op = OPERATOR_OFFSETS[oplch as usize];
        if carrier != 0 {
            self.backend.write(OP_WAVEFORM + CARRIER + op, carrier - 1);
        }
        if modulator != 0 {
            self.backend.write(OP_WAVEFORM + op, modulator - 1);
        }
    }

    /// Waveform write from a special-arpeggio script opcode: tens digit
    /// drives the carrier, ones digit the modulator, each value-1.
    pub(super) fn write_script_waveform(&mut self, chan: usize, opcode: u8) {
        let oplch = self.select_channel(chan);
        let op = OPERATOR_OFFSETS[oplch as usize];
        let carrier = opcode / 10;
        let modulator = opcode % 10;
        if carrier != 0 {
            self.backend.write(OP_WAVEFORM + CARRIER + op, carrier - 1);
        }
        if modulator != 0 {
            self.backend.write(OP_WAVEFORM + op, modulator - 1);
        }
    }

    /// Write the current depth bits to the chip owning `chan`.
    pub(super) fn write_depth(&mut self, chan: usize) {
        let _ = self.select_channel(chan);
        self.backend.write(TREMOLO_VIBRATO, self.depth.bits());
    }
}
