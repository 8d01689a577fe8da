//! Recording OPL backend
//!
//! [`RegisterCapture`] records register writes instead of synthesizing
//! audio. Replayer tests assert on the captured stream; headless tools
//! can replay it into an external renderer.

use crate::backend::OplBackend;

/// One captured register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturedWrite {
    /// Chip (register bank) the write targeted.
    pub chip: u8,
    /// Register address.
    pub register: u8,
    /// Value written.
    pub value: u8,
}

/// An [`OplBackend`] that records every write in order.
#[derive(Debug, Clone)]
pub struct RegisterCapture {
    writes: Vec<CapturedWrite>,
    chip: u8,
    chip_count: u8,
    init_calls: usize,
}

impl RegisterCapture {
    /// Create a capture backend with two register banks (OPL3 layout).
    pub fn new() -> Self {
        Self::with_chips(2)
    }

    /// Create a capture backend with `chip_count` register banks.
    pub fn with_chips(chip_count: u8) -> Self {
        Self {
            writes: Vec::with_capacity(256),
            chip: 0,
            chip_count: chip_count.max(1),
            init_calls: 0,
        }
    }

    /// All writes captured so far, oldest first.
    pub fn writes(&self) -> &[CapturedWrite] {
        &self.writes
    }

    /// Discard the captured writes, keeping chip selection.
    pub fn clear(&mut self) {
        self.writes.clear();
    }

    /// Number of times [`OplBackend::init`] was called.
    pub fn init_calls(&self) -> usize {
        self.init_calls
    }

    /// Most recent value written to `register` on `chip`, if any.
    pub fn last_value(&self, chip: u8, register: u8) -> Option<u8> {
        self.writes
            .iter()
            .rev()
            .find(|w| w.chip == chip && w.register == register)
            .map(|w| w.value)
    }
}

impl Default for RegisterCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl OplBackend for RegisterCapture {
    fn init(&mut self) {
        self.init_calls += 1;
        self.chip = 0;
    }

    fn set_chip(&mut self, chip: u8) {
        self.chip = chip.min(self.chip_count - 1);
    }

    fn current_chip(&self) -> u8 {
        self.chip
    }

    fn write(&mut self, reg: u8, value: u8) {
        self.writes.push(CapturedWrite {
            chip: self.chip,
            register: reg,
            value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_writes_in_order() {
        let mut opl = RegisterCapture::new();
        opl.write(0xA0, 0x44);
        opl.set_chip(1);
        opl.write(0xB0, 0x21);

        assert_eq!(
            opl.writes(),
            &[
                CapturedWrite {
                    chip: 0,
                    register: 0xA0,
                    value: 0x44
                },
                CapturedWrite {
                    chip: 1,
                    register: 0xB0,
                    value: 0x21
                },
            ]
        );
    }

    #[test]
    fn chip_selection_clamps_to_available_banks() {
        let mut opl = RegisterCapture::with_chips(1);
        opl.set_chip(5);
        assert_eq!(opl.current_chip(), 0);

        let mut dual = RegisterCapture::new();
        dual.set_chip(5);
        assert_eq!(dual.current_chip(), 1);
    }

    #[test]
    fn last_value_sees_the_newest_write() {
        let mut opl = RegisterCapture::new();
        opl.write(0x40, 0x3F);
        opl.write(0x40, 0x10);
        assert_eq!(opl.last_value(0, 0x40), Some(0x10));
        assert_eq!(opl.last_value(1, 0x40), None);
    }

    #[test]
    fn init_resets_chip_selection_and_counts() {
        let mut opl = RegisterCapture::new();
        opl.set_chip(1);
        opl.init();
        assert_eq!(opl.current_chip(), 0);
        assert_eq!(opl.init_calls(), 1);
    }
}
