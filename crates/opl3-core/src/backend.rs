//! Backend trait abstraction for OPL chip implementations
//!
//! This module defines the interface replayers drive: chip selection,
//! register writes and one-time initialization. Whether the other side
//! is a cycle-accurate emulation, a musical softsynth or a capture
//! buffer is invisible to the caller.

/// Common interface for OPL2/OPL3 chip backends
///
/// A backend models up to two OPL2 register files ("chips"). OPL3
/// hardware exposes its second register bank as chip 1; dual-OPL2
/// setups expose two physical chips the same way. Register writes
/// always target the currently selected chip.
///
/// # Example
///
/// ```
/// use opl3::{OplBackend, RegisterCapture};
/// use opl3::registers;
///
/// fn key_off_channel<B: OplBackend>(opl: &mut B, channel: u8) {
///     opl.write(registers::CH_KEY_BLOCK + channel, 0);
/// }
///
/// let mut opl = RegisterCapture::new();
/// key_off_channel(&mut opl, 0);
/// ```
pub trait OplBackend {
    /// Reset the backend to its power-on state.
    ///
    /// Replayers call this once at rewind, before any waveform-select,
    /// OPL3 or depth setup writes.
    fn init(&mut self);

    /// Select the chip (register bank) that subsequent writes target.
    ///
    /// Implementations clamp out-of-range indices to the last
    /// available chip rather than failing.
    fn set_chip(&mut self, chip: u8);

    /// Index of the currently selected chip.
    fn current_chip(&self) -> u8;

    /// Write `value` to register `reg` on the selected chip.
    fn write(&mut self, reg: u8, value: u8);
}
