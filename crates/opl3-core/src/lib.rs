//! OPL2/OPL3 FM synthesis register interface
//!
//! This crate defines the register-level boundary between tracker
//! replayers and an OPL-family FM synthesis chip:
//!
//! - [`OplBackend`] - the write/select/init interface every chip
//!   implementation provides
//! - [`registers`] - register addressing constants and the fixed
//!   channel-to-operator offset table
//! - [`RegisterCapture`] - a recording backend for tests and headless
//!   callers
//!
//! Chip emulation itself is out of scope here; hardware-accurate
//! emulators, softsynths or real ISA hardware plug in behind
//! [`OplBackend`] and become interchangeable from the replayer's point
//! of view.

#![warn(missing_docs)]

pub mod backend;
pub mod capture;
pub mod registers;

pub use backend::OplBackend;
pub use capture::{CapturedWrite, RegisterCapture};
pub use registers::{DepthFlags, CHANNELS_PER_CHIP, OPERATOR_OFFSETS};
