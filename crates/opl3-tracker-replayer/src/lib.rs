//! Generic tracker-module playback engine for OPL2/OPL3 FM chips
//!
//! Given a parsed module (instrument bank, per-channel pattern data, an
//! order list) the engine drives an FM synthesis chip tick-by-tick,
//! reproducing the note, volume and effect semantics of several
//! historic tracker dialects (SA2, AMD, RAD/A2M and plain hex/decimal
//! encodings) through one unified interpreter.
//!
//! # Features
//!
//! - Per-channel effect state machine over one canonical command table
//! - Dialect quirks behind [`DialectFlags`]: decimal parameters,
//!   alternate volume semantics, suppressed note-on, OPL3 setup
//! - Special-arpeggio script interpreter
//! - F-number/octave arithmetic with octave folding
//! - Allocation-free, bounded-time ticks
//!
//! File loaders and the chip itself stay outside this crate: loaders
//! populate a [`Module`], and any [`opl3::OplBackend`] receives the
//! register writes.
//!
//! # Quick Start
//!
//! ```
//! use opl3::RegisterCapture;
//! use opl3_tracker_replayer::{Module, TrackerEngine};
//!
//! # fn main() -> opl3_tracker_replayer::Result<()> {
//! let mut module = Module::new();
//! module.allocate_order(1)?;
//! module.allocate_patterns(1, 64, 9)?;
//! module.allocate_instruments(4)?;
//! module.build_default_track_index();
//!
//! let mut engine = TrackerEngine::new(module, RegisterCapture::new())?;
//! while engine.tick() {
//!     // schedule the next call at engine.refresh_rate() Hz
//! #   break;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Internal modules - not part of the public API
mod channel;

// Public modules
pub mod commands;
pub mod error;
pub mod format;
pub mod frequency;
pub mod player;

// Re-export the public API (explicit, no star exports)
pub use channel::ChannelState;
pub use commands::{Command, ExtendedOp};
pub use error::{ReplayerError, Result};
pub use format::{
    ArpeggioScript, DialectFlags, Instrument, Module, TrackCell, JUMP_MARKER, MAX_CHANNELS,
    MAX_INSTRUMENTS, MAX_ORDER_LENGTH, MAX_PATTERNS,
};
pub use player::TrackerEngine;
