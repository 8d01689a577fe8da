//! Error types for module construction and engine setup.

use thiserror::Error;

/// Result type for replayer operations.
pub type Result<T> = std::result::Result<T, ReplayerError>;

/// Errors that can occur while building a module or constructing the
/// engine.
///
/// Playback itself never fails: `tick()` reports a playing/ended status
/// instead of returning errors.
#[derive(Error, Debug)]
pub enum ReplayerError {
    /// A storage allocation request exceeded an engine limit.
    #[error("{what} allocation of {requested} exceeds the engine limit of {max}")]
    AllocationLimit {
        /// What was being allocated.
        what: &'static str,
        /// Requested element count.
        requested: usize,
        /// Engine maximum.
        max: usize,
    },

    /// A required dimension was zero.
    #[error("{what} cannot be allocated with zero {dimension}")]
    EmptyDimension {
        /// What was being allocated.
        what: &'static str,
        /// The offending dimension.
        dimension: &'static str,
    },

    /// A track-index override referenced track storage that does not
    /// exist.
    #[error("track {track} out of range (1..={available}) for pattern {pattern}, channel {channel}")]
    InvalidTrackIndex {
        /// Requested 1-based track id.
        track: u16,
        /// Pattern whose mapping was being overridden.
        pattern: usize,
        /// Channel whose mapping was being overridden.
        channel: usize,
        /// Allocated track count.
        available: usize,
    },

    /// Engine constructed over a module without pattern storage.
    #[error("module has no pattern storage; allocate patterns before constructing an engine")]
    UnallocatedModule,
}
