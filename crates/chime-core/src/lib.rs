//! Chime Core - Foundation types for audio playback
//!
//! This crate provides the types shared by the playback engine:
//! - Decoded waveforms and loop regions
//! - Voice handles and the null-fallback handle table
//! - Clocks and stopwatches for fade timing
//! - Periodic worker threads with joined shutdown

pub mod clock;
pub mod error;
pub mod handle;
pub mod wave;
pub mod worker;

pub use clock::{Clock, ManualClock, Stopwatch, SystemClock};
pub use error::{ChimeError, Result};
pub use handle::{AudioId, HandleTable};
pub use wave::{as_interleaved, as_interleaved_mut, LoopRegion, Wave, WaveSample};
pub use worker::Worker;

/// Playback constants.
pub mod limits {
    /// Smallest frequency ratio any voice accepts.
    pub const MIN_FREQUENCY_RATIO: f64 = 1.0 / 1024.0;

    /// Default ceiling for playback speed.
    pub const DEFAULT_MAX_SPEED: f64 = 2.0;

    /// Default number of concurrent one-shot instances per voice.
    pub const DEFAULT_MAX_VOICE_SHOTS: usize = 32;

    /// Master volume below which a master fade snaps to silence.
    pub const MASTER_FADE_FLOOR: f64 = 0.0005;
}
