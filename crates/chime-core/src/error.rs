//! Error types for chime.

use thiserror::Error;

/// Main error type for chime operations.
///
/// The public playback surface never hands these to callers; it degrades to
/// null handles and no-ops instead. They surface from setup paths such as
/// opening a device or loading a configuration file.
#[derive(Error, Debug)]
pub enum ChimeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Voice creation failed: {0}")]
    VoiceCreation(String),

    #[error("Hardware call failed: {0}")]
    Hardware(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Thread error: {0}")]
    Thread(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for chime operations.
pub type Result<T> = std::result::Result<T, ChimeError>;
