//! Error types for wavplayer-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! Hardware and file failures are values, never panics: a fatal error inside a
//! playback session is logged on the session thread and turned into a final
//! "stopped" status event.

use thiserror::Error;

/// Main error type for wavplayer-ap module
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File id could not be resolved to an existing file
    #[error("The file '{file_id}' cannot be opened ({reason})")]
    FileNotFound { file_id: String, reason: String },

    /// File id resolves to a path outside the audio root directory
    #[error("The file '{0}' is not inside the audio files directory")]
    OutsideRoot(String),

    /// File container, codec or sample layout not supported
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Raw frame read / seek failure
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors (open, negotiation, submit, query)
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Hardware buffer starved while frames were still being transferred
    #[error("an xrun occurred (audio device buffer underrun)")]
    Underrun,

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Shared library errors
    #[error(transparent)]
    Common(#[from] wavplayer_common::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using wavplayer-ap Error
pub type Result<T> = std::result::Result<T, Error>;
