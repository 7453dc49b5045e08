//! Error types for posecoach
//!
//! Defines the crate error type using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for posecoach
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Client state file errors
    #[error("State file error: {0}")]
    Storage(String),

    /// Pose service request errors
    #[error("Pose service error: {0}")]
    Api(#[from] crate::api::ApiError),

    /// Frame capture errors
    #[error("Capture error: {0}")]
    Capture(String),

    /// Cue audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Coaching session lifecycle errors
    #[error("Session error: {0}")]
    Session(String),

    /// Missing or rejected credentials
    #[error("Authentication error: {0}")]
    Auth(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using posecoach Error
pub type Result<T> = std::result::Result<T, Error>;
