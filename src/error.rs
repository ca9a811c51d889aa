//! Error types for the analyzer.

use thiserror::Error;

/// Result type alias using `AnalyzerError`
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Errors raised outside the real-time callback
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// Configuration rejected by `validate()`
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Audio device lookup or configuration failed
    #[error("Audio device error: {0}")]
    Device(String),

    /// Audio stream could not be built or started
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// A message carried a tag outside the protocol
    #[error("Protocol error: unknown message tag {0:#04x}")]
    Protocol(u8),

    /// The control side tried to send an engine notification to the engine
    #[error("Only requests can be sent to the engine, got {0:?}")]
    NotARequest(crate::audio::MessageTag),

    /// A message buffer was shorter than its tag requires
    #[error("Truncated message: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// The offline host ran out of blocks waiting for a reply
    #[error("No analysis reply after {blocks} blocks")]
    Stalled { blocks: usize },

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// WAV decoding errors
    #[error(transparent)]
    Wav(#[from] hound::Error),
}

impl AnalyzerError {
    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a device error
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    /// Create a stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream(msg.into())
    }
}
