//! # Error Types
//!
//! Custom error types for Modem Webhook using `thiserror`.

use thiserror::Error;

/// Main error type for Modem Webhook
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The command interface itself failed (port I/O, `ERROR` result code, timeout)
    #[error("Command interface error: {0}")]
    Interface(String),

    /// A command response did not have the expected shape
    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// A telemetry field failed its width or character check
    #[error("Invalid reading: {0}")]
    InvalidReading(String),

    /// Hostname could not be resolved
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Stream connection could not be opened
    #[error("Connection error: {0}")]
    Connection(String),

    /// Send or receive failed mid-session
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response did not fit the fixed receive buffer
    #[error("Response exceeds {capacity} byte receive buffer")]
    ResponseTooLarge { capacity: usize },

    /// Response carried no line terminator
    #[error("Malformed response: no status line terminator")]
    MalformedResponse,

    /// Precomputed buffer length disagreed with the rendered length
    #[error("Internal size mismatch: computed {expected} bytes, rendered {actual}")]
    InternalSizeMismatch { expected: usize, actual: usize },

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Modem Webhook
pub type Result<T> = std::result::Result<T, WebhookError>;
