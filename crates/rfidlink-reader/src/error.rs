//! Error types for reader session operations.
//!
//! Expected "nothing happened" outcomes are not errors: an empty read is
//! [`TagRead::NoTag`](crate::TagRead::NoTag), a silent device is
//! [`CommandResponse::NoResponse`](crate::CommandResponse::NoResponse), and a
//! failed post-write check is
//! [`WriteOutcome::VerificationMismatch`](crate::WriteOutcome::VerificationMismatch).

use rfidlink_transport::TransportError;

/// Result type alias for reader operations.
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Errors that can occur during reader session operations.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// Fault in the underlying transport (open, send or receive).
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Text that does not form a valid tag identifier.
    #[error("Invalid tag: {message}")]
    InvalidTag { message: String },

    /// Device response that cannot be decoded.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    /// Missing or malformed configuration value.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Background work needs a Tokio runtime that is not available.
    #[error("Runtime error: {message}")]
    Runtime { message: String },

    /// Operation attempted after the session was closed.
    #[error("Reader session is closed")]
    Closed,
}

impl ReaderError {
    /// Create a new invalid tag error.
    pub fn invalid_tag(message: impl Into<String>) -> Self {
        Self::InvalidTag {
            message: message.into(),
        }
    }

    /// Create a new invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new runtime error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Whether the fault may clear up on the next attempt.
    ///
    /// The detection loop keeps polling through these.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_transient(),
            Self::InvalidTag { .. } | Self::InvalidResponse { .. } => true,
            Self::Configuration { .. } | Self::Runtime { .. } | Self::Closed => false,
        }
    }
}
