//! Error types for serial transport operations.
//!
//! The transport layer distinguishes two fault families: the port could not
//! be opened or configured ([`TransportError::Connection`]), and a send or
//! receive faulted once the port was open ([`TransportError::Io`]). A read
//! timeout with no data is *not* an error and never appears here.

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur while driving a serial transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Port could not be opened or configured.
    #[error("Connection error on {port}: {message}")]
    Connection { port: String, message: String },

    /// Operation attempted on a transport that is not open.
    #[error("Transport is not open")]
    NotOpen,

    /// Send or receive faulted at the I/O level.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid connection configuration value.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Blocking worker backing a port call failed or was cancelled.
    #[error("Transport task failed: {message}")]
    Task { message: String },
}

impl TransportError {
    /// Create a new connection error.
    pub fn connection(port: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            port: port.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new task error.
    pub fn task(message: impl Into<String>) -> Self {
        Self::Task {
            message: message.into(),
        }
    }

    /// Returns `true` for faults that concern an already-open port and may
    /// clear up on the next attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Task { .. })
    }
}
