//! Enum wrapper for transport dispatch.
//!
//! `Transport` uses native async methods and is therefore not object-safe.
//! [`AnyTransport`] gives callers a single concrete type when the backend is
//! picked at runtime (for instance from a `--mock` switch or a settings file)
//! while keeping static dispatch.
//!
//! # Examples
//!
//! ```
//! use rfidlink_transport::devices::AnyTransport;
//! use rfidlink_transport::mock::MockTransport;
//!
//! let (mock, _handle) = MockTransport::new();
//! let transport = AnyTransport::Mock(mock);
//! assert_eq!(transport.kind(), "mock");
//! ```

use crate::config::SerialConfig;
use crate::error::Result;
use crate::mock::MockTransport;
#[cfg(feature = "hardware-serial")]
use crate::serial::SerialTransport;
use crate::traits::Transport;

/// Any supported transport backend.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyTransport {
    /// Physical serial port.
    #[cfg(feature = "hardware-serial")]
    Serial(SerialTransport),

    /// Simulated reader for development and testing.
    Mock(MockTransport),
}

impl AnyTransport {
    /// Short backend name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            #[cfg(feature = "hardware-serial")]
            Self::Serial(_) => "serial",
            Self::Mock(_) => "mock",
        }
    }
}

#[cfg(feature = "hardware-serial")]
impl From<SerialTransport> for AnyTransport {
    fn from(transport: SerialTransport) -> Self {
        Self::Serial(transport)
    }
}

impl From<MockTransport> for AnyTransport {
    fn from(transport: MockTransport) -> Self {
        Self::Mock(transport)
    }
}

impl Transport for AnyTransport {
    async fn open(&mut self, config: &SerialConfig) -> Result<()> {
        match self {
            #[cfg(feature = "hardware-serial")]
            Self::Serial(transport) => transport.open(config).await,
            Self::Mock(transport) => transport.open(config).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            #[cfg(feature = "hardware-serial")]
            Self::Serial(transport) => transport.close().await,
            Self::Mock(transport) => transport.close().await,
        }
    }

    fn is_open(&self) -> bool {
        match self {
            #[cfg(feature = "hardware-serial")]
            Self::Serial(transport) => transport.is_open(),
            Self::Mock(transport) => transport.is_open(),
        }
    }

    async fn send_bytes(&mut self, data: &[u8]) -> Result<usize> {
        match self {
            #[cfg(feature = "hardware-serial")]
            Self::Serial(transport) => transport.send_bytes(data).await,
            Self::Mock(transport) => transport.send_bytes(data).await,
        }
    }

    async fn receive_bytes(&mut self, max_len: usize) -> Result<Vec<u8>> {
        match self {
            #[cfg(feature = "hardware-serial")]
            Self::Serial(transport) => transport.receive_bytes(max_len).await,
            Self::Mock(transport) => transport.receive_bytes(max_len).await,
        }
    }
}
