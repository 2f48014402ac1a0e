//! The transport trait.
//!
//! A transport owns the physical channel: it opens and configures it, moves
//! raw bytes in both directions, and closes it. It has no notion of commands,
//! tags or sessions.
//!
//! Methods return `impl Future + Send` instead of using bare `async fn` so
//! that generic callers can drive a transport from a spawned Tokio task.
//! Implementations are still free to write `async fn`.

use crate::config::SerialConfig;
use crate::error::Result;
use std::future::Future;

/// Raw byte channel to a serial device.
///
/// A transport is not safe for concurrent use from two logical flows; the
/// caller must serialize access (the reader session wraps it in a mutex).
///
/// # Object Safety
///
/// Like the other async device traits in this workspace, `Transport` is not
/// object-safe. Use generics, or [`AnyTransport`](crate::devices::AnyTransport)
/// when the implementation is chosen at runtime.
///
/// # Examples
///
/// ```no_run
/// use rfidlink_transport::{Result, SerialConfig, Transport};
///
/// async fn ping<T: Transport>(transport: &mut T) -> Result<Vec<u8>> {
///     transport.open(&SerialConfig::new("/dev/ttyUSB0")).await?;
///     transport.send_bytes(b"STATUS\r\n").await?;
///     transport.receive_bytes(256).await
/// }
/// ```
pub trait Transport: Send + 'static {
    /// Open the channel and apply the line settings in `config`.
    ///
    /// Opening an already-open transport reopens it with the new settings.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connection`](crate::TransportError::Connection)
    /// if the port does not exist, is busy, or rejects a setting.
    fn open(&mut self, config: &SerialConfig) -> impl Future<Output = Result<()>> + Send;

    /// Release the channel. Closing a closed transport is a no-op.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Whether the channel is currently open.
    fn is_open(&self) -> bool;

    /// Write raw bytes, returning how many were accepted by the device.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`](crate::TransportError::Io) on a write
    /// fault and [`TransportError::NotOpen`](crate::TransportError::NotOpen)
    /// if the transport is closed.
    fn send_bytes(&mut self, data: &[u8]) -> impl Future<Output = Result<usize>> + Send;

    /// Receive up to `max_len` bytes, blocking for at most the configured
    /// read timeout.
    ///
    /// An elapsed timeout with nothing received returns an empty vector.
    /// Silence from the device is a normal outcome, not a failure.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`](crate::TransportError::Io) on a read
    /// fault and [`TransportError::NotOpen`](crate::TransportError::NotOpen)
    /// if the transport is closed.
    fn receive_bytes(&mut self, max_len: usize) -> impl Future<Output = Result<Vec<u8>>> + Send;
}
