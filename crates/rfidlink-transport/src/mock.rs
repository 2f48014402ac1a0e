//! Mock transport for testing and development.
//!
//! This module provides a simulated serial reader that can be controlled
//! programmatically, so sessions and the detection loop can be exercised
//! without physical hardware.
//!
//! The reader side ([`MockTransport`]) implements [`Transport`]; the control
//! side ([`MockTransportHandle`]) scripts what the "device" sends back and
//! records everything that crossed the wire.

use crate::config::SerialConfig;
use crate::error::{Result, TransportError};
use crate::traits::Transport;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// One scripted answer to a `receive_bytes` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Bytes available immediately.
    Data(Vec<u8>),

    /// Nothing arrives; the read returns empty after the read timeout.
    Silence,

    /// Bytes arrive after the given delay.
    Delayed(Duration, Vec<u8>),

    /// The read faults with an I/O error of this kind.
    Fault(std::io::ErrorKind),
}

impl MockReply {
    /// Convenience constructor for a data reply.
    pub fn data(bytes: impl AsRef<[u8]>) -> Self {
        Self::Data(bytes.as_ref().to_vec())
    }
}

/// A completed operation, in the order the transport performed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    /// Port opened with this name.
    Open(String),

    /// Port closed.
    Close,

    /// Bytes written by the caller.
    Sent(Vec<u8>),

    /// Bytes returned to the caller (empty for a timeout).
    Received(Vec<u8>),
}

/// Reacts to a written frame by queueing replies.
type Responder = Arc<dyn Fn(&[u8]) -> Vec<MockReply> + Send + Sync>;

#[derive(Default)]
struct MockState {
    replies: VecDeque<MockReply>,
    tag_in_field: Option<Vec<u8>>,
    responder: Option<Responder>,
    ops: Vec<MockOp>,
    open_failure: Option<String>,
    write_fault: Option<std::io::ErrorKind>,
    drop_writes: bool,
    last_config: Option<SerialConfig>,
    /// Delayed reply already on its way, with its arrival time.
    in_flight: Option<(Instant, Vec<u8>)>,
}

/// Shared state between the transport and its handle.
#[derive(Clone, Default)]
struct Shared(Arc<Mutex<MockState>>);

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Simulated serial reader.
///
/// Reads are answered, in priority order, by the queued replies, then by the
/// tag currently in the field, then by silence (an empty read after the
/// configured read timeout).
///
/// Like a real port, bytes beyond the caller's buffer stay queued for the
/// next read, and a delayed reply keeps arriving when the read waiting for it
/// is cancelled.
///
/// # Examples
///
/// ```
/// use rfidlink_transport::mock::MockTransport;
/// use rfidlink_transport::{SerialConfig, Transport};
///
/// #[tokio::main]
/// async fn main() -> rfidlink_transport::Result<()> {
///     let (mut transport, handle) = MockTransport::new();
///     transport.open(&SerialConfig::new("MOCK0")).await?;
///
///     handle.present_tag("E200341201");
///     let data = transport.receive_bytes(64).await?;
///     assert_eq!(data, b"E200341201\r\n");
///
///     Ok(())
/// }
/// ```
pub struct MockTransport {
    state: Shared,

    /// Device name
    name: String,

    open: bool,

    read_timeout: Duration,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("name", &self.name)
            .field("open", &self.open)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

impl MockTransport {
    /// Create a new closed mock transport with the default name.
    ///
    /// Returns the transport and a handle for scripting the simulated device.
    pub fn new() -> (Self, MockTransportHandle) {
        Self::with_name("Mock Serial Reader")
    }

    /// Create a new closed mock transport with a custom name.
    pub fn with_name(name: impl Into<String>) -> (Self, MockTransportHandle) {
        let state = Shared::default();

        let transport = Self {
            state: state.clone(),
            name: name.into(),
            open: false,
            read_timeout: SerialConfig::default().read_timeout(),
        };

        (transport, MockTransportHandle { state })
    }

    /// Device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the in-flight reply, then take it.
    ///
    /// Cancelling the wait leaves the reply in place for the next read.
    async fn await_in_flight(&self, at: Instant) -> Vec<u8> {
        tokio::time::sleep_until(at).await;
        self.state
            .lock()
            .in_flight
            .take()
            .map(|(_, bytes)| bytes)
            .unwrap_or_default()
    }

    fn next_reply(&self) -> MockReply {
        let mut state = self.state.lock();
        if let Some(reply) = state.replies.pop_front() {
            return reply;
        }
        match &state.tag_in_field {
            Some(tag) => MockReply::Data(tag.clone()),
            None => MockReply::Silence,
        }
    }
}

impl Transport for MockTransport {
    async fn open(&mut self, config: &SerialConfig) -> Result<()> {
        config.validate()?;

        let mut state = self.state.lock();
        if let Some(message) = state.open_failure.take() {
            return Err(TransportError::connection(&config.port_name, message));
        }

        state.ops.push(MockOp::Open(config.port_name.clone()));
        state.last_config = Some(config.clone());
        self.read_timeout = config.read_timeout();
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.state.lock().ops.push(MockOp::Close);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn send_bytes(&mut self, data: &[u8]) -> Result<usize> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }

        let responder = {
            let mut state = self.state.lock();
            if let Some(kind) = state.write_fault.take() {
                return Err(std::io::Error::new(kind, "simulated write fault").into());
            }
            state.ops.push(MockOp::Sent(data.to_vec()));
            if state.drop_writes {
                return Ok(0);
            }
            state.responder.clone()
        };

        // Run the responder outside the lock so it may inspect the handle.
        if let Some(responder) = responder {
            let replies = responder(data);
            self.state.lock().replies.extend(replies);
        }

        Ok(data.len())
    }

    async fn receive_bytes(&mut self, max_len: usize) -> Result<Vec<u8>> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }

        let arrival = self.state.lock().in_flight.as_ref().map(|(at, _)| *at);
        let mut data = match arrival {
            Some(at) => self.await_in_flight(at).await,
            None => match self.next_reply() {
                MockReply::Data(bytes) => bytes,
                MockReply::Silence => {
                    tokio::time::sleep(self.read_timeout).await;
                    Vec::new()
                }
                MockReply::Delayed(delay, bytes) => {
                    let at = Instant::now() + delay;
                    self.state.lock().in_flight = Some((at, bytes));
                    self.await_in_flight(at).await
                }
                MockReply::Fault(kind) => {
                    return Err(std::io::Error::new(kind, "simulated read fault").into());
                }
            },
        };

        let mut state = self.state.lock();
        if data.len() > max_len {
            let rest = data.split_off(max_len);
            state.replies.push_front(MockReply::Data(rest));
        }
        state.ops.push(MockOp::Received(data.clone()));
        Ok(data)
    }
}

/// Handle for controlling a mock transport.
///
/// Cloning the handle shares the same simulated device.
///
/// # Examples
///
/// ```
/// use rfidlink_transport::mock::{MockReply, MockTransport};
///
/// let (_transport, handle) = MockTransport::new();
///
/// // Answer every WRITE frame with an acknowledgement line.
/// handle.set_responder(|frame| {
///     if frame.starts_with(b"WRITE:") {
///         vec![MockReply::data("OK\r\n")]
///     } else {
///         Vec::new()
///     }
/// });
/// ```
#[derive(Clone)]
pub struct MockTransportHandle {
    state: Shared,
}

impl std::fmt::Debug for MockTransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockTransportHandle")
            .field("pending_replies", &state.replies.len())
            .field("tag_in_field", &state.tag_in_field.is_some())
            .finish()
    }
}

impl MockTransportHandle {
    /// Queue one reply for a future read.
    pub fn queue_reply(&self, reply: MockReply) {
        self.state.lock().replies.push_back(reply);
    }

    /// Queue several replies, answered in order.
    pub fn queue_replies(&self, replies: impl IntoIterator<Item = MockReply>) {
        self.state.lock().replies.extend(replies);
    }

    /// Number of queued replies not yet consumed.
    pub fn pending_replies(&self) -> usize {
        self.state.lock().replies.len()
    }

    /// Place a tag in the reader's field.
    ///
    /// While present, every read with no queued reply returns the tag ID
    /// followed by CRLF, like a reader in continuous-inventory mode.
    pub fn present_tag(&self, tag_id: &str) {
        self.state.lock().tag_in_field = Some(format!("{tag_id}\r\n").into_bytes());
    }

    /// Remove the tag from the reader's field.
    pub fn remove_tag(&self) {
        self.state.lock().tag_in_field = None;
    }

    /// Whether a tag is currently in the field.
    pub fn is_tag_present(&self) -> bool {
        self.state.lock().tag_in_field.is_some()
    }

    /// Install a function that reacts to every written frame.
    ///
    /// The replies it returns are appended to the reply queue.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&[u8]) -> Vec<MockReply> + Send + Sync + 'static,
    {
        self.state.lock().responder = Some(Arc::new(responder));
    }

    /// Remove the installed responder.
    pub fn clear_responder(&self) {
        self.state.lock().responder = None;
    }

    /// Make the next `open` fail with a connection error.
    pub fn fail_next_open(&self, message: impl Into<String>) {
        self.state.lock().open_failure = Some(message.into());
    }

    /// Make the next `send_bytes` fail with an I/O error of this kind.
    pub fn fail_next_write(&self, kind: std::io::ErrorKind) {
        self.state.lock().write_fault = Some(kind);
    }

    /// When enabled, writes are recorded but report zero bytes accepted.
    pub fn drop_writes(&self, enabled: bool) {
        self.state.lock().drop_writes = enabled;
    }

    /// Every completed operation so far, oldest first.
    pub fn operations(&self) -> Vec<MockOp> {
        self.state.lock().ops.clone()
    }

    /// Forget the recorded operations.
    pub fn clear_operations(&self) {
        self.state.lock().ops.clear();
    }

    /// Frames written by the caller, oldest first.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                MockOp::Sent(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of completed reads, including empty ones.
    pub fn receive_count(&self) -> usize {
        self.state
            .lock()
            .ops
            .iter()
            .filter(|op| matches!(op, MockOp::Received(_)))
            .count()
    }

    /// Configuration passed to the most recent successful `open`.
    pub fn last_config(&self) -> Option<SerialConfig> {
        self.state.lock().last_config.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    async fn open_mock() -> (MockTransport, MockTransportHandle) {
        let (mut transport, handle) = MockTransport::new();
        transport.open(&SerialConfig::new("MOCK0")).await.unwrap();
        (transport, handle)
    }

    #[tokio::test]
    async fn test_mock_open_records_config() {
        let (transport, handle) = open_mock().await;

        assert!(transport.is_open());
        assert_eq!(handle.operations(), vec![MockOp::Open("MOCK0".to_string())]);
        assert_eq!(handle.last_config().unwrap().port_name, "MOCK0");
    }

    #[tokio::test]
    async fn test_mock_open_failure() {
        let (mut transport, handle) = MockTransport::new();
        handle.fail_next_open("port busy");

        let result = transport.open(&SerialConfig::new("MOCK0")).await;
        assert!(matches!(result, Err(TransportError::Connection { .. })));
        assert!(!transport.is_open());

        // Failure is one-shot
        transport.open(&SerialConfig::new("MOCK0")).await.unwrap();
        assert!(transport.is_open());
    }

    #[tokio::test]
    async fn test_mock_close_is_idempotent() {
        let (mut transport, handle) = open_mock().await;

        transport.close().await.unwrap();
        transport.close().await.unwrap();

        assert!(!transport.is_open());
        let closes = handle
            .operations()
            .into_iter()
            .filter(|op| *op == MockOp::Close)
            .count();
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn test_mock_closed_io_fails() {
        let (mut transport, _handle) = MockTransport::new();

        assert!(matches!(
            transport.send_bytes(b"X").await,
            Err(TransportError::NotOpen)
        ));
        assert!(matches!(
            transport.receive_bytes(8).await,
            Err(TransportError::NotOpen)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_silence_waits_read_timeout() {
        let (mut transport, _handle) = open_mock().await;

        let start = tokio::time::Instant::now();
        let data = transport.receive_bytes(64).await.unwrap();

        assert!(data.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_mock_queued_replies_take_priority() {
        let (mut transport, handle) = open_mock().await;
        handle.present_tag("AAAA");
        handle.queue_reply(MockReply::data("BBBB"));

        assert_eq!(transport.receive_bytes(64).await.unwrap(), b"BBBB");
        assert_eq!(transport.receive_bytes(64).await.unwrap(), b"AAAA\r\n");
        assert_eq!(transport.receive_bytes(64).await.unwrap(), b"AAAA\r\n");
    }

    #[tokio::test]
    async fn test_mock_keeps_bytes_beyond_max_len() {
        let (mut transport, handle) = open_mock().await;
        handle.queue_reply(MockReply::data("0123456789"));
        handle.queue_reply(MockReply::data("NEXT"));

        assert_eq!(transport.receive_bytes(4).await.unwrap(), b"0123");
        assert_eq!(transport.receive_bytes(4).await.unwrap(), b"4567");
        assert_eq!(transport.receive_bytes(64).await.unwrap(), b"89");
        assert_eq!(transport.receive_bytes(64).await.unwrap(), b"NEXT");
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_cancelled_read_keeps_delayed_reply() {
        let (mut transport, handle) = open_mock().await;
        handle.queue_reply(MockReply::Delayed(
            Duration::from_millis(300),
            b"LATE\r\n".to_vec(),
        ));

        let start = Instant::now();
        let cancelled =
            tokio::time::timeout(Duration::from_millis(100), transport.receive_bytes(64)).await;
        assert!(cancelled.is_err());
        assert!(transport.is_open());

        // The reply arrives at its original time, not a full delay later
        assert_eq!(transport.receive_bytes(64).await.unwrap(), b"LATE\r\n");
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert!(start.elapsed() < Duration::from_millis(400));
        assert_eq!(handle.receive_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_read_fault() {
        let (mut transport, handle) = open_mock().await;
        handle.queue_reply(MockReply::Fault(ErrorKind::BrokenPipe));

        let result = transport.receive_bytes(64).await;
        assert!(matches!(result, Err(TransportError::Io(_))));
    }

    #[tokio::test]
    async fn test_mock_write_fault_and_drop() {
        let (mut transport, handle) = open_mock().await;

        handle.fail_next_write(ErrorKind::TimedOut);
        assert!(matches!(
            transport.send_bytes(b"A").await,
            Err(TransportError::Io(_))
        ));

        handle.drop_writes(true);
        assert_eq!(transport.send_bytes(b"B").await.unwrap(), 0);

        handle.drop_writes(false);
        assert_eq!(transport.send_bytes(b"CD").await.unwrap(), 2);

        assert_eq!(handle.sent_frames(), vec![b"B".to_vec(), b"CD".to_vec()]);
    }

    #[tokio::test]
    async fn test_mock_responder_queues_replies() {
        let (mut transport, handle) = open_mock().await;
        handle.set_responder(|frame| vec![MockReply::data(frame)]);

        transport.send_bytes(b"PING").await.unwrap();
        assert_eq!(handle.pending_replies(), 1);
        assert_eq!(transport.receive_bytes(64).await.unwrap(), b"PING");

        handle.clear_responder();
        transport.send_bytes(b"PING").await.unwrap();
        assert_eq!(handle.pending_replies(), 0);
    }

    #[tokio::test]
    async fn test_mock_tag_presence() {
        let (_transport, handle) = open_mock().await;

        assert!(!handle.is_tag_present());
        handle.present_tag("ABC");
        assert!(handle.is_tag_present());
        handle.remove_tag();
        assert!(!handle.is_tag_present());
    }

    #[tokio::test]
    async fn test_mock_operation_log() {
        let (mut transport, handle) = open_mock().await;
        handle.clear_operations();
        handle.queue_reply(MockReply::data("R"));

        transport.send_bytes(b"S").await.unwrap();
        transport.receive_bytes(8).await.unwrap();
        transport.close().await.unwrap();

        assert_eq!(
            handle.operations(),
            vec![
                MockOp::Sent(b"S".to_vec()),
                MockOp::Received(b"R".to_vec()),
                MockOp::Close,
            ]
        );
        assert_eq!(handle.receive_count(), 1);
    }
}
