//! Shared helpers for reader integration tests.
//!
//! Sessions run on a [`MockTransport`]; the handle scripts the simulated
//! reader. Set `RUST_LOG=rfidlink_reader=trace` to see the session's logs.

#![allow(dead_code)]

use rfidlink_reader::{ReaderConfig, ReaderSession, TagId};
use rfidlink_transport::mock::{MockReply, MockTransport, MockTransportHandle};
use std::sync::{Arc, Mutex};

/// Install a test subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Open a session on a fresh mock reader with default settings.
pub async fn open_mock_session() -> (ReaderSession<MockTransport>, MockTransportHandle) {
    init_tracing();
    let (transport, handle) = MockTransport::new();
    let session = ReaderSession::open(transport, ReaderConfig::new("MOCK0"))
        .await
        .expect("mock session should open");
    (session, handle)
}

/// Make the mock behave like a writable tag: a `WRITE:<id>` frame places
/// `<id>` in the field.
pub fn store_written_tags(handle: &MockTransportHandle) {
    let device = handle.clone();
    handle.set_responder(move |frame| {
        if let Some(payload) = frame.strip_prefix(b"WRITE:") {
            let id = String::from_utf8_lossy(payload);
            device.present_tag(id.trim());
        }
        Vec::new()
    });
}

/// Make the mock echo the written ID back once as the next read.
pub fn echo_written_tags(handle: &MockTransportHandle) {
    handle.set_responder(|frame| match frame.strip_prefix(b"WRITE:") {
        Some(payload) => vec![MockReply::data(payload)],
        None => Vec::new(),
    });
}

/// Callback that records every detected tag.
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<TagId>>>,
}

impl Recorder {
    pub fn callback(&self) -> impl Fn(TagId) + Send + Sync + use<> {
        let seen = Arc::clone(&self.seen);
        move |tag| seen.lock().unwrap().push(tag)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.to_string())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

/// Queue one read per item: `Some(id)` answers with the ID, `None` is silence.
pub fn queue_reads(handle: &MockTransportHandle, reads: &[Option<&str>]) {
    handle.queue_replies(reads.iter().map(|read| match read {
        Some(id) => MockReply::data(format!("{id}\r\n")),
        None => MockReply::Silence,
    }));
}
