//! Shared helpers for transport integration tests.

#![allow(dead_code)]

use rfidlink_transport::mock::{MockTransport, MockTransportHandle};
use rfidlink_transport::{AnyTransport, SerialConfig, Transport};

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

/// An opened mock reader behind the runtime-selected wrapper.
pub async fn open_any_mock(port: &str) -> (AnyTransport, MockTransportHandle) {
    init_tracing();
    let (mock, handle) = MockTransport::with_name("integration mock");
    let mut transport = AnyTransport::from(mock);
    transport
        .open(&SerialConfig::new(port))
        .await
        .expect("mock transport should open");
    (transport, handle)
}
