//! RFID reader sessions over a serial link.
//!
//! A [`ReaderSession`] owns one [`Transport`] and offers three things on top
//! of it:
//!
//! - **Reads**: [`read_tag`](ReaderSession::read_tag) returns the tag in range
//!   or [`TagRead::NoTag`].
//! - **Verified writes**: [`write_tag`](ReaderSession::write_tag) sends a
//!   write frame, then reads the tag back and compares.
//! - **Auto-detection**: [`start_auto_detection`](ReaderSession::start_auto_detection)
//!   polls in the background and reports each tag once per appearance.
//!
//! Writes pause auto-detection and resume it afterwards, so the two never
//! interleave on the wire.
//!
//! # Example
//!
//! ```
//! use rfidlink_reader::{ReaderConfig, ReaderSession};
//! use rfidlink_transport::mock::{MockReply, MockTransport};
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() -> rfidlink_reader::Result<()> {
//! let (transport, handle) = MockTransport::new();
//!
//! // A reader that stores whatever is written to it.
//! let device = handle.clone();
//! handle.set_responder(move |frame| {
//!     if let Some(id) = frame.strip_prefix(b"WRITE:") {
//!         device.present_tag(std::str::from_utf8(id).unwrap_or("").trim());
//!     }
//!     Vec::new()
//! });
//!
//! let session = ReaderSession::open(transport, ReaderConfig::new("MOCK0")).await?;
//!
//! session.start_auto_detection(|tag| println!("detected {tag}"))?;
//! let outcome = session.write_tag("e2003412").await?;
//! assert!(outcome.is_success());
//!
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod detection;
pub mod error;
pub mod framing;
pub mod script;
pub mod session;
pub mod tag;

pub use config::{ReaderConfig, parse_properties};
pub use detection::{DetectionMemory, Observation, TagCallback};
pub use error::{ReaderError, Result};
pub use framing::{CommandResponse, Framing, LineFraming, NO_RESPONSE};
pub use rfidlink_transport::{SerialConfig, Transport, TransportError};
pub use script::{ConfigScript, ScriptStep};
pub use session::{ConfigWarning, ConfigureReport, ReaderSession, SessionState, WriteOutcome};
pub use tag::{DEFAULT_TAG_MAX_LENGTH, TagId, TagRead};
