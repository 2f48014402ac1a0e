//! Reader session: the single owner of a reader's transport.
//!
//! All transport traffic, whether from the caller or the detection loop,
//! goes through one FIFO-fair async mutex, so a command and its reply are
//! never split by another party's I/O.

use crate::config::ReaderConfig;
use crate::detection::{DetectionControl, Suspension};
use crate::error::{ReaderError, Result};
use crate::framing::{CommandResponse, Framing, LineFraming};
use crate::script::ConfigScript;
use crate::tag::{TagId, TagRead};
use rfidlink_transport::Transport;
use std::fmt;
use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

/// Command sent by [`ReaderSession::test_connection`].
pub const STATUS_COMMAND: &str = "STATUS\r\n";

/// Externally visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Closed,
    OpenIdle,
    OpenAutoDetecting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::OpenIdle => write!(f, "open"),
            Self::OpenAutoDetecting => write!(f, "auto-detecting"),
        }
    }
}

/// Result of a write-and-verify sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The tag now reads back as written.
    Verified { tag: TagId, bytes_written: usize },

    /// The transport accepted no bytes.
    NothingWritten,

    /// The read-back differs from what was written.
    ///
    /// `actual` is the first line read back, or `None` if nothing came back.
    VerificationMismatch {
        expected: TagId,
        actual: Option<String>,
    },
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verified { tag, .. } => write!(f, "wrote and verified {tag}"),
            Self::NothingWritten => write!(f, "no bytes written"),
            Self::VerificationMismatch {
                expected,
                actual: Some(actual),
            } => write!(f, "expected {expected}, read back {actual}"),
            Self::VerificationMismatch {
                expected,
                actual: None,
            } => write!(f, "expected {expected}, read back nothing"),
        }
    }
}

/// Problem with one configuration command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The reader did not answer.
    NoResponse { command: String },

    /// The command could not be exchanged.
    Failed { command: String, message: String },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResponse { command } => write!(f, "{command}: no response"),
            Self::Failed { command, message } => write!(f, "{command}: {message}"),
        }
    }
}

/// Outcome of [`ReaderSession::configure_reader`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigureReport {
    /// Commands the reader answered, with the trimmed reply.
    pub applied: Vec<(String, String)>,

    pub warnings: Vec<ConfigWarning>,
}

impl ConfigureReport {
    /// Whether every command got an answer.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// State shared between the session handle and its background tasks.
pub(crate) struct Shared<T: Transport> {
    pub(crate) transport: Mutex<T>,
    pub(crate) control: std::sync::Mutex<DetectionControl>,
    pub(crate) config: ReaderConfig,
    framing: Box<dyn Framing>,
    script: ConfigScript,
}

impl<T: Transport> Shared<T> {
    pub(crate) fn control(&self) -> MutexGuard<'_, DetectionControl> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn read_line_locked(&self, transport: &mut T) -> Result<Option<String>> {
        let data = transport.receive_bytes(self.config.read_buffer_size).await?;
        trace!(len = data.len(), "Read response");
        self.framing.decode_line(&data)
    }

    pub(crate) async fn read_tag_locked(&self, transport: &mut T) -> Result<TagRead> {
        match self.read_line_locked(transport).await? {
            Some(line) => {
                let tag = TagId::with_max_length(&line, self.config.tag_max_length)?;
                Ok(TagRead::Present(tag))
            }
            None => Ok(TagRead::NoTag),
        }
    }

    async fn send_command_locked(
        &self,
        transport: &mut T,
        command: &str,
        settle: Duration,
    ) -> Result<CommandResponse> {
        trace!(command = command.trim_end(), "Sending command");
        transport.send_bytes(command.as_bytes()).await?;
        tokio::time::sleep(settle).await;

        let data = transport
            .receive_bytes(self.config.command_buffer_size)
            .await?;
        Ok(CommandResponse::from_bytes(&data))
    }
}

/// An open connection to one RFID reader.
///
/// Every operation is `&self`; concurrent callers queue on the transport
/// lock in arrival order. Dropping the session stops auto-detection but
/// does not wait for the transport to close; call [`close`](Self::close)
/// for an orderly shutdown.
///
/// # Examples
///
/// ```
/// use rfidlink_reader::{ReaderConfig, ReaderSession, TagRead};
/// use rfidlink_transport::mock::MockTransport;
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() -> rfidlink_reader::Result<()> {
/// let (transport, handle) = MockTransport::new();
/// let session = ReaderSession::open(transport, ReaderConfig::new("MOCK0")).await?;
///
/// handle.present_tag("e2003412");
/// let read = session.read_tag().await?;
/// assert_eq!(read.tag().map(|t| t.as_str()), Some("E2003412"));
///
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct ReaderSession<T: Transport> {
    pub(crate) shared: Arc<Shared<T>>,
}

impl<T: Transport> fmt::Debug for ReaderSession<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderSession")
            .field("port", &self.shared.config.serial.port_name)
            .field("state", &self.state())
            .finish()
    }
}

impl<T: Transport> ReaderSession<T> {
    /// Open `transport` and start a session with CRLF framing and the
    /// default configuration script.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::Configuration` for invalid settings and
    /// `ReaderError::Transport` if the port cannot be opened.
    pub async fn open(transport: T, config: ReaderConfig) -> Result<Self> {
        Self::open_with(transport, config, LineFraming, ConfigScript::default()).await
    }

    /// Open a session with a custom framing and configuration script.
    ///
    /// # Errors
    ///
    /// Same as [`ReaderSession::open`].
    pub async fn open_with(
        mut transport: T,
        config: ReaderConfig,
        framing: impl Framing,
        script: ConfigScript,
    ) -> Result<Self> {
        config.validate()?;
        transport.open(&config.serial).await?;

        info!(
            port = %config.serial.port_name,
            baud_rate = config.serial.baud_rate,
            "Reader session opened"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                transport: Mutex::new(transport),
                control: std::sync::Mutex::new(DetectionControl::default()),
                config,
                framing: Box::new(framing),
                script,
            }),
        })
    }

    /// Settings this session was opened with.
    pub fn config(&self) -> &ReaderConfig {
        &self.shared.config
    }

    pub fn state(&self) -> SessionState {
        let control = self.shared.control();
        if control.closed {
            SessionState::Closed
        } else if control.is_running() {
            SessionState::OpenAutoDetecting
        } else {
            SessionState::OpenIdle
        }
    }

    async fn lock_transport(&self) -> Result<tokio::sync::MutexGuard<'_, T>> {
        let guard = self.shared.transport.lock().await;
        let closed = self.shared.control().closed;
        if closed {
            return Err(ReaderError::Closed);
        }
        Ok(guard)
    }

    /// Read whatever tag is in range.
    ///
    /// Silence is [`TagRead::NoTag`]. When the reader sends several lines the
    /// first non-empty one is used.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::InvalidTag` when the reply is not a valid tag
    /// identifier and `ReaderError::Transport` on an I/O fault.
    pub async fn read_tag(&self) -> Result<TagRead> {
        let mut transport = self.lock_transport().await?;
        self.shared.read_tag_locked(&mut transport).await
    }

    /// Send a raw command and return the reply.
    ///
    /// `command` must carry its own terminator. The reply is read once after
    /// the command settle delay.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::Transport` on an I/O fault.
    pub async fn send_command(&self, command: &str) -> Result<CommandResponse> {
        let mut transport = self.lock_transport().await?;
        let response = self
            .shared
            .send_command_locked(&mut transport, command, self.shared.config.command_settle())
            .await?;

        debug!(command = command.trim_end(), response = %response, "Command completed");
        Ok(response)
    }

    /// Ask the reader for its status.
    pub async fn test_connection(&self) -> Result<CommandResponse> {
        let response = self.send_command(STATUS_COMMAND).await?;
        if !response.is_response() {
            warn!(port = %self.shared.config.serial.port_name, "Reader did not answer STATUS");
        }
        Ok(response)
    }

    /// Write `tag_id` to the tag in range and read it back.
    ///
    /// Auto-detection is paused for the whole sequence and resumed with the
    /// same callback afterwards, also when the sequence fails.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::InvalidTag` if `tag_id` is not a valid
    /// identifier and `ReaderError::Transport` on an I/O fault. A read-back
    /// that does not match is a [`WriteOutcome::VerificationMismatch`].
    pub async fn write_tag(&self, tag_id: &str) -> Result<WriteOutcome> {
        let expected = TagId::with_max_length(tag_id, self.shared.config.tag_max_length)?;

        let mut transport = self.lock_transport().await?;
        // Dropped before `transport`, so detection resumes while the lock is held.
        let _suspension = Suspension::begin(&self.shared);

        let frame = self.shared.framing.encode_write(&expected);
        debug!(tag = %expected, len = frame.len(), "Writing tag");

        let bytes_written = transport.send_bytes(&frame).await?;
        if bytes_written == 0 {
            warn!(tag = %expected, "Reader accepted no bytes");
            return Ok(WriteOutcome::NothingWritten);
        }

        tokio::time::sleep(self.shared.config.write_settle()).await;

        let actual = self.shared.read_line_locked(&mut transport).await?;
        let verified = actual.as_deref().is_some_and(|line| {
            TagId::with_max_length(line, self.shared.config.tag_max_length)
                .is_ok_and(|tag| tag == expected)
        });

        if verified {
            info!(tag = %expected, bytes_written, "Tag written and verified");
            Ok(WriteOutcome::Verified {
                tag: expected,
                bytes_written,
            })
        } else {
            warn!(tag = %expected, actual = ?actual, "Tag verification failed");
            Ok(WriteOutcome::VerificationMismatch { expected, actual })
        }
    }

    /// Run the configuration script against the reader.
    ///
    /// The whole script runs under one transport lock hold. Each step is a
    /// full command exchange (send, command settle, receive) followed by the
    /// step's own pause. Commands that fail or go unanswered are reported as
    /// warnings; the remaining steps still run.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::Closed` on a closed session.
    pub async fn configure_reader(&self) -> Result<ConfigureReport> {
        let mut transport = self.lock_transport().await?;
        let mut report = ConfigureReport::default();

        for step in self.shared.script.steps() {
            let command = step.label().to_string();
            match self
                .shared
                .send_command_locked(
                    &mut transport,
                    &step.command,
                    self.shared.config.command_settle(),
                )
                .await
            {
                Ok(CommandResponse::Reply(reply)) => {
                    debug!(command = %command, reply = reply.trim(), "Configuration applied");
                    report.applied.push((command, reply.trim().to_string()));
                }
                Ok(CommandResponse::NoResponse) => {
                    warn!(command = %command, "No response to configuration command");
                    report.warnings.push(ConfigWarning::NoResponse { command });
                }
                Err(e) => {
                    warn!(command = %command, error = %e, "Configuration command failed");
                    report.warnings.push(ConfigWarning::Failed {
                        command,
                        message: e.to_string(),
                    });
                }
            }

            tokio::time::sleep(step.settle()).await;
        }

        info!(
            applied = report.applied.len(),
            warnings = report.warnings.len(),
            "Reader configured"
        );
        Ok(report)
    }

    /// Stop auto-detection, wait for the poll task and close the transport.
    ///
    /// Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::Transport` if the transport fails to close.
    pub async fn close(&self) -> Result<()> {
        let task = {
            let mut control = self.shared.control();
            if control.closed {
                return Ok(());
            }
            control.closed = true;
            control.halt()
        };

        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Detection task ended abnormally: {}", e);
            }
        }

        let mut transport = self.shared.transport.lock().await;
        transport.close().await?;

        info!(port = %self.shared.config.serial.port_name, "Reader session closed");
        Ok(())
    }
}

impl<T: Transport> Drop for ReaderSession<T> {
    fn drop(&mut self) {
        self.shared.control().halt();
    }
}
