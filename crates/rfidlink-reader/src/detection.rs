//! Background tag auto-detection.
//!
//! A detection run is one poll task plus one notifier task. The poll task
//! takes the transport lock, reads once, folds the result into
//! [`DetectionMemory`] and hands newly seen tags to the notifier, which calls
//! the user callback in detection order. Callbacks therefore never run while
//! the transport is locked and never stall polling.
//!
//! # Phases
//!
//! ```text
//!            start                    stop / loop exit
//! Stopped ──────────▶ Running ─────────────────────────▶ Stopped
//!                       │  ▲
//!      write takes lock │  │ write finishes (same callback)
//!                       ▼  │
//!                     Suspended
//! ```
//!
//! Every phase change happens under the control mutex, which is never held
//! across an await. Code that also needs the transport takes the transport
//! lock first.

use crate::error::{ReaderError, Result};
use crate::session::{ReaderSession, Shared};
use crate::tag::{TagId, TagRead};
use rfidlink_transport::Transport;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Callback invoked with each newly detected tag.
pub type TagCallback = Arc<dyn Fn(TagId) + Send + Sync>;

/// What a single poll meant relative to the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// A tag different from the last one is in range.
    Detected(TagId),

    /// The same tag is still in range.
    Repeated,

    /// The remembered tag left the read range.
    Removed(TagId),

    /// Nothing in range, nothing remembered.
    Idle,
}

/// Last tag seen by the detection loop.
///
/// A tag is reported once per appearance: repeats are swallowed until the
/// channel goes quiet or a different tag shows up.
///
/// # Examples
///
/// ```
/// use rfidlink_reader::detection::{DetectionMemory, Observation};
/// use rfidlink_reader::{TagId, TagRead};
///
/// let a = TagId::new("A1").unwrap();
/// let mut memory = DetectionMemory::default();
///
/// assert_eq!(memory.observe(TagRead::Present(a.clone())), Observation::Detected(a.clone()));
/// assert_eq!(memory.observe(TagRead::Present(a.clone())), Observation::Repeated);
/// assert_eq!(memory.observe(TagRead::NoTag), Observation::Removed(a.clone()));
/// assert_eq!(memory.observe(TagRead::Present(a.clone())), Observation::Detected(a));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionMemory {
    last: Option<TagId>,
}

impl DetectionMemory {
    /// Fold one read into the memory.
    pub fn observe(&mut self, read: TagRead) -> Observation {
        match read {
            TagRead::Present(tag) if self.last.as_ref() == Some(&tag) => Observation::Repeated,
            TagRead::Present(tag) => {
                self.last = Some(tag.clone());
                Observation::Detected(tag)
            }
            TagRead::NoTag => match self.last.take() {
                Some(tag) => Observation::Removed(tag),
                None => Observation::Idle,
            },
        }
    }

    pub fn last(&self) -> Option<&TagId> {
        self.last.as_ref()
    }

    pub fn clear(&mut self) {
        self.last = None;
    }
}

/// A live detection run.
pub(crate) struct ActiveRun {
    id: u64,
    token: CancellationToken,
    callback: TagCallback,
    task: JoinHandle<()>,
}

pub(crate) enum DetectionPhase {
    Stopped,
    Running(ActiveRun),
    /// A write holds the transport; `resume` restarts detection afterwards.
    Suspended { resume: Option<TagCallback> },
}

pub(crate) struct DetectionControl {
    pub(crate) phase: DetectionPhase,
    pub(crate) memory: DetectionMemory,
    pub(crate) closed: bool,
    next_run_id: u64,
}

impl Default for DetectionControl {
    fn default() -> Self {
        Self {
            phase: DetectionPhase::Stopped,
            memory: DetectionMemory::default(),
            closed: false,
            next_run_id: 0,
        }
    }
}

impl DetectionControl {
    /// Whether a poll task is live.
    pub(crate) fn is_running(&self) -> bool {
        matches!(&self.phase, DetectionPhase::Running(run) if !run.task.is_finished())
    }

    /// Cancel the current run, if any, and forget the last tag.
    ///
    /// A pending resume is dropped as well. Returns the poll task so the
    /// caller may wait for it.
    pub(crate) fn halt(&mut self) -> Option<JoinHandle<()>> {
        self.memory.clear();
        match std::mem::replace(&mut self.phase, DetectionPhase::Stopped) {
            DetectionPhase::Running(run) => {
                run.token.cancel();
                Some(run.task)
            }
            DetectionPhase::Suspended { .. } => {
                self.phase = DetectionPhase::Suspended { resume: None };
                None
            }
            DetectionPhase::Stopped => None,
        }
    }
}

/// Pauses detection for the lifetime of a transport critical section.
///
/// Create it only while holding the transport lock and drop it before the
/// lock is released, so a resumed loop cannot slip in between.
pub(crate) struct Suspension<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Suspension<T> {
    pub(crate) fn begin(shared: &Arc<Shared<T>>) -> Self {
        let mut control = shared.control();
        let resume = match std::mem::replace(&mut control.phase, DetectionPhase::Stopped) {
            DetectionPhase::Running(run) => {
                run.token.cancel();
                debug!(run_id = run.id, "Auto-detection suspended");
                (!run.task.is_finished()).then_some(run.callback)
            }
            DetectionPhase::Suspended { resume } => resume,
            DetectionPhase::Stopped => None,
        };
        control.memory.clear();
        control.phase = DetectionPhase::Suspended { resume };

        Self {
            shared: Arc::clone(shared),
        }
    }
}

impl<T: Transport> Drop for Suspension<T> {
    fn drop(&mut self) {
        let mut control = self.shared.control();
        let resume = match std::mem::replace(&mut control.phase, DetectionPhase::Stopped) {
            DetectionPhase::Suspended { resume } => resume,
            other => {
                control.phase = other;
                return;
            }
        };

        let Some(callback) = resume else {
            return;
        };
        if control.closed {
            return;
        }

        match Handle::try_current() {
            Ok(runtime) => {
                let run = spawn_run(&self.shared, &mut control, callback, &runtime);
                debug!(run_id = run.id, "Auto-detection resumed");
                control.phase = DetectionPhase::Running(run);
            }
            Err(e) => warn!("Cannot resume auto-detection: {}", e),
        }
    }
}

impl<T: Transport> ReaderSession<T> {
    /// Start polling for tags in the background.
    ///
    /// `callback` runs once for every tag that appears, in detection order,
    /// on a separate task. Returns `false` if detection is already running,
    /// in which case the existing callback stays in place.
    ///
    /// Called while a write is in flight, detection begins as soon as the
    /// write finishes.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::Closed` on a closed session and
    /// `ReaderError::Runtime` outside a Tokio runtime.
    pub fn start_auto_detection<F>(&self, callback: F) -> Result<bool>
    where
        F: Fn(TagId) + Send + Sync + 'static,
    {
        let runtime = Handle::try_current().map_err(|e| ReaderError::runtime(e.to_string()))?;
        let mut control = self.shared.control();

        if control.closed {
            return Err(ReaderError::Closed);
        }

        match &mut control.phase {
            DetectionPhase::Running(run) if !run.task.is_finished() => {
                debug!("Auto-detection already running");
                return Ok(false);
            }
            DetectionPhase::Suspended { resume } => {
                if resume.is_some() {
                    return Ok(false);
                }
                *resume = Some(Arc::new(callback));
                debug!("Auto-detection will start after the current write");
                return Ok(true);
            }
            _ => {}
        }

        let run = spawn_run(&self.shared, &mut control, Arc::new(callback), &runtime);
        info!(
            run_id = run.id,
            interval_ms = self.shared.config.poll_interval_ms,
            "Auto-detection started"
        );
        control.phase = DetectionPhase::Running(run);
        Ok(true)
    }

    /// Stop polling.
    ///
    /// Returns immediately. A read already in progress finishes, but its
    /// result is discarded and no further read is issued. Returns `true` if
    /// detection was running or about to resume.
    pub fn stop_auto_detection(&self) -> bool {
        let mut control = self.shared.control();
        let was_active = matches!(
            control.phase,
            DetectionPhase::Running(_) | DetectionPhase::Suspended { resume: Some(_) }
        );
        control.halt();

        if was_active {
            info!("Auto-detection stopped");
        }
        was_active
    }

    /// Stop polling and wait for the poll task to exit.
    ///
    /// The wait is bounded by one transport read timeout.
    pub async fn stop_auto_detection_and_wait(&self) -> bool {
        let (was_active, task) = {
            let mut control = self.shared.control();
            let was_active = matches!(
                control.phase,
                DetectionPhase::Running(_) | DetectionPhase::Suspended { resume: Some(_) }
            );
            (was_active, control.halt())
        };

        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Detection task ended abnormally: {}", e);
            }
        }

        if was_active {
            info!("Auto-detection stopped");
        }
        was_active
    }

    /// Whether the background loop is polling right now.
    ///
    /// `false` while a write has detection suspended.
    pub fn is_auto_detecting(&self) -> bool {
        self.shared.control().is_running()
    }

    /// Most recent tag reported by the detection loop, until it leaves range.
    pub fn last_detected_tag(&self) -> Option<TagId> {
        self.shared.control().memory.last().cloned()
    }
}

fn spawn_run<T: Transport>(
    shared: &Arc<Shared<T>>,
    control: &mut DetectionControl,
    callback: TagCallback,
    runtime: &Handle,
) -> ActiveRun {
    control.next_run_id += 1;
    control.memory.clear();

    let id = control.next_run_id;
    let token = CancellationToken::new();
    let (tx, rx) = mpsc::unbounded_channel();

    runtime.spawn(notify_loop(rx, Arc::clone(&callback), token.clone()));
    let task = runtime.spawn(poll_loop(Arc::clone(shared), id, token.clone(), tx));

    ActiveRun {
        id,
        token,
        callback,
        task,
    }
}

enum PollStep {
    Continue,
    Publish(TagId),
    Stop,
}

async fn poll_loop<T: Transport>(
    shared: Arc<Shared<T>>,
    run_id: u64,
    token: CancellationToken,
    notify: mpsc::UnboundedSender<TagId>,
) {
    let interval = shared.config.poll_interval();
    debug!(run_id, "Detection loop running");

    loop {
        let mut transport = tokio::select! {
            biased;
            () = token.cancelled() => break,
            guard = shared.transport.lock() => guard,
        };
        if token.is_cancelled() {
            break;
        }

        let read = shared.read_tag_locked(&mut transport).await;
        let step = record_poll(&shared, &token, read);
        drop(transport);

        match step {
            PollStep::Stop => break,
            PollStep::Publish(tag) => {
                if notify.send(tag).is_err() {
                    warn!(run_id, "Tag notifier is gone");
                    break;
                }
            }
            PollStep::Continue => {}
        }

        tokio::select! {
            biased;
            () = token.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }

    retire_run(&shared, run_id);
    debug!(run_id, "Detection loop exited");
}

/// Apply one poll result to the memory, unless the run was cancelled.
fn record_poll<T: Transport>(
    shared: &Shared<T>,
    token: &CancellationToken,
    read: Result<TagRead>,
) -> PollStep {
    let mut control = shared.control();
    if token.is_cancelled() {
        return PollStep::Stop;
    }

    match read {
        Ok(read) => match control.memory.observe(read) {
            Observation::Detected(tag) => {
                info!(tag = %tag, "Tag detected");
                PollStep::Publish(tag)
            }
            Observation::Removed(tag) => {
                info!(tag = %tag, "Tag removed");
                PollStep::Continue
            }
            Observation::Repeated | Observation::Idle => PollStep::Continue,
        },
        Err(e) if e.is_transient() => {
            warn!(error = %e, "Detection poll failed");
            PollStep::Continue
        }
        Err(e) => {
            error!(error = %e, "Detection loop stopping");
            PollStep::Stop
        }
    }
}

/// Mark the run stopped if it is still the current one.
fn retire_run<T: Transport>(shared: &Shared<T>, run_id: u64) {
    let mut control = shared.control();
    if matches!(&control.phase, DetectionPhase::Running(run) if run.id == run_id) {
        control.phase = DetectionPhase::Stopped;
        control.memory.clear();
    }
}

async fn notify_loop(
    mut rx: mpsc::UnboundedReceiver<TagId>,
    callback: TagCallback,
    token: CancellationToken,
) {
    while let Some(tag) = rx.recv().await {
        if token.is_cancelled() {
            break;
        }
        callback(tag);
    }
}
