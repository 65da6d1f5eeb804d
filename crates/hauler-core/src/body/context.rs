use std::{
    fmt,
    sync::{Arc, Mutex},
};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use hauler_model::{
    JobDescription, LogEntry, LogLevel, ServerSettings, StatusPayload, WorkerMessage,
};

/// Execution context handed to every job body hook.
///
/// Carries the job, the coordinator settings and the only channel a body has to
/// its supervisor: log lines and status events are turned into worker messages.
#[derive(Clone)]
pub struct JobContext {
    job: Arc<JobDescription>,
    server: ServerSettings,
    outbox: mpsc::UnboundedSender<WorkerMessage>,
    cancel: CancellationToken,
    raise_reason: Arc<Mutex<Option<String>>>,
}

impl JobContext {
    /// Create a context writing messages into `outbox`.
    pub fn new(
        job: JobDescription,
        server: ServerSettings,
        outbox: mpsc::UnboundedSender<WorkerMessage>,
    ) -> Self {
        Self {
            job: Arc::new(job),
            server,
            outbox,
            cancel: CancellationToken::new(),
            raise_reason: Arc::new(Mutex::new(None)),
        }
    }

    pub fn job(&self) -> &JobDescription {
        &self.job
    }

    pub fn server(&self) -> &ServerSettings {
        &self.server
    }

    /// Append a log line to the job trace.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.send(WorkerMessage::Log(LogEntry::now(level, message)));
    }

    /// Append a log line with a structured payload.
    pub fn log_with(&self, level: LogLevel, message: impl Into<String>, payload: Value) {
        self.send(WorkerMessage::Log(
            LogEntry::now(level, message).with_payload(payload),
        ));
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Report a status change.
    pub fn event(&self, payload: StatusPayload) {
        self.send(WorkerMessage::Event(payload));
    }

    /// Request cooperative cancellation.
    ///
    /// The first reason wins; later calls only re-trigger the (already fired) token.
    pub fn raise(&self, reason: impl Into<String>) {
        if let Ok(mut guard) = self.raise_reason.lock() {
            if guard.is_none() {
                *guard = Some(reason.into());
            }
        }
        self.cancel.cancel();
    }

    pub fn is_raised(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Reason given to [`JobContext::raise`], if any.
    pub fn raise_reason(&self) -> Option<String> {
        self.raise_reason.lock().ok().and_then(|g| g.clone())
    }

    /// Completes once the job has been raised.
    pub async fn raised(&self) {
        self.cancel.cancelled().await
    }

    /// Token fired on raise; long-running bodies may hand it to their own tasks.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn send(&self, msg: WorkerMessage) {
        if self.outbox.send(msg).is_err() {
            trace!(job = self.job.job_id, "outbox closed; message discarded");
        }
    }
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.job.job_id)
            .field("kind", &self.job.job_kind)
            .field("raised", &self.is_raised())
            .finish()
    }
}
