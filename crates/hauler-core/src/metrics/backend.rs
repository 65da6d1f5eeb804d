use std::sync::Arc;

use hauler_model::JobKind;

/// How a job ended, for metrics classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Worker ended the job without reporting a failure.
    Success,
    /// Job reported a failed status, or its worker could not be spawned.
    Failure,
    /// Job was raised (timeout or explicit termination).
    Terminated,
    /// Worker process died without a terminal message.
    Crashed,
}

impl JobOutcome {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            JobOutcome::Success => "success",
            JobOutcome::Failure => "failure",
            JobOutcome::Terminated => "terminated",
            JobOutcome::Crashed => "crashed",
        }
    }
}

/// Backend metrics collection interface.
pub trait MetricsBackend: Send + Sync + 'static {
    /// Record that a worker acknowledged `start`.
    fn record_job_started(&self, kind: JobKind);
    /// Record job finalization with outcome and duration.
    fn record_job_completed(&self, kind: JobKind, outcome: JobOutcome, duration_ms: u64);
    /// Record a single failed push attempt.
    fn record_push_failed(&self, kind: JobKind);
    /// Record an update dropped after exhausting its retries.
    fn record_update_dropped(&self, kind: JobKind);
}

/// Shared handle to metrics backend.
pub type MetricsHandle = Arc<dyn MetricsBackend>;
