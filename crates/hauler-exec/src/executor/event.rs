use std::time::Duration;

use tokio::sync::mpsc;

use hauler_core::JobOutcome;

use crate::ExecError;

/// Lifecycle notification published by an executor. Each kind fires at most once.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorEvent {
    /// The worker acknowledged `start`.
    Start,
    /// Spawn failure or worker crash.
    Error(ExecError),
    /// Fired exactly once. `termination` is the raise reason when the job was terminated.
    End { termination: Option<String> },
}

/// Receiving side of an executor's events.
pub type EventStream = mpsc::UnboundedReceiver<ExecutorEvent>;

/// What [`Executor::run`](super::Executor::run) returns once every update is pushed or dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionSummary {
    pub outcome: JobOutcome,
    pub termination: Option<String>,
    pub error: Option<ExecError>,
    /// Time from the `start` acknowledgement (or from spawning, if never acknowledged) to finalization.
    pub duration: Duration,
    /// Log entries delivered to the coordinator.
    pub logs_pushed: usize,
    /// Updates dropped after exhausting their retries.
    pub updates_dropped: u32,
}

impl ExecutionSummary {
    /// `duration` in whole milliseconds, saturating at `u64::MAX`.
    pub fn duration_millis(&self) -> u64 {
        duration_millis(self.duration)
    }
}

pub(crate) fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
