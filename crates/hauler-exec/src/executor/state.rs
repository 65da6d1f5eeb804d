use std::fmt;

/// Lifecycle of one executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    /// Worker process requested, waiting for `alive`.
    Spawning,
    /// `start` sent, waiting for its acknowledgement.
    Handshaking,
    Running,
    /// `raise` sent, waiting for `raised`.
    Ending,
    Ended,
}

impl ExecutorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutorState::Idle => "idle",
            ExecutorState::Spawning => "spawning",
            ExecutorState::Handshaking => "handshaking",
            ExecutorState::Running => "running",
            ExecutorState::Ending => "ending",
            ExecutorState::Ended => "ended",
        }
    }
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an executor finalized.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Finish {
    /// The worker sent `end`.
    Completed,
    /// The worker acknowledged `raise`.
    Raised,
    /// Terminated before the worker came alive.
    Terminated,
    /// `raise` went unacknowledged for the whole grace period.
    Killed,
    SpawnFailed(crate::ExecError),
    Crashed(crate::ExecError),
}

impl Finish {
    pub(crate) fn error(&self) -> Option<&crate::ExecError> {
        match self {
            Finish::SpawnFailed(e) | Finish::Crashed(e) => Some(e),
            _ => None,
        }
    }
}
