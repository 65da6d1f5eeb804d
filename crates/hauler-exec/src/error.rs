use thiserror::Error;

/// Errors raised while supervising a worker process.
///
/// Carries strings only so it can be cloned into both the event stream and the execution summary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("worker crashed: {0}")]
    WorkerCrashed(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Io(e.to_string())
    }
}
