use thiserror::Error;

use hauler_model::JobKind;

/// Failure raised by a job body hook.
///
/// Crosses no process boundary: the worker turns it into a `failed` status payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BodyError {
    #[error("{0}")]
    Failed(String),

    /// The supervisor asked the job to stop; the message is the bare reason.
    #[error("{0}")]
    Raised(String),

    #[error("no job body registered for kind '{0}'")]
    Unsupported(JobKind),

    #[error("invalid job payload: {0}")]
    InvalidPayload(String),

    #[error("io error: {0}")]
    Io(String),
}

impl BodyError {
    pub fn failed(reason: impl Into<String>) -> Self {
        BodyError::Failed(reason.into())
    }

    pub fn is_raised(&self) -> bool {
        matches!(self, BodyError::Raised(_))
    }
}

impl From<std::io::Error> for BodyError {
    fn from(e: std::io::Error) -> Self {
        BodyError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for BodyError {
    fn from(e: serde_json::Error) -> Self {
        BodyError::InvalidPayload(e.to_string())
    }
}
