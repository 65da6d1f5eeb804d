use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown job kind: {0}")]
    UnknownJobKind(String),

    #[error("unknown log level: {0}")]
    UnknownLogLevel(String),

    #[error("invalid model: {0}")]
    Invalid(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
