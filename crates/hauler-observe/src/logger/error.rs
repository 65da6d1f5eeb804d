use thiserror::Error;

/// Errors from parsing logger settings or installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format '{0}' (expected text, json or journald)")]
    InvalidFormat(String),

    #[error("unknown log output '{0}' (expected stdout or stderr)")]
    InvalidOutput(String),

    #[error("journald logging requires linux")]
    JournaldNotSupported,

    #[error("journald connection failed: {0}")]
    JournaldInitFailed(String),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,

    #[error("bad log filter '{0}'")]
    InvalidLevel(String),
}

pub type LoggerResult<T> = Result<T, LoggerError>;
