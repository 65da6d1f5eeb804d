mod config;
mod error;
mod init;
mod object;

pub use config::LoggerConfig;
pub use error::{LoggerError, LoggerResult};
pub use object::{LoggerFormat, LoggerLevel, LoggerOutput, LoggerRfc3339};

/// Installs the global tracing subscriber described by `cfg`.
///
/// Call once per process; a second call fails with [`LoggerError::AlreadyInitialized`].
///
/// # Examples
/// ```rust
/// use hauler_observe::{LoggerConfig, LoggerOutput, init_logger};
///
/// let cfg = LoggerConfig {
///     output: LoggerOutput::Stderr,
///     ..Default::default()
/// };
/// init_logger(&cfg).expect("logger");
/// tracing::info!("worker logging to stderr");
/// ```
pub fn init_logger(cfg: &LoggerConfig) -> LoggerResult<()> {
    match cfg.format {
        LoggerFormat::Text => init::logger_text(cfg),
        LoggerFormat::Json => init::logger_json(cfg),
        LoggerFormat::Journald => init::logger_journald(cfg),
    }
}
