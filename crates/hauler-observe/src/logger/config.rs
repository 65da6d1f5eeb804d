use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::logger::object::{LoggerFormat, LoggerLevel, LoggerOutput};

/// Logger configuration, embedded as the `log` section of the runner config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggerConfig {
    /// Output format.
    pub format: LoggerFormat,
    /// Filter expression (e.g. `"info"`, `"hauler_exec=trace,info"`).
    pub level: LoggerLevel,
    /// Stream the text/json formats write to.
    pub output: LoggerOutput,
    /// Include module targets in log lines.
    pub with_targets: bool,
    /// Colorize text output when writing to a terminal.
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::default(),
            level: LoggerLevel::default(),
            output: LoggerOutput::default(),
            with_targets: true,
            use_color: true,
        }
    }
}

impl LoggerConfig {
    /// Same configuration, redirected to stderr.
    pub fn to_stderr(mut self) -> Self {
        self.output = LoggerOutput::Stderr;
        self
    }

    /// Color only when enabled and the selected stream is a terminal.
    pub fn should_use_color(&self) -> bool {
        self.use_color
            && match self.output {
                LoggerOutput::Stdout => std::io::stdout().is_terminal(),
                LoggerOutput::Stderr => std::io::stderr().is_terminal(),
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = LoggerConfig::default();
        assert_eq!(cfg.format, LoggerFormat::Text);
        assert_eq!(cfg.output, LoggerOutput::Stdout);
        assert_eq!(cfg.level.as_str(), "info");
        assert!(cfg.with_targets);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: LoggerConfig =
            serde_json::from_str(r#"{"format": "json", "withTargets": false}"#).unwrap();
        assert_eq!(cfg.format, LoggerFormat::Json);
        assert!(!cfg.with_targets);
        assert!(cfg.use_color);
        assert_eq!(cfg.output, LoggerOutput::Stdout);
    }

    #[test]
    fn to_stderr_only_changes_output() {
        let cfg = LoggerConfig {
            format: LoggerFormat::Json,
            ..Default::default()
        }
        .to_stderr();
        assert_eq!(cfg.output, LoggerOutput::Stderr);
        assert_eq!(cfg.format, LoggerFormat::Json);
    }

    #[test]
    fn rejects_invalid_level_in_json() {
        let res = serde_json::from_str::<LoggerConfig>(r#"{"level": "hauler=loud"}"#);
        assert!(res.is_err());
    }
}
