use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::logger::LoggerError;

/// Stream the text and json formats write to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LoggerOutput {
    #[default]
    Stdout,
    /// Required for worker processes.
    Stderr,
}

impl LoggerOutput {
    pub(crate) fn make_writer(&self) -> BoxMakeWriter {
        match self {
            LoggerOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
            LoggerOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        }
    }
}

impl FromStr for LoggerOutput {
    type Err = LoggerError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            _ => Err(LoggerError::InvalidOutput(s.to_string())),
        }
    }
}

impl TryFrom<String> for LoggerOutput {
    type Error = LoggerError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LoggerOutput> for String {
    fn from(o: LoggerOutput) -> Self {
        o.to_string()
    }
}

impl fmt::Display for LoggerOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoggerOutput::Stdout => "stdout",
            LoggerOutput::Stderr => "stderr",
        })
    }
}
