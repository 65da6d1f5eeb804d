//! Runner configuration: one JSON file, deep-merged over defaults.
//!
//! There is no global config object. A [`ConfigHandle`] is created once per process and every
//! executor receives an immutable [`RunnerConfig`] snapshot from it.
mod handle;
pub use handle::ConfigHandle;

mod merge;
pub use merge::deep_merge;

mod validate;
pub use validate::{FieldError, Rule, VALIDATION_RULES, ValidationReport, validate};

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use hauler_model::{JobDescription, JobKind, ServerSettings};
use hauler_observe::LoggerConfig;

/// Well-known location of the runner config file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hauler/runner.json";

/// Environment variable overriding [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_PATH_ENV: &str = "HAULER_CONFIG";

/// Config file location: `$HAULER_CONFIG` or [`DEFAULT_CONFIG_PATH`].
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error on {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("config parse error: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(ValidationReport),
}

/// Complete runner configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunnerConfig {
    pub server: ServerSettings,
    pub runner: RunnerSettings,
    pub log: LoggerConfig,
}

/// Job execution settings shared by every executor of a runner process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunnerSettings {
    /// Runner name reported to the coordinator; defaults to the host name.
    pub name: String,
    /// Job kinds this runner accepts. Empty accepts every kind.
    pub job_kind_filter: Vec<JobKind>,
    /// Interval between job polls.
    pub check_interval_seconds: u64,
    /// Default job timeout when the job carries none.
    pub timeout_seconds: u64,
    /// Concurrently executing jobs.
    pub concurrency: u32,
    /// How long a raised worker may take to acknowledge before it is killed.
    pub terminate_grace_seconds: u64,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            name: default_runner_name(),
            job_kind_filter: JobKind::ALL.to_vec(),
            check_interval_seconds: 10,
            timeout_seconds: 600,
            concurrency: 1,
            terminate_grace_seconds: 10,
        }
    }
}

fn default_runner_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "hauler-runner".to_string())
}

impl RunnerConfig {
    /// Timeout in seconds for `job`: its own override, else the runner default.
    pub fn timeout_seconds_for(&self, job: &JobDescription) -> u64 {
        job.timeout_seconds.unwrap_or(self.runner.timeout_seconds)
    }

    pub fn timeout_for(&self, job: &JobDescription) -> Duration {
        Duration::from_secs(self.timeout_seconds_for(job))
    }

    pub fn terminate_grace(&self) -> Duration {
        Duration::from_secs(self.runner.terminate_grace_seconds)
    }

    /// Returns `true` if the kind filter admits `kind`.
    pub fn accepts(&self, kind: JobKind) -> bool {
        self.runner.job_kind_filter.is_empty() || self.runner.job_kind_filter.contains(&kind)
    }

    /// Run the validation rules against this configuration.
    pub fn validate(&self) -> ValidationReport {
        match serde_json::to_value(self) {
            Ok(value) => validate(&value),
            Err(e) => ValidationReport::single("", format!("not serializable: {e}")),
        }
    }
}
