use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use serde_json::Value;
use tracing::{debug, info};

use super::{ConfigError, RunnerConfig, ValidationReport, deep_merge, validate};

/// Process-wide configuration handle.
///
/// Owns the config file path and the current configuration. Executors receive
/// [`snapshot`](Self::snapshot)s, so a later [`patch`](Self::patch) never changes a running job.
#[derive(Debug)]
pub struct ConfigHandle {
    path: PathBuf,
    current: RwLock<Arc<RunnerConfig>>,
}

impl ConfigHandle {
    /// Load `path` over the defaults. A missing file yields the defaults.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let mut merged = defaults_value()?;
        match fs::read_to_string(&path) {
            Ok(text) => {
                let file: Value = serde_json::from_str(&text)
                    .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
                deep_merge(&mut merged, file);
                debug!(path = %path.display(), "config file loaded");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "config file not found, using defaults");
            }
            Err(e) => return Err(io_error(&path, e)),
        }
        let config = from_value(merged)?;
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(config)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current configuration.
    pub fn snapshot(&self) -> Arc<RunnerConfig> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn validate(&self) -> ValidationReport {
        self.snapshot().validate()
    }

    /// Deep-merge `patch` into the current configuration, validate, and persist.
    ///
    /// `null` values in the patch are ignored. An invalid result is rejected and
    /// leaves both the file and the in-memory configuration unchanged.
    pub fn patch(&self, patch: Value) -> Result<Arc<RunnerConfig>, ConfigError> {
        let mut merged = serde_json::to_value(&*self.snapshot())
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        deep_merge(&mut merged, patch);

        let report = validate(&merged);
        if !report.ok {
            return Err(ConfigError::Invalid(report));
        }
        let config = Arc::new(from_value(merged)?);
        self.persist(&config)?;

        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::clone(&config);
        info!(path = %self.path.display(), "config patched");
        Ok(config)
    }

    fn persist(&self, config: &RunnerConfig) -> Result<(), ConfigError> {
        let text =
            serde_json::to_string_pretty(config).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| io_error(&self.path, e))
    }
}

fn defaults_value() -> Result<Value, ConfigError> {
    serde_json::to_value(RunnerConfig::default()).map_err(|e| ConfigError::Parse(e.to_string()))
}

fn from_value(value: Value) -> Result<RunnerConfig, ConfigError> {
    serde_json::from_value(value).map_err(|e| ConfigError::Parse(e.to_string()))
}

fn io_error(path: &Path, e: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}
