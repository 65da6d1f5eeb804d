use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status reported by a job body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

/// Typed status payload carried by worker `event` messages.
///
/// Failures are data: a job that fails reports `Failed` with a human-readable reason
/// instead of raising an error across the process boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StatusPayload {
    pub fn running() -> Self {
        Self {
            status: JobStatus::Running,
            result: None,
            reason: None,
        }
    }

    pub fn succeeded(result: Value) -> Self {
        Self {
            status: JobStatus::Succeeded,
            result: Some(result),
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            result: None,
            reason: Some(reason.into()),
        }
    }

    /// Returns `true` for `Succeeded` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, JobStatus::Running)
    }
}
