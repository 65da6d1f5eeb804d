use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::job::{JobId, JobKind};

/// A single unit of assigned work.
///
/// Handed to an executor once and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescription {
    /// Coordinator-assigned identifier.
    pub job_id: JobId,
    /// Which job body runs this job.
    pub job_kind: JobKind,
    /// Body-specific input, opaque to the engine.
    #[serde(default)]
    pub payload: Value,
    /// Per-job timeout override in seconds.
    ///
    /// Falls back to the runner-wide default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl JobDescription {
    /// Create a job description without a timeout override.
    pub fn new(job_id: JobId, job_kind: JobKind, payload: Value) -> Self {
        Self {
            job_id,
            job_kind,
            payload,
            timeout_seconds: None,
        }
    }

    /// Set a per-job timeout override.
    pub fn with_timeout_seconds(mut self, secs: u64) -> Self {
        self.timeout_seconds = Some(secs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_camel_case_fields() {
        let job: JobDescription = serde_json::from_value(json!({
            "jobId": 42,
            "jobKind": "command",
            "payload": {"command": "ls"},
            "timeoutSeconds": 3
        }))
        .unwrap();

        assert_eq!(job.job_id, 42);
        assert_eq!(job.job_kind, JobKind::Command);
        assert_eq!(job.payload["command"], "ls");
        assert_eq!(job.timeout_seconds, Some(3));
    }

    #[test]
    fn timeout_is_omitted_when_absent() {
        let job = JobDescription::new(1, JobKind::BundleStats, Value::Null);
        let json = serde_json::to_value(&job).unwrap();
        assert!(json.get("timeoutSeconds").is_none());
    }
}
