use serde::{Deserialize, Serialize};

use crate::StatusPayload;

/// A queued status update awaiting push.
///
/// The log trace is not part of the update itself: it is attached when the update
/// is dequeued (see [`crate::UpdateBatch`]), so a retried update is the very same value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_updates: Option<StatusPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_millis: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl PendingUpdate {
    /// Update carrying a status payload.
    pub fn status(payload: StatusPayload) -> Self {
        Self {
            job_updates: Some(payload),
            ..Self::default()
        }
    }

    /// Final update closing the job.
    pub fn done(duration_millis: u64, failure_reason: Option<String>) -> Self {
        Self {
            job_updates: None,
            duration_millis: Some(duration_millis),
            done: Some(true),
            failure_reason,
        }
    }

    /// Returns `true` when every field is absent.
    ///
    /// Placeholders are enqueued on log arrival so logs get shipped without a status event.
    pub fn is_placeholder(&self) -> bool {
        self.job_updates.is_none()
            && self.duration_millis.is_none()
            && self.done.is_none()
            && self.failure_reason.is_none()
    }

    pub fn is_done(&self) -> bool {
        self.done == Some(true)
    }
}
