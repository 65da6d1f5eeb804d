use serde::{Deserialize, Serialize};

use crate::{LogEntry, PendingUpdate};

/// A dequeued update plus the log slice shipped with it.
///
/// Serialized flat, as the coordinator expects: `{jobUpdates?, trace, durationMillis?, done?, failureReason?}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateBatch {
    #[serde(flatten)]
    pub update: PendingUpdate,
    #[serde(default)]
    pub trace: Vec<LogEntry>,
}

impl UpdateBatch {
    pub fn new(update: PendingUpdate, trace: Vec<LogEntry>) -> Self {
        Self { update, trace }
    }

    pub fn is_done(&self) -> bool {
        self.update.is_done()
    }
}
