//! Metrics classification of finished jobs.
use hauler_core::JobOutcome;
use hauler_model::JobStatus;

use crate::executor::Finish;

/// Classify a finished job from how it ended and the last status its body reported.
pub(crate) fn job_outcome(finish: &Finish, last_status: Option<JobStatus>) -> JobOutcome {
    match finish {
        Finish::Completed => match last_status {
            Some(JobStatus::Failed) => JobOutcome::Failure,
            _ => JobOutcome::Success,
        },
        Finish::Raised | Finish::Terminated | Finish::Killed => JobOutcome::Terminated,
        Finish::SpawnFailed(_) => JobOutcome::Failure,
        Finish::Crashed(_) => JobOutcome::Crashed,
    }
}
