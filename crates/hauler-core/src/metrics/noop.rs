use hauler_model::JobKind;

use crate::metrics::backend::{JobOutcome, MetricsBackend};

/// No-op metrics backend that compiles to nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsBackend for NoOpMetrics {
    #[inline(always)]
    fn record_job_started(&self, _: JobKind) {}

    #[inline(always)]
    fn record_job_completed(&self, _: JobKind, _: JobOutcome, _: u64) {}

    #[inline(always)]
    fn record_push_failed(&self, _: JobKind) {}

    #[inline(always)]
    fn record_update_dropped(&self, _: JobKind) {}
}
