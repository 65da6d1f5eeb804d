use std::sync::Arc;

use prometheus::{
    CounterVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder, proto::MetricFamily,
};

use hauler_core::{JobOutcome, MetricsBackend};
use hauler_model::JobKind;

const NAMESPACE: &str = "hauler";

/// Prometheus metrics backend.
///
/// ## Label cardinality
/// All labels are bounded:
/// - `kind`: the job kinds (`command`, `bundleStats`, `packageAnalysis`, `labAnalysis`)
/// - `outcome`: `success`, `failure`, `terminated`, `crashed`
#[derive(Clone)]
pub struct PrometheusMetrics {
    jobs_started: CounterVec,
    jobs_completed: CounterVec,
    job_duration: HistogramVec,
    push_failures: CounterVec,
    updates_dropped: CounterVec,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    /// Create a backend registering its metrics in `registry`.
    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let jobs_started = CounterVec::new(
            Opts::new("jobs_started_total", "Jobs whose worker acknowledged start")
                .namespace(NAMESPACE),
            &["kind"],
        )?;
        registry.register(Box::new(jobs_started.clone()))?;

        let jobs_completed = CounterVec::new(
            Opts::new("jobs_completed_total", "Jobs finalized, by outcome").namespace(NAMESPACE),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(jobs_completed.clone()))?;

        // Jobs run from seconds to tens of minutes.
        let job_duration = HistogramVec::new(
            HistogramOpts::new("job_duration_seconds", "Job execution duration in seconds")
                .namespace(NAMESPACE)
                .buckets(vec![
                    0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0,
                ]),
            &["kind"],
        )?;
        registry.register(Box::new(job_duration.clone()))?;

        let push_failures = CounterVec::new(
            Opts::new("push_failures_total", "Failed update push attempts").namespace(NAMESPACE),
            &["kind"],
        )?;
        registry.register(Box::new(push_failures.clone()))?;

        let updates_dropped = CounterVec::new(
            Opts::new(
                "updates_dropped_total",
                "Updates dropped after exhausting their retries",
            )
            .namespace(NAMESPACE),
            &["kind"],
        )?;
        registry.register(Box::new(updates_dropped.clone()))?;

        Ok(Self {
            jobs_started,
            jobs_completed,
            job_duration,
            push_failures,
            updates_dropped,
            registry,
        })
    }

    /// Create a backend with its own registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    /// Gather all metrics for exposition.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.gather())
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_job_started(&self, kind: JobKind) {
        self.jobs_started.with_label_values(&[kind.as_str()]).inc();
    }

    fn record_job_completed(&self, kind: JobKind, outcome: JobOutcome, duration_ms: u64) {
        self.jobs_completed
            .with_label_values(&[kind.as_str(), outcome.as_label()])
            .inc();

        let duration_seconds = duration_ms as f64 / 1000.0;
        self.job_duration
            .with_label_values(&[kind.as_str()])
            .observe(duration_seconds);
    }

    fn record_push_failed(&self, kind: JobKind) {
        self.push_failures.with_label_values(&[kind.as_str()]).inc();
    }

    fn record_update_dropped(&self, kind: JobKind) {
        self.updates_dropped
            .with_label_values(&[kind.as_str()])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family<'a>(families: &'a [MetricFamily], name: &str) -> &'a MetricFamily {
        families
            .iter()
            .find(|f| f.name() == name)
            .unwrap_or_else(|| panic!("metric {name} not found"))
    }

    #[test]
    fn started_counter_is_labelled_by_kind() {
        let metrics = PrometheusMetrics::new().unwrap();

        metrics.record_job_started(JobKind::Command);
        metrics.record_job_started(JobKind::Command);
        metrics.record_job_started(JobKind::LabAnalysis);

        let families = metrics.gather();
        let started = family(&families, "hauler_jobs_started_total");
        assert_eq!(started.get_metric().len(), 2);
    }

    #[test]
    fn completion_feeds_counter_and_histogram() {
        let metrics = PrometheusMetrics::new().unwrap();

        metrics.record_job_completed(JobKind::BundleStats, JobOutcome::Success, 1_500);
        metrics.record_job_completed(JobKind::BundleStats, JobOutcome::Terminated, 3_000);

        let families = metrics.gather();
        assert_eq!(
            family(&families, "hauler_jobs_completed_total")
                .get_metric()
                .len(),
            2
        );
        assert_eq!(
            family(&families, "hauler_job_duration_seconds")
                .get_metric()
                .len(),
            1
        );
    }

    #[test]
    fn push_failures_and_drops_are_counted() {
        let metrics = PrometheusMetrics::new().unwrap();

        metrics.record_push_failed(JobKind::PackageAnalysis);
        metrics.record_push_failed(JobKind::PackageAnalysis);
        metrics.record_push_failed(JobKind::PackageAnalysis);
        metrics.record_update_dropped(JobKind::PackageAnalysis);

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("hauler_push_failures_total{kind=\"packageAnalysis\"} 3"));
        assert!(text.contains("hauler_updates_dropped_total{kind=\"packageAnalysis\"} 1"));
    }

    #[test]
    fn shared_registry_is_used() {
        let registry = Arc::new(Registry::new());
        let metrics = PrometheusMetrics::new_with_registry(registry.clone()).unwrap();

        metrics.record_job_started(JobKind::Command);
        assert!(!registry.gather().is_empty());
    }

    #[test]
    fn double_registration_fails() {
        let registry = Arc::new(Registry::new());
        PrometheusMetrics::new_with_registry(registry.clone()).unwrap();
        assert!(PrometheusMetrics::new_with_registry(registry).is_err());
    }
}
