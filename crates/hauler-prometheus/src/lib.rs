//! Prometheus metrics backend for hauler job execution.
//!
//! [`PrometheusMetrics`] implements [`hauler_core::MetricsBackend`]; hand it to an executor with
//! `Executor::with_metrics`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use hauler_core::{JobOutcome, MetricsBackend, MetricsHandle};
//! use hauler_model::JobKind;
//! use hauler_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let handle: MetricsHandle = Arc::new(metrics.clone());
//!
//! handle.record_job_completed(JobKind::Command, JobOutcome::Success, 1_250);
//! assert!(metrics.encode_text()?.contains("hauler_jobs_completed_total"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `hauler_jobs_started_total{kind}` - Counter
//! - `hauler_jobs_completed_total{kind, outcome}` - Counter
//! - `hauler_job_duration_seconds{kind}` - Histogram
//! - `hauler_push_failures_total{kind}` - Counter
//! - `hauler_updates_dropped_total{kind}` - Counter
//!
//! No HTTP endpoint is provided; the agent writes [`PrometheusMetrics::encode_text`] to a file.
mod backend;
pub use backend::PrometheusMetrics;
