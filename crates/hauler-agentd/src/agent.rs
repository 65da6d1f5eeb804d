//! Agent mode: run one job from a JSON file against the configured coordinator.
use std::{process::ExitCode, sync::Arc};

use anyhow::{Context, bail};
use tracing::{error, info, warn};

use hauler_core::{
    JobOutcome, MetricsHandle,
    config::{ConfigHandle, config_path},
};
use hauler_exec::{Executor, ExecutorEvent, ProcessSpawner};
use hauler_model::JobDescription;
use hauler_observe::init_logger;
use hauler_prometheus::PrometheusMetrics;

use crate::coordinator::HttpCoordinator;

/// When set, the Prometheus text exposition is written here after the job.
const METRICS_FILE_ENV: &str = "HAULER_METRICS_FILE";

pub async fn run(job_path: &str) -> anyhow::Result<ExitCode> {
    let handle = ConfigHandle::load(config_path()).context("loading runner config")?;
    let config = handle.snapshot();
    init_logger(&config.log)?;
    info!(config = %handle.path().display(), runner = %config.runner.name, "agent starting");

    let report = handle.validate();
    if !report.ok {
        bail!("invalid runner config {}: {report}", handle.path().display());
    }

    let text = tokio::fs::read_to_string(job_path)
        .await
        .with_context(|| format!("reading job file {job_path}"))?;
    let job: JobDescription =
        serde_json::from_str(&text).with_context(|| format!("parsing job file {job_path}"))?;
    if !config.accepts(job.job_kind) {
        bail!("job kind {} is not accepted by this runner", job.job_kind);
    }

    let metrics = PrometheusMetrics::new()?;
    let coordinator = HttpCoordinator::new(&config.server, job.job_id)?;
    let spawner = ProcessSpawner::current_exe()?;

    let (executor, mut events) = Executor::new(
        job,
        Arc::clone(&config),
        Arc::new(spawner),
        Arc::new(coordinator),
    );
    let executor = executor.with_metrics(Arc::new(metrics.clone()) as MetricsHandle);
    let control = executor.handle();
    let mut running = executor.start();

    let summary = loop {
        tokio::select! {
            summary = &mut running => break summary.context("executor task failed")?,
            Some(event) = events.recv() => match event {
                ExecutorEvent::Start => info!("job running"),
                ExecutorEvent::Error(e) => error!(error = %e, "job error"),
                ExecutorEvent::End { termination } => info!(?termination, "job ended"),
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupt received; terminating job");
                control.terminate("Terminated by runner shutdown.");
            }
        }
    };

    info!(
        outcome = summary.outcome.as_label(),
        duration_ms = summary.duration_millis(),
        logs_pushed = summary.logs_pushed,
        updates_dropped = summary.updates_dropped,
        "agent finished"
    );

    if let Some(path) = std::env::var_os(METRICS_FILE_ENV) {
        let text = metrics.encode_text()?;
        tokio::fs::write(&path, text)
            .await
            .with_context(|| format!("writing metrics to {}", path.to_string_lossy()))?;
    }

    Ok(match summary.outcome {
        JobOutcome::Success => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}
