//! `hauler-agentd <job.json>` runs one job; `hauler-agentd worker` is the worker process it spawns.
mod agent;
mod coordinator;

use std::process::ExitCode;

use anyhow::Context;
use tracing::{debug, warn};

use hauler_core::config::{ConfigHandle, config_path};
use hauler_exec::{WORKER_ARG, builtin_registry, run_worker};
use hauler_observe::init_logger;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some(WORKER_ARG) => worker().await.map(|_| ExitCode::SUCCESS),
        Some(job_path) => agent::run(job_path).await,
        None => {
            eprintln!("usage: hauler-agentd <job.json> | hauler-agentd {WORKER_ARG}");
            Ok(ExitCode::from(2))
        }
    }
}

/// Worker mode: stdout carries the protocol, so logs go to stderr.
async fn worker() -> anyhow::Result<()> {
    let log = match ConfigHandle::load(config_path()) {
        Ok(handle) => handle.snapshot().log.clone(),
        Err(e) => {
            eprintln!("worker: {e}; using default logging");
            Default::default()
        }
    };
    init_logger(&log.to_stderr())?;
    debug!(pid = std::process::id(), "worker process up");

    let registry = builtin_registry();
    if let Err(e) = run_worker(&registry, tokio::io::stdin(), tokio::io::stdout()).await {
        warn!(error = %e, "worker loop aborted");
        return Err(e).context("worker loop");
    }
    Ok(())
}
