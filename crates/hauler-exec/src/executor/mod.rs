//! Supervisor state machine for one job.
//!
//! An [`Executor`] owns exactly one worker process. Everything it reacts to (worker signals,
//! pipeline ticks, the job timeout, the hard-kill deadline, terminate commands and the single
//! in-flight push) is multiplexed in one `select!` loop, so all state is mutated from one task.
//!
//! ```text
//! Idle -> Spawning -(alive)-> Handshaking -(start ack)-> Running -(raise)-> Ending -> Ended
//! ```
mod event;
pub use event::{EventStream, ExecutionSummary, ExecutorEvent};

mod handle;
use handle::ExecutorCommand;
pub use handle::ExecutorHandle;

mod state;
pub(crate) use state::Finish;
pub use state::ExecutorState;

#[cfg(test)]
mod tests;

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use hauler_core::{
    MetricsHandle,
    config::RunnerConfig,
    coordinator::{Coordinator, PushError},
    noop_metrics,
    pipeline::{PushOutcome, TICK_INTERVAL, UpdatePipeline},
};
use hauler_model::{
    JobDescription, JobId, JobStatus, LogEntry, LogLevel, PendingUpdate, StartPayload,
    SupervisorMessage, UpdateBatch, WorkerMessage,
};

use crate::{
    ExecError,
    channel::{WorkerChannel, WorkerSignal, WorkerSpawner},
    metrics::job_outcome,
};

/// How long a finalized worker may take to exit after `shutdown` before it is killed.
const RELEASE_GRACE: Duration = Duration::from_secs(5);

type PushFuture = Pin<Box<dyn Future<Output = (UpdateBatch, Result<(), PushError>)> + Send>>;

/// Runs one job in a worker process and relays its progress to a coordinator.
pub struct Executor {
    job: Arc<JobDescription>,
    config: Arc<RunnerConfig>,
    spawner: Arc<dyn WorkerSpawner>,
    coordinator: Arc<dyn Coordinator>,
    metrics: MetricsHandle,
    tick_interval: Duration,
    events: mpsc::UnboundedSender<ExecutorEvent>,
    commands_tx: mpsc::UnboundedSender<ExecutorCommand>,
    commands: mpsc::UnboundedReceiver<ExecutorCommand>,

    state: ExecutorState,
    pipeline: UpdatePipeline,
    worker: Option<WorkerChannel>,
    push: Option<PushFuture>,
    spawned_at: Option<Instant>,
    started_at: Option<Instant>,
    timeout_at: Option<Instant>,
    kill_at: Option<Instant>,
    /// Raise requested during the handshake, sent once `start` is acknowledged.
    pending_raise: Option<String>,
    termination: Option<String>,
    last_status: Option<JobStatus>,
    finish: Option<Finish>,
    duration: Duration,
    updates_dropped: u32,
}

impl Executor {
    pub fn new(
        job: JobDescription,
        config: Arc<RunnerConfig>,
        spawner: Arc<dyn WorkerSpawner>,
        coordinator: Arc<dyn Coordinator>,
    ) -> (Self, EventStream) {
        let (events, stream) = mpsc::unbounded_channel();
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let executor = Self {
            job: Arc::new(job),
            config,
            spawner,
            coordinator,
            metrics: noop_metrics(),
            tick_interval: TICK_INTERVAL,
            events,
            commands_tx,
            commands,
            state: ExecutorState::Idle,
            pipeline: UpdatePipeline::new(),
            worker: None,
            push: None,
            spawned_at: None,
            started_at: None,
            timeout_at: None,
            kill_at: None,
            pending_raise: None,
            termination: None,
            last_status: None,
            finish: None,
            duration: Duration::ZERO,
            updates_dropped: 0,
        };
        (executor, stream)
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Override the pipeline tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn handle(&self) -> ExecutorHandle {
        ExecutorHandle {
            commands: self.commands_tx.clone(),
        }
    }

    pub fn job(&self) -> &JobDescription {
        &self.job
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Run the executor on the current tokio runtime.
    pub fn start(self) -> JoinHandle<ExecutionSummary> {
        tokio::spawn(self.run())
    }

    /// Supervise the job until it has ended and every update has been pushed or dropped.
    pub async fn run(mut self) -> ExecutionSummary {
        self.spawn_worker();

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.is_finished() {
            tokio::select! {
                signal = next_signal(&mut self.worker) => self.on_signal(signal),
                Some(cmd) = self.commands.recv() => self.on_command(cmd),
                _ = sleep_until(self.timeout_at) => self.on_timeout(),
                _ = sleep_until(self.kill_at) => self.on_kill_deadline(),
                _ = ticker.tick() => self.on_tick(),
                (batch, result) = next_push(&mut self.push) => self.on_pushed(batch, result),
            }
        }

        debug!(job = self.job.job_id, "executor finished");
        self.summary()
    }

    fn is_finished(&self) -> bool {
        self.finish.is_some()
            && self.push.is_none()
            && (self.pipeline.is_stopped() || self.pipeline.is_idle())
    }

    fn spawn_worker(&mut self) {
        self.state = ExecutorState::Spawning;
        self.spawned_at = Some(Instant::now());

        match self.spawner.spawn(&self.job) {
            Ok(worker) => {
                debug!(job = self.job.job_id, "worker spawned");
                self.worker = Some(worker);
            }
            Err(e) => {
                error!(job = self.job.job_id, error = %e, "worker spawn failed");
                let e = match e {
                    ExecError::SpawnFailed(_) => e,
                    other => ExecError::SpawnFailed(other.to_string()),
                };
                self.finalize(Finish::SpawnFailed(e));
            }
        }
    }

    fn on_signal(&mut self, signal: Option<WorkerSignal>) {
        match signal {
            Some(WorkerSignal::Message(msg)) => self.on_message(msg),
            Some(WorkerSignal::Protocol(e)) => {
                warn!(job = self.job.job_id, error = %e, "ignoring undecodable worker output");
            }
            Some(WorkerSignal::Exited { code }) => {
                let how = match code {
                    Some(code) => format!("exit code {code}"),
                    None => "a signal".to_string(),
                };
                self.on_worker_gone(format!("worker exited with {how}"));
            }
            None => self.on_worker_gone("worker channel closed".to_string()),
        }
    }

    fn on_message(&mut self, msg: WorkerMessage) {
        match (self.state, msg) {
            (ExecutorState::Spawning, WorkerMessage::Alive) => {
                debug!(job = self.job.job_id, "worker alive; sending start");
                self.state = ExecutorState::Handshaking;
                self.send(SupervisorMessage::Start(StartPayload {
                    job: (*self.job).clone(),
                    server: self.config.server.clone(),
                }));
            }
            (ExecutorState::Handshaking, WorkerMessage::Started) => self.on_started(),
            (_, WorkerMessage::Log(entry)) => self.pipeline.append_log(entry),
            (_, WorkerMessage::Event(payload)) => {
                debug!(job = self.job.job_id, status = ?payload.status, "job status");
                self.last_status = Some(payload.status);
                self.pipeline.enqueue_status(payload);
            }
            (_, WorkerMessage::Raised) => self.finalize(Finish::Raised),
            (_, WorkerMessage::Ended) => self.finalize(Finish::Completed),
            (state, msg) => warn!(
                job = self.job.job_id,
                %state,
                msg = msg.name(),
                "unexpected worker message"
            ),
        }
    }

    fn on_started(&mut self) {
        let now = Instant::now();
        self.started_at = Some(now);
        self.state = ExecutorState::Running;
        info!(job = self.job.job_id, kind = %self.job.job_kind, "job started");
        self.metrics.record_job_started(self.job.job_kind);
        self.emit(ExecutorEvent::Start);

        match self.pending_raise.take() {
            Some(reason) => self.send_raise(reason),
            None => self.timeout_at = Some(now + self.config.timeout_for(&self.job)),
        }
    }

    fn on_worker_gone(&mut self, reason: String) {
        if self.finish.is_some() {
            return;
        }
        error!(job = self.job.job_id, state = %self.state, %reason, "worker crashed");
        let err = ExecError::WorkerCrashed(format!("{reason} while {}", self.state));
        self.finalize(Finish::Crashed(err));
    }

    fn on_command(&mut self, cmd: ExecutorCommand) {
        match cmd {
            ExecutorCommand::Terminate(reason) => self.terminate(reason),
        }
    }

    fn terminate(&mut self, reason: String) {
        if self.finish.is_some() || self.termination.is_some() {
            debug!(job = self.job.job_id, %reason, "terminate ignored");
            return;
        }
        info!(job = self.job.job_id, state = %self.state, %reason, "terminating job");
        self.termination = Some(reason.clone());
        self.timeout_at = None;

        match self.state {
            ExecutorState::Idle | ExecutorState::Spawning => self.finalize(Finish::Terminated),
            ExecutorState::Handshaking => self.pending_raise = Some(reason),
            ExecutorState::Running => self.send_raise(reason),
            ExecutorState::Ending | ExecutorState::Ended => {}
        }
    }

    fn send_raise(&mut self, reason: String) {
        self.send(SupervisorMessage::Raise(reason));
        self.state = ExecutorState::Ending;
        self.kill_at = Some(Instant::now() + self.config.terminate_grace());
    }

    fn on_timeout(&mut self) {
        self.timeout_at = None;
        let secs = self.config.timeout_seconds_for(&self.job);
        self.terminate(format!("Timeout after {secs} seconds."));
    }

    fn on_kill_deadline(&mut self) {
        self.kill_at = None;
        warn!(
            job = self.job.job_id,
            grace_secs = self.config.runner.terminate_grace_seconds,
            "worker did not acknowledge raise; killing"
        );
        if let Some(worker) = self.worker.as_mut() {
            worker.lease.kill();
        }
        self.finalize(Finish::Killed);
    }

    fn on_tick(&mut self) {
        if self.push.is_some() {
            return;
        }
        if let Some(batch) = self.pipeline.next_batch() {
            let coordinator = Arc::clone(&self.coordinator);
            self.push = Some(Box::pin(async move {
                let result = coordinator.push(&batch).await;
                (batch, result)
            }));
        }
    }

    fn on_pushed(&mut self, batch: UpdateBatch, result: Result<(), PushError>) {
        self.push = None;
        if let Err(e) = &result {
            debug!(job = self.job.job_id, error = %e, "push failed");
            self.metrics.record_push_failed(self.job.job_kind);
        }
        if self.pipeline.complete(batch, result) == PushOutcome::Dropped {
            self.updates_dropped += 1;
            self.metrics.record_update_dropped(self.job.job_kind);
        }
    }

    /// Move to `Ended`. Runs at most once; later calls are ignored.
    fn finalize(&mut self, finish: Finish) {
        if self.finish.is_some() {
            return;
        }
        let now = Instant::now();
        let since = self.started_at.or(self.spawned_at).unwrap_or(now);
        self.duration = now.saturating_duration_since(since);
        let duration_ms = event::duration_millis(self.duration);

        self.state = ExecutorState::Ended;
        self.timeout_at = None;
        self.kill_at = None;
        self.pending_raise = None;
        if let Some(worker) = self.worker.take() {
            release(self.job.job_id, worker);
        }

        let failure_reason = match &finish {
            Finish::SpawnFailed(e) | Finish::Crashed(e) => Some(e.to_string()),
            Finish::Terminated | Finish::Killed => self.termination.clone(),
            Finish::Completed | Finish::Raised => None,
        };
        // Queued before the closing log line so that line travels with the final update.
        self.pipeline
            .enqueue(PendingUpdate::done(duration_ms, failure_reason));
        if finish == Finish::Killed {
            self.pipeline.append_log(LogEntry::now(
                LogLevel::Warn,
                format!(
                    "Worker did not acknowledge termination within {} seconds and was killed.",
                    self.config.runner.terminate_grace_seconds
                ),
            ));
        }
        if let Some(e) = finish.error() {
            self.pipeline
                .append_log(LogEntry::now(LogLevel::Error, e.to_string()));
            self.emit(ExecutorEvent::Error(e.clone()));
        }

        let outcome = job_outcome(&finish, self.last_status);
        self.metrics
            .record_job_completed(self.job.job_kind, outcome, duration_ms);
        info!(
            job = self.job.job_id,
            kind = %self.job.job_kind,
            outcome = outcome.as_label(),
            duration_ms,
            termination = ?self.termination,
            "job ended"
        );
        self.emit(ExecutorEvent::End {
            termination: self.termination.clone(),
        });
        self.finish = Some(finish);
    }

    fn send(&self, msg: SupervisorMessage) {
        if let Some(worker) = &self.worker {
            if worker.outbound.send(msg).is_err() {
                debug!(job = self.job.job_id, "worker input closed");
            }
        }
    }

    fn emit(&self, event: ExecutorEvent) {
        let _ = self.events.send(event);
    }

    fn summary(&self) -> ExecutionSummary {
        let outcome = match &self.finish {
            Some(finish) => job_outcome(finish, self.last_status),
            None => hauler_core::JobOutcome::Crashed,
        };
        ExecutionSummary {
            outcome,
            termination: self.termination.clone(),
            error: self.finish.as_ref().and_then(|f| f.error().cloned()),
            duration: self.duration,
            logs_pushed: self.pipeline.last_pushed_log_index(),
            updates_dropped: self.updates_dropped,
        }
    }
}

/// Ask the worker to exit and kill it if it is still around after [`RELEASE_GRACE`].
fn release(job_id: JobId, mut worker: WorkerChannel) {
    let _ = worker.outbound.send(SupervisorMessage::Shutdown);
    tokio::spawn(async move {
        let exited = tokio::time::timeout(RELEASE_GRACE, async {
            while let Some(signal) = worker.inbound.recv().await {
                if matches!(signal, WorkerSignal::Exited { .. }) {
                    break;
                }
            }
        })
        .await;
        if exited.is_err() {
            debug!(job = job_id, "worker still running after shutdown; killing");
        }
        worker.lease.kill();
    });
}

async fn next_signal(worker: &mut Option<WorkerChannel>) -> Option<WorkerSignal> {
    match worker {
        Some(worker) => worker.inbound.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_push(push: &mut Option<PushFuture>) -> (UpdateBatch, Result<(), PushError>) {
    match push {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
