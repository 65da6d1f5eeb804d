use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU32, Ordering},
};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use hauler_core::{JobOutcome, MetricsBackend};
use hauler_model::{JobKind, StatusPayload};

use super::*;
use crate::channel::WorkerLease;

/// What the fake worker does.
#[derive(Clone)]
struct Script {
    alive: bool,
    logs: usize,
    /// Sent with `end` right after the `start` ack.
    finish: Option<StatusPayload>,
    ack_raise: bool,
    /// Exit with this code right after the `start` ack.
    crash: Option<i32>,
}

impl Script {
    fn hanging() -> Self {
        Self {
            alive: true,
            logs: 0,
            finish: None,
            ack_raise: true,
            crash: None,
        }
    }

    fn finishing(logs: usize, status: StatusPayload) -> Self {
        Self {
            logs,
            finish: Some(status),
            ..Self::hanging()
        }
    }
}

struct FakeSpawner {
    script: Script,
    seen: Arc<Mutex<Vec<SupervisorMessage>>>,
    killed: Arc<AtomicBool>,
}

impl FakeSpawner {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            seen: Arc::default(),
            killed: Arc::default(),
        })
    }

    fn raises(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter_map(|m| match m {
                SupervisorMessage::Raise(reason) => Some(reason.clone()),
                _ => None,
            })
            .collect()
    }
}

impl WorkerSpawner for FakeSpawner {
    fn spawn(&self, _job: &JobDescription) -> Result<WorkerChannel, ExecError> {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<SupervisorMessage>();
        let (sig_tx, sig_rx) = mpsc::unbounded_channel();
        let (lease, mut kill_rx) = WorkerLease::pair();
        let script = self.script.clone();
        let seen = Arc::clone(&self.seen);
        let killed = Arc::clone(&self.killed);

        tokio::spawn(async move {
            let send = |msg: WorkerMessage| {
                let _ = sig_tx.send(WorkerSignal::Message(msg));
            };
            if script.alive {
                send(WorkerMessage::Alive);
            }
            loop {
                tokio::select! {
                    biased;
                    res = &mut kill_rx => {
                        if res.is_ok() {
                            killed.store(true, Ordering::SeqCst);
                        }
                        let _ = sig_tx.send(WorkerSignal::Exited { code: None });
                        return;
                    }
                    msg = out_rx.recv() => {
                        let Some(msg) = msg else { return };
                        seen.lock().unwrap().push(msg.clone());
                        match msg {
                            SupervisorMessage::Start(_) => {
                                send(WorkerMessage::Started);
                                for i in 0..script.logs {
                                    send(WorkerMessage::Log(LogEntry::now(
                                        LogLevel::Info,
                                        format!("line {i}"),
                                    )));
                                }
                                if let Some(code) = script.crash {
                                    let _ = sig_tx.send(WorkerSignal::Exited { code: Some(code) });
                                    return;
                                }
                                if let Some(status) = script.finish.clone() {
                                    send(WorkerMessage::Event(status));
                                    send(WorkerMessage::Ended);
                                }
                            }
                            SupervisorMessage::Raise(reason) => {
                                if script.ack_raise {
                                    send(WorkerMessage::Event(StatusPayload::failed(reason)));
                                    send(WorkerMessage::Raised);
                                }
                            }
                            SupervisorMessage::Shutdown => {
                                let _ = sig_tx.send(WorkerSignal::Exited { code: Some(0) });
                                return;
                            }
                        }
                    }
                }
            }
        });

        Ok(WorkerChannel {
            outbound: out_tx,
            inbound: sig_rx,
            lease,
        })
    }
}

struct FailingSpawner;

impl WorkerSpawner for FailingSpawner {
    fn spawn(&self, _job: &JobDescription) -> Result<WorkerChannel, ExecError> {
        Err(ExecError::SpawnFailed("no such file or directory".into()))
    }
}

#[derive(Default)]
struct RecordingCoordinator {
    batches: Mutex<Vec<UpdateBatch>>,
    always_fail: bool,
}

impl RecordingCoordinator {
    fn batches(&self) -> Vec<UpdateBatch> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Coordinator for RecordingCoordinator {
    async fn push(&self, batch: &UpdateBatch) -> Result<(), PushError> {
        self.batches.lock().unwrap().push(batch.clone());
        if self.always_fail {
            return Err(PushError::Transport("connection refused".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct CountingMetrics {
    started: AtomicU32,
    completed: Mutex<Vec<JobOutcome>>,
    push_failed: AtomicU32,
    dropped: AtomicU32,
}

impl MetricsBackend for CountingMetrics {
    fn record_job_started(&self, _kind: JobKind) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn record_job_completed(&self, _kind: JobKind, outcome: JobOutcome, _duration_ms: u64) {
        self.completed.lock().unwrap().push(outcome);
    }
    fn record_push_failed(&self, _kind: JobKind) {
        self.push_failed.fetch_add(1, Ordering::SeqCst);
    }
    fn record_update_dropped(&self, _kind: JobKind) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

fn job(timeout_seconds: u64) -> JobDescription {
    JobDescription::new(42, JobKind::PackageAnalysis, json!({"package": "left-pad"}))
        .with_timeout_seconds(timeout_seconds)
}

fn config() -> Arc<RunnerConfig> {
    let mut cfg = RunnerConfig::default();
    cfg.server.url = "http://coordinator.test".into();
    cfg.server.token = "token".into();
    Arc::new(cfg)
}

fn drain(events: &mut EventStream) -> Vec<ExecutorEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = events.try_recv() {
        out.push(ev);
    }
    out
}

fn ends(events: &[ExecutorEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ExecutorEvent::End { .. }))
        .count()
}

#[tokio::test(start_paused = true)]
async fn completed_job_pushes_logs_with_status_then_done() {
    let spawner = FakeSpawner::new(Script::finishing(5, StatusPayload::succeeded(json!({"ok": true}))));
    let coordinator = Arc::new(RecordingCoordinator::default());
    let metrics = Arc::new(CountingMetrics::default());

    let (executor, mut events) = Executor::new(job(600), config(), spawner.clone(), coordinator.clone());
    let summary = executor.with_metrics(metrics.clone()).run().await;

    assert_eq!(
        drain(&mut events),
        vec![ExecutorEvent::Start, ExecutorEvent::End { termination: None }]
    );
    assert_eq!(summary.outcome, JobOutcome::Success);
    assert_eq!(summary.logs_pushed, 5);

    let batches = coordinator.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].trace.len(), 5);
    assert_eq!(
        batches[0].update.job_updates,
        Some(StatusPayload::succeeded(json!({"ok": true})))
    );
    let messages: Vec<_> = batches[0].trace.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(messages, vec!["line 0", "line 1", "line 2", "line 3", "line 4"]);
    assert!(batches[1].is_done());
    assert!(batches[1].trace.is_empty());
    assert_eq!(batches[1].update.failure_reason, None);

    assert!(matches!(
        spawner.seen.lock().unwrap().first(),
        Some(SupervisorMessage::Start(StartPayload { job, .. })) if job.job_id == 42
    ));
    assert_eq!(metrics.started.load(Ordering::SeqCst), 1);
    assert_eq!(*metrics.completed.lock().unwrap(), vec![JobOutcome::Success]);
}

#[tokio::test(start_paused = true)]
async fn failed_status_is_a_failure_outcome_not_an_error() {
    let spawner = FakeSpawner::new(Script::finishing(0, StatusPayload::failed("lint errors")));
    let coordinator = Arc::new(RecordingCoordinator::default());

    let (executor, mut events) = Executor::new(job(600), config(), spawner, coordinator);
    let summary = executor.run().await;

    assert_eq!(summary.outcome, JobOutcome::Failure);
    assert_eq!(summary.error, None);
    assert!(
        !drain(&mut events)
            .iter()
            .any(|e| matches!(e, ExecutorEvent::Error(_)))
    );
}

#[tokio::test(start_paused = true)]
async fn timeout_raises_worker_with_reason() {
    let spawner = FakeSpawner::new(Script::hanging());
    let coordinator = Arc::new(RecordingCoordinator::default());

    let (executor, mut events) = Executor::new(job(3), config(), spawner.clone(), coordinator.clone());
    let begin = Instant::now();
    let running = executor.start();

    tokio::time::sleep(Duration::from_millis(2_900)).await;
    assert!(spawner.raises().is_empty());

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(spawner.raises(), vec!["Timeout after 3 seconds.".to_string()]);

    let seen = drain(&mut events);
    assert_eq!(ends(&seen), 1);
    assert!(seen.contains(&ExecutorEvent::End {
        termination: Some("Timeout after 3 seconds.".into())
    }));
    assert!(!seen.iter().any(|e| matches!(e, ExecutorEvent::Error(_))));

    let summary = running.await.unwrap();
    assert_eq!(summary.outcome, JobOutcome::Terminated);
    assert_eq!(summary.termination.as_deref(), Some("Timeout after 3 seconds."));
    assert!(summary.duration >= Duration::from_secs(3));
    assert!(begin.elapsed() >= Duration::from_secs(3));

    let statuses: Vec<_> = coordinator
        .batches()
        .into_iter()
        .filter_map(|b| b.update.job_updates)
        .collect();
    assert_eq!(statuses, vec![StatusPayload::failed("Timeout after 3 seconds.")]);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn terminate_clears_timeout_and_is_idempotent() {
    let spawner = FakeSpawner::new(Script::hanging());
    let coordinator = Arc::new(RecordingCoordinator::default());

    let (executor, mut events) = Executor::new(job(3), config(), spawner.clone(), coordinator);
    let handle = executor.handle();
    let running = executor.start();

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert!(handle.terminate("canceled"));
    handle.terminate("canceled again");
    tokio::time::sleep(Duration::from_millis(5_000)).await;

    assert_eq!(spawner.raises(), vec!["canceled".to_string()]);
    let summary = running.await.unwrap();
    assert_eq!(summary.termination.as_deref(), Some("canceled"));

    let seen = drain(&mut events);
    assert_eq!(
        seen,
        vec![
            ExecutorEvent::Start,
            ExecutorEvent::End {
                termination: Some("canceled".into())
            }
        ]
    );
    assert!(!handle.terminate("late"));
}

#[tokio::test(start_paused = true)]
async fn immediate_terminate_ends_once_without_error() {
    let spawner = FakeSpawner::new(Script::hanging());
    let coordinator = Arc::new(RecordingCoordinator::default());

    let (executor, mut events) = Executor::new(job(3), config(), spawner, coordinator.clone());
    executor.handle().terminate("canceled");
    let summary = executor.run().await;

    let seen = drain(&mut events);
    assert_eq!(ends(&seen), 1);
    assert!(!seen.iter().any(|e| matches!(e, ExecutorEvent::Error(_))));
    assert_eq!(summary.outcome, JobOutcome::Terminated);
    assert!(coordinator.batches().last().unwrap().is_done());
}

#[tokio::test(start_paused = true)]
async fn terminate_before_alive_finalizes_immediately() {
    let spawner = FakeSpawner::new(Script {
        alive: false,
        ..Script::hanging()
    });
    let coordinator = Arc::new(RecordingCoordinator::default());

    let (executor, mut events) = Executor::new(job(3), config(), spawner.clone(), coordinator.clone());
    let handle = executor.handle();
    let running = executor.start();
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.terminate("canceled");
    let summary = running.await.unwrap();

    assert_eq!(
        drain(&mut events),
        vec![ExecutorEvent::End {
            termination: Some("canceled".into())
        }]
    );
    assert!(spawner.raises().is_empty());
    assert_eq!(summary.outcome, JobOutcome::Terminated);
    let done = coordinator.batches().pop().unwrap();
    assert_eq!(done.update.failure_reason.as_deref(), Some("canceled"));
}

#[tokio::test(start_paused = true)]
async fn spawn_failure_emits_error_and_end_only() {
    let coordinator = Arc::new(RecordingCoordinator::default());
    let metrics = Arc::new(CountingMetrics::default());

    let (executor, mut events) =
        Executor::new(job(3), config(), Arc::new(FailingSpawner), coordinator.clone());
    let summary = executor.with_metrics(metrics.clone()).run().await;

    let seen = drain(&mut events);
    assert_eq!(seen.len(), 2);
    assert!(matches!(seen[0], ExecutorEvent::Error(ExecError::SpawnFailed(_))));
    assert_eq!(seen[1], ExecutorEvent::End { termination: None });
    assert_eq!(summary.outcome, JobOutcome::Failure);
    assert_eq!(metrics.started.load(Ordering::SeqCst), 0);

    let batches = coordinator.batches();
    assert_eq!(batches.len(), 1);
    assert!(batches[0].is_done());
    assert!(
        batches[0]
            .update
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("no such file")
    );
    assert_eq!(batches[0].trace.len(), 1);
    assert_eq!(batches[0].trace[0].level, LogLevel::Error);
}

#[tokio::test(start_paused = true)]
async fn worker_exit_without_end_is_a_crash() {
    let spawner = FakeSpawner::new(Script {
        logs: 2,
        crash: Some(137),
        ..Script::hanging()
    });
    let coordinator = Arc::new(RecordingCoordinator::default());

    let (executor, mut events) = Executor::new(job(600), config(), spawner, coordinator.clone());
    let summary = executor.run().await;

    let seen = drain(&mut events);
    assert_eq!(seen[0], ExecutorEvent::Start);
    assert!(matches!(&seen[1], ExecutorEvent::Error(ExecError::WorkerCrashed(m)) if m.contains("137")));
    assert_eq!(seen[2], ExecutorEvent::End { termination: None });
    assert_eq!(summary.outcome, JobOutcome::Crashed);

    let done = coordinator.batches().pop().unwrap();
    assert!(done.is_done());
    assert!(done.update.failure_reason.is_some());
    // The two worker logs plus the crash report, in arrival order.
    assert_eq!(summary.logs_pushed, 3);
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_raise_is_killed_after_grace() {
    let spawner = FakeSpawner::new(Script {
        ack_raise: false,
        ..Script::hanging()
    });
    let coordinator = Arc::new(RecordingCoordinator::default());

    let (executor, mut events) = Executor::new(job(3), config(), spawner.clone(), coordinator.clone());
    let begin = Instant::now();
    let summary = executor.run().await;

    assert!(spawner.killed.load(Ordering::SeqCst));
    assert!(begin.elapsed() >= Duration::from_secs(13));
    assert_eq!(summary.outcome, JobOutcome::Terminated);
    assert_eq!(summary.error, None);

    let seen = drain(&mut events);
    assert_eq!(ends(&seen), 1);
    assert!(!seen.iter().any(|e| matches!(e, ExecutorEvent::Error(_))));

    let done = coordinator.batches().pop().unwrap();
    assert!(done.is_done());
    assert_eq!(done.trace.last().unwrap().level, LogLevel::Warn);
}

#[tokio::test(start_paused = true)]
async fn unreachable_coordinator_drops_updates_and_still_finishes() {
    let spawner = FakeSpawner::new(Script::finishing(1, StatusPayload::succeeded(Value::Null)));
    let coordinator = Arc::new(RecordingCoordinator {
        always_fail: true,
        ..Default::default()
    });
    let metrics = Arc::new(CountingMetrics::default());

    let (executor, _events) = Executor::new(job(600), config(), spawner, coordinator.clone());
    let summary = executor
        .with_metrics(metrics.clone())
        .with_tick_interval(Duration::from_millis(500))
        .run()
        .await;

    // Status update and done update, three attempts each.
    assert_eq!(coordinator.batches().len(), 6);
    assert_eq!(summary.updates_dropped, 2);
    assert_eq!(summary.logs_pushed, 0);
    assert_eq!(metrics.push_failed.load(Ordering::SeqCst), 6);
    assert_eq!(metrics.dropped.load(Ordering::SeqCst), 2);
}
