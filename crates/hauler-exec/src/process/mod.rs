//! Worker processes backed by `tokio::process`.
mod stderr;
pub use stderr::StderrLogConfig;
pub(crate) use stderr::{read_line_lossy, truncate_line};

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use tokio::{
    process::{Child, Command},
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, trace, warn};

use hauler_model::{JobDescription, JobId};

use crate::{
    ExecError,
    channel::{IoPumps, WorkerChannel, WorkerLease, WorkerSignal, WorkerSpawner},
};

/// Argument selecting worker mode in the agent binary.
pub const WORKER_ARG: &str = "worker";

/// How long stdout may stay open after the process exited (inherited by grandchildren).
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Spawns one OS process per job speaking the line protocol on stdin/stdout.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    program: PathBuf,
    args: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
    stderr: StderrLogConfig,
}

impl ProcessSpawner {
    /// Run `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stderr: StderrLogConfig::default(),
        }
    }

    /// Re-run the current executable in worker mode.
    pub fn current_exe() -> Result<Self, ExecError> {
        let exe = std::env::current_exe()
            .map_err(|e| ExecError::Internal(format!("cannot resolve current executable: {e}")))?;
        Ok(Self::new(exe).arg(WORKER_ARG))
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_stderr_config(mut self, cfg: StderrLogConfig) -> Self {
        self.stderr = cfg;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl WorkerSpawner for ProcessSpawner {
    fn spawn(&self, job: &JobDescription) -> Result<WorkerChannel, ExecError> {
        let job_id = job.job_id;
        trace!(
            job = job_id,
            program = %self.program.display(),
            args = ?self.args,
            "spawning worker process"
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (k, v) in &self.env {
            cmd.env(k, v);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ExecError::SpawnFailed(format!("{}: {e}", self.program.display())))?;

        let missing = |pipe: &str| ExecError::SpawnFailed(format!("worker {pipe} not captured"));
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        debug!(job = job_id, pid = ?child.id(), "worker process started");

        let pumps = IoPumps::start(job_id, stdout, stdin);
        tokio::spawn(stderr::relay_stderr(job_id, stderr, self.stderr));

        let (lease, kill_rx) = WorkerLease::pair();
        tokio::spawn(watch_child(job_id, child, kill_rx, pumps.reader, pumps.signals));

        Ok(WorkerChannel {
            outbound: pumps.outbound,
            inbound: pumps.inbound,
            lease,
        })
    }
}

/// Wait for the child to exit or for a kill request, then report the exit.
///
/// The exit is reported only after the stdout reader has drained, so every message the
/// worker wrote before exiting is seen first.
async fn watch_child(
    job_id: JobId,
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    reader: JoinHandle<()>,
    signals: mpsc::UnboundedSender<WorkerSignal>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill_rx => {
            debug!(job = job_id, "killing worker process");
            if let Err(e) = child.kill().await {
                warn!(job = job_id, error = %e, "failed to kill worker process");
            }
            child.wait().await
        }
    };

    let code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(job = job_id, error = %e, "failed to wait for worker process");
            None
        }
    };
    if tokio::time::timeout(DRAIN_GRACE, reader).await.is_err() {
        debug!(job = job_id, "worker output still open after exit");
    }
    debug!(job = job_id, code = ?code, "worker process exited");
    let _ = signals.send(WorkerSignal::Exited { code });
}

#[cfg(test)]
mod tests {
    use super::*;
    use hauler_model::{JobKind, WorkerMessage};
    use serde_json::Value;

    fn job() -> JobDescription {
        JobDescription::new(11, JobKind::Command, Value::Null)
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_failure() {
        let spawner = ProcessSpawner::new("/nonexistent/hauler-worker");
        let err = spawner.spawn(&job()).unwrap_err();
        assert!(matches!(err, ExecError::SpawnFailed(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn messages_arrive_before_exit() {
        let spawner = ProcessSpawner::new("/bin/sh")
            .arg("-c")
            .arg("echo '{\"type\":\"alive\"}'; echo oops >&2; exit 3");
        let mut ch = spawner.spawn(&job()).unwrap();

        assert_eq!(
            ch.inbound.recv().await,
            Some(WorkerSignal::Message(WorkerMessage::Alive))
        );
        assert_eq!(
            ch.inbound.recv().await,
            Some(WorkerSignal::Exited { code: Some(3) })
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn lease_kill_terminates_the_process() {
        let spawner = ProcessSpawner::new("/bin/sh").arg("-c").arg("exec sleep 30");
        let mut ch = spawner.spawn(&job()).unwrap();
        ch.lease.kill();

        assert_eq!(
            ch.inbound.recv().await,
            Some(WorkerSignal::Exited { code: None })
        );
    }
}
