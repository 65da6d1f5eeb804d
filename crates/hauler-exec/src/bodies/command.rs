use std::{collections::BTreeMap, path::PathBuf, process::Stdio};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::{io::BufReader, process::Command};
use tracing::{debug, trace};

use hauler_core::body::{BodyError, JobBody, JobContext};
use hauler_model::{LogLevel, StatusPayload};

use crate::process::{read_line_lossy, truncate_line};

/// Environment variable pointing the command at its scratch directory.
pub const SCRATCH_DIR_ENV: &str = "HAULER_SCRATCH_DIR";

/// Payload of a `command` job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPayload {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory. Defaults to the job's scratch directory.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl CommandPayload {
    fn validate(&self) -> Result<(), BodyError> {
        if self.command.trim().is_empty() {
            return Err(BodyError::InvalidPayload("command is empty".into()));
        }
        Ok(())
    }
}

/// Runs an external command, streaming its output into the job trace.
///
/// stdout lines become `info` entries and stderr lines `warn` entries. A non-zero exit fails the job.
#[derive(Debug)]
pub struct CommandBody {
    payload: Option<CommandPayload>,
    scratch: Option<PathBuf>,
    max_line_length: usize,
}

impl Default for CommandBody {
    fn default() -> Self {
        Self {
            payload: None,
            scratch: None,
            max_line_length: 4096,
        }
    }
}

impl CommandBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }
}

#[async_trait]
impl JobBody for CommandBody {
    async fn before(&mut self, ctx: &JobContext) -> Result<(), BodyError> {
        let payload: CommandPayload = serde_json::from_value(ctx.job().payload.clone())?;
        payload.validate()?;

        let scratch = std::env::temp_dir().join(format!(
            "hauler-job-{}-{}",
            ctx.job().job_id,
            std::process::id()
        ));
        tokio::fs::create_dir_all(&scratch).await?;
        trace!(job = ctx.job().job_id, scratch = %scratch.display(), "scratch dir created");

        ctx.event(StatusPayload::running());
        ctx.log_with(
            LogLevel::Info,
            format!("Running {}", payload.command),
            json!({"args": payload.args}),
        );
        self.scratch = Some(scratch);
        self.payload = Some(payload);
        Ok(())
    }

    async fn work(&mut self, ctx: &JobContext) -> Result<Value, BodyError> {
        let payload = self
            .payload
            .as_ref()
            .ok_or_else(|| BodyError::failed("command payload missing"))?;

        let mut cmd = Command::new(&payload.command);
        cmd.args(&payload.args)
            .envs(&payload.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(scratch) = &self.scratch {
            cmd.env(SCRATCH_DIR_ENV, scratch);
        }
        if let Some(dir) = payload.cwd.as_ref().or(self.scratch.as_ref()) {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| BodyError::failed(format!("failed to start {}: {e}", payload.command)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BodyError::failed("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BodyError::failed("stderr not captured"))?;

        let mut out = BufReader::new(stdout);
        let mut err = BufReader::new(stderr);
        let (mut out_buf, mut err_buf) = (Vec::new(), Vec::new());
        let (mut out_open, mut err_open) = (true, true);
        let mut lines: u64 = 0;

        while out_open || err_open {
            tokio::select! {
                line = read_line_lossy(&mut out, &mut out_buf), if out_open => match line? {
                    Some(line) => {
                        lines += 1;
                        ctx.info(truncate_line(&line, self.max_line_length));
                    }
                    None => out_open = false,
                },
                line = read_line_lossy(&mut err, &mut err_buf), if err_open => match line? {
                    Some(line) => {
                        lines += 1;
                        ctx.warn(truncate_line(&line, self.max_line_length));
                    }
                    None => err_open = false,
                },
            }
        }

        let status = child.wait().await?;
        debug!(job = ctx.job().job_id, ?status, lines, "command finished");
        match status.code() {
            Some(0) => Ok(json!({"exitCode": 0, "lines": lines})),
            Some(code) => Err(BodyError::failed(format!(
                "{} exited with code {code}",
                payload.command
            ))),
            None => Err(BodyError::failed(format!(
                "{} was terminated by a signal",
                payload.command
            ))),
        }
    }

    async fn after(&mut self, _ctx: &JobContext) -> Result<(), BodyError> {
        if let Some(scratch) = self.scratch.take() {
            tokio::fs::remove_dir_all(&scratch).await?;
        }
        Ok(())
    }
}
