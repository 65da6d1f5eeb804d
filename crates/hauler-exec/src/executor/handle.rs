use tokio::sync::mpsc;

#[derive(Debug)]
pub(crate) enum ExecutorCommand {
    Terminate(String),
}

/// Clonable remote control for a running [`Executor`](super::Executor).
#[derive(Debug, Clone)]
pub struct ExecutorHandle {
    pub(crate) commands: mpsc::UnboundedSender<ExecutorCommand>,
}

impl ExecutorHandle {
    /// Cooperatively terminate the job with `reason`.
    ///
    /// Only the first call has an effect. Returns `false` once the executor has finished running.
    pub fn terminate(&self, reason: impl Into<String>) -> bool {
        self.commands
            .send(ExecutorCommand::Terminate(reason.into()))
            .is_ok()
    }
}
