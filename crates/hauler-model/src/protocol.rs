//! Message protocol exchanged between the supervisor and a worker process.
//!
//! Every message is a JSON object `{"type": ..., "payload": ...}`; variants without data carry no `payload` field at all.
//! The supervisor never sends a new command before the previous one is acknowledged:
//! `alive` → `start` → `start` (ack), and `raise` → `raised`.
use serde::{Deserialize, Serialize};

use crate::{JobDescription, LogEntry, ServerSettings, StatusPayload};

/// Payload of the `start` command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StartPayload {
    pub job: JobDescription,
    pub server: ServerSettings,
}

/// Supervisor → worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum SupervisorMessage {
    /// Begin executing the job.
    Start(StartPayload),
    /// Cooperatively cancel the running job with a human-readable reason.
    Raise(String),
    /// Exit the worker process.
    Shutdown,
}

/// Worker → supervisor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum WorkerMessage {
    /// Worker process is up and waiting for `start`.
    Alive,
    /// Acknowledges `start`: the job body is running.
    #[serde(rename = "start")]
    Started,
    Log(LogEntry),
    Event(StatusPayload),
    /// Acknowledges `raise`: the body's error and cleanup hooks have run.
    Raised,
    /// The job body finished.
    #[serde(rename = "end")]
    Ended,
}

impl SupervisorMessage {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            SupervisorMessage::Start(_) => "start",
            SupervisorMessage::Raise(_) => "raise",
            SupervisorMessage::Shutdown => "shutdown",
        }
    }
}

impl WorkerMessage {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            WorkerMessage::Alive => "alive",
            WorkerMessage::Started => "start",
            WorkerMessage::Log(_) => "log",
            WorkerMessage::Event(_) => "event",
            WorkerMessage::Raised => "raised",
            WorkerMessage::Ended => "end",
        }
    }
}
