mod error;
pub use error::{ModelError, ModelResult};

mod job;
pub use job::{JobDescription, JobId, JobKind};

mod log;
pub use log::{LogEntry, LogLevel, now_millis};

mod status;
pub use status::{JobStatus, StatusPayload};

mod update;
pub use update::{PendingUpdate, UpdateBatch};

mod server;
pub use server::ServerSettings;

mod protocol;
pub use protocol::{StartPayload, SupervisorMessage, WorkerMessage};
