pub mod body;
pub mod config;
pub mod coordinator;
pub mod metrics;
pub mod pipeline;

pub use metrics::{JobOutcome, MetricsBackend, MetricsHandle, NoOpMetrics, noop_metrics};

pub mod prelude {
    pub use crate::body::{BodyError, BodyRegistry, JobBody, JobContext};
    pub use crate::config::{ConfigHandle, RunnerConfig};
    pub use crate::coordinator::{Coordinator, PushError};
    pub use crate::pipeline::UpdatePipeline;
}
