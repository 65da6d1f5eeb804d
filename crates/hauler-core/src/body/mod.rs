//! Job body contract executed inside the worker process.
//!
//! Every concrete job (command, bundle stats, package analysis, lab analysis) follows the same
//! lifecycle: `before` → `work` → `after`, with `on_error` invoked when `before` or `work` fails
//! or the job is raised. Bodies differ only in what they compute and report.
mod error;
pub use error::BodyError;

mod context;
pub use context::JobContext;

mod registry;
pub use registry::{BodyFactory, BodyRegistry};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use hauler_model::StatusPayload;

/// Uniform lifecycle implemented by every job kind.
///
/// Hooks are invoked once each, in order, by [`drive_body`].
#[async_trait]
pub trait JobBody: Send {
    /// Acquire inputs (download, unpack, parse payload). May report a `running` status.
    async fn before(&mut self, ctx: &JobContext) -> Result<(), BodyError>;

    /// The job's computation. The returned value becomes the final `succeeded` status payload.
    async fn work(&mut self, ctx: &JobContext) -> Result<Value, BodyError>;

    /// Best-effort cleanup. Errors are logged as warnings and never propagated.
    async fn after(&mut self, _ctx: &JobContext) -> Result<(), BodyError> {
        Ok(())
    }

    /// Report a terminal failure. Must not fail.
    async fn on_error(&mut self, ctx: &JobContext, err: &BodyError) {
        ctx.event(StatusPayload::failed(err.to_string()));
    }
}

/// How a driven body finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyOutcome {
    /// `work` returned a result.
    Completed,
    /// `before` or `work` failed; `on_error` has reported it.
    Failed(BodyError),
    /// The job was raised before it finished; `on_error` has reported it.
    Raised(String),
}

/// Run the full lifecycle of `body`.
///
/// `before` and `work` race against the context's raise signal. Whatever happens,
/// `after` runs last.
pub async fn drive_body(body: &mut dyn JobBody, ctx: &JobContext) -> BodyOutcome {
    let result = tokio::select! {
        biased;
        _ = ctx.raised() => Err(BodyError::Raised(
            ctx.raise_reason().unwrap_or_else(|| "raised".to_string()),
        )),
        res = run_stages(&mut *body, ctx) => res,
    };

    let outcome = match result {
        Ok(value) => {
            debug!(job = ctx.job().job_id, "job body completed");
            ctx.event(StatusPayload::succeeded(value));
            BodyOutcome::Completed
        }
        Err(err) => {
            debug!(job = ctx.job().job_id, error = %err, "job body failed");
            body.on_error(ctx, &err).await;
            match err {
                BodyError::Raised(reason) => BodyOutcome::Raised(reason),
                other => BodyOutcome::Failed(other),
            }
        }
    };

    if let Err(e) = body.after(ctx).await {
        warn!(job = ctx.job().job_id, error = %e, "job cleanup failed");
        ctx.warn(format!("cleanup failed: {e}"));
    }
    outcome
}

async fn run_stages(body: &mut dyn JobBody, ctx: &JobContext) -> Result<Value, BodyError> {
    body.before(ctx).await?;
    body.work(ctx).await
}
