//! Boundary to the remote coordinator that receives job updates.
use async_trait::async_trait;
use thiserror::Error;

use hauler_model::UpdateBatch;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PushError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("coordinator rejected update (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("{0}")]
    Other(String),
}

/// Pushes a batch of updates to the coordinator.
///
/// The executor calls [`Coordinator::push`] at most once concurrently and treats any
/// error as a failed push to be retried by the pipeline.
#[async_trait]
pub trait Coordinator: Send + Sync {
    async fn push(&self, batch: &UpdateBatch) -> Result<(), PushError>;
}
