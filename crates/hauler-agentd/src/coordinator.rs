use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use hauler_core::coordinator::{Coordinator, PushError};
use hauler_model::{JobId, ServerSettings, UpdateBatch};

/// Pushes update batches of one job to the coordinator's HTTP API.
pub struct HttpCoordinator {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl HttpCoordinator {
    pub fn new(server: &ServerSettings, job_id: JobId) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(server.timeout_seconds))
            .build()
            .map_err(|e| PushError::Other(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: updates_url(&server.url, job_id),
            token: server.token.clone(),
        })
    }
}

fn updates_url(base: &str, job_id: JobId) -> String {
    format!("{}/api/v1/jobs/{job_id}/updates", base.trim_end_matches('/'))
}

#[async_trait]
impl Coordinator for HttpCoordinator {
    async fn push(&self, batch: &UpdateBatch) -> Result<(), PushError> {
        trace!(
            url = %self.url,
            trace_len = batch.trace.len(),
            done = batch.is_done(),
            "pushing update"
        );
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(batch)
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(PushError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
