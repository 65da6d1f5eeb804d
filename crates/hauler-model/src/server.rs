use serde::{Deserialize, Serialize};

/// Coordinator connection settings.
///
/// This is the `server` section of the runner configuration and is also shipped
/// to the worker process in the `start` message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettings {
    /// Base URL of the coordinator.
    #[serde(default)]
    pub url: String,
    /// Bearer token used to authenticate pushes.
    #[serde(default)]
    pub token: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_server_timeout")]
    pub timeout_seconds: u64,
}

fn default_server_timeout() -> u64 {
    30
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            timeout_seconds: default_server_timeout(),
        }
    }
}
