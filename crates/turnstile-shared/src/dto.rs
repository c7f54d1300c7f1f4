//! Data Transfer Objects - request/response types for the API.

use serde::{Deserialize, Serialize};

/// A configured limiter as reported by `GET /api/limits`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySummary {
    pub name: String,
    pub window_secs: u64,
    pub max_requests: u32,
    /// Key shape, e.g. `login:ip:email`.
    pub key: String,
    pub message: String,
}

/// Response of `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub store: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_keys: Option<usize>,
}
