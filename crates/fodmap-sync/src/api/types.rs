//! Wire types for the classification service endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{ClassificationRecord, FodmapStatus};

/// Body for `POST {base}/products/submit`.
#[derive(Debug, Serialize)]
pub struct SubmitRequest<'a> {
    pub products: &'a [ClassificationRecord],
}

/// Per-batch response from the submit endpoint.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub submitted_count: u64,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body for `POST {base}/products/status`.
#[derive(Debug, Serialize)]
pub struct StatusRequest<'a> {
    pub ids: &'a [String],
}

/// One classifier verdict from the status endpoint. A `pending` status
/// means the server knows the record but has not classified it yet.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    pub id: String,
    pub status: FodmapStatus,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub is_food: Option<bool>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

/// Per-batch response from the status endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(default)]
    pub results: Vec<StatusResult>,
    #[serde(default)]
    pub found: u64,
    #[serde(default)]
    pub missing: u64,
    #[serde(default)]
    pub missing_ids: Vec<String>,
}

/// Aggregate result of a (possibly multi-batch) submission.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub success: bool,
    pub submitted_count: u64,
    pub message: Option<String>,
}

/// Aggregate result of a (possibly multi-batch) status poll.
#[derive(Debug, Default)]
pub struct PollOutcome {
    pub results: Vec<StatusResult>,
    pub found: u64,
    pub missing: u64,
    pub missing_ids: Vec<String>,
}

impl PollOutcome {
    /// The empty outcome returned for an empty id list, without any call.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Folds one batch response into the aggregate.
    pub fn merge(&mut self, batch: StatusResponse) {
        self.results.extend(batch.results);
        self.found += batch.found;
        self.missing += batch.missing;
        self.missing_ids.extend(batch.missing_ids);
    }
}

/// Result of a health probe.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub is_healthy: bool,
    pub message: String,
}
