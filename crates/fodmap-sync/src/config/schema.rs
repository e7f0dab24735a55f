//! Sync engine configuration schema.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Externally supplied configuration for the sync engine.
///
/// Every field has a serde default so a partial JSON document only needs
/// to name the values it overrides. Validation happens after parsing, in
/// [`crate::config::loader`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Base endpoint of the classification service. An empty string means
    /// the API is not configured and every cycle is a no-op.
    pub api_endpoint: String,
    /// Master switch for both cycles.
    pub sync_enabled: bool,
    /// Seconds between scheduled submit cycles.
    pub submit_interval_secs: u64,
    /// Seconds between scheduled poll cycles.
    pub poll_interval_secs: u64,
    /// Maximum HTTP attempts per batch, including the first one.
    pub max_retry_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Multiplier applied to the retry delay after each failed attempt.
    pub backoff_multiplier: u32,
    /// Records per submission batch.
    pub submit_batch_size: usize,
    /// Ids per status-poll batch.
    pub poll_batch_size: usize,
    /// Overall timeout per HTTP request, in seconds.
    pub request_timeout_secs: u64,
    /// Grace delay between a successful submission and the targeted poll
    /// that picks up quickly classified records, in milliseconds.
    pub post_submit_poll_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_endpoint: String::new(),
            sync_enabled: true,
            submit_interval_secs: 300,
            poll_interval_secs: 120,
            max_retry_attempts: 3,
            retry_base_delay_ms: 1000,
            backoff_multiplier: 2,
            submit_batch_size: 100,
            poll_batch_size: 500,
            request_timeout_secs: 30,
            post_submit_poll_delay_ms: 2000,
        }
    }
}

impl SyncConfig {
    /// True iff a non-empty base endpoint is set.
    pub fn is_configured(&self) -> bool {
        !self.api_endpoint.trim().is_empty()
    }

    pub fn submit_interval(&self) -> Duration {
        Duration::from_secs(self.submit_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn post_submit_poll_delay(&self) -> Duration {
        Duration::from_millis(self.post_submit_poll_delay_ms)
    }
}
