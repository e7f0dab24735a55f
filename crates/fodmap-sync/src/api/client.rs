//! HTTP client for the classification service.
//!
//! Turns record lists into batched POST calls with bounded retry and
//! exponential backoff. A batch either fully succeeds or the whole
//! operation fails after retries are exhausted; batches already sent stay
//! sent (no rollback).

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::record::ClassificationRecord;

use super::error::{ApiError, Result};
use super::types::{
    HealthReport, PollOutcome, StatusRequest, StatusResponse, SubmitOutcome, SubmitRequest,
    SubmitResponse,
};
use super::ClassificationApi;

/// Connect timeout for all HTTP requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the lightweight health probe, independent of the batch
/// endpoints' request timeout.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a healthy probe result is trusted before re-verifying.
const HEALTHY_TTL: Duration = Duration::from_secs(60);

/// How long an unhealthy probe result is held, so a cold backend is not
/// hammered on every cycle.
const UNHEALTHY_TTL: Duration = Duration::from_secs(300);

/// Maximum length of an error body carried into logs and error values.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first one. At least 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Factor applied to the delay after each further failure.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after the given failed attempt (1-based):
    /// `base_delay * multiplier^(attempt-1)`.
    fn delay_after(&self, failed_attempt: u32) -> Duration {
        // Cap the exponent; beyond this the delay is absurd anyway.
        let exponent = failed_attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(self.multiplier.saturating_pow(exponent))
    }
}

/// Retries `call` until it succeeds, fails with a non-retryable error, or
/// `policy.max_attempts` is reached. The error of the final attempt is the
/// one returned.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    op: &str,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1u32;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                log::warn!(
                    "{} attempt {}/{} failed: {}; retrying in {:?}",
                    op,
                    attempt,
                    policy.max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

struct CachedHealth {
    report: HealthReport,
    checked_at: Instant,
}

/// HTTP implementation of [`ClassificationApi`] over reqwest.
pub struct ClassificationApiClient {
    http: reqwest::Client,
    /// Base endpoint without trailing slash. Empty = not configured.
    base_url: String,
    retry: RetryPolicy,
    submit_batch_size: usize,
    poll_batch_size: usize,
    health_cache: Mutex<Option<CachedHealth>>,
}

impl ClassificationApiClient {
    /// Creates a client from the engine configuration.
    pub fn from_config(config: &crate::config::SyncConfig) -> Result<Self> {
        Self::new(
            &config.api_endpoint,
            RetryPolicy {
                max_attempts: config.max_retry_attempts,
                base_delay: config.retry_base_delay(),
                multiplier: config.backoff_multiplier,
            },
            config.submit_batch_size,
            config.poll_batch_size,
            config.request_timeout(),
        )
    }

    /// Creates a client with explicit settings.
    pub fn new(
        base_url: &str,
        retry: RetryPolicy,
        submit_batch_size: usize,
        poll_batch_size: usize,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            retry,
            submit_batch_size,
            poll_batch_size,
            health_cache: Mutex::new(None),
        })
    }

    fn submit_url(&self) -> String {
        format!("{}/products/submit", self.base_url)
    }

    fn status_url(&self) -> String {
        format!("{}/products/status", self.base_url)
    }

    /// Health endpoint lives next to the API root: a trailing version
    /// segment (`/v1`, `/v2`, …) is stripped before appending `/health`.
    fn health_url(&self) -> String {
        let root = match self.base_url.rsplit_once('/') {
            Some((parent, segment)) if is_version_segment(segment) => parent,
            _ => self.base_url.as_str(),
        };
        format!("{}/health", root)
    }

    async fn post_submit_batch(&self, batch: &[ClassificationRecord]) -> Result<SubmitResponse> {
        let response = self
            .http
            .post(self.submit_url())
            .json(&SubmitRequest { products: batch })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status,
                body: truncate_body(&body),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn post_status_batch(&self, ids: &[String]) -> Result<StatusResponse> {
        let response = self
            .http
            .post(self.status_url())
            .json(&StatusRequest { ids })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status,
                body: truncate_body(&body),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn cached_health(&self) -> Option<HealthReport> {
        let cache = match self.health_cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Health cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let cached = cache.as_ref()?;
        let ttl = if cached.report.is_healthy {
            HEALTHY_TTL
        } else {
            UNHEALTHY_TTL
        };
        if cached.checked_at.elapsed() < ttl {
            Some(cached.report.clone())
        } else {
            None
        }
    }

    fn store_health(&self, report: &HealthReport) {
        let mut cache = match self.health_cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Health cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        *cache = Some(CachedHealth {
            report: report.clone(),
            checked_at: Instant::now(),
        });
    }
}

#[async_trait]
impl ClassificationApi for ClassificationApiClient {
    fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    async fn submit_records(&self, records: &[ClassificationRecord]) -> Result<SubmitOutcome> {
        if records.is_empty() {
            return Err(ApiError::EmptyBatch);
        }
        if !self.is_configured() {
            return Err(ApiError::NotConfigured);
        }

        let total_batches = records.len().div_ceil(self.submit_batch_size);
        let mut outcome = SubmitOutcome {
            success: true,
            submitted_count: 0,
            message: None,
        };

        for (index, batch) in records.chunks(self.submit_batch_size).enumerate() {
            log::debug!(
                "Submitting batch {}/{} ({} records)",
                index + 1,
                total_batches,
                batch.len()
            );
            let response =
                retry_with_backoff(&self.retry, "Submit", || self.post_submit_batch(batch))
                    .await?;
            outcome.success &= response.success;
            outcome.submitted_count += response.submitted_count;
            if response.message.is_some() {
                outcome.message = response.message;
            }
        }

        log::info!(
            "Submitted {} records in {} batches",
            outcome.submitted_count,
            total_batches
        );
        Ok(outcome)
    }

    async fn poll_status(&self, ids: &[String]) -> Result<PollOutcome> {
        if ids.is_empty() {
            return Ok(PollOutcome::empty());
        }
        if !self.is_configured() {
            return Err(ApiError::NotConfigured);
        }

        let mut outcome = PollOutcome::empty();
        for batch in ids.chunks(self.poll_batch_size) {
            let response =
                retry_with_backoff(&self.retry, "Status poll", || self.post_status_batch(batch))
                    .await?;
            outcome.merge(response);
        }

        log::debug!(
            "Polled {} ids: {} found, {} missing",
            ids.len(),
            outcome.found,
            outcome.missing
        );
        Ok(outcome)
    }

    async fn health_check(&self) -> HealthReport {
        if !self.is_configured() {
            return HealthReport {
                is_healthy: false,
                message: "API endpoint not configured".to_string(),
            };
        }

        if let Some(report) = self.cached_health() {
            return report;
        }

        let report = match self
            .http
            .get(self.health_url())
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => HealthReport {
                is_healthy: true,
                message: "OK".to_string(),
            },
            Ok(response) => HealthReport {
                is_healthy: false,
                message: format!("Health endpoint returned {}", response.status()),
            },
            Err(e) => HealthReport {
                is_healthy: false,
                message: format!("Health probe failed: {}", e),
            },
        };

        if !report.is_healthy {
            log::warn!("Classification service unhealthy: {}", report.message);
        }
        self.store_health(&report);
        report
    }
}

fn is_version_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    chars.next() == Some('v') && {
        let rest = chars.as_str();
        !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
    }
}

/// Truncates an error response body so log lines stay bounded.
fn truncate_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}
