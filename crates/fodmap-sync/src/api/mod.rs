//! Outbound interface to the remote classification service.

pub mod client;
pub mod error;
pub mod types;

pub use client::{ClassificationApiClient, RetryPolicy};
pub use error::ApiError;
pub use types::{HealthReport, PollOutcome, StatusResult, SubmitOutcome};

use async_trait::async_trait;

use crate::record::ClassificationRecord;

/// Calls the sync engine makes against the classification service.
///
/// The orchestrator only depends on this trait; the production
/// implementation is [`ClassificationApiClient`], tests substitute their
/// own.
#[async_trait]
pub trait ClassificationApi: Send + Sync {
    /// True iff a non-empty base endpoint is set. Callers must check this
    /// before invoking any other operation.
    fn is_configured(&self) -> bool;

    /// Submits records for classification in bounded batches. Fails fast
    /// on an empty list; a batch failure after retries aborts the
    /// remaining batches.
    async fn submit_records(
        &self,
        records: &[ClassificationRecord],
    ) -> error::Result<SubmitOutcome>;

    /// Polls classification status for the given ids in bounded batches.
    /// An empty id list returns an empty outcome without any call.
    async fn poll_status(&self, ids: &[String]) -> error::Result<PollOutcome>;

    /// Probes service health. Never fails; an unreachable service is
    /// reported as unhealthy. Results are cached.
    async fn health_check(&self) -> HealthReport;
}
