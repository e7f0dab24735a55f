//! Record store seam between the orchestrator and its persistence host.
//!
//! In the deployed system the orchestrator and the record store live in
//! different contexts bridged by asynchronous message passing, so every
//! store operation is an awaited call that can fail with an explicit
//! "unreachable" outcome. The orchestrator treats `Unreachable` like any
//! transient error: the current cycle ends early and the next scheduled
//! tick retries.

pub mod local;

pub use local::LocalRecordStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::record::ClassificationRecord;

/// Errors crossing the store boundary.
#[derive(Error, Debug)]
pub enum TransportError {
    /// No route to the record store (the peer context is gone).
    #[error("Record store unreachable: {0}")]
    Unreachable(String),

    /// The store received the request but failed to execute it.
    #[error("Record store request failed: {0}")]
    Store(String),
}

impl From<DatabaseError> for TransportError {
    fn from(err: DatabaseError) -> Self {
        TransportError::Store(err.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Query and update surface the sync engine needs from its record store.
///
/// Only the orchestrator mutates `submitted_at`/`processed_at`; the store
/// implementation applies whatever it is handed without second-guessing.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records that have never been handed to the API and still need a
    /// classification.
    async fn unsubmitted_records(&self) -> Result<Vec<ClassificationRecord>>;

    /// Records that were submitted and still await a verdict.
    async fn submitted_unprocessed_records(&self) -> Result<Vec<ClassificationRecord>>;

    /// Records matching the given id set; unknown ids are silently absent
    /// from the result.
    async fn records_by_ids(&self, ids: &[String]) -> Result<Vec<ClassificationRecord>>;

    /// Bulk upsert by id.
    async fn apply_updates(&self, records: &[ClassificationRecord]) -> Result<()>;

    /// Clears the submission stamp on the given ids so they become
    /// eligible for resubmission. Returns the number of records changed.
    async fn reset_submitted_at(&self, ids: &[String]) -> Result<usize>;
}
