//! Submit-and-poll synchronization engine for remote FODMAP product
//! classification.
//!
//! Locally discovered products are submitted to a classification service
//! in bounded batches with retry and backoff, then polled until a
//! terminal verdict arrives and is reconciled back into the local record
//! store. Records the server turns out not to know are reset and become
//! eligible for resubmission.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod record;
pub mod store;
pub mod sync;

pub use api::{ClassificationApi, ClassificationApiClient, HealthReport, PollOutcome, SubmitOutcome};
pub use config::{load_config, load_config_from_str, SyncConfig};
pub use error::{ConfigError, FodmapSyncError, Result};
pub use record::{ClassificationRecord, FodmapStatus};
pub use store::{LocalRecordStore, RecordStore, TransportError};
pub use sync::{CycleOutcome, CycleStats, SkipReason, SyncOrchestrator, SyncScheduler, SyncStatus};
