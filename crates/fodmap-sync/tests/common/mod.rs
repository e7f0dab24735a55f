//! Shared fixtures for the integration tests.

#![allow(dead_code)]

pub mod stub_server;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;

use fodmap_sync::api::error::Result as ApiResult;
use fodmap_sync::api::{
    ApiError, ClassificationApi, HealthReport, PollOutcome, StatusResult, SubmitOutcome,
};
use fodmap_sync::db::Database;
use fodmap_sync::{
    ClassificationRecord, FodmapStatus, LocalRecordStore, SyncConfig, SyncOrchestrator,
};

/// One recorded interaction with the mock API.
#[derive(Debug, Clone)]
pub enum ApiCall {
    Submit(Vec<String>),
    Poll(Vec<String>),
}

#[derive(Default)]
struct PollScript {
    results: Vec<StatusResult>,
    missing_ids: Vec<String>,
}

/// Scriptable in-memory stand-in for the classification service.
///
/// By default every submission succeeds and every polled id comes back
/// `pending` (the server knows the record but has not classified it yet).
pub struct MockApi {
    configured: bool,
    healthy: AtomicBool,
    calls: Mutex<Vec<ApiCall>>,
    fail_submits: AtomicU32,
    poll_script: Mutex<PollScript>,
    submit_gate: Mutex<Option<Arc<Semaphore>>>,
    /// Receives one permit every time a submit call begins.
    pub submit_started: Arc<Semaphore>,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            configured: true,
            healthy: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
            fail_submits: AtomicU32::new(0),
            poll_script: Mutex::new(PollScript::default()),
            submit_gate: Mutex::new(None),
            submit_started: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// The next `n` submit calls fail with a network error.
    pub fn fail_next_submits(&self, n: u32) {
        self.fail_submits.store(n, Ordering::SeqCst);
    }

    /// Scripts the poll endpoint: listed results are returned for
    /// matching requested ids, listed missing ids are reported missing,
    /// anything else polled comes back `pending`.
    pub fn script_poll(&self, results: Vec<StatusResult>, missing_ids: Vec<String>) {
        let mut script = self.poll_script.lock().unwrap();
        script.results = results;
        script.missing_ids = missing_ids;
    }

    /// Makes submit calls block until the returned semaphore receives a
    /// permit, so tests can hold a cycle in flight.
    pub fn gate_submits(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.submit_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn submit_calls(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ApiCall::Submit(ids) => Some(ids),
                _ => None,
            })
            .collect()
    }

    pub fn poll_calls(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ApiCall::Poll(ids) => Some(ids),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ClassificationApi for MockApi {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn submit_records(&self, records: &[ClassificationRecord]) -> ApiResult<SubmitOutcome> {
        if records.is_empty() {
            return Err(ApiError::EmptyBatch);
        }
        let ids = records.iter().map(|r| r.id.clone()).collect();
        self.calls.lock().unwrap().push(ApiCall::Submit(ids));
        self.submit_started.add_permits(1);

        let gate = self.submit_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let permit = gate.acquire().await.expect("submit gate closed");
            permit.forget();
        }

        if self.fail_submits.load(Ordering::SeqCst) > 0 {
            self.fail_submits.fetch_sub(1, Ordering::SeqCst);
            return Err(ApiError::Network("mock: connection refused".to_string()));
        }

        Ok(SubmitOutcome {
            success: true,
            submitted_count: records.len() as u64,
            message: None,
        })
    }

    async fn poll_status(&self, ids: &[String]) -> ApiResult<PollOutcome> {
        self.calls.lock().unwrap().push(ApiCall::Poll(ids.to_vec()));

        let script = self.poll_script.lock().unwrap();
        let mut outcome = PollOutcome::empty();
        for id in ids {
            if script.missing_ids.contains(id) {
                outcome.missing += 1;
                outcome.missing_ids.push(id.clone());
                continue;
            }
            let result = script
                .results
                .iter()
                .find(|r| &r.id == id)
                .cloned()
                .unwrap_or_else(|| pending_result(id));
            outcome.found += 1;
            outcome.results.push(result);
        }
        Ok(outcome)
    }

    async fn health_check(&self) -> HealthReport {
        if self.healthy.load(Ordering::SeqCst) {
            HealthReport {
                is_healthy: true,
                message: "OK".to_string(),
            }
        } else {
            HealthReport {
                is_healthy: false,
                message: "mock: service down".to_string(),
            }
        }
    }
}

/// Config pointing at a fictional endpoint, with the post-submit grace
/// delay zeroed so tests run instantly.
pub fn test_config() -> SyncConfig {
    SyncConfig {
        api_endpoint: "https://classify.example.com/api/v1".to_string(),
        post_submit_poll_delay_ms: 0,
        ..SyncConfig::default()
    }
}

pub fn memory_store() -> Arc<LocalRecordStore> {
    Arc::new(LocalRecordStore::new(
        Database::open_in_memory().expect("open in-memory DB"),
    ))
}

pub fn orchestrator_with(
    config: SyncConfig,
    api: Arc<MockApi>,
    store: Arc<LocalRecordStore>,
) -> Arc<SyncOrchestrator> {
    Arc::new(SyncOrchestrator::new(config, api, store))
}

/// A record that has never been submitted.
pub fn unsubmitted(name: &str) -> ClassificationRecord {
    ClassificationRecord::new(name, "groceries")
}

/// A record stamped and pending, as left behind by a successful submit.
pub fn submitted_pending(name: &str) -> ClassificationRecord {
    let mut record = ClassificationRecord::new(name, "groceries");
    record.submitted_at = Some(Utc::now());
    record.status = FodmapStatus::Pending;
    record
}

/// A record with a terminal verdict already applied.
pub fn processed(name: &str, status: FodmapStatus) -> ClassificationRecord {
    let mut record = ClassificationRecord::new(name, "groceries");
    record.submitted_at = Some(Utc::now());
    record.processed_at = Some(Utc::now());
    record.status = status;
    record
}

/// A scripted terminal poll result.
pub fn terminal_result(id: &str, status: FodmapStatus) -> StatusResult {
    StatusResult {
        id: id.to_string(),
        status,
        explanation: None,
        is_food: None,
        processed_at: None,
    }
}

fn pending_result(id: &str) -> StatusResult {
    StatusResult {
        id: id.to_string(),
        status: FodmapStatus::Pending,
        explanation: None,
        is_food: None,
        processed_at: None,
    }
}
