//! In-process record store backed by the rusqlite database.
//!
//! Used when the engine and the product store share a process, and by the
//! integration tests. Database calls are synchronous and sub-millisecond,
//! so they run inline on the async caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::record_repo::{self, ProductRow};
use crate::db::Database;
use crate::record::{ClassificationRecord, FodmapStatus};

use super::{RecordStore, Result};

/// Record store implementation over the local SQLite database.
#[derive(Clone)]
pub struct LocalRecordStore {
    db: Database,
}

impl LocalRecordStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts freshly scraped products, skipping ids that already exist.
    /// Returns the records that were actually added.
    pub fn register_products(
        &self,
        records: &[ClassificationRecord],
    ) -> Result<Vec<ClassificationRecord>> {
        let mut added = Vec::new();
        for record in records {
            if record_repo::find_by_id(&self.db, &record.id)?.is_none() {
                record_repo::insert(&self.db, &record_to_row(record, Utc::now()))?;
                added.push(record.clone());
            }
        }
        Ok(added)
    }
}

#[async_trait]
impl RecordStore for LocalRecordStore {
    async fn unsubmitted_records(&self) -> Result<Vec<ClassificationRecord>> {
        let rows = record_repo::find_unsubmitted(&self.db)?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn submitted_unprocessed_records(&self) -> Result<Vec<ClassificationRecord>> {
        let rows = record_repo::find_submitted_unprocessed(&self.db)?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn records_by_ids(&self, ids: &[String]) -> Result<Vec<ClassificationRecord>> {
        let rows = record_repo::find_by_ids(&self.db, ids)?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn apply_updates(&self, records: &[ClassificationRecord]) -> Result<()> {
        let now = Utc::now();
        let rows: Vec<ProductRow> = records.iter().map(|r| record_to_row(r, now)).collect();
        record_repo::upsert_all(&self.db, &rows)?;
        Ok(())
    }

    async fn reset_submitted_at(&self, ids: &[String]) -> Result<usize> {
        let changed = record_repo::clear_submitted_at(&self.db, ids, &format_timestamp(Utc::now()))?;
        Ok(changed)
    }
}

fn row_to_record(row: &ProductRow) -> ClassificationRecord {
    ClassificationRecord {
        id: row.id.clone(),
        name: row.name.clone(),
        category: row.category.clone(),
        status: FodmapStatus::parse(&row.status),
        submitted_at: row.submitted_at.as_deref().map(parse_timestamp),
        processed_at: row.processed_at.as_deref().map(parse_timestamp),
        explanation: row.explanation.clone(),
        is_food: row.is_food,
    }
}

fn record_to_row(record: &ClassificationRecord, now: DateTime<Utc>) -> ProductRow {
    ProductRow {
        id: record.id.clone(),
        name: record.name.clone(),
        category: record.category.clone(),
        status: record.status.as_str().to_string(),
        submitted_at: record.submitted_at.map(format_timestamp),
        processed_at: record.processed_at.map(format_timestamp),
        explanation: record.explanation.clone(),
        is_food: record.is_food,
        created_at: format_timestamp(now),
        updated_at: format_timestamp(now),
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}
