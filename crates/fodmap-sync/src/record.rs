//! Classification record model.
//!
//! A record tracks one product's journey through the remote classifier:
//! unsubmitted (`unknown`/`pending` with no submission stamp), submitted
//! (`pending` with a stamp), and finally processed (terminal status with
//! `processed_at` set). Only the sync engine mutates the submission and
//! processing stamps; the classifier supplies status and enrichment fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// FODMAP classification status of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FodmapStatus {
    Low,
    Moderate,
    High,
    Unknown,
    Pending,
}

impl FodmapStatus {
    /// Returns true for statuses that represent a final classifier verdict.
    ///
    /// `Unknown` counts as terminal when it arrives in a poll response (the
    /// classifier gave up on the product); `Pending` is the only
    /// still-in-flight answer.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FodmapStatus::Pending)
    }

    /// Stable string form used in the database and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            FodmapStatus::Low => "low",
            FodmapStatus::Moderate => "moderate",
            FodmapStatus::High => "high",
            FodmapStatus::Unknown => "unknown",
            FodmapStatus::Pending => "pending",
        }
    }

    /// Parses a stored status string, defaulting to `Unknown` on anything
    /// unrecognized so a corrupt row re-enters the submission pipeline
    /// instead of being dropped.
    pub fn parse(s: &str) -> Self {
        match s {
            "low" => FodmapStatus::Low,
            "moderate" => FodmapStatus::Moderate,
            "high" => FodmapStatus::High,
            "unknown" => FodmapStatus::Unknown,
            "pending" => FodmapStatus::Pending,
            other => {
                log::warn!("Unknown FODMAP status '{}', treating as unknown", other);
                FodmapStatus::Unknown
            }
        }
    }
}

/// A product's classification state as tracked by the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRecord {
    /// Stable identifier, derived from the normalized product name unless
    /// supplied externally.
    pub id: String,
    /// Display name used as classification context.
    pub name: String,
    /// Free-text grouping label.
    #[serde(default)]
    pub category: String,
    /// Current classification status.
    pub status: FodmapStatus,
    /// Set when the record is handed to the API client for submission;
    /// cleared again if the server later reports the record missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    /// Set only when a terminal classification result is received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    /// Classifier-supplied explanation, carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Classifier-supplied food flag, carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_food: Option<bool>,
}

impl ClassificationRecord {
    /// Creates a fresh, unsubmitted record with an id derived from `name`.
    pub fn new(name: &str, category: &str) -> Self {
        Self::with_id(derive_record_id(name), name, category)
    }

    /// Creates a fresh, unsubmitted record with an externally supplied id.
    pub fn with_id(id: impl Into<String>, name: &str, category: &str) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            category: category.to_string(),
            status: FodmapStatus::Unknown,
            submitted_at: None,
            processed_at: None,
            explanation: None,
            is_food: None,
        }
    }

    /// A record is eligible for the submit cycle while it has never been
    /// handed to the API (no submission stamp) and is still unclassified.
    pub fn is_submit_eligible(&self) -> bool {
        self.submitted_at.is_none()
            && matches!(self.status, FodmapStatus::Unknown | FodmapStatus::Pending)
    }

    /// A record is eligible for the poll cycle exactly when it has been
    /// submitted, awaits a verdict, and has not been processed yet.
    pub fn is_poll_eligible(&self) -> bool {
        self.submitted_at.is_some()
            && self.processed_at.is_none()
            && self.status == FodmapStatus::Pending
    }
}

/// Derives a stable record id from a product name: lowercased, with runs
/// of non-alphanumeric characters collapsed to single dashes.
pub fn derive_record_id(name: &str) -> String {
    let mut id = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !id.is_empty() {
                id.push('-');
            }
            pending_dash = false;
            for lower in c.to_lowercase() {
                id.push(lower);
            }
        } else {
            pending_dash = true;
        }
    }

    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_record_id() {
        assert_eq!(derive_record_id("Bananas"), "bananas");
        assert_eq!(derive_record_id("Sourdough Bread (800g)"), "sourdough-bread-800g");
        assert_eq!(derive_record_id("  Greek   Yoghurt  "), "greek-yoghurt");
        assert_eq!(derive_record_id("Crème Fraîche"), "crème-fraîche");
        assert_eq!(derive_record_id(""), "");
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            FodmapStatus::Low,
            FodmapStatus::Moderate,
            FodmapStatus::High,
            FodmapStatus::Unknown,
            FodmapStatus::Pending,
        ] {
            assert_eq!(FodmapStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_unrecognized_status_becomes_unknown() {
        assert_eq!(FodmapStatus::parse("garbage"), FodmapStatus::Unknown);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(FodmapStatus::Low.is_terminal());
        assert!(FodmapStatus::Unknown.is_terminal());
        assert!(!FodmapStatus::Pending.is_terminal());
    }

    #[test]
    fn test_new_record_is_submit_eligible() {
        let record = ClassificationRecord::new("Bananas", "fruit");
        assert_eq!(record.id, "bananas");
        assert!(record.is_submit_eligible());
        assert!(!record.is_poll_eligible());
    }

    #[test]
    fn test_submitted_record_is_poll_eligible() {
        let mut record = ClassificationRecord::new("Bananas", "fruit");
        record.submitted_at = Some(Utc::now());
        record.status = FodmapStatus::Pending;

        assert!(!record.is_submit_eligible());
        assert!(record.is_poll_eligible());
    }

    #[test]
    fn test_processed_record_is_not_eligible_anywhere() {
        let mut record = ClassificationRecord::new("Bananas", "fruit");
        record.submitted_at = Some(Utc::now());
        record.processed_at = Some(Utc::now());
        record.status = FodmapStatus::Low;

        assert!(!record.is_submit_eligible());
        assert!(!record.is_poll_eligible());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let mut record = ClassificationRecord::new("Rye Bread", "bakery");
        record.is_food = Some(true);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "rye-bread");
        assert_eq!(json["status"], "unknown");
        assert_eq!(json["isFood"], true);
        // Unset stamps are omitted entirely.
        assert!(json.get("submittedAt").is_none());
        assert!(json.get("processedAt").is_none());
    }
}
