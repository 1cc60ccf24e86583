//! # Run Summary
//!
//! Final accounting snapshot for one run: attempted/succeeded/failed
//! tallies plus an ordered failure log with stable reason codes. Nothing
//! is ever silently dropped; every rejected or failed item appears here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable reason code attached to every failure entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// A required field resolved to absent; the record was rejected.
    RequiredFieldMissing,
    /// The page-access collaborator faulted for this URL.
    PageAccessFault,
}

impl ReasonCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RequiredFieldMissing => "required_field_missing",
            Self::PageAccessFault => "page_access_fault",
        }
    }
}

/// One failed or rejected item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub url: String,
    pub reason_code: ReasonCode,
    pub message: String,
}

/// Immutable snapshot of a finished (or finishing) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub failures: Vec<FailureRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Success rate in percent; 100 for an empty run.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.succeeded as f64 / self.total as f64) * 100.0
        }
    }
}
