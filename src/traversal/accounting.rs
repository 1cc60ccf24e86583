//! # Run Accounting
//!
//! Append-only counters and a failure log for one run. Accepts
//! concurrent appends (counters are atomic, the failure log is
//! lock-protected) and produces an immutable [`RunSummary`] snapshot on
//! finalization. No retries happen here; retry policy belongs to the
//! fetching collaborator and is treated as already applied.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::domain::summary::{FailureRecord, ReasonCode, RunSummary};

/// Accounting for one run. Created at run start, finalized at run end,
/// never reused across runs.
#[derive(Debug)]
pub struct RunAccountant {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    attempted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    failures: Mutex<Vec<FailureRecord>>,
}

impl RunAccountant {
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            attempted: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            failures: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Records that an extraction is being attempted.
    pub fn record_attempt(&self) {
        self.attempted.fetch_add(1, Ordering::SeqCst);
    }

    /// Records an accepted record.
    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    /// Records a failed or rejected item. Every failure is enumerated,
    /// never silently dropped.
    pub async fn record_failure(
        &self,
        url: impl Into<String>,
        reason_code: ReasonCode,
        message: impl Into<String>,
    ) {
        let record = FailureRecord {
            url: url.into(),
            reason_code,
            message: message.into(),
        };
        warn!(
            url = %record.url,
            reason = reason_code.as_str(),
            message = %record.message,
            "extraction failure recorded"
        );
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.failures.lock().await.push(record);
    }

    #[must_use]
    pub fn attempted(&self) -> u64 {
        self.attempted.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    /// Produces the immutable run summary snapshot. Every unit of work
    /// ends as a success or a failure, so the total is their sum.
    pub async fn finalize(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            total: self.succeeded() + self.failed(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            failures: self.failures.lock().await.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

impl Default for RunAccountant {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn tallies_and_failure_log_agree() {
        let accountant = RunAccountant::new();
        accountant.record_attempt();
        accountant.record_attempt();
        accountant.record_success();
        accountant
            .record_failure(
                "https://shop.example.com/p/2",
                ReasonCode::RequiredFieldMissing,
                "required field `title` missing",
            )
            .await;

        let summary = accountant.finalize().await;
        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(
            summary.failures[0].reason_code,
            ReasonCode::RequiredFieldMissing
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_lose_nothing() {
        let accountant = Arc::new(RunAccountant::new());
        let mut handles = Vec::new();
        for worker in 0..4 {
            let accountant = Arc::clone(&accountant);
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    accountant.record_attempt();
                    accountant
                        .record_failure(
                            format!("https://shop.example.com/p/{worker}-{i}"),
                            ReasonCode::PageAccessFault,
                            "scripted fault",
                        )
                        .await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let summary = accountant.finalize().await;
        assert_eq!(summary.total, 100);
        assert_eq!(summary.failed, 100);
        assert_eq!(summary.failures.len(), 100);
    }
}
