//! # Traversal Budget
//!
//! The one piece of cross-worker mutable state in a run. Claims use
//! single-step compare-and-increment semantics so that concurrent workers
//! cannot collectively overshoot the caps.

use std::sync::atomic::{AtomicU64, Ordering};

/// Caps on total items and page requests for one run, plus the live
/// counters. Created at run start, never reused across runs.
#[derive(Debug)]
pub struct TraversalBudget {
    max_items: Option<u64>,
    max_requests: u64,
    items_claimed: AtomicU64,
    requests_made: AtomicU64,
}

impl TraversalBudget {
    /// Budget with an item cap (`None` = unbounded items) and a request cap.
    #[must_use]
    pub fn new(max_items: Option<u64>, max_requests: u64) -> Self {
        Self {
            max_items,
            max_requests,
            items_claimed: AtomicU64::new(0),
            requests_made: AtomicU64::new(0),
        }
    }

    /// Budget bounded only by request count.
    #[must_use]
    pub fn unbounded_items(max_requests: u64) -> Self {
        Self::new(None, max_requests)
    }

    /// A run may only start with room for at least one request and one item.
    #[must_use]
    pub fn is_startable(&self) -> bool {
        self.max_requests > 0 && self.max_items != Some(0)
    }

    /// Atomically claims one item slot. Check and increment happen as a
    /// single step; returns `false` once the cap is reached.
    pub fn try_claim_item(&self) -> bool {
        self.items_claimed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                match self.max_items {
                    Some(max) if current >= max => None,
                    _ => Some(current + 1),
                }
            })
            .is_ok()
    }

    /// Atomically claims one page request slot.
    pub fn try_claim_request(&self) -> bool {
        self.requests_made
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                if current >= self.max_requests {
                    None
                } else {
                    Some(current + 1)
                }
            })
            .is_ok()
    }

    #[must_use]
    pub fn items_claimed(&self) -> u64 {
        self.items_claimed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn requests_made(&self) -> u64 {
        self.requests_made.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn items_exhausted(&self) -> bool {
        matches!(self.max_items, Some(max) if self.items_claimed() >= max)
    }

    #[must_use]
    pub fn requests_exhausted(&self) -> bool {
        self.requests_made() >= self.max_requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn zero_budget_is_not_startable() {
        assert!(!TraversalBudget::new(Some(10), 0).is_startable());
        assert!(!TraversalBudget::new(Some(0), 10).is_startable());
        assert!(TraversalBudget::new(None, 10).is_startable());
    }

    #[test]
    fn item_claims_stop_at_cap() {
        let budget = TraversalBudget::new(Some(3), 100);
        assert!(budget.try_claim_item());
        assert!(budget.try_claim_item());
        assert!(budget.try_claim_item());
        assert!(!budget.try_claim_item());
        assert_eq!(budget.items_claimed(), 3);
        assert!(budget.items_exhausted());
    }

    #[test]
    fn unbounded_items_never_exhaust() {
        let budget = TraversalBudget::unbounded_items(5);
        for _ in 0..1000 {
            assert!(budget.try_claim_item());
        }
        assert!(!budget.items_exhausted());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_claims_never_overshoot() {
        let budget = Arc::new(TraversalBudget::new(Some(10), 1000));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let budget = Arc::clone(&budget);
            handles.push(tokio::spawn(async move {
                let mut claimed = 0u64;
                for _ in 0..100 {
                    if budget.try_claim_item() {
                        claimed += 1;
                    }
                }
                claimed
            }));
        }

        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }
        assert_eq!(total, 10);
        assert_eq!(budget.items_claimed(), 10);
    }
}
