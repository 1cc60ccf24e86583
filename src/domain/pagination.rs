//! # Pagination State
//!
//! Observable state of one listing's pagination, mutated exclusively by
//! the pagination controller across successive steps and terminal once
//! `terminated` is set.

use serde::{Deserialize, Serialize};

/// Structural cause recorded when pagination stops. Not an error; a
/// normal termination reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The load-more control is gone or no longer interactable.
    NoMoreControl,
    /// Content stopped growing within the bounded wait.
    NoGrowth,
    /// The hard step ceiling was reached.
    BudgetExceeded,
}

impl TerminationReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoMoreControl => "no_more_control",
            Self::NoGrowth => "no_growth",
            Self::BudgetExceeded => "budget_exceeded",
        }
    }
}

/// Pagination progress for one listing page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaginationState {
    /// Item count observed after the most recent step.
    pub last_observed_count: u64,
    /// Content extent observed after the most recent step.
    pub last_observed_extent: u64,
    /// Number of steps that produced growth.
    pub steps_taken: u32,
    pub terminated: bool,
    pub termination_reason: Option<TerminationReason>,
}

impl PaginationState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful growth step.
    pub fn record_growth(&mut self, count: u64, extent: u64) {
        debug_assert!(!self.terminated, "growth recorded on terminated state");
        self.last_observed_count = count;
        self.last_observed_extent = extent;
        self.steps_taken += 1;
    }

    /// Marks the state terminal. The first reason wins; later calls are
    /// ignored.
    pub fn terminate(&mut self, reason: TerminationReason) {
        if !self.terminated {
            self.terminated = true;
            self.termination_reason = Some(reason);
        }
    }
}
