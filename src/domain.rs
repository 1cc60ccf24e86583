//! # Domain Model
//!
//! Core value types for the extraction engine: probes and selector
//! strategies, field specifications, traversal budgets, pagination state
//! and run summaries. Everything here is plain data; no type in this
//! module holds a reference to a live page.

pub mod budget;
pub mod field;
pub mod pagination;
pub mod selector;
pub mod summary;

pub use budget::TraversalBudget;
pub use field::{
    ExtractionResult, FieldDiagnostic, FieldSpec, FieldValue, MatchPolicy, PostProcess,
    ProbeOutcome, ValueSource,
};
pub use pagination::{PaginationState, TerminationReason};
pub use selector::{Probe, SelectorStrategy, StrategyError};
pub use summary::{FailureRecord, ReasonCode, RunSummary};
