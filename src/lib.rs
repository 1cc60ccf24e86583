//! # Harvester
//!
//! A resilient, polymorphic web-extraction engine: selector strategies
//! with ordered fallback probes, a field extractor with cross-field
//! validation, a pagination state machine for load-more and infinite
//! scroll listings, and a budget-bounded traversal coordinator that
//! expands listing pages into detail records.
//!
//! The engine is a library. Browser management, network transport and
//! HTML parsing live behind the [`page::PageAccess`] and
//! [`page::PageProvider`] contracts; callers receive accepted records
//! through a streaming channel and a final [`domain::RunSummary`].

// Module declarations
pub mod domain;
pub mod extraction;
pub mod infrastructure;
pub mod page;
pub mod pagination;
pub mod traversal;

// Re-export the primary API surface
pub use domain::{
    ExtractionResult, FieldSpec, FieldValue, MatchPolicy, PaginationState, Probe, ReasonCode,
    RunSummary, SelectorStrategy, TerminationReason, TraversalBudget,
};
pub use extraction::{FieldExtractor, PricingRules, RuleEngine};
pub use infrastructure::{EngineConfig, init_logging, init_logging_with_config};
pub use page::{LoadSignal, NodeHandle, PageAccess, PageError, PageProvider};
pub use pagination::{PaginationController, PaginationProbes};
pub use traversal::{
    EngineError, ExtractionPlan, RunAccountant, TraversalCoordinator, record_channel,
    run_extraction,
};
