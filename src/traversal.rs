//! # Traversal Runtime
//!
//! Orchestrates listing-to-detail expansion: pagination on listing
//! pages, link collection and deduplication, a bounded worker pool for
//! detail extraction, and append-only run accounting.

pub mod accounting;
pub mod coordinator;

pub use accounting::RunAccountant;
pub use coordinator::{
    EngineError, ExtractionPlan, TraversalCoordinator, record_channel, run_extraction,
};
