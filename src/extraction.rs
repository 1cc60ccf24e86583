//! # Extraction Engine
//!
//! Evaluates selector strategies against a page through the page-access
//! contract and composes per-field results into records. Field-level
//! misses are typed absences, never errors; only hard collaborator
//! faults propagate.

pub mod extractor;
pub mod post_process;
pub mod rule_engine;

pub use extractor::{FieldExtractor, PricingRules};
pub use rule_engine::{MatchSet, ProbeEvaluation, ProbeTrace, RuleEngine};
