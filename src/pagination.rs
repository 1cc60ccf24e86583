//! # Pagination Runtime
//!
//! The state machine driving listing-page growth: repeated load-more
//! activation or scroll-based content extension, with structural
//! termination detection and a hard step ceiling.

pub mod controller;

pub use controller::{PaginationController, PaginationProbes};
