//! Dashboard analysis.
//!
//! Filtering and aggregation over triage log records.

pub mod aggregator;

pub use aggregator::*;
