//! Result aggregation.
//!
//! Consolidates per-item CSV artifacts into the directory-wide summaries.

pub mod aggregator;

pub use aggregator::*;
