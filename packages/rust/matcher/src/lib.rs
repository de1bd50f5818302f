//! Matching strategies and the aggregator.
//!
//! This crate provides:
//! - [`scan`]: Scan-Match, literal substring containment (multi-valued)
//! - [`exact`]: Exact-Key-Match, text lookup in an export-derived index (single-valued)
//! - [`aggregate`]: the only code that mutates document provenance

pub mod aggregate;
pub mod exact;
pub mod scan;

pub use aggregate::{
    apply_exact_match, apply_partial_matches, apply_scan_match, rebuild_prior_provenance,
    reset_to_single,
};
pub use exact::{ExactKeyIndex, IndexStats, SourceDetector, exact_match};
pub use scan::{contains_literal, scan_match, scan_shard};
