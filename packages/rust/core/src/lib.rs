//! Run orchestration for provenance enrichment.
//!
//! This crate ties the catalog, the matchers and the storage layer together:
//! the [`distributor`] fans Scan-Match work out to a worker pool, the
//! [`pipeline`] drives a whole run partition by partition, and [`split`]
//! produces the partitions in the first place.

pub mod distributor;
pub mod pipeline;
pub mod split;

pub use distributor::{Distributor, plan_shards};
pub use pipeline::{
    EnrichConfig, MatchSource, ProgressReporter, SilentProgress, enrich_exact, enrich_scan,
    run_enrichment,
};
pub use split::{Split, split_file, split_records};
