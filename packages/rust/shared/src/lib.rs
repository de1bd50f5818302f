//! Shared types, error model, and configuration for the provenance engine.
//!
//! This crate is the foundation depended on by all other provenance crates.
//! It provides:
//! - [`ProvenanceError`]: the unified error type
//! - Domain types ([`Document`], [`ReferenceRecord`], [`ProvenanceTriple`], [`RunManifest`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EnrichmentSettings, PathsConfig, SplitConfig, config_dir, config_file_path,
    default_worker_count, init_config, load_config, load_config_from, validate_partitions,
};
pub use error::{ProvenanceError, Result, UnknownSourceRef};
pub use types::{
    CURRENT_SCHEMA_VERSION, Document, ExportRow, MatchMode, PartialMatch, PartitionSummary, Provenance,
    ProvenanceLists, ProvenanceTriple, ReferenceRecord, RunId, RunManifest,
};
