//! JSONL storage layer for partitions, reference corpora and export tables.
//!
//! Reading is strict for target documents (any malformed record aborts the
//! partition) and lenient for the reference corpus and the export table
//! (malformed rows are skipped with a warning and counted).
//!
//! Writing is atomic: output goes to a hidden `.{name}.tmp` sibling which is
//! renamed over the target once complete, so a failed run never leaves a
//! half-written partition behind.

mod reader;
mod writer;

pub use reader::{Loaded, read_documents, read_export_table, read_reference_corpus, read_values};
pub use writer::{
    MANIFEST_FILE_NAME, WriteMode, WrittenFile, partition_path, write_manifest, write_partition,
};
