//! Error types for the provenance engine.
//!
//! Library crates use [`ProvenanceError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::fmt;
use std::path::PathBuf;

/// Top-level error type for all provenance operations.
#[derive(Debug, thiserror::Error)]
pub enum ProvenanceError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// One or more source identifiers are not present in the catalog.
    #[error("unknown source identifier(s): {}", UnknownSourceList(.0))]
    UnknownSource(Vec<UnknownSourceRef>),

    /// A record is missing a required field or has an empty text.
    #[error("malformed {origin} record #{index}: {reason}")]
    MalformedRecord {
        origin: String,
        index: usize,
        reason: String,
    },

    /// A worker failed while matching one shard of the reference corpus.
    #[error("worker failure in partition '{partition}', shard {shard}: {message}")]
    WorkerFailure {
        partition: String,
        shard: usize,
        message: String,
    },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON or TOML input could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Data validation error (catalog definition, partition names, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ProvenanceError>;

/// An unknown source identifier and, when known, the first record naming it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSourceRef {
    pub source_id: String,
    pub record_index: Option<usize>,
}

struct UnknownSourceList<'a>(&'a [UnknownSourceRef]);

impl fmt::Display for UnknownSourceList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, unknown) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "'{}'", unknown.source_id)?;
            if let Some(index) = unknown.record_index {
                write!(f, " (record #{index})")?;
            }
        }
        Ok(())
    }
}

impl ProvenanceError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a malformed-record error for the record at `index` of `origin`.
    pub fn malformed(origin: impl Into<String>, index: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            origin: origin.into(),
            index,
            reason: reason.into(),
        }
    }

    /// A single unknown source id, without record context.
    pub fn unknown_source(source_id: impl Into<String>) -> Self {
        Self::UnknownSource(vec![UnknownSourceRef {
            source_id: source_id.into(),
            record_index: None,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ProvenanceError::config("workers must be positive");
        assert_eq!(err.to_string(), "config error: workers must be positive");

        let err = ProvenanceError::malformed("target document", 3, "missing text");
        assert_eq!(
            err.to_string(),
            "malformed target document record #3: missing text"
        );
    }

    #[test]
    fn unknown_source_lists_every_id() {
        let err = ProvenanceError::UnknownSource(vec![
            UnknownSourceRef {
                source_id: "unknown_id".into(),
                record_index: Some(4),
            },
            UnknownSourceRef {
                source_id: "other".into(),
                record_index: None,
            },
        ]);
        assert_eq!(
            err.to_string(),
            "unknown source identifier(s): 'unknown_id' (record #4), 'other'"
        );
    }

    #[test]
    fn worker_failure_reports_shard() {
        let err = ProvenanceError::WorkerFailure {
            partition: "dev".into(),
            shard: 2,
            message: "boom".into(),
        };
        assert!(err.to_string().contains("shard 2"));
        assert!(err.to_string().contains("'dev'"));
    }
}
