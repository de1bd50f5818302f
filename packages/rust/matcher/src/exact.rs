//! Exact-Key-Match: text equality lookup in a table built from an annotator export.

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;
use tracing::{info, instrument, warn};

use provenance_catalog::ProvenanceCatalog;
use provenance_shared::{
    Document, ExportRow, ProvenanceError, ProvenanceTriple, Result, UnknownSourceRef,
};

// ---------------------------------------------------------------------------
// Source detection
// ---------------------------------------------------------------------------

/// A source id must not continue a longer word on its left.
const LEADING_DELIMITER: &str = r"(?:^|[^A-Za-z0-9_])";

/// Characters accepted right after a source id in a metadata payload.
const TRAILING_DELIMITER: &str = r#"(?:["',:;)\]}]|\s|$)"#;

/// Finds the catalog source a metadata payload refers to.
///
/// An object whose `source` field is a catalog id names that source outright.
/// Otherwise a source is detected when its id, standing on its own and
/// followed by a delimiter, appears in the payload's textual form. Ids are
/// tried in catalog order and the first hit wins.
pub struct SourceDetector {
    patterns: Vec<(String, Regex)>,
}

impl SourceDetector {
    pub fn new(catalog: &ProvenanceCatalog) -> Result<Self> {
        let patterns = catalog
            .entries()
            .iter()
            .map(|entry| {
                let pattern = format!(
                    "{LEADING_DELIMITER}{}{TRAILING_DELIMITER}",
                    regex::escape(&entry.id)
                );
                Regex::new(&pattern)
                    .map(|re| (entry.id.clone(), re))
                    .map_err(|e| ProvenanceError::validation(format!("catalog id '{}': {e}", entry.id)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Detect the source named in `meta`, if any.
    pub fn detect(&self, meta: &Value) -> Option<&str> {
        if let Some(named) = meta.get("source").and_then(Value::as_str) {
            if let Some((id, _)) = self.patterns.iter().find(|(id, _)| id == named) {
                return Some(id.as_str());
            }
        }

        let rendered;
        let text = match meta {
            Value::Null => return None,
            Value::String(s) => s.as_str(),
            other => {
                rendered = other.to_string();
                rendered.as_str()
            }
        };
        self.patterns
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(id, _)| id.as_str())
    }
}

// ---------------------------------------------------------------------------
// ExactKeyIndex
// ---------------------------------------------------------------------------

/// Counters reported while building an [`ExactKeyIndex`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Rows read from the export table.
    pub rows: usize,
    /// Rows whose source could not be determined and were dropped.
    pub undetermined: usize,
    /// Rows that replaced an earlier row with the same text (last write wins).
    pub overwritten: usize,
}

/// `text -> source id` dictionary for O(1) lookups.
///
/// Ambiguous texts (the same text with different sources in the export) keep
/// the last row's source; this is reported through [`IndexStats::overwritten`]
/// and not resolved.
#[derive(Debug, Clone, Default)]
pub struct ExactKeyIndex {
    map: HashMap<String, String>,
}

impl ExactKeyIndex {
    /// Build the index from export rows, keeping rows whose source is detected.
    #[instrument(skip_all, fields(rows = rows.len()))]
    pub fn build(rows: &[ExportRow], catalog: &ProvenanceCatalog) -> Result<(Self, IndexStats)> {
        let detector = SourceDetector::new(catalog)?;
        let mut index = Self::default();
        let mut stats = IndexStats {
            rows: rows.len(),
            ..IndexStats::default()
        };

        for row in rows {
            match detector.detect(&row.meta) {
                Some(source) => {
                    if index.map.insert(row.text.clone(), source.to_string()).is_some() {
                        stats.overwritten += 1;
                    }
                }
                None => stats.undetermined += 1,
            }
        }

        if stats.undetermined > 0 {
            warn!(count = stats.undetermined, "export rows without a recognisable source dropped");
        }
        if stats.overwritten > 0 {
            warn!(count = stats.overwritten, "duplicate export texts, last row wins");
        }
        info!(entries = index.len(), "exact-key index built");

        Ok((index, stats))
    }

    /// Build the index from explicit `(text, source)` pairs.
    ///
    /// Every source must be a catalog id.
    pub fn from_pairs<I, T, S>(pairs: I, catalog: &ProvenanceCatalog) -> Result<Self>
    where
        I: IntoIterator<Item = (T, S)>,
        T: Into<String>,
        S: Into<String>,
    {
        let mut map = HashMap::new();
        let mut unknown: Vec<UnknownSourceRef> = Vec::new();
        for (i, (text, source)) in pairs.into_iter().enumerate() {
            let source = source.into();
            if !catalog.contains(&source) {
                unknown.push(UnknownSourceRef {
                    source_id: source,
                    record_index: Some(i),
                });
                continue;
            }
            map.insert(text.into(), source);
        }
        if !unknown.is_empty() {
            return Err(ProvenanceError::UnknownSource(unknown));
        }
        Ok(Self { map })
    }

    pub fn lookup(&self, text: &str) -> Option<&str> {
        self.map.get(text).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Look up `document` in `index` and resolve the hit through the catalog.
pub fn exact_match(
    document: &Document,
    index: &ExactKeyIndex,
    catalog: &ProvenanceCatalog,
) -> Result<Option<ProvenanceTriple>> {
    index
        .lookup(document.text())
        .map(|source| catalog.triple(source))
        .transpose()
}
