//! Core domain types for provenance enrichment.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::error::{ProvenanceError, Result};

/// Current schema version for the run manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Output key holding the matched source identifier(s).
pub const SOURCE_KEY: &str = "source";
/// Output key holding the domain categor(y/ies).
pub const DOMAIN_KEY: &str = "domain";
/// Output key holding the human-readable source name(s).
pub const SOURCE_EXTENDED_KEY: &str = "source_extended";

const PROVENANCE_KEYS: [&str; 3] = [SOURCE_KEY, DOMAIN_KEY, SOURCE_EXTENDED_KEY];

// ---------------------------------------------------------------------------
// ProvenanceTriple
// ---------------------------------------------------------------------------

/// Provenance attached to a document for one matched source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProvenanceTriple {
    /// Short source identifier (e.g. `wiki`).
    pub source: String,
    /// Domain category of the source (e.g. `Wiki & Books`).
    pub domain: String,
    /// Human-readable source name (e.g. `Wikipedia`).
    pub source_extended: String,
}

// ---------------------------------------------------------------------------
// ProvenanceLists
// ---------------------------------------------------------------------------

/// Multi-valued provenance: three index-aligned lists without duplicate sources.
///
/// The lists are only reachable through [`ProvenanceLists::push`], which keeps
/// them the same length and rejects sources that are already present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvenanceLists {
    source: Vec<String>,
    domain: Vec<String>,
    source_extended: Vec<String>,
}

impl ProvenanceLists {
    /// Rebuild lists from previously serialized values.
    ///
    /// Returns `None` if the three lists differ in length. Repeated sources
    /// keep their first occurrence.
    pub fn from_lists(
        source: Vec<String>,
        domain: Vec<String>,
        source_extended: Vec<String>,
    ) -> Option<Self> {
        if source.len() != domain.len() || source.len() != source_extended.len() {
            return None;
        }
        let mut lists = Self::default();
        for ((source, domain), source_extended) in source.into_iter().zip(domain).zip(source_extended)
        {
            lists.push(ProvenanceTriple {
                source,
                domain,
                source_extended,
            });
        }
        Some(lists)
    }

    /// Append `triple` in lockstep unless its source is already present.
    /// Returns `true` if the triple was appended.
    pub fn push(&mut self, triple: ProvenanceTriple) -> bool {
        if self.contains_source(&triple.source) {
            return false;
        }
        self.source.push(triple.source);
        self.domain.push(triple.domain);
        self.source_extended.push(triple.source_extended);
        true
    }

    pub fn contains_source(&self, source: &str) -> bool {
        self.source.iter().any(|s| s == source)
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn sources(&self) -> &[String] {
        &self.source
    }

    pub fn domains(&self) -> &[String] {
        &self.domain
    }

    pub fn extended_names(&self) -> &[String] {
        &self.source_extended
    }
}

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// The mutable provenance part of a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// Scan-Match accumulation: every matching source, de-duplicated.
    Multi(ProvenanceLists),
    /// Exact-Key-Match result: at most one triple.
    Single(Option<ProvenanceTriple>),
}

impl Default for Provenance {
    fn default() -> Self {
        Self::Multi(ProvenanceLists::default())
    }
}

impl Provenance {
    /// Whether a source identifier is already attached.
    pub fn contains_source(&self, source: &str) -> bool {
        match self {
            Self::Multi(lists) => lists.contains_source(source),
            Self::Single(triple) => triple.as_ref().is_some_and(|t| t.source == source),
        }
    }

    /// Whether any provenance is attached.
    pub fn is_set(&self) -> bool {
        match self {
            Self::Multi(lists) => !lists.is_empty(),
            Self::Single(triple) => triple.is_some(),
        }
    }

    /// All attached source identifiers, in insertion order.
    pub fn sources(&self) -> Vec<&str> {
        match self {
            Self::Multi(lists) => lists.sources().iter().map(String::as_str).collect(),
            Self::Single(triple) => triple.iter().map(|t| t.source.as_str()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// An annotated target document.
///
/// `text` identifies the document together with its position in the
/// partition. `fields` are passed through to the output untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    text: String,
    fields: Map<String, Value>,
    provenance: Provenance,
}

impl Document {
    /// A document with only a text and empty Multi provenance.
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_fields(text, Map::new())
    }

    /// A document with pass-through fields and empty Multi provenance.
    pub fn with_fields(text: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            text: text.into(),
            fields,
            provenance: Provenance::default(),
        }
    }

    /// Build a document from one parsed JSON record.
    ///
    /// `text` must be a non-empty string. Provenance keys left by a previous
    /// run are lifted into [`Provenance`] so a second pass stays de-duplicated.
    /// Only the source ids of a lifted value are meaningful; the matcher
    /// rebuilds the rest from the catalog.
    pub fn from_json(origin: &str, index: usize, value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(ProvenanceError::malformed(origin, index, "record is not a JSON object"));
        };

        let text = match fields.shift_remove("text") {
            Some(Value::String(text)) if !text.is_empty() => text,
            Some(Value::String(_)) => {
                return Err(ProvenanceError::malformed(origin, index, "empty text"));
            }
            Some(_) => {
                return Err(ProvenanceError::malformed(origin, index, "text is not a string"));
            }
            None => return Err(ProvenanceError::malformed(origin, index, "missing text")),
        };

        let provenance = lift_prior_provenance(origin, index, &mut fields);

        Ok(Self {
            text,
            fields,
            provenance,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn provenance_mut(&mut self) -> &mut Provenance {
        &mut self.provenance
    }
}

/// Remove provenance keys from `fields`, rebuilding them as [`Provenance`].
fn lift_prior_provenance(origin: &str, index: usize, fields: &mut Map<String, Value>) -> Provenance {
    let prior: Vec<Option<Value>> = PROVENANCE_KEYS
        .iter()
        .map(|key| fields.shift_remove(*key))
        .collect();

    match prior.as_slice() {
        [None, None, None] => Provenance::default(),
        [Some(Value::Array(s)), Some(Value::Array(d)), Some(Value::Array(e))] => {
            let lists = (string_list(s), string_list(d), string_list(e));
            match lists {
                (Some(s), Some(d), Some(e)) => match ProvenanceLists::from_lists(s, d, e) {
                    Some(lists) => Provenance::Multi(lists),
                    None => {
                        warn!(origin, index, "prior provenance lists differ in length, discarding");
                        Provenance::default()
                    }
                },
                _ => {
                    warn!(origin, index, "prior provenance lists hold non-strings, discarding");
                    Provenance::default()
                }
            }
        }
        [Some(Value::String(s)), Some(Value::String(d)), Some(Value::String(e))] => {
            Provenance::Single(Some(ProvenanceTriple {
                source: s.clone(),
                domain: d.clone(),
                source_extended: e.clone(),
            }))
        }
        _ => {
            warn!(origin, index, "incomplete prior provenance fields, discarding");
            Provenance::default()
        }
    }
}

fn string_list(values: &[Value]) -> Option<Vec<String>> {
    values
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("text", &self.text)?;
        for (key, value) in &self.fields {
            if key == "text" || PROVENANCE_KEYS.contains(&key.as_str()) {
                continue;
            }
            map.serialize_entry(key, value)?;
        }
        match &self.provenance {
            Provenance::Multi(lists) => {
                map.serialize_entry(SOURCE_KEY, lists.sources())?;
                map.serialize_entry(DOMAIN_KEY, lists.domains())?;
                map.serialize_entry(SOURCE_EXTENDED_KEY, lists.extended_names())?;
            }
            Provenance::Single(Some(triple)) => {
                map.serialize_entry(SOURCE_KEY, &triple.source)?;
                map.serialize_entry(DOMAIN_KEY, &triple.domain)?;
                map.serialize_entry(SOURCE_EXTENDED_KEY, &triple.source_extended)?;
            }
            Provenance::Single(None) => {}
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// ReferenceRecord / ExportRow / PartialMatch
// ---------------------------------------------------------------------------

/// One labelled record of the reference corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub text: String,
    pub source: String,
}

/// One row of an annotator export table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub text: String,
    /// Free-form metadata expected to mention one source identifier.
    #[serde(default)]
    pub meta: Value,
}

/// A match found by a worker, applied later by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialMatch {
    /// Position of the matched document within its partition.
    pub doc_index: usize,
    pub triple: ProvenanceTriple,
}

// ---------------------------------------------------------------------------
// MatchMode
// ---------------------------------------------------------------------------

/// Which matching strategy a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Substring scan against the reference corpus (multi-valued).
    #[default]
    Scan,
    /// Exact text lookup in an annotator export table (single-valued).
    Exact,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::Exact => "exact",
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "scan" => Ok(Self::Scan),
            "exact" => Ok(Self::Exact),
            other => Err(format!("unknown match mode '{other}': expected 'scan' or 'exact'")),
        }
    }
}

// ---------------------------------------------------------------------------
// RunId / RunManifest
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one enrichment run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The `manifest.json` written next to the partition outputs of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub run_id: RunId,
    pub mode: MatchMode,
    /// Worker pool size (1 for Exact-Key-Match, which runs inline).
    pub workers: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Reference records (or export rows) skipped as malformed.
    pub skipped_records: usize,
    pub partitions: Vec<PartitionSummary>,
}

/// Outcome of enriching and writing one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSummary {
    pub name: String,
    pub documents: usize,
    /// Documents with at least one attached source.
    pub matched_documents: usize,
    /// Triples applied by the aggregator.
    pub matches: usize,
    /// Output file name, relative to the output directory.
    pub output: String,
    pub sha256: String,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn triple(source: &str) -> ProvenanceTriple {
        ProvenanceTriple {
            source: source.into(),
            domain: format!("{source}-domain"),
            source_extended: format!("{source}-name"),
        }
    }

    #[test]
    fn lists_reject_duplicate_sources() {
        let mut lists = ProvenanceLists::default();
        assert!(lists.push(triple("wiki")));
        assert!(!lists.push(triple("wiki")));
        assert!(lists.push(triple("ep")));
        assert_eq!(lists.sources(), ["wiki", "ep"]);
        assert_eq!(lists.domains().len(), 2);
        assert_eq!(lists.extended_names().len(), 2);
    }

    #[test]
    fn from_lists_requires_equal_lengths() {
        assert!(ProvenanceLists::from_lists(vec!["a".into()], vec![], vec![]).is_none());
        let lists = ProvenanceLists::from_lists(
            vec!["a".into(), "a".into()],
            vec!["x".into(), "x".into()],
            vec!["y".into(), "y".into()],
        )
        .expect("aligned");
        assert_eq!(lists.len(), 1);
    }

    #[test]
    fn document_from_json_keeps_fields_in_order() {
        let doc = Document::from_json(
            "target document",
            0,
            json!({"ents": [1, 2], "text": "hej", "tokens": []}),
        )
        .expect("valid document");
        assert_eq!(doc.text(), "hej");
        let keys: Vec<&str> = doc.fields().keys().map(String::as_str).collect();
        assert_eq!(keys, ["ents", "tokens"]);
        assert!(!doc.provenance().is_set());
    }

    #[test]
    fn document_from_json_rejects_missing_or_empty_text() {
        let err = Document::from_json("target document", 7, json!({"ents": []})).unwrap_err();
        assert!(err.to_string().contains("#7"));
        assert!(err.to_string().contains("missing text"));

        let err = Document::from_json("target document", 1, json!({"text": ""})).unwrap_err();
        assert!(err.to_string().contains("empty text"));

        let err = Document::from_json("target document", 2, json!(["text"])).unwrap_err();
        assert!(matches!(err, ProvenanceError::MalformedRecord { index: 2, .. }));
    }

    #[test]
    fn document_from_json_lifts_prior_lists() {
        let doc = Document::from_json(
            "target document",
            0,
            json!({
                "text": "hej",
                "source": ["wiki"],
                "domain": ["Wiki & Books"],
                "source_extended": ["Wikipedia"],
            }),
        )
        .unwrap();
        assert!(doc.provenance().contains_source("wiki"));
        assert!(doc.fields().is_empty());
    }

    #[test]
    fn serialize_multi_puts_provenance_last() {
        let mut fields = Map::new();
        fields.insert("ents".into(), json!([]));
        let mut doc = Document::with_fields("hello", fields);
        if let Provenance::Multi(lists) = doc.provenance_mut() {
            lists.push(triple("wiki"));
        }
        let line = serde_json::to_string(&doc).unwrap();
        assert_eq!(
            line,
            r#"{"text":"hello","ents":[],"source":["wiki"],"domain":["wiki-domain"],"source_extended":["wiki-name"]}"#
        );
    }

    #[test]
    fn serialize_single_unset_omits_provenance() {
        let mut doc = Document::new("hello");
        *doc.provenance_mut() = Provenance::Single(None);
        assert_eq!(serde_json::to_string(&doc).unwrap(), r#"{"text":"hello"}"#);

        *doc.provenance_mut() = Provenance::Single(Some(triple("hest")));
        let value: Value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["source"], "hest");
        assert_eq!(value["domain"], "hest-domain");
    }

    #[test]
    fn match_mode_parses() {
        assert_eq!("scan".parse::<MatchMode>().unwrap(), MatchMode::Scan);
        assert_eq!("exact".parse::<MatchMode>().unwrap(), MatchMode::Exact);
        assert!("fuzzy".parse::<MatchMode>().is_err());
    }

    #[test]
    fn run_id_display_roundtrip() {
        let id = RunId::new();
        let parsed = Uuid::parse_str(&id.to_string()).expect("uuid");
        assert_eq!(id.0, parsed);
    }
}
