//! Provenance catalog: source identifier → domain category and display name.
//!
//! The catalog is an immutable value injected into the matcher and the
//! pipeline. [`ProvenanceCatalog::dagw`] provides the built-in Danish
//! Gigaword table; [`load_catalog_from`] reads a replacement from TOML.

mod dagw;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use provenance_shared::{
    ProvenanceError, ProvenanceTriple, ReferenceRecord, Result, UnknownSourceRef,
};

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Short source identifier (e.g. `wiki`).
    pub id: String,
    /// Domain category (e.g. `Wiki & Books`).
    pub domain: String,
    /// Human-readable source name (e.g. `Wikipedia`).
    pub extended_name: String,
}

/// TOML layout accepted by [`load_catalog_from`].
#[derive(Debug, Deserialize)]
struct CatalogFile {
    sources: Vec<CatalogEntry>,
}

/// Ordered, immutable mapping over the set of valid source identifiers.
#[derive(Debug, Clone)]
pub struct ProvenanceCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl ProvenanceCatalog {
    /// Build a catalog from ordered entries.
    ///
    /// Rejects an empty entry list, empty identifiers and duplicate identifiers.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(ProvenanceError::validation("catalog has no entries"));
        }

        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if entry.id.trim().is_empty() {
                return Err(ProvenanceError::validation(format!(
                    "catalog entry #{i} has an empty id"
                )));
            }
            if index.insert(entry.id.clone(), i).is_some() {
                return Err(ProvenanceError::validation(format!(
                    "duplicate catalog id '{}'",
                    entry.id
                )));
            }
        }

        Ok(Self { entries, index })
    }

    /// The built-in Danish Gigaword catalog (24 sources).
    pub fn dagw() -> Self {
        let entries = dagw::entries();
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.id.clone(), i))
            .collect();
        Self { entries, index }
    }

    fn entry(&self, id: &str) -> Result<&CatalogEntry> {
        self.index
            .get(id)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| ProvenanceError::unknown_source(id))
    }

    pub fn domain_of(&self, id: &str) -> Result<&str> {
        Ok(&self.entry(id)?.domain)
    }

    pub fn extended_name_of(&self, id: &str) -> Result<&str> {
        Ok(&self.entry(id)?.extended_name)
    }

    /// The full provenance triple for a source identifier.
    pub fn triple(&self, id: &str) -> Result<ProvenanceTriple> {
        let entry = self.entry(id)?;
        Ok(ProvenanceTriple {
            source: entry.id.clone(),
            domain: entry.domain.clone(),
            source_extended: entry.extended_name.clone(),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Entries in catalog order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that every record's `source` resolves.
    ///
    /// Fails with [`ProvenanceError::UnknownSource`] listing each unknown
    /// identifier once, together with the index of the first record naming it.
    #[instrument(skip_all, fields(records = records.len()))]
    pub fn validate_records(&self, records: &[ReferenceRecord]) -> Result<()> {
        let mut unknown: Vec<UnknownSourceRef> = Vec::new();
        for (i, record) in records.iter().enumerate() {
            if self.contains(&record.source)
                || unknown.iter().any(|u| u.source_id == record.source)
            {
                continue;
            }
            unknown.push(UnknownSourceRef {
                source_id: record.source.clone(),
                record_index: Some(i),
            });
        }

        if unknown.is_empty() {
            debug!("all reference sources resolve");
            Ok(())
        } else {
            Err(ProvenanceError::UnknownSource(unknown))
        }
    }
}

impl Default for ProvenanceCatalog {
    fn default() -> Self {
        Self::dagw()
    }
}

/// Load a catalog from a TOML file of `[[sources]]` tables.
pub fn load_catalog_from(path: &Path) -> Result<ProvenanceCatalog> {
    let content = std::fs::read_to_string(path).map_err(|e| ProvenanceError::io(path, e))?;
    parse_catalog(&content)
        .map_err(|e| ProvenanceError::parse(format!("{}: {e}", path.display())))
        .and_then(ProvenanceCatalog::new)
}

fn parse_catalog(content: &str) -> std::result::Result<Vec<CatalogEntry>, toml::de::Error> {
    toml::from_str::<CatalogFile>(content).map(|file| file.sources)
}
