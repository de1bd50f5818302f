//! Scan-Match: literal substring containment against reference records.

use std::collections::HashSet;

use tracing::{trace, warn};

use provenance_catalog::ProvenanceCatalog;
use provenance_shared::{Document, PartialMatch, ProvenanceTriple, ReferenceRecord, Result};

/// Whether `needle` occurs as a contiguous substring of `haystack`.
///
/// Both strings are compared literally; pattern metacharacters carry no meaning.
pub fn contains_literal(haystack: &str, needle: &str) -> bool {
    needle.len() <= haystack.len() && haystack.contains(needle)
}

/// Decide whether `document` matches `record`.
///
/// A match requires the document text to be a literal substring of the
/// record text and the record's source to be absent from the document's
/// accumulated sources. Returns the triple to attach; never mutates.
pub fn scan_match(
    document: &Document,
    record: &ReferenceRecord,
    catalog: &ProvenanceCatalog,
) -> Result<Option<ProvenanceTriple>> {
    if document.text().is_empty() {
        warn!("empty target text matches everything, skipping");
        return Ok(None);
    }
    if !contains_literal(&record.text, document.text()) {
        return Ok(None);
    }
    if document.provenance().contains_source(&record.source) {
        return Ok(None);
    }
    catalog.triple(&record.source).map(Some)
}

/// Run Scan-Match for every (record, document) pair of one shard.
///
/// Matches are returned in record order, then document order, with at most
/// one match per (document, source) pair.
pub fn scan_shard(
    documents: &[Document],
    shard: &[ReferenceRecord],
    catalog: &ProvenanceCatalog,
) -> Result<Vec<PartialMatch>> {
    let candidates: Vec<usize> = documents
        .iter()
        .enumerate()
        .filter(|(_, doc)| !doc.text().is_empty())
        .map(|(i, _)| i)
        .collect();
    if candidates.len() < documents.len() {
        warn!(
            skipped = documents.len() - candidates.len(),
            "documents with empty text excluded from scan"
        );
    }

    let mut seen: HashSet<(usize, &str)> = HashSet::new();
    let mut matches = Vec::new();

    for record in shard {
        for &doc_index in &candidates {
            if seen.contains(&(doc_index, record.source.as_str())) {
                continue;
            }
            if let Some(triple) = scan_match(&documents[doc_index], record, catalog)? {
                trace!(doc_index, source = %triple.source, "scan match");
                seen.insert((doc_index, record.source.as_str()));
                matches.push(PartialMatch { doc_index, triple });
            }
        }
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use provenance_shared::Provenance;

    fn record(text: &str, source: &str) -> ReferenceRecord {
        ReferenceRecord {
            text: text.into(),
            source: source.into(),
        }
    }

    #[test]
    fn substring_matches_and_yields_triple() {
        let catalog = ProvenanceCatalog::dagw();
        let doc = Document::new("hello my name is kenneth");
        let rec = record("...hello my name is kenneth...", "wiki");

        let triple = scan_match(&doc, &rec, &catalog).unwrap().expect("match");
        assert_eq!(triple.source, "wiki");
        assert_eq!(triple.domain, "Wiki & Books");
        assert_eq!(triple.source_extended, "Wikipedia");
    }

    #[test]
    fn metacharacters_are_literal() {
        let catalog = ProvenanceCatalog::dagw();
        let doc = Document::new("a.b*(c)?");
        assert!(scan_match(&doc, &record("xx a.b*(c)? yy", "ep"), &catalog).unwrap().is_some());
        assert!(scan_match(&doc, &record("xx aXbbb(c) yy", "ep"), &catalog).unwrap().is_none());

        let doc = Document::new("[x]");
        assert!(scan_match(&doc, &record("x", "ep"), &catalog).unwrap().is_none());
        assert!(contains_literal("^$\\d+", "\\d"));
    }

    #[test]
    fn longer_target_never_matches() {
        assert!(!contains_literal("short", "much longer text"));
        assert!(contains_literal("same", "same"));
    }

    #[test]
    fn no_match_without_containment() {
        let catalog = ProvenanceCatalog::dagw();
        let doc = Document::new("xyz123");
        assert!(scan_match(&doc, &record("hello world", "wiki"), &catalog).unwrap().is_none());
    }

    #[test]
    fn already_attached_source_is_not_matched_again() {
        let catalog = ProvenanceCatalog::dagw();
        let mut doc = Document::new("hello");
        if let Provenance::Multi(lists) = doc.provenance_mut() {
            lists.push(catalog.triple("wiki").unwrap());
        }
        assert!(scan_match(&doc, &record("hello there", "wiki"), &catalog).unwrap().is_none());
        assert!(scan_match(&doc, &record("hello there", "ep"), &catalog).unwrap().is_some());
    }

    #[test]
    fn empty_target_is_rejected() {
        let catalog = ProvenanceCatalog::dagw();
        let doc = Document::new("");
        assert!(scan_match(&doc, &record("anything", "wiki"), &catalog).unwrap().is_none());
    }

    #[test]
    fn unknown_source_surfaces_on_match_only() {
        let catalog = ProvenanceCatalog::dagw();
        let doc = Document::new("hello");
        assert!(scan_match(&doc, &record("hello", "unknown_id"), &catalog).is_err());
        assert!(scan_match(&doc, &record("bye", "unknown_id"), &catalog).unwrap().is_none());
    }

    #[test]
    fn shard_dedupes_per_document_and_source() {
        let catalog = ProvenanceCatalog::dagw();
        let documents = vec![
            Document::new("hello my name is kenneth"),
            Document::new("xyz123"),
            Document::new("bye bye"),
        ];
        let shard = vec![
            record("hello my name is kenneth and bye bye", "wiki"),
            record("again: hello my name is kenneth", "wiki"),
            record("bye bye said the parliament", "ep"),
        ];

        let matches = scan_shard(&documents, &shard, &catalog).unwrap();
        let pairs: Vec<(usize, &str)> = matches
            .iter()
            .map(|m| (m.doc_index, m.triple.source.as_str()))
            .collect();
        assert_eq!(pairs, [(0, "wiki"), (2, "wiki"), (2, "ep")]);
    }

    #[test]
    fn shard_skips_empty_documents() {
        let catalog = ProvenanceCatalog::dagw();
        let documents = vec![Document::new(""), Document::new("b")];
        let matches = scan_shard(&documents, &[record("abc", "cc")], &catalog).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].doc_index, 1);
    }
}
