//! Aggregator: the only place document provenance is mutated.

use provenance_catalog::ProvenanceCatalog;
use provenance_shared::{
    Document, PartialMatch, Provenance, ProvenanceError, ProvenanceLists, ProvenanceTriple, Result,
    UnknownSourceRef,
};

/// Append `triple` to the document's provenance lists unless its source is present.
///
/// A single-valued provenance is first converted to lists, keeping its triple.
/// Returns `true` if the triple was appended.
pub fn apply_scan_match(document: &mut Document, triple: ProvenanceTriple) -> bool {
    let provenance = document.provenance_mut();
    *provenance = match std::mem::take(provenance) {
        Provenance::Single(existing) => {
            let mut lists = ProvenanceLists::default();
            if let Some(prev) = existing {
                lists.push(prev);
            }
            Provenance::Multi(lists)
        }
        multi => multi,
    };

    match provenance {
        Provenance::Multi(lists) => lists.push(triple),
        Provenance::Single(_) => false,
    }
}

/// Overwrite the document's provenance with a single triple.
pub fn apply_exact_match(document: &mut Document, triple: ProvenanceTriple) {
    *document.provenance_mut() = Provenance::Single(Some(triple));
}

/// Clear a document's provenance ahead of Exact-Key-Match.
///
/// Any provenance read from the input is dropped, so only a table hit can
/// give the document a triple.
pub fn reset_to_single(document: &mut Document) {
    *document.provenance_mut() = Provenance::Single(None);
}

/// Rebuild provenance carried over from a previous run from the catalog.
///
/// Only the prior source ids are kept; domains and extended names are looked
/// up again. Every unknown id fails the partition, reported with the index of
/// the first document carrying it.
pub fn rebuild_prior_provenance(
    documents: &mut [Document],
    catalog: &ProvenanceCatalog,
) -> Result<usize> {
    let mut unknown: Vec<UnknownSourceRef> = Vec::new();
    let mut rebuilt = 0;

    for (doc_index, document) in documents.iter_mut().enumerate() {
        let provenance = document.provenance_mut();
        if !provenance.is_set() {
            continue;
        }

        let mut triples = Vec::new();
        for source in provenance.sources() {
            match catalog.triple(source) {
                Ok(triple) => triples.push(triple),
                Err(_) => {
                    if !unknown.iter().any(|u| u.source_id == source) {
                        unknown.push(UnknownSourceRef {
                            source_id: source.to_string(),
                            record_index: Some(doc_index),
                        });
                    }
                }
            }
        }

        *provenance = if matches!(provenance, Provenance::Multi(_)) {
            let mut lists = ProvenanceLists::default();
            for triple in triples {
                lists.push(triple);
            }
            Provenance::Multi(lists)
        } else {
            Provenance::Single(triples.into_iter().next())
        };
        rebuilt += 1;
    }

    if unknown.is_empty() {
        Ok(rebuilt)
    } else {
        Err(ProvenanceError::UnknownSource(unknown))
    }
}

/// Apply worker results onto the authoritative document list.
///
/// Returns the number of triples actually appended.
pub fn apply_partial_matches(documents: &mut [Document], matches: Vec<PartialMatch>) -> Result<usize> {
    let mut applied = 0;
    for PartialMatch { doc_index, triple } in matches {
        let len = documents.len();
        let document = documents.get_mut(doc_index).ok_or_else(|| {
            ProvenanceError::validation(format!(
                "partial match for document #{doc_index} outside partition of {len}"
            ))
        })?;
        if apply_scan_match(document, triple) {
            applied += 1;
        }
    }
    Ok(applied)
}
