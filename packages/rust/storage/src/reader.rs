//! Line-oriented JSONL readers.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use provenance_shared::{Document, ExportRow, ProvenanceError, ReferenceRecord, Result};

/// Rows read from a lenient source, plus how many were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub items: Vec<T>,
    pub skipped: usize,
}

/// Read one partition of target documents.
///
/// Blank lines are ignored. Invalid JSON and records without a non-empty
/// `text` abort the read; `origin` names the partition in the error.
#[instrument(skip_all, fields(path = %path.display(), origin = %origin))]
pub fn read_documents(path: &Path, origin: &str) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for_each_record(path, |index, line_no, line| {
        let value = parse_line(path, line_no, line)?;
        documents.push(Document::from_json(origin, index, value)?);
        Ok(())
    })?;
    debug!(count = documents.len(), "documents loaded");
    Ok(documents)
}

/// Read every record of a JSONL file as raw JSON.
///
/// Blank lines are ignored; invalid JSON aborts the read.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_values(path: &Path) -> Result<Vec<Value>> {
    let mut values = Vec::new();
    for_each_record(path, |_, line_no, line| {
        values.push(parse_line(path, line_no, line)?);
        Ok(())
    })?;
    debug!(count = values.len(), "records loaded");
    Ok(values)
}

/// Read the labelled reference corpus.
///
/// Invalid JSON is fatal. Records without non-empty string `text` and
/// `source` are skipped with a warning. Source identifiers are not checked
/// here.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_reference_corpus(path: &Path) -> Result<Loaded<ReferenceRecord>> {
    let mut loaded = Loaded {
        items: Vec::new(),
        skipped: 0,
    };
    for_each_record(path, |index, line_no, line| {
        let value = parse_line(path, line_no, line)?;
        match parse_reference(&value) {
            Ok(record) => loaded.items.push(record),
            Err(reason) => {
                let err = ProvenanceError::malformed("reference", index, reason);
                warn!(line = line_no, error = %err, "skipping record");
                loaded.skipped += 1;
            }
        }
        Ok(())
    })?;
    debug!(count = loaded.items.len(), skipped = loaded.skipped, "reference corpus loaded");
    Ok(loaded)
}

fn parse_reference(value: &Value) -> std::result::Result<ReferenceRecord, String> {
    let field = |key: &str| match value.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(format!("empty {key}")),
        Some(_) => Err(format!("{key} is not a string")),
        None => Err(format!("missing {key}")),
    };
    Ok(ReferenceRecord {
        text: field("text")?,
        source: field("source")?,
    })
}

/// Read an annotator export table.
///
/// Invalid JSON is fatal. Rows without a string `text`, or with an empty
/// one, are skipped with a warning.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_export_table(path: &Path) -> Result<Loaded<ExportRow>> {
    let mut loaded = Loaded {
        items: Vec::new(),
        skipped: 0,
    };
    for_each_record(path, |index, line_no, line| {
        let value = parse_line(path, line_no, line)?;
        let reason = match serde_json::from_value::<ExportRow>(value) {
            Ok(row) if !row.text.is_empty() => {
                loaded.items.push(row);
                return Ok(());
            }
            Ok(_) => "empty text".to_string(),
            Err(e) => e.to_string(),
        };
        let err = ProvenanceError::malformed("export", index, reason);
        warn!(line = line_no, error = %err, "skipping row");
        loaded.skipped += 1;
        Ok(())
    })?;
    debug!(count = loaded.items.len(), skipped = loaded.skipped, "export table loaded");
    Ok(loaded)
}

fn parse_line(path: &Path, line_no: usize, line: &str) -> Result<Value> {
    serde_json::from_str(line)
        .map_err(|e| ProvenanceError::parse(format!("{}:{line_no}: {e}", path.display())))
}

/// Call `f(record_index, line_number, line)` for every non-blank line.
///
/// `record_index` counts non-blank lines from 0; `line_number` is 1-based.
fn for_each_record<F>(path: &Path, mut f: F) -> Result<()>
where
    F: FnMut(usize, usize, &str) -> Result<()>,
{
    let file = File::open(path).map_err(|e| ProvenanceError::io(path, e))?;
    let mut index = 0;
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| ProvenanceError::io(path, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        f(index, i + 1, line)?;
        index += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "provenance-reader-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn documents_keep_order_and_skip_blank_lines() {
        let tmp = temp_dir();
        let path = write(
            &tmp,
            "train.jsonl",
            "{\"text\": \"hello\", \"tokens\": [\"hello\"]}\n\n{\"text\": \"bye\"}\n",
        );

        let docs = read_documents(&path, "train").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text(), "hello");
        assert!(docs[0].fields().contains_key("tokens"));
        assert_eq!(docs[1].text(), "bye");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn document_without_text_is_fatal() {
        let tmp = temp_dir();
        let path = write(&tmp, "dev.jsonl", "{\"text\": \"ok\"}\n{\"tokens\": []}\n");

        let err = read_documents(&path, "dev").unwrap_err();
        assert_eq!(err.to_string(), "malformed dev record #1: missing text");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn invalid_json_reports_line_number() {
        let tmp = temp_dir();
        let path = write(&tmp, "test.jsonl", "{\"text\": \"ok\"}\n\n{not json\n");

        let err = read_documents(&path, "test").unwrap_err();
        assert!(matches!(err, ProvenanceError::Parse { .. }));
        assert!(err.to_string().contains("test.jsonl:3:"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_partition_file_is_io_error() {
        let tmp = temp_dir();
        let err = read_documents(&tmp.join("absent.jsonl"), "absent").unwrap_err();
        assert!(matches!(err, ProvenanceError::Io { .. }));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn values_are_passed_through_untouched() {
        let tmp = temp_dir();
        let path = write(&tmp, "all.jsonl", "{\"text\": \"a\", \"ents\": [1]}\n\n{\"other\": true}\n");

        let values = read_values(&path).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0]["ents"][0], 1);
        assert_eq!(values[1]["other"], true);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn reference_corpus_skips_malformed_rows() {
        let tmp = temp_dir();
        let path = write(
            &tmp,
            "reference.jsonl",
            concat!(
                "{\"text\": \"bye bye\", \"source\": \"hest\"}\n",
                "{\"text\": \"\", \"source\": \"wiki\"}\n",
                "{\"text\": \"no source\"}\n",
                "[1, 2]\n",
                "{\"text\": \"hello\", \"source\": \"unknown_id\"}\n",
            ),
        );

        let loaded = read_reference_corpus(&path).unwrap();
        assert_eq!(loaded.skipped, 3);
        assert_eq!(
            loaded.items,
            vec![
                ReferenceRecord {
                    text: "bye bye".into(),
                    source: "hest".into()
                },
                ReferenceRecord {
                    text: "hello".into(),
                    source: "unknown_id".into()
                },
            ]
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn reference_corpus_invalid_json_is_fatal() {
        let tmp = temp_dir();
        let path = write(&tmp, "reference.jsonl", "{\"text\": \"a\", \"source\": \"wiki\"}\ngarbage\n");

        let err = read_reference_corpus(&path).unwrap_err();
        assert!(err.to_string().contains("reference.jsonl:2:"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn export_table_skips_empty_text() {
        let tmp = temp_dir();
        let path = write(
            &tmp,
            "export.jsonl",
            concat!(
                "{\"text\": \"hello bye bye\", \"meta\": {\"source\": \"hest\"}}\n",
                "{\"text\": \"\", \"meta\": \"ep\"}\n",
                "{\"text\": \"no meta\"}\n",
            ),
        );

        let loaded = read_export_table(&path).unwrap();
        assert_eq!(loaded.skipped, 1);
        assert_eq!(loaded.items.len(), 2);
        assert_eq!(loaded.items[1].meta, Value::Null);

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
