//! Seeded train/dev/test split of one annotated document file.

use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde_json::Value;
use tracing::{info, instrument};

use provenance_shared::{PartitionSummary, Result};
use provenance_storage::{WriteMode, partition_path, read_values, write_partition};

/// Records of one split, in output order.
#[derive(Debug, Clone, PartialEq)]
pub struct Split<T> {
    pub train: Vec<T>,
    pub dev: Vec<T>,
    pub test: Vec<T>,
}

impl<T> Split<T> {
    /// `(name, records)` pairs in the order they are written.
    pub fn partitions(&self) -> [(&'static str, &[T]); 3] {
        [
            ("train", self.train.as_slice()),
            ("dev", self.dev.as_slice()),
            ("test", self.test.as_slice()),
        ]
    }
}

/// Shuffle `records` with a seeded RNG and cut them into three partitions.
///
/// A tenth is `len / 100 * 10` (whole hundreds only): `test` gets the first
/// tenth, `dev` the second and `train` everything else. The same seed always
/// yields the same split.
pub fn split_records<T>(mut records: Vec<T>, seed: u64) -> Split<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    records.shuffle(&mut rng);

    let tenth = records.len() / 100 * 10;
    let train = records.split_off(tenth * 2);
    let dev = records.split_off(tenth);
    Split {
        train,
        dev,
        test: records,
    }
}

/// Split the JSONL file at `input` into `{output_dir}/{train,dev,test}.jsonl`.
///
/// Records are passed through untouched.
#[instrument(skip_all, fields(input = %input.display(), seed = seed))]
pub fn split_file(input: &Path, output_dir: &Path, seed: u64) -> Result<Vec<PartitionSummary>> {
    let records: Vec<Value> = read_values(input)?;
    let total = records.len();
    let split = split_records(records, seed);

    let mut summaries = Vec::with_capacity(3);
    for (name, records) in split.partitions() {
        let written = write_partition(
            &partition_path(output_dir, name),
            records,
            WriteMode::Overwrite,
        )?;
        summaries.push(PartitionSummary {
            name: name.to_string(),
            documents: records.len(),
            matched_documents: 0,
            matches: 0,
            output: format!("{name}.jsonl"),
            sha256: written.sha256,
            size_bytes: written.size_bytes,
        });
    }

    info!(
        total,
        train = split.train.len(),
        dev = split.dev.len(),
        test = split.test.len(),
        "split written"
    );
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "provenance-split-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn tenth_is_whole_hundreds() {
        let split = split_records((0..250).collect::<Vec<u32>>(), 0);
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.dev.len(), 20);
        assert_eq!(split.train.len(), 210);

        // Fewer than a hundred records all go to train.
        let small = split_records((0..99).collect::<Vec<u32>>(), 0);
        assert!(small.test.is_empty());
        assert!(small.dev.is_empty());
        assert_eq!(small.train.len(), 99);
    }

    #[test]
    fn split_is_a_seeded_permutation() {
        let a = split_records((0..300).collect::<Vec<u32>>(), 7);
        let b = split_records((0..300).collect::<Vec<u32>>(), 7);
        assert_eq!(a, b);

        let all: HashSet<u32> = a
            .train
            .iter()
            .chain(&a.dev)
            .chain(&a.test)
            .copied()
            .collect();
        assert_eq!(all.len(), 300);

        let c = split_records((0..300).collect::<Vec<u32>>(), 8);
        assert_ne!(a, c);
    }

    #[test]
    fn split_file_writes_three_partitions() {
        let tmp = temp_dir();
        let input = tmp.join("all.jsonl");
        let lines: Vec<String> = (0..100)
            .map(|i| format!(r#"{{"text": "doc {i}", "ents": []}}"#))
            .collect();
        std::fs::write(&input, lines.join("\n")).unwrap();

        let summaries = split_file(&input, &tmp.join("out"), 0).unwrap();
        let sizes: Vec<(&str, usize)> = summaries
            .iter()
            .map(|s| (s.name.as_str(), s.documents))
            .collect();
        assert_eq!(sizes, [("train", 80), ("dev", 10), ("test", 10)]);

        let dev = std::fs::read_to_string(tmp.join("out/dev.jsonl")).unwrap();
        assert_eq!(dev.lines().count(), 10);
        let first: Value = serde_json::from_str(dev.lines().next().unwrap()).unwrap();
        assert!(first.get("ents").is_some());
        assert!(first.get("source").is_none());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
