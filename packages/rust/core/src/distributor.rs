//! Work distributor: fans reference-corpus shards out to a fixed worker pool.
//!
//! Every worker borrows the same read-only view of the partition's documents
//! and the catalog, scans its own contiguous slice of reference records and
//! returns [`PartialMatch`]es. Nothing is mutated until the coordinator folds
//! the merged results into the documents.

use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, instrument};

use provenance_catalog::ProvenanceCatalog;
use provenance_matcher::scan_shard;
use provenance_shared::{Document, PartialMatch, ProvenanceError, ReferenceRecord, Result};

/// A fixed-size pool of named worker threads.
pub struct Distributor {
    workers: usize,
    pool: rayon::ThreadPool,
}

impl Distributor {
    /// Build a pool with `workers` threads. Zero workers is a config error.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(ProvenanceError::config("workers must be a positive integer"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("provenance-worker-{i}"))
            .build()
            .map_err(|e| ProvenanceError::config(format!("failed to start worker pool: {e}")))?;
        Ok(Self { workers, pool })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Scan every document of `partition` against every reference record.
    ///
    /// Returns once all shards finished, with their matches concatenated in
    /// shard order. `on_shard_done(finished, total)` is called from worker
    /// threads as shards complete and runs under the same panic guard as the
    /// scan itself. The first failing shard (in shard order)
    /// is reported as [`ProvenanceError::WorkerFailure`].
    #[instrument(skip_all, fields(partition = %partition, documents = documents.len(), records = records.len()))]
    pub fn scan(
        &self,
        partition: &str,
        documents: &[Document],
        records: &[ReferenceRecord],
        catalog: &ProvenanceCatalog,
        on_shard_done: &(dyn Fn(usize, usize) + Sync),
    ) -> Result<Vec<PartialMatch>> {
        let shards = plan_shards(records.len(), self.workers);
        let total = shards.len();
        let finished = AtomicUsize::new(0);

        let results: Vec<Result<Vec<PartialMatch>>> = self.pool.install(|| {
            shards
                .par_iter()
                .enumerate()
                .map(|(shard, range)| {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<Vec<PartialMatch>> {
                        let matches = scan_shard(documents, &records[range.clone()], catalog)?;
                        let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
                        on_shard_done(done, total);
                        Ok(matches)
                    }));
                    let result = match outcome {
                        Ok(Ok(matches)) => Ok(matches),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(payload) => Err(panic_message(payload.as_ref())),
                    };
                    result.map_err(|message| ProvenanceError::WorkerFailure {
                        partition: partition.to_string(),
                        shard,
                        message,
                    })
                })
                .collect()
        });

        let mut merged = Vec::new();
        for result in results {
            merged.extend(result?);
        }
        debug!(shards = total, matches = merged.len(), "shards merged");
        Ok(merged)
    }
}

/// Split `len` records into at most `workers` contiguous, non-empty ranges
/// whose sizes differ by at most one.
pub fn plan_shards(len: usize, workers: usize) -> Vec<Range<usize>> {
    let count = workers.min(len);
    if count == 0 {
        return Vec::new();
    }
    let base = len / count;
    let extra = len % count;

    let mut shards = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let size = base + usize::from(i < extra);
        shards.push(start..start + size);
        start += size;
    }
    shards
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("worker panicked: {s}")
    } else {
        "worker panicked".to_string()
    }
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
    fn zero_workers_is_config_error() {
        let err = Distributor::new(0).err().expect("must fail");
        assert!(matches!(err, ProvenanceError::Config { .. }));
    }

    #[test]
    fn shards_are_contiguous_and_balanced() {
        let shards = plan_shards(10, 3);
        assert_eq!(shards, vec![0..4, 4..7, 7..10]);

        assert_eq!(plan_shards(2, 4), vec![0..1, 1..2]);
        assert!(plan_shards(0, 4).is_empty());

        for (len, workers) in [(1, 1), (7, 7), (100, 6), (5, 2)] {
            let shards = plan_shards(len, workers);
            let sizes: Vec<usize> = shards.iter().map(|r| r.len()).collect();
            let max = sizes.iter().max().copied().unwrap();
            let min = sizes.iter().min().copied().unwrap();
            assert!(max - min <= 1);
            assert!(min > 0);
            assert_eq!(sizes.iter().sum::<usize>(), len);
            assert_eq!(shards.last().unwrap().end, len);
        }
    }

    #[test]
    fn scan_merges_in_shard_order() {
        let catalog = ProvenanceCatalog::dagw();
        let documents = vec![Document::new("hello"), Document::new("bye")];
        let records = vec![
            record("hello world", "wiki"),
            record("bye bye", "hest"),
            record("say hello", "ep"),
            record("nothing", "ft"),
        ];

        let distributor = Distributor::new(3).unwrap();
        let calls = AtomicUsize::new(0);
        let matches = distributor
            .scan("train", &documents, &records, &catalog, &|_, total| {
                assert_eq!(total, 3);
                calls.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();

        let found: Vec<(usize, &str)> = matches
            .iter()
            .map(|m| (m.doc_index, m.triple.source.as_str()))
            .collect();
        assert_eq!(found, [(0, "wiki"), (1, "hest"), (0, "ep")]);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
        // Workers only read.
        assert!(documents.iter().all(|d| !d.provenance().is_set()));
        assert_eq!(documents[0].provenance(), &Provenance::default());
    }

    #[test]
    fn result_does_not_depend_on_worker_count() {
        let catalog = ProvenanceCatalog::dagw();
        let documents = vec![Document::new("a"), Document::new("b")];
        let records: Vec<ReferenceRecord> = ["wiki", "ep", "ft", "hest", "cc"]
            .iter()
            .map(|s| record("a b", s))
            .collect();

        let expected = Distributor::new(1)
            .unwrap()
            .scan("dev", &documents, &records, &catalog, &|_, _| {})
            .unwrap();
        for workers in 2..=6 {
            let got = Distributor::new(workers)
                .unwrap()
                .scan("dev", &documents, &records, &catalog, &|_, _| {})
                .unwrap();
            assert_eq!(got, expected);
        }
    }

    #[test]
    fn shard_error_becomes_worker_failure() {
        let catalog = ProvenanceCatalog::dagw();
        let documents = vec![Document::new("x")];
        let records = vec![record("x", "wiki"), record("x", "unknown_id")];

        let err = Distributor::new(2)
            .unwrap()
            .scan("test", &documents, &records, &catalog, &|_, _| {})
            .unwrap_err();
        match err {
            ProvenanceError::WorkerFailure { partition, shard, .. } => {
                assert_eq!(partition, "test");
                assert_eq!(shard, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn worker_panic_becomes_worker_failure() {
        let catalog = ProvenanceCatalog::dagw();
        let documents = vec![Document::new("x")];
        let records = vec![record("x", "wiki")];

        let err = Distributor::new(1)
            .unwrap()
            .scan("train", &documents, &records, &catalog, &|_, _| panic!("progress sink broke"))
            .unwrap_err();
        assert!(matches!(err, ProvenanceError::WorkerFailure { .. }));
    }
}
