//! End-to-end enrichment run: load → match → aggregate → write, per partition.

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, instrument};

use provenance_catalog::ProvenanceCatalog;
use provenance_matcher::{
    ExactKeyIndex, apply_exact_match, apply_partial_matches, exact_match,
    rebuild_prior_provenance, reset_to_single,
};
use provenance_shared::{
    AppConfig, CURRENT_SCHEMA_VERSION, Document, MatchMode, PartitionSummary, ProvenanceError,
    ReferenceRecord, Result, RunId, RunManifest, validate_partitions,
};
use provenance_storage::{
    WriteMode, partition_path, read_documents, read_export_table, read_reference_corpus,
    write_manifest, write_partition,
};

use crate::distributor::Distributor;

/// Which strategy a run uses, with the input it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchSource {
    /// Scan-Match against a labelled reference corpus.
    Scan { reference_corpus: PathBuf },
    /// Exact-Key-Match against an annotator export table.
    Exact { export_table: PathBuf },
}

impl MatchSource {
    pub fn mode(&self) -> MatchMode {
        match self {
            Self::Scan { .. } => MatchMode::Scan,
            Self::Exact { .. } => MatchMode::Exact,
        }
    }
}

/// Configuration for [`run_enrichment`].
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// Directory holding `<partition>.jsonl` target documents.
    pub input_dir: PathBuf,
    /// Directory receiving enriched partitions and `manifest.json`.
    pub output_dir: PathBuf,
    /// Partitions to process, in order.
    pub partitions: Vec<String>,
    pub source: MatchSource,
    /// Worker pool size for Scan-Match.
    pub workers: usize,
    pub write_mode: WriteMode,
}

impl EnrichConfig {
    /// Build a run configuration from the application config.
    pub fn from_app_config(config: &AppConfig) -> Self {
        let paths = &config.paths;
        let enrichment = &config.enrichment;
        let source = match enrichment.mode {
            MatchMode::Scan => MatchSource::Scan {
                reference_corpus: paths.reference_corpus.clone(),
            },
            MatchMode::Exact => MatchSource::Exact {
                export_table: paths.export_table.clone(),
            },
        };
        Self {
            input_dir: paths.input_dir.clone(),
            output_dir: paths.output_dir.clone(),
            partitions: enrichment.partitions.clone(),
            source,
            workers: enrichment.resolve_workers(),
            write_mode: if enrichment.append {
                WriteMode::Append
            } else {
                WriteMode::Overwrite
            },
        }
    }
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called from worker threads each time a Scan-Match shard finishes.
    fn shard_done(&self, partition: &str, finished: usize, total: usize);
    /// Called after a partition file has been written.
    fn partition_written(&self, summary: &PartitionSummary);
    /// Called when the run completes.
    fn done(&self, manifest: &RunManifest);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn shard_done(&self, _partition: &str, _finished: usize, _total: usize) {}
    fn partition_written(&self, _summary: &PartitionSummary) {}
    fn done(&self, _manifest: &RunManifest) {}
}

/// Matching inputs loaded once per run.
enum Prepared {
    Scan {
        records: Vec<ReferenceRecord>,
        distributor: Distributor,
    },
    Exact {
        index: ExactKeyIndex,
    },
}

/// Run the full enrichment.
///
/// 1. Load and validate the reference corpus (or build the export index)
/// 2. For each partition: load, match, aggregate, write atomically
/// 3. Write `manifest.json`
///
/// Stops at the first failing partition. Partitions written before the
/// failure stay on disk; no manifest is written.
#[instrument(skip_all, fields(mode = %config.source.mode(), partitions = config.partitions.len()))]
pub fn run_enrichment(
    config: &EnrichConfig,
    catalog: &ProvenanceCatalog,
    progress: &dyn ProgressReporter,
) -> Result<RunManifest> {
    let start = Instant::now();
    let started_at = Utc::now();
    let run_id = RunId::new();

    validate_partitions(&config.partitions)?;
    if config.workers == 0 {
        return Err(ProvenanceError::config("workers must be a positive integer"));
    }

    info!(%run_id, "starting enrichment run");

    // --- Phase 1: Reference data ---
    progress.phase("Loading reference data");
    let (prepared, skipped_records) = prepare(config, catalog)?;
    let workers = match &prepared {
        Prepared::Scan { distributor, .. } => distributor.workers(),
        Prepared::Exact { .. } => 1,
    };

    // --- Phase 2: Partitions ---
    let mut partitions = Vec::with_capacity(config.partitions.len());
    for name in &config.partitions {
        progress.phase(&format!("Enriching {name}"));
        let summary = enrich_partition(config, name, &prepared, catalog, progress)?;
        progress.partition_written(&summary);
        partitions.push(summary);
    }

    // --- Phase 3: Manifest ---
    progress.phase("Writing manifest");
    let manifest = RunManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        run_id,
        mode: config.source.mode(),
        workers,
        started_at,
        completed_at: Utc::now(),
        skipped_records,
        partitions,
    };
    write_manifest(&config.output_dir, &manifest)?;

    info!(
        run_id = %manifest.run_id,
        partitions = manifest.partitions.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "enrichment run complete"
    );
    progress.done(&manifest);

    Ok(manifest)
}

fn prepare(config: &EnrichConfig, catalog: &ProvenanceCatalog) -> Result<(Prepared, usize)> {
    match &config.source {
        MatchSource::Scan { reference_corpus } => {
            let loaded = read_reference_corpus(reference_corpus)?;
            catalog.validate_records(&loaded.items)?;
            info!(
                records = loaded.items.len(),
                skipped = loaded.skipped,
                "reference corpus validated"
            );
            let distributor = Distributor::new(config.workers)?;
            Ok((
                Prepared::Scan {
                    records: loaded.items,
                    distributor,
                },
                loaded.skipped,
            ))
        }
        MatchSource::Exact { export_table } => {
            let loaded = read_export_table(export_table)?;
            let (index, _stats) = ExactKeyIndex::build(&loaded.items, catalog)?;
            Ok((Prepared::Exact { index }, loaded.skipped))
        }
    }
}

#[instrument(skip_all, fields(partition = %name))]
fn enrich_partition(
    config: &EnrichConfig,
    name: &str,
    prepared: &Prepared,
    catalog: &ProvenanceCatalog,
    progress: &dyn ProgressReporter,
) -> Result<PartitionSummary> {
    let input = partition_path(&config.input_dir, name);
    let mut documents = read_documents(&input, name)?;

    let matches = match prepared {
        Prepared::Scan {
            records,
            distributor,
        } => enrich_scan(name, &mut documents, records, catalog, distributor, progress)?,
        Prepared::Exact { index } => enrich_exact(&mut documents, index, catalog)?,
    };

    let output = partition_path(&config.output_dir, name);
    let written = write_partition(&output, &documents, config.write_mode)?;

    let matched_documents = documents
        .iter()
        .filter(|d| d.provenance().is_set())
        .count();
    info!(
        documents = documents.len(),
        matched_documents, matches, "partition written"
    );

    Ok(PartitionSummary {
        name: name.to_string(),
        documents: documents.len(),
        matched_documents,
        matches,
        output: format!("{name}.jsonl"),
        sha256: written.sha256,
        size_bytes: written.size_bytes,
    })
}

/// Scan-Match one partition across the worker pool and fold the results in.
///
/// Provenance carried by the input is rebuilt from the catalog first, so a
/// prior unknown source fails the partition before any matching. Returns the
/// number of triples appended.
pub fn enrich_scan(
    partition: &str,
    documents: &mut [Document],
    records: &[ReferenceRecord],
    catalog: &ProvenanceCatalog,
    distributor: &Distributor,
    progress: &dyn ProgressReporter,
) -> Result<usize> {
    let rebuilt = rebuild_prior_provenance(documents, catalog)?;
    if rebuilt > 0 {
        debug!(partition = %partition, rebuilt, "prior provenance rebuilt");
    }

    let matches = distributor.scan(partition, documents, records, catalog, &|finished, total| {
        progress.shard_done(partition, finished, total)
    })?;
    apply_partial_matches(documents, matches)
}

/// Exact-Key-Match every document of one partition.
///
/// Documents switch to single-valued provenance and any provenance read from
/// the input is dropped. Returns the number of hits.
pub fn enrich_exact(
    documents: &mut [Document],
    index: &ExactKeyIndex,
    catalog: &ProvenanceCatalog,
) -> Result<usize> {
    let mut hits = 0;
    for document in documents.iter_mut() {
        reset_to_single(document);
        if let Some(triple) = exact_match(document, index, catalog)? {
            apply_exact_match(document, triple);
            hits += 1;
        }
    }
    Ok(hits)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
