//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use provenance_catalog::{ProvenanceCatalog, load_catalog_from};
use provenance_core::pipeline::{EnrichConfig, ProgressReporter, run_enrichment};
use provenance_core::split::split_file;
use provenance_shared::{
    AppConfig, MatchMode, PartitionSummary, RunManifest, init_config, load_config,
    load_config_from,
};
use provenance_storage::read_reference_corpus;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Provenance: attach source, domain and source name to annotated documents.
#[derive(Parser)]
#[command(
    name = "provenance",
    version,
    about = "Enrich annotated corpus partitions with source provenance.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.provenance/provenance.toml).
    #[arg(long, global = true, env = "PROVENANCE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Match partitions against the reference data and write enriched JSONL.
    Enrich(EnrichArgs),

    /// Shuffle a document file and split it into train/dev/test.
    Split {
        /// JSONL file holding every annotated document.
        #[arg(long)]
        input: PathBuf,

        /// Shuffle seed (defaults to the configured seed).
        #[arg(long)]
        seed: Option<u64>,

        /// Where to write the partitions (defaults to the configured input dir).
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Inspect the provenance catalog.
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags of `enrich`; each overrides the config file.
#[derive(Args, Debug, Default)]
pub(crate) struct EnrichArgs {
    /// Matching strategy: scan or exact.
    #[arg(long)]
    pub mode: Option<MatchMode>,

    /// Partitions to enrich, comma-separated.
    #[arg(long, value_delimiter = ',')]
    pub partitions: Option<Vec<String>>,

    /// Worker pool size (defaults to available cores minus one).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Append to existing output files instead of replacing them.
    #[arg(long)]
    pub append: bool,

    /// Reference corpus JSONL (scan mode).
    #[arg(long)]
    pub reference: Option<PathBuf>,

    /// Annotator export table JSONL (exact mode).
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Directory holding `<partition>.jsonl` inputs.
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// Directory receiving the enriched partitions.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

/// Catalog subcommands.
#[derive(Subcommand)]
pub(crate) enum CatalogAction {
    /// Print every source with its domain and name.
    List,
    /// Check that every reference record names a known source.
    Validate {
        /// Reference corpus JSONL (defaults to the configured one).
        #[arg(long)]
        reference: Option<PathBuf>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "provenance=info",
        1 => "provenance=debug",
        _ => "provenance=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Enrich(args) => cmd_enrich(config_path, args),
        Command::Split {
            input,
            seed,
            output_dir,
        } => cmd_split(config_path, &input, seed, output_dir),
        Command::Catalog { action } => match action {
            CatalogAction::List => cmd_catalog_list(config_path),
            CatalogAction::Validate { reference } => cmd_catalog_validate(config_path, reference),
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

/// Load the config from `--config` or the default location.
fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

/// The configured catalog file, or the built-in one.
fn load_catalog(config: &AppConfig) -> Result<ProvenanceCatalog> {
    let catalog = match &config.paths.catalog {
        Some(path) => load_catalog_from(path)?,
        None => ProvenanceCatalog::dagw(),
    };
    Ok(catalog)
}

/// Fold `enrich` flags into the file config.
fn apply_enrich_args(config: &mut AppConfig, args: EnrichArgs) {
    if let Some(mode) = args.mode {
        config.enrichment.mode = mode;
    }
    if let Some(partitions) = args.partitions {
        config.enrichment.partitions = partitions;
    }
    if args.workers.is_some() {
        config.enrichment.workers = args.workers;
    }
    if args.append {
        config.enrichment.append = true;
    }
    if let Some(path) = args.reference {
        config.paths.reference_corpus = path;
    }
    if let Some(path) = args.export {
        config.paths.export_table = path;
    }
    if let Some(dir) = args.input_dir {
        config.paths.input_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        config.paths.output_dir = dir;
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_enrich(config_path: Option<&Path>, args: EnrichArgs) -> Result<()> {
    let mut config = load_app_config(config_path)?;
    apply_enrich_args(&mut config, args);
    config.validate()?;

    let catalog = load_catalog(&config)?;
    let enrich = EnrichConfig::from_app_config(&config);

    info!(
        mode = %config.enrichment.mode,
        workers = enrich.workers,
        partitions = ?enrich.partitions,
        "enriching partitions"
    );

    let reporter = CliProgress::new();
    let manifest = match run_enrichment(&enrich, &catalog, &reporter) {
        Ok(manifest) => manifest,
        Err(e) => {
            reporter.spinner.abandon_with_message("enrichment failed");
            return Err(e.into());
        }
    };

    let elapsed = manifest.completed_at - manifest.started_at;
    println!();
    println!("  Enrichment complete!");
    println!("  Run:     {}", manifest.run_id);
    println!("  Mode:    {}", manifest.mode);
    println!("  Workers: {}", manifest.workers);
    if manifest.skipped_records > 0 {
        println!("  Skipped: {} malformed reference rows", manifest.skipped_records);
    }
    for p in &manifest.partitions {
        println!(
            "  {:<8} {:>6} docs, {:>6} matched, {:>6} matches -> {}",
            p.name,
            p.documents,
            p.matched_documents,
            p.matches,
            enrich.output_dir.join(&p.output).display()
        );
    }
    println!(
        "  Time:    {:.1}s",
        elapsed.num_milliseconds() as f64 / 1000.0
    );
    println!();

    Ok(())
}

fn cmd_split(
    config_path: Option<&Path>,
    input: &Path,
    seed: Option<u64>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let config = load_app_config(config_path)?;
    let seed = seed.unwrap_or(config.split.seed);
    let output_dir = output_dir.unwrap_or(config.paths.input_dir);

    info!(input = %input.display(), seed, "splitting documents");
    let summaries = split_file(input, &output_dir, seed)?;

    println!();
    for s in &summaries {
        println!(
            "  {:<6} {:>6} docs -> {}",
            s.name,
            s.documents,
            output_dir.join(&s.output).display()
        );
    }
    println!();
    Ok(())
}

fn cmd_catalog_list(config_path: Option<&Path>) -> Result<()> {
    let config = load_app_config(config_path)?;
    let catalog = load_catalog(&config)?;

    let width = catalog
        .entries()
        .iter()
        .map(|e| e.id.len())
        .max()
        .unwrap_or(0);
    for entry in catalog.entries() {
        println!(
            "{:<width$}  {:<14}  {}",
            entry.id, entry.domain, entry.extended_name
        );
    }
    Ok(())
}

fn cmd_catalog_validate(config_path: Option<&Path>, reference: Option<PathBuf>) -> Result<()> {
    let config = load_app_config(config_path)?;
    let catalog = load_catalog(&config)?;
    let reference = reference.unwrap_or(config.paths.reference_corpus);

    let loaded = read_reference_corpus(&reference)?;
    catalog.validate_records(&loaded.items)?;

    println!(
        "{}: {} records, all sources known ({} malformed rows skipped)",
        reference.display(),
        loaded.items.len(),
        loaded.skipped
    );
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load_app_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn shard_done(&self, partition: &str, finished: usize, total: usize) {
        self.spinner
            .set_message(format!("Scanning {partition} [{finished}/{total} shards]"));
    }

    fn partition_written(&self, summary: &PartitionSummary) {
        self.spinner.println(format!(
            "  wrote {} ({} documents)",
            summary.output, summary.documents
        ));
    }

    fn done(&self, _manifest: &RunManifest) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn enrich_flags_parse() {
        let cli = Cli::try_parse_from([
            "provenance",
            "enrich",
            "--mode",
            "exact",
            "--partitions",
            "train,dev",
            "--workers",
            "4",
            "--append",
        ])
        .unwrap();

        let Command::Enrich(args) = cli.command else {
            panic!("expected enrich");
        };
        assert_eq!(args.mode, Some(MatchMode::Exact));
        assert_eq!(args.partitions, Some(vec!["train".to_string(), "dev".to_string()]));
        assert_eq!(args.workers, Some(4));
        assert!(args.append);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Cli::try_parse_from(["provenance", "enrich", "--mode", "fuzzy"]).is_err());
    }

    #[test]
    fn flags_override_config_values() {
        let mut config = AppConfig::default();
        config.enrichment.workers = Some(2);

        apply_enrich_args(
            &mut config,
            EnrichArgs {
                mode: Some(MatchMode::Exact),
                partitions: Some(vec!["test".into()]),
                output_dir: Some(PathBuf::from("out")),
                ..EnrichArgs::default()
            },
        );

        assert_eq!(config.enrichment.mode, MatchMode::Exact);
        assert_eq!(config.enrichment.partitions, ["test"]);
        assert_eq!(config.enrichment.workers, Some(2));
        assert!(!config.enrichment.append);
        assert_eq!(config.paths.output_dir, PathBuf::from("out"));
        assert_eq!(config.paths.input_dir, AppConfig::default().paths.input_dir);
    }

    #[test]
    fn zero_workers_fails_validation() {
        let mut config = AppConfig::default();
        apply_enrich_args(
            &mut config,
            EnrichArgs {
                workers: Some(0),
                ..EnrichArgs::default()
            },
        );
        assert!(config.validate().is_err());
    }
}
