//! Application configuration for the provenance engine.
//!
//! User config lives at `~/.provenance/provenance.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ProvenanceError, Result};
use crate::types::MatchMode;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "provenance.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".provenance";

// ---------------------------------------------------------------------------
// Config structs (matching provenance.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Input and output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Matching behaviour.
    #[serde(default)]
    pub enrichment: EnrichmentSettings,

    /// Partition splitting.
    #[serde(default)]
    pub split: SplitConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding one `<partition>.jsonl` of annotated documents per partition.
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Directory receiving the enriched `<partition>.jsonl` files and `manifest.json`.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Reference corpus (JSONL of `{text, source}`), used by Scan-Match.
    #[serde(default = "default_reference_corpus")]
    pub reference_corpus: PathBuf,

    /// Annotator export table (JSONL of `{text, meta}`), used by Exact-Key-Match.
    #[serde(default = "default_export_table")]
    pub export_table: PathBuf,

    /// Optional TOML catalog replacing the built-in one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            reference_corpus: default_reference_corpus(),
            export_table: default_export_table(),
            catalog: None,
        }
    }
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("data/annotated")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_reference_corpus() -> PathBuf {
    PathBuf::from("data/reference.jsonl")
}
fn default_export_table() -> PathBuf {
    PathBuf::from("data/export.jsonl")
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentSettings {
    /// Matching strategy.
    #[serde(default)]
    pub mode: MatchMode,

    /// Partitions to enrich, in order.
    #[serde(default = "default_partitions")]
    pub partitions: Vec<String>,

    /// Worker pool size. Unset means available cores minus one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Append to existing partition files instead of replacing them.
    #[serde(default)]
    pub append: bool,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            mode: MatchMode::default(),
            partitions: default_partitions(),
            workers: None,
            append: false,
        }
    }
}

fn default_partitions() -> Vec<String> {
    vec!["train".into(), "dev".into(), "test".into()]
}

impl EnrichmentSettings {
    /// Configured worker count, or available cores minus one (at least one).
    pub fn resolve_workers(&self) -> usize {
        self.workers.unwrap_or_else(default_worker_count)
    }
}

/// Available cores minus one, never less than one.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// `[split]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Seed for the shuffle preceding the split.
    #[serde(default)]
    pub seed: u64,
}

impl AppConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let enrichment = &self.enrichment;
        if enrichment.workers == Some(0) {
            return Err(ProvenanceError::config("workers must be a positive integer"));
        }
        validate_partitions(&enrichment.partitions)
    }
}

/// Partition names must be non-empty, unique and usable as file stems.
pub fn validate_partitions(partitions: &[String]) -> Result<()> {
    if partitions.is_empty() {
        return Err(ProvenanceError::config("at least one partition is required"));
    }
    let mut seen = HashSet::new();
    for name in partitions {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(ProvenanceError::validation(format!(
                "invalid partition name '{name}'"
            )));
        }
        if !seen.insert(name.as_str()) {
            return Err(ProvenanceError::validation(format!(
                "duplicate partition name '{name}'"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.provenance/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ProvenanceError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.provenance/provenance.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ProvenanceError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ProvenanceError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ProvenanceError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ProvenanceError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ProvenanceError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
