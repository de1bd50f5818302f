//! Atomic JSONL and manifest writers.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use provenance_shared::{ProvenanceError, Result, RunManifest};

/// File name of the run manifest inside the output directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// How an existing partition file is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the file.
    #[default]
    Overwrite,
    /// Keep existing lines and add the new documents after them.
    Append,
}

/// Checksum and size of a file after it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: u64,
}

/// `{dir}/{partition}.jsonl`
pub fn partition_path(dir: &Path, partition: &str) -> PathBuf {
    dir.join(format!("{partition}.jsonl"))
}

/// Write `documents` as JSON Lines to `path`, one record per line.
///
/// The target only changes once every line has been written. In
/// [`WriteMode::Append`] the existing content is carried over first.
#[instrument(skip_all, fields(path = %path.display(), documents = documents.len(), mode = ?mode))]
pub fn write_partition<T: Serialize>(
    path: &Path,
    documents: &[T],
    mode: WriteMode,
) -> Result<WrittenFile> {
    write_atomically(path, |writer, temp| {
        if mode == WriteMode::Append && path.exists() {
            copy_existing(path, writer)?;
        }
        for document in documents {
            serde_json::to_writer(&mut *writer, document).map_err(|e| {
                ProvenanceError::validation(format!("JSON serialization failed: {e}"))
            })?;
            writer.write_all(b"\n").map_err(|e| ProvenanceError::io(temp, e))?;
        }
        Ok(())
    })?;

    let written = checksum(path)?;
    debug!(size = written.size_bytes, sha256 = %written.sha256, "wrote partition");
    Ok(written)
}

/// Write the run manifest to `{dir}/manifest.json` (pretty-printed).
pub fn write_manifest(dir: &Path, manifest: &RunManifest) -> Result<PathBuf> {
    let path = dir.join(MANIFEST_FILE_NAME);
    write_json(&path, manifest)?;
    Ok(path)
}

fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).map_err(|e| {
        ProvenanceError::validation(format!("JSON serialization failed: {e}"))
    })?;
    write_atomically(path, |writer, temp| {
        writer
            .write_all(json.as_bytes())
            .and_then(|()| writer.write_all(b"\n"))
            .map_err(|e| ProvenanceError::io(temp, e))
    })?;
    debug!(path = %path.display(), "wrote JSON file");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fill a hidden `.{name}.tmp` sibling of `path`, then rename it over `path`.
///
/// The temp file is removed if anything fails.
fn write_atomically<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>, &Path) -> Result<()>,
{
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            ProvenanceError::validation(format!("invalid output path '{}'", path.display()))
        })?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| ProvenanceError::io(&dir, e))?;
    let temp = dir.join(format!(".{file_name}.tmp"));

    let result = (|| {
        let file = File::create(&temp).map_err(|e| ProvenanceError::io(&temp, e))?;
        let mut writer = BufWriter::new(file);
        fill(&mut writer, &temp)?;
        writer.flush().map_err(|e| ProvenanceError::io(&temp, e))?;
        drop(writer);
        std::fs::rename(&temp, path).map_err(|e| ProvenanceError::io(path, e))
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&temp);
    }
    result
}

/// Copy `path` into `writer`, terminating a last line that lacks a newline.
fn copy_existing(path: &Path, writer: &mut BufWriter<File>) -> Result<()> {
    let io_err = |e| ProvenanceError::io(path, e);
    let mut existing = File::open(path).map_err(io_err)?;
    let len = existing.metadata().map_err(io_err)?.len();
    if len == 0 {
        return Ok(());
    }

    let mut last = [0u8; 1];
    existing.seek(SeekFrom::End(-1)).map_err(io_err)?;
    existing.read_exact(&mut last).map_err(io_err)?;
    existing.seek(SeekFrom::Start(0)).map_err(io_err)?;

    std::io::copy(&mut existing, writer).map_err(io_err)?;
    if last[0] != b'\n' {
        writer.write_all(b"\n").map_err(io_err)?;
    }
    Ok(())
}

fn checksum(path: &Path) -> Result<WrittenFile> {
    let mut file = File::open(path).map_err(|e| ProvenanceError::io(path, e))?;
    let mut hasher = Sha256::new();
    let size_bytes =
        std::io::copy(&mut file, &mut hasher).map_err(|e| ProvenanceError::io(path, e))?;
    Ok(WrittenFile {
        path: path.to_path_buf(),
        sha256: format!("{:x}", hasher.finalize()),
        size_bytes,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
