//! Provenance CLI: attach source metadata to annotated corpus partitions.
//!
//! Matches annotated documents against a labelled reference corpus (or an
//! annotator export table) and writes enriched JSONL partitions.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
