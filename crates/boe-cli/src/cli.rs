//! Argument parsing for the `boe-ingest` binary.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Thin wrapper around the ingestion pipeline: accepts law ids, runs a
/// batch, and prints the aggregate result.
#[derive(Debug, Parser)]
#[command(name = "boe-ingest", version, about = "BOE legal document ingestion pipeline")]
pub struct Cli {
    /// Law ids to ingest (e.g. BOE-A-2000-1234). May be combined with
    /// `--ids-file`.
    pub law_ids: Vec<String>,

    /// File with one law id per line, in addition to any positional ids.
    #[arg(long)]
    pub ids_file: Option<PathBuf>,

    /// Output format for the final batch result.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Use deterministic fake embedding vectors instead of a real provider.
    #[arg(long)]
    pub simulate_embeddings: bool,

    /// Skip the embed stage entirely.
    #[arg(long)]
    pub skip_embeddings: bool,

    /// Verbose logging (debug level).
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

impl Cli {
    /// Union of positional ids and `--ids-file` entries, in order, with
    /// blank lines and duplicates from the file dropped.
    pub fn resolve_law_ids(&self) -> anyhow::Result<Vec<String>> {
        let mut ids = self.law_ids.clone();
        if let Some(path) = &self.ids_file {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("failed to read --ids-file {}: {e}", path.display()))?;
            for line in contents.lines() {
                let line = line.trim();
                if !line.is_empty() {
                    ids.push(line.to_string());
                }
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::Cli;

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_positional_ids_and_flags() {
        let cli = Cli::parse_from(["boe-ingest", "BOE-A-1", "BOE-A-2", "--simulate-embeddings"]);
        assert_eq!(cli.law_ids, vec!["BOE-A-1", "BOE-A-2"]);
        assert!(cli.simulate_embeddings);
    }
}
