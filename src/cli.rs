use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::mapping::DEFAULT_MAPPINGS_FILE;

pub const MAPPINGS_ENV: &str = "CSV_NORMALIZE_MAPPINGS";

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Find near-duplicate values in CSV columns and remember the canonical choice",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply stored mappings, resolve new anomalies, and save the decisions
    Normalize(NormalizeArgs),
    /// Apply stored mappings only, without asking for new decisions
    Apply(ApplyArgs),
    /// Report anomalies that stored mappings do not yet cover
    Scan(ScanArgs),
    /// List the stored mapping records
    Mappings(MappingsArgs),
}

#[derive(Debug, Args)]
pub struct MappingStoreArgs {
    /// Mapping table remembered across runs
    #[arg(long = "mappings", env = MAPPINGS_ENV, default_value = DEFAULT_MAPPINGS_FILE)]
    pub mappings: PathBuf,
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input CSV file (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding for the output file/stdout (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub output: OutputArgs,
    #[command(flatten)]
    pub store: MappingStoreArgs,
    /// Restrict the anomaly scan to these columns (comma-separated, repeatable)
    #[arg(short = 'C', long = "columns", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub columns: Vec<String>,
    /// Choose canonical values automatically instead of prompting
    #[arg(long = "auto", value_enum)]
    pub auto: Option<AutoPolicy>,
    /// Show this many rows before and after normalization
    #[arg(long, default_value_t = 0)]
    pub preview: usize,
    /// Do not write new decisions to the mapping table
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub output: OutputArgs,
    #[command(flatten)]
    pub store: MappingStoreArgs,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub store: MappingStoreArgs,
    /// Restrict the scan to these columns (comma-separated, repeatable)
    #[arg(short = 'C', long = "columns", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub columns: Vec<String>,
    /// Emit the report as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct MappingsArgs {
    #[command(flatten)]
    pub store: MappingStoreArgs,
    /// Only list records for these columns (comma-separated, repeatable)
    #[arg(short = 'C', long = "columns", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub columns: Vec<String>,
}

/// Unattended choice of the canonical member.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum AutoPolicy {
    /// The member held by the most cells (earliest on ties)
    MostFrequent,
    /// The member that appears first in the column
    FirstSeen,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

/// Trims entries and drops empties, as produced by `-C a,,b`.
pub fn column_selection(columns: &[String]) -> Option<Vec<String>> {
    let selected = columns
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string())
        .collect::<Vec<_>>();
    if selected.is_empty() {
        None
    } else {
        Some(selected)
    }
}
