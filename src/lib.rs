pub mod cli;
pub mod dataset;
pub mod decision;
pub mod engine;
pub mod error;
pub mod io_utils;
pub mod mapping;
pub mod mappings_cmd;
pub mod scan;
pub mod session;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

pub use crate::{
    dataset::{Column, Dataset},
    decision::{Decision, DecisionMaker},
    engine::{
        NormalizationReport, SimilarityGroup, find_remaining_groups, integrate_decision,
        normalize, process_column, request_decision,
    },
    mapping::{MappingRecord, MappingStore},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_normalize", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Normalize(args) => session::execute_normalize(&args),
        Commands::Apply(args) => session::execute_apply(&args),
        Commands::Scan(args) => scan::execute(&args),
        Commands::Mappings(args) => mappings_cmd::execute(&args),
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
