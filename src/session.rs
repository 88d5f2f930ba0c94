//! One normalization session: read the dataset, load remembered decisions,
//! resolve what is left, persist the decisions, and write the result.

use std::{
    io::{self, Write},
    path::Path,
};

use anyhow::{Context, Result, bail};
use log::{info, warn};

use crate::{
    cli::{self, ApplyArgs, InputArgs, NormalizeArgs, OutputArgs},
    dataset::Dataset,
    decision::TerminalPrompt,
    engine::{self, NormalizationReport},
    io_utils,
    mapping::MappingStore,
    printable_delimiter, table,
};

pub struct LoadedInput {
    pub dataset: Dataset,
    pub delimiter: u8,
}

pub fn load_input(args: &InputArgs) -> Result<LoadedInput> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Reading '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );
    let reader = io_utils::open_csv_reader_from_path(&args.input, delimiter, true)?;
    let dataset = Dataset::from_csv_reader(reader, encoding)
        .with_context(|| format!("Reading dataset from {:?}", args.input))?;
    info!(
        "Loaded {} row(s) across {} column(s)",
        dataset.row_count(),
        dataset.columns().len()
    );
    Ok(LoadedInput { dataset, delimiter })
}

pub fn load_store(path: &Path) -> Result<MappingStore> {
    let store =
        MappingStore::load(path).with_context(|| format!("Loading mappings from {path:?}"))?;
    info!("Loaded {} stored mapping(s) from {path:?}", store.len());
    Ok(store)
}

/// Serializes `dataset` with the output delimiter and encoding; fails on
/// values the output encoding cannot represent.
pub fn encode_output(dataset: &Dataset, args: &OutputArgs, input_delimiter: u8) -> Result<Vec<u8>> {
    let delimiter = io_utils::resolve_output_delimiter(
        args.output.as_deref(),
        args.output_delimiter,
        input_delimiter,
    );
    let encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    let utf8 = dataset
        .to_csv_bytes(delimiter)
        .context("Serializing normalized dataset")?;
    let text = std::str::from_utf8(&utf8).context("Output is not valid UTF-8")?;
    io_utils::encode_text(text, encoding)
}

pub fn write_output(bytes: &[u8], rows: usize, args: &OutputArgs) -> Result<()> {
    io_utils::write_output(args.output.as_deref(), bytes)?;
    info!(
        "Wrote {rows} row(s) to {}",
        io_utils::describe_destination(args.output.as_deref())
    );
    Ok(())
}

pub fn execute_normalize(args: &NormalizeArgs) -> Result<()> {
    if args.auto.is_none() && io_utils::is_dash(&args.input.input) {
        bail!("Prompts read answers from stdin, so the input must be a file; pass --auto to read data from stdin");
    }
    let LoadedInput {
        mut dataset,
        delimiter,
    } = load_input(&args.input)?;
    let mut store = load_store(&args.store.mappings)?;
    let csv_on_stdout = args
        .output
        .output
        .as_deref()
        .is_none_or(io_utils::is_dash);

    if args.preview > 0 {
        show_preview("Data preview", &dataset, args.preview, csv_on_stdout)?;
    }

    let selection = cli::column_selection(&args.columns);
    let report = match args.auto {
        Some(mut policy) => {
            info!("Choosing canonical values automatically ({policy:?})");
            engine::normalize(&mut dataset, &mut store, selection.as_deref(), &mut policy)
        }
        None => {
            let mut prompt = TerminalPrompt::new(io::stdin().lock(), io::stderr());
            engine::normalize(&mut dataset, &mut store, selection.as_deref(), &mut prompt)
        }
    }
    .context("Normalizing dataset")?;
    log_report(&report);
    // An unencodable value must fail the run before the store is saved.
    let output = encode_output(&dataset, &args.output, delimiter)?;

    if args.dry_run {
        info!(
            "Dry run: {} new mapping(s) not written to {:?}",
            report.records_added(),
            args.store.mappings
        );
    } else {
        store
            .save(&args.store.mappings)
            .with_context(|| format!("Saving mappings to {:?}", args.store.mappings))?;
        info!(
            "Saved {} mapping(s) to {:?}",
            store.effective_len(),
            args.store.mappings
        );
    }

    if args.preview > 0 {
        show_preview("Modified data", &dataset, args.preview, csv_on_stdout)?;
    }
    write_output(&output, dataset.row_count(), &args.output)
}

pub fn execute_apply(args: &ApplyArgs) -> Result<()> {
    let LoadedInput {
        mut dataset,
        delimiter,
    } = load_input(&args.input)?;
    let store = load_store(&args.store.mappings)?;
    let changed = store.apply(&mut dataset);
    info!("Stored mappings rewrote {changed} cell(s)");
    let output = encode_output(&dataset, &args.output, delimiter)?;
    write_output(&output, dataset.row_count(), &args.output)
}

fn log_report(report: &NormalizationReport) {
    info!(
        "Stored mappings rewrote {} cell(s); {} anomaly group(s) found, {} new mapping(s)",
        report.applied_cells,
        report.groups_found(),
        report.records_added()
    );
    for outcome in report.columns.iter().filter(|outcome| outcome.groups_found > 0) {
        info!(
            "Column '{}': {} integrated, {} skipped, {} cell(s) rewritten",
            outcome.column, outcome.integrated, outcome.skipped, outcome.cells_rewritten
        );
    }
    if report.aborted {
        warn!(
            "Stopped early; {} group(s) left for the next run",
            report.skipped()
        );
    }
}

fn show_preview(title: &str, dataset: &Dataset, rows: usize, to_stderr: bool) -> Result<()> {
    let rendered = format!(
        "{title}:\n{}",
        table::render_dataset_preview(dataset, rows)
    );
    if to_stderr {
        io::stderr()
            .write_all(rendered.as_bytes())
            .context("Writing preview")
    } else {
        io::stdout()
            .write_all(rendered.as_bytes())
            .context("Writing preview")
    }
}
