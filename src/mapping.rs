//! Durable table of remembered canonical choices.
//!
//! The store is an append-only log of [`MappingRecord`]s keyed by
//! `(column, original_value)`. It is loaded once per session, extended in
//! memory as decisions are made, and flushed once at the end.
//!
//! ## Precedence
//!
//! Duplicate keys are tolerated in memory and on disk, but the most recently
//! written record wins. [`MappingStore::save`] collapses duplicates so the file
//! holds at most one record per key.
//!
//! ## Chains
//!
//! [`MappingStore::apply`] makes one left-to-right pass over the effective
//! records. A record `a -> b` followed later by `b -> c` rewrites `a` to `c`.
//! The reverse order only rewrites one hop per application. Records produced
//! by the engine are always in forward order because a canonical value is
//! never an already-mapped original.

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{dataset::Dataset, error::MappingError, io_utils};

pub const DEFAULT_MAPPINGS_FILE: &str = "value_mappings.csv";

const HEADER: [&str; 3] = ["column", "original_value", "renamed_value"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappingRecord {
    pub column: String,
    pub original_value: String,
    pub renamed_value: String,
}

impl MappingRecord {
    pub fn new(
        column: impl Into<String>,
        original_value: impl Into<String>,
        renamed_value: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            original_value: original_value.into(),
            renamed_value: renamed_value.into(),
        }
    }

    fn key(&self) -> (&str, &str) {
        (self.column.as_str(), self.original_value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingStore {
    records: Vec<MappingRecord>,
}

impl MappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<MappingRecord>) -> Self {
        Self { records }
    }

    /// Reads the table at `path`; an absent file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, MappingError> {
        if !path.exists() {
            debug!("No mapping file at {path:?}; starting with an empty store");
            return Ok(Self::new());
        }
        let file = fs::File::open(path).map_err(|source| MappingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = io_utils::open_csv_reader(file, io_utils::DEFAULT_CSV_DELIMITER, true);
        let csv_err = |source| MappingError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let headers = reader.headers().map_err(csv_err)?.clone();
        let mut names = headers.iter().collect::<Vec<_>>();
        names.sort_unstable();
        let mut expected = HEADER.to_vec();
        expected.sort_unstable();
        if names != expected {
            return Err(MappingError::Schema {
                path: path.to_path_buf(),
                found: headers.iter().collect::<Vec<_>>().join(", "),
            });
        }

        let mut records = Vec::new();
        for result in reader.records() {
            let row = result.map_err(csv_err)?;
            let line = row.position().map_or(0, |position| position.line());
            let record = row
                .deserialize::<MappingRecord>(Some(&headers))
                .map_err(csv_err)?;
            for (field, value) in [
                ("column", &record.column),
                ("original_value", &record.original_value),
            ] {
                if value.is_empty() {
                    return Err(MappingError::InvalidRecord {
                        path: path.to_path_buf(),
                        line,
                        field,
                    });
                }
            }
            records.push(record);
        }
        debug!("Loaded {} mapping record(s) from {path:?}", records.len());
        Ok(Self { records })
    }

    /// Atomically replaces the table at `path` with the deduplicated contents.
    pub fn save(&self, path: &Path) -> Result<(), MappingError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| MappingError::Io { path, source }
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let mut writer = io_utils::csv_buffer_writer(io_utils::DEFAULT_CSV_DELIMITER);
        let csv_err = |source| MappingError::Csv {
            path: path.to_path_buf(),
            source,
        };
        writer.write_record(HEADER).map_err(csv_err)?;
        for record in self.effective_records() {
            writer
                .write_record([
                    &record.column,
                    &record.original_value,
                    &record.renamed_value,
                ])
                .map_err(csv_err)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|err| MappingError::Io {
                path: path.to_path_buf(),
                source: err.into_error(),
            })?;

        let temp_path = temporary_sibling(path);
        fs::write(&temp_path, bytes).map_err(io_err(temp_path.as_path()))?;
        fs::rename(&temp_path, path).map_err(io_err(path))?;
        debug!("Saved {} mapping record(s) to {path:?}", self.effective_len());
        Ok(())
    }

    /// Appends a record; later records take precedence over earlier ones.
    pub fn push(&mut self, record: MappingRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[MappingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn effective_len(&self) -> usize {
        self.effective_records().len()
    }

    /// Records with duplicates collapsed: the last record for each key survives
    /// at the position of its last occurrence.
    pub fn effective_records(&self) -> Vec<&MappingRecord> {
        let mut seen = HashSet::new();
        let mut kept = self
            .records
            .iter()
            .rev()
            .filter(|record| seen.insert(record.key()))
            .collect::<Vec<_>>();
        kept.reverse();
        kept
    }

    /// Drops superseded duplicates in place.
    pub fn deduplicate(&mut self) -> usize {
        let before = self.records.len();
        self.records = self.effective_records().into_iter().cloned().collect();
        before - self.records.len()
    }

    /// Original values already decided for `column`.
    pub fn originals_for(&self, column: &str) -> HashSet<&str> {
        self.records
            .iter()
            .filter(|record| record.column == column)
            .map(|record| record.original_value.as_str())
            .collect()
    }

    /// Rewrites every matching cell of `dataset`, returning how many cells changed.
    ///
    /// Records naming columns absent from the dataset are ignored.
    pub fn apply(&self, dataset: &mut Dataset) -> usize {
        let mut by_column: HashMap<&str, Vec<&MappingRecord>> = HashMap::new();
        for record in self.effective_records() {
            by_column
                .entry(record.column.as_str())
                .or_default()
                .push(record);
        }

        let mut changed = 0;
        for (column_name, records) in by_column {
            let Some(column) = dataset.column_mut(column_name) else {
                continue;
            };
            let table = compose_single_pass(&records);
            for cell in column.values_mut() {
                if let Some(value) = cell
                    && let Some(&renamed) = table.get(value.as_str())
                {
                    *value = renamed.to_string();
                    changed += 1;
                }
            }
        }
        changed
    }
}

/// Collapses an ordered record list into one lookup equivalent to running a
/// cell through every record in order.
///
/// `holders` indexes origins by their current image so each record only
/// touches the origins it actually redirects.
fn compose_single_pass<'a>(records: &[&'a MappingRecord]) -> HashMap<&'a str, &'a str> {
    let mut table: HashMap<&str, &str> = HashMap::new();
    let mut holders: HashMap<&str, Vec<&str>> = HashMap::new();
    for record in records {
        let from = record.original_value.as_str();
        let to = record.renamed_value.as_str();
        let mut moved = holders.remove(from).unwrap_or_default();
        for origin in &moved {
            table.insert(origin, to);
        }
        if !table.contains_key(from) {
            table.insert(from, to);
            moved.push(from);
        }
        let target = holders.entry(to).or_default();
        if target.len() < moved.len() {
            std::mem::swap(target, &mut moved);
        }
        target.append(&mut moved);
    }
    table.retain(|from, to| from != to);
    table
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
