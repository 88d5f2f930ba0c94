//! Error types for dataset loading, the mapping store, and normalization.
//!
//! Library code returns these typed errors; the CLI layer wraps them in
//! `anyhow` with file-level context.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or writing a tabular dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Two columns share the same header name.
    #[error("duplicate column name '{name}' in header")]
    DuplicateColumn { name: String },

    /// A row does not have one cell per column.
    #[error("row {row} has {found} field(s), expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// The CSV reader or writer failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Field bytes could not be decoded with the selected encoding.
    #[error("failed to decode row {row} with encoding {encoding}")]
    Decode { row: usize, encoding: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading or saving the durable mapping table.
#[derive(Debug, Error)]
pub enum MappingError {
    /// The mapping file could not be read or written.
    #[error("failed to access mapping file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The header is not exactly `column,original_value,renamed_value`.
    #[error("mapping file {path} has header [{found}], expected column, original_value, renamed_value")]
    Schema { path: PathBuf, found: String },

    /// A row could not be parsed.
    #[error("failed to parse mapping file {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A row has an empty key field.
    #[error("mapping file {path} line {line}: field '{field}' must not be empty")]
    InvalidRecord {
        path: PathBuf,
        line: u64,
        field: &'static str,
    },
}

/// Errors raised by the normalization engine.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// A selected or referenced column is not part of the dataset.
    #[error("column '{column}' not found in dataset")]
    UnknownColumn { column: String },

    /// A canonical value outside the group was handed to integration.
    #[error("'{value}' is not a member of the group '{key}' in column '{column}'")]
    NotAMember {
        column: String,
        key: String,
        value: String,
    },
}
