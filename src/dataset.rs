//! In-memory tabular dataset: ordered, uniquely named columns of optional cells.
//!
//! A missing cell (`None`) is what an empty CSV field reads as; it is written
//! back as an empty field.

use std::{collections::HashSet, io::Read};

use encoding_rs::Encoding;

use crate::{error::DatasetError, io_utils};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    values: Vec<Option<String>>,
}

impl Column {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    /// Cells are editable in place; the column length is fixed by the dataset.
    pub fn values_mut(&mut self) -> &mut [Option<String>] {
        &mut self.values
    }

    /// Number of cells currently equal to `value`.
    pub fn count_of(&self, value: &str) -> usize {
        self.values
            .iter()
            .filter(|cell| cell.as_deref() == Some(value))
            .count()
    }

    /// Rewrites every cell equal to `from` into `to`, returning how many changed.
    pub fn replace(&mut self, from: &str, to: &str) -> usize {
        if from == to {
            return 0;
        }
        let mut changed = 0;
        for cell in self.values.iter_mut() {
            if cell.as_deref() == Some(from) {
                *cell = Some(to.to_string());
                changed += 1;
            }
        }
        changed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    /// Builds a dataset from a header row and row-major records.
    pub fn from_rows<I>(headers: Vec<String>, rows: I) -> Result<Self, DatasetError>
    where
        I: IntoIterator<Item = Vec<Option<String>>>,
    {
        let mut seen = HashSet::with_capacity(headers.len());
        for name in &headers {
            if !seen.insert(name.as_str()) {
                return Err(DatasetError::DuplicateColumn { name: name.clone() });
            }
        }
        let mut columns = headers
            .into_iter()
            .map(|name| Column {
                name,
                values: Vec::new(),
            })
            .collect::<Vec<_>>();
        let mut count = 0usize;
        for row in rows {
            if row.len() != columns.len() {
                return Err(DatasetError::RowWidth {
                    row: count + 1,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
            for (column, cell) in columns.iter_mut().zip(row) {
                column.values.push(cell);
            }
            count += 1;
        }
        Ok(Self {
            columns,
            rows: count,
        })
    }

    /// Convenience constructor for column-major data where every cell is present.
    pub fn from_columns<N, V, S>(columns: Vec<(N, V)>) -> Result<Self, DatasetError>
    where
        N: Into<String>,
        V: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names = Vec::with_capacity(columns.len());
        let mut cells = Vec::with_capacity(columns.len());
        for (name, values) in columns {
            names.push(name.into());
            cells.push(
                values
                    .into_iter()
                    .map(|value| Some(value.into()))
                    .collect::<Vec<_>>(),
            );
        }
        let rows = cells.iter().map(Vec::len).max().unwrap_or(0);
        let records = (0..rows).map(|row| {
            cells
                .iter()
                .filter_map(|column| column.get(row).cloned())
                .collect::<Vec<_>>()
        });
        Self::from_rows(names, records.collect::<Vec<_>>())
    }

    /// Reads every record of a headed CSV reader, decoding fields with `encoding`.
    pub fn from_csv_reader<R: Read>(
        mut reader: csv::Reader<R>,
        encoding: &'static Encoding,
    ) -> Result<Self, DatasetError> {
        let header_record = reader.byte_headers()?.clone();
        let headers = io_utils::decode_record(&header_record, encoding).ok_or(
            DatasetError::Decode {
                row: 1,
                encoding: encoding.name(),
            },
        )?;
        let mut rows = Vec::new();
        for (idx, record) in reader.byte_records().enumerate() {
            let record = record?;
            let decoded =
                io_utils::decode_record(&record, encoding).ok_or(DatasetError::Decode {
                    row: idx + 2,
                    encoding: encoding.name(),
                })?;
            rows.push(
                decoded
                    .into_iter()
                    .map(|field| if field.is_empty() { None } else { Some(field) })
                    .collect(),
            );
        }
        Self::from_rows(headers, rows)
    }

    /// Serializes the dataset (header first) as UTF-8 CSV.
    pub fn to_csv_bytes(&self, delimiter: u8) -> Result<Vec<u8>, DatasetError> {
        let mut writer = io_utils::csv_buffer_writer(delimiter);
        writer.write_record(self.column_names())?;
        for row in self.rows() {
            writer.write_record(row.iter().map(|cell| cell.unwrap_or("")))?;
        }
        writer
            .into_inner()
            .map_err(|err| DatasetError::Io(err.into_error()))
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|column| column.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Row-major view over the cells.
    pub fn rows(&self) -> impl Iterator<Item = Vec<Option<&str>>> + '_ {
        (0..self.rows).map(move |row| {
            self.columns
                .iter()
                .map(|column| column.values[row].as_deref())
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;

    fn read(text: &str) -> Result<Dataset, DatasetError> {
        let reader = io_utils::open_csv_reader(text.as_bytes(), b',', true);
        Dataset::from_csv_reader(reader, UTF_8)
    }

    #[test]
    fn empty_fields_read_as_missing() {
        let dataset = read("state,city\nNY,\n,Albany\n").expect("dataset");
        let state = dataset.column("state").expect("state column");
        assert_eq!(state.values, vec![Some("NY".to_string()), None]);
        assert_eq!(dataset.row_count(), 2);
    }

    #[test]
    fn duplicate_headers_are_rejected() {
        let err = read("state,state\nNY,CA\n").unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateColumn { name } if name == "state"));
    }

    #[test]
    fn ragged_rows_are_fatal() {
        assert!(read("a,b\n1,2,3\n").is_err());
    }

    #[test]
    fn canonical_csv_round_trips_byte_identical() {
        let text = "state,note\nNY,\"Albany, capital\"\n,plain\nCA,\"say \"\"hi\"\"\"\n";
        let dataset = read(text).expect("dataset");
        let bytes = dataset.to_csv_bytes(b',').expect("serialize");
        assert_eq!(String::from_utf8(bytes).unwrap(), text);
    }

    #[test]
    fn edits_through_column_mut_keep_rows_rectangular() {
        let mut dataset = read("state,city\nNY,Albany\nny,\n").expect("dataset");
        let column = dataset.column_mut("city").expect("city column");
        column.values_mut()[1] = Some("Buffalo".to_string());
        column.replace("Albany", "Albany City");

        let bytes = dataset.to_csv_bytes(b',').expect("serialize");
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "state,city\nNY,Albany City\nny,Buffalo\n"
        );
        assert_eq!(dataset.rows().count(), 2);
    }

    #[test]
    fn replace_skips_self_rewrite_and_missing_cells() {
        let mut column = Column {
            name: "state".to_string(),
            values: vec![Some("ny".into()), None, Some("ny".into()), Some("CA".into())],
        };
        assert_eq!(column.replace("ny", "ny"), 0);
        assert_eq!(column.replace("ny", "NY"), 2);
        assert_eq!(column.count_of("NY"), 2);
        assert_eq!(column.values[1], None);
    }
}
