//! Read-only report of anomalies that stored mappings do not yet cover.

use anyhow::{Context, Result, bail};
use itertools::Itertools;
use log::info;
use serde::Serialize;

use crate::{
    cli::{self, ScanArgs},
    dataset::Dataset,
    engine::{self, SimilarityGroup},
    mapping::MappingStore,
    session, table,
};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ColumnAnomalies {
    pub column: String,
    pub groups: Vec<SimilarityGroup>,
}

/// Applies `store` to a copy of `dataset` and collects the remaining groups
/// of each selected column, skipping columns without anomalies.
pub fn find_anomalies(
    dataset: &Dataset,
    store: &MappingStore,
    selection: Option<&[String]>,
) -> Result<Vec<ColumnAnomalies>> {
    let mut normalized = dataset.clone();
    store.apply(&mut normalized);

    let columns = match selection {
        Some(names) => names.to_vec(),
        None => normalized.column_names().map(str::to_string).collect(),
    };
    let mut report = Vec::new();
    for name in columns {
        let Some(column) = normalized.column(&name) else {
            bail!("Column '{name}' not found in dataset");
        };
        let groups = engine::find_remaining_groups(column.values(), &store.originals_for(&name));
        if !groups.is_empty() {
            report.push(ColumnAnomalies {
                column: name,
                groups,
            });
        }
    }
    Ok(report)
}

pub fn execute(args: &ScanArgs) -> Result<()> {
    let loaded = session::load_input(&args.input)?;
    let store = session::load_store(&args.store.mappings)?;
    let selection = cli::column_selection(&args.columns);
    let report = find_anomalies(&loaded.dataset, &store, selection.as_deref())?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Serializing scan report")?;
        println!("{json}");
    } else if !report.is_empty() {
        let headers = vec![
            "column".to_string(),
            "key".to_string(),
            "similar values".to_string(),
        ];
        let rows = report
            .iter()
            .flat_map(|entry| {
                entry.groups.iter().map(move |group| {
                    vec![
                        entry.column.clone(),
                        format!("{:?}", group.key),
                        group
                            .members_with_counts()
                            .map(|(member, count)| format!("{member:?} x{count}"))
                            .join(", "),
                    ]
                })
            })
            .collect::<Vec<_>>();
        table::print_table(&headers, &rows);
    }

    let groups: usize = report.iter().map(|entry| entry.groups.len()).sum();
    info!(
        "Found {groups} anomaly group(s) across {} column(s)",
        report.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingRecord;

    #[test]
    fn stored_decisions_hide_covered_variants() {
        let dataset =
            Dataset::from_columns(vec![("state", vec!["NY", "ny ", "Ny", "CA", "ca"])]).unwrap();
        let store = MappingStore::from_records(vec![MappingRecord::new("state", "ny ", "NY")]);
        let report = find_anomalies(&dataset, &store, None).expect("scan");
        assert_eq!(report.len(), 1);
        let keys = report[0]
            .groups
            .iter()
            .map(|group| group.key.as_str())
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["ny", "ca"]);
        assert_eq!(report[0].groups[0].members, vec!["NY", "Ny"]);
        assert_eq!(report[0].groups[0].occurrences, vec![2, 1]);
    }

    #[test]
    fn unknown_selected_column_is_an_error() {
        let dataset = Dataset::from_columns(vec![("state", vec!["NY"])]).unwrap();
        let selection = vec!["city".to_string()];
        let result = find_anomalies(&dataset, &MappingStore::new(), Some(selection.as_slice()));
        assert!(result.is_err());
    }
}
