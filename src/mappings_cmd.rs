//! Listing of the stored mapping table.

use anyhow::Result;
use log::info;

use crate::{cli::MappingsArgs, session, table};

pub fn execute(args: &MappingsArgs) -> Result<()> {
    let store = session::load_store(&args.store.mappings)?;
    let selection = crate::cli::column_selection(&args.columns);
    let records = store
        .effective_records()
        .into_iter()
        .filter(|record| {
            selection
                .as_ref()
                .is_none_or(|columns| columns.contains(&record.column))
        })
        .collect::<Vec<_>>();

    if records.is_empty() {
        info!("No stored mappings in {:?}", args.store.mappings);
        return Ok(());
    }

    let headers = vec![
        "column".to_string(),
        "original_value".to_string(),
        "renamed_value".to_string(),
    ];
    let rows = records
        .iter()
        .map(|record| {
            vec![
                record.column.clone(),
                format!("{:?}", record.original_value),
                format!("{:?}", record.renamed_value),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);

    let superseded = store.len() - store.effective_len();
    if superseded > 0 {
        info!("{superseded} superseded duplicate record(s) will be dropped on next save");
    }
    info!("Listed {} mapping(s)", records.len());
    Ok(())
}
