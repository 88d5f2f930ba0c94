use csv_normalize::{
    Dataset,
    table::{MISSING_MARKER, render_dataset_preview, render_table},
};

#[test]
fn render_table_aligns_columns() {
    let headers = vec!["column".to_string(), "key".to_string()];
    let rows = vec![
        vec!["state".to_string(), "ny".to_string()],
        vec!["city".to_string(), "albany".to_string()],
    ];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(
        lines,
        vec![
            "column  key",
            "------  ------",
            "state   ny",
            "city    albany"
        ]
    );
}

#[test]
fn render_table_flattens_control_characters() {
    let headers = vec!["note".to_string()];
    let rows = vec![vec!["line1\nline2\tvalue".to_string()]];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2], "line1 line2 value");
}

#[test]
fn preview_marks_missing_cells_and_limits_rows() {
    let dataset = Dataset::from_rows(
        vec!["state".to_string(), "city".to_string()],
        vec![
            vec![Some("NY".to_string()), None],
            vec![Some("CA".to_string()), Some("Sacramento".to_string())],
        ],
    )
    .expect("dataset");

    let rendered = render_dataset_preview(&dataset, 1);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2], format!("NY     {MISSING_MARKER}"));
}
