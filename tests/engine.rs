mod common;

use std::collections::HashSet;

use common::cells;
use csv_normalize::{
    Dataset, Decision, MappingRecord, MappingStore, SimilarityGroup, error::NormalizeError,
    find_remaining_groups, integrate_decision, normalize, process_column,
};

fn state(values: &[&str]) -> Dataset {
    Dataset::from_columns(vec![("state", values.to_vec())]).expect("dataset")
}

fn choose(value: &'static str) -> impl FnMut(&str, &SimilarityGroup) -> Decision {
    move |_: &str, _: &SimilarityGroup| Decision::Canonical(value.to_string())
}

#[test]
fn case_and_whitespace_variants_form_one_group() {
    let groups = find_remaining_groups(&cells(&["NY", " ny", "ny ", "NY"]), &HashSet::new());
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].key, "ny");
    assert_eq!(groups[0].members, vec!["NY", " ny", "ny "]);
}

#[test]
fn distinct_keys_yield_no_groups() {
    let groups = find_remaining_groups(&cells(&["NY", "CA", "TX"]), &HashSet::new());
    assert!(groups.is_empty());
}

#[test]
fn mapped_originals_are_never_resurfaced() {
    let mapped = HashSet::from(["ny "]);
    let alone = find_remaining_groups(&cells(&["ny ", "Ny"]), &mapped);
    assert!(alone.is_empty(), "a lone unmapped variant is not an anomaly");

    let paired = find_remaining_groups(&cells(&["ny ", "Ny", " NY"]), &mapped);
    assert_eq!(paired.len(), 1);
    assert_eq!(paired[0].members, vec!["Ny", " NY"]);
}

#[test]
fn choosing_a_canonical_value_rewrites_and_records() {
    let mut dataset = state(&["NY", "ny ", "CA"]);
    let mut store = MappingStore::new();
    let outcome =
        process_column(&mut dataset, "state", &mut store, &mut choose("NY")).expect("process");

    assert_eq!(dataset.column("state").unwrap().values(), cells(&["NY", "NY", "CA"]));
    assert_eq!(store.records(), &[MappingRecord::new("state", "ny ", "NY")]);
    assert_eq!(outcome.groups_found, 1);
    assert_eq!(outcome.integrated, 1);
    assert_eq!(outcome.records_added, 1);
    assert_eq!(outcome.cells_rewritten, 1);
}

#[test]
fn canonical_member_never_maps_to_itself() {
    let mut dataset = state(&["NY", "ny", " Ny ", "NY"]);
    let mut store = MappingStore::new();
    let group = find_remaining_groups(dataset.column("state").unwrap().values(), &HashSet::new())
        .remove(0);
    let integration =
        integrate_decision(&mut dataset, &mut store, "state", &group, "ny").expect("integrate");

    assert_eq!(integration.records_added, group.members.len() - 1);
    assert!(
        store
            .records()
            .iter()
            .all(|record| record.original_value != record.renamed_value)
    );
    assert_eq!(integration.cells_rewritten, 3);
}

#[test]
fn decisions_stay_within_their_column() {
    let mut dataset = Dataset::from_columns(vec![
        ("state", vec!["NY", "ny"]),
        ("city", vec!["NY", "ny"]),
    ])
    .expect("dataset");
    let mut store = MappingStore::new();
    let selection = vec!["state".to_string()];
    normalize(
        &mut dataset,
        &mut store,
        Some(selection.as_slice()),
        &mut choose("NY"),
    )
    .expect("normalize");

    assert_eq!(dataset.column("city").unwrap().values(), cells(&["NY", "ny"]));
    assert!(store.records().iter().all(|record| record.column == "state"));
}

#[test]
fn skipped_groups_leave_values_untouched_and_continue() {
    let mut dataset = Dataset::from_columns(vec![
        ("state", vec!["NY", "ny", "CA", "ca"]),
        ("city", vec!["Albany", "albany", "x", "y"]),
    ])
    .expect("dataset");
    let mut store = MappingStore::new();
    let mut decider = |_: &str, group: &SimilarityGroup| {
        if group.key == "ny" {
            Decision::Skip
        } else {
            Decision::Canonical(group.members[0].clone())
        }
    };
    let report = normalize(&mut dataset, &mut store, None, &mut decider).expect("normalize");

    assert_eq!(
        dataset.column("state").unwrap().values(),
        cells(&["NY", "ny", "CA", "CA"])
    );
    assert_eq!(
        dataset.column("city").unwrap().values(),
        cells(&["Albany", "Albany", "x", "y"])
    );
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.records_added(), 2);
    assert!(!report.aborted);
}

#[test]
fn abort_keeps_earlier_decisions_and_stops() {
    let mut dataset = Dataset::from_columns(vec![
        ("state", vec!["NY", "ny", "CA", "ca"]),
        ("city", vec!["Albany", "albany", "x", "y"]),
    ])
    .expect("dataset");
    let mut store = MappingStore::new();
    let mut asked = Vec::new();
    let mut decider = |column: &str, group: &SimilarityGroup| {
        asked.push(format!("{column}/{}", group.key));
        if group.key == "ca" {
            Decision::Abort
        } else {
            Decision::Canonical(group.members[0].clone())
        }
    };
    let report = normalize(&mut dataset, &mut store, None, &mut decider).expect("normalize");

    assert_eq!(asked, vec!["state/ny", "state/ca"]);
    assert!(report.aborted);
    assert_eq!(store.records(), &[MappingRecord::new("state", "ny", "NY")]);
    assert_eq!(
        dataset.column("city").unwrap().values(),
        cells(&["Albany", "albany", "x", "y"])
    );
}

#[test]
fn stored_mappings_apply_before_detection() {
    let mut dataset = state(&["ny ", "NY", "Ny", "CA"]);
    let mut store = MappingStore::from_records(vec![MappingRecord::new("state", "ny ", "NY")]);
    let mut offered = Vec::new();
    let mut decider = |_: &str, group: &SimilarityGroup| {
        offered.push(group.members.clone());
        Decision::Canonical("NY".to_string())
    };
    let report = normalize(&mut dataset, &mut store, None, &mut decider).expect("normalize");

    assert_eq!(report.applied_cells, 1);
    assert_eq!(offered, vec![vec!["NY".to_string(), "Ny".to_string()]]);
    assert_eq!(
        dataset.column("state").unwrap().values(),
        cells(&["NY", "NY", "NY", "CA"])
    );
    assert_eq!(store.len(), 2);
}

#[test]
fn unknown_selected_column_fails_before_any_change() {
    let mut dataset = state(&["ny"]);
    let mut store = MappingStore::from_records(vec![MappingRecord::new("state", "ny", "NY")]);
    let selection = vec!["county".to_string()];
    let err = normalize(
        &mut dataset,
        &mut store,
        Some(selection.as_slice()),
        &mut choose("NY"),
    )
    .unwrap_err();

    assert!(matches!(err, NormalizeError::UnknownColumn { column } if column == "county"));
    assert_eq!(dataset.column("state").unwrap().values(), cells(&["ny"]));
}

#[test]
fn group_processing_order_does_not_change_the_result() {
    let values = ["NY", "ny", "CA", "ca", "TX", "tx "];
    let pick_upper = |_: &str, group: &SimilarityGroup| {
        Decision::Canonical(
            group
                .members
                .iter()
                .find(|member| member.chars().all(|ch| ch.is_uppercase()))
                .cloned()
                .unwrap_or_default(),
        )
    };

    let mut forward = state(&values);
    let mut forward_store = MappingStore::new();
    normalize(&mut forward, &mut forward_store, None, &mut { pick_upper }).expect("forward");

    let mut reversed_values = values;
    reversed_values.reverse();
    let mut backward = state(&reversed_values);
    let mut backward_store = MappingStore::new();
    normalize(&mut backward, &mut backward_store, None, &mut { pick_upper }).expect("backward");

    let mut forward_cells = forward.column("state").unwrap().values().to_vec();
    let mut backward_cells = backward.column("state").unwrap().values().to_vec();
    forward_cells.sort();
    backward_cells.sort();
    assert_eq!(forward_cells, backward_cells);

    let mut forward_records = forward_store.records().to_vec();
    let mut backward_records = backward_store.records().to_vec();
    forward_records.sort_by(|a, b| a.original_value.cmp(&b.original_value));
    backward_records.sort_by(|a, b| a.original_value.cmp(&b.original_value));
    assert_eq!(forward_records, backward_records);
}
