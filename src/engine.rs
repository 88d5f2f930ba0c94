//! Similarity detection and decision integration for categorical columns.
//!
//! Per column and per run the engine moves through
//! `Unprocessed -> GroupsIdentified -> (AwaitingDecision -> Integrated)* -> Done`.
//! A group whose decision is skipped stays un-normalized and resurfaces on
//! the next run. An abort abandons every remaining group but keeps what was
//! already integrated.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    dataset::Dataset,
    decision::{Decision, DecisionMaker},
    error::NormalizeError,
    mapping::{MappingRecord, MappingStore},
};

/// Times an out-of-group answer is re-requested before the group is skipped.
pub const MAX_DECISION_ATTEMPTS: usize = 3;

/// Lowercases, then strips leading and trailing whitespace.
pub fn normalization_key(value: &str) -> String {
    value.to_lowercase().trim().to_string()
}

/// Distinct raw values of one column that share a normalization key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimilarityGroup {
    pub key: String,
    /// Members in order of first appearance.
    pub members: Vec<String>,
    /// Cell count per member, aligned with `members`.
    pub occurrences: Vec<usize>,
}

impl SimilarityGroup {
    pub fn contains(&self, value: &str) -> bool {
        self.members.iter().any(|member| member == value)
    }

    pub fn members_with_counts(&self) -> impl Iterator<Item = (&str, usize)> {
        self.members
            .iter()
            .map(String::as_str)
            .zip(self.occurrences.iter().copied())
    }
}

/// Groups the distinct, not yet mapped values of a column by normalization key.
///
/// Only keys shared by at least two distinct values are returned, in order of
/// first appearance. Missing cells never participate.
pub fn find_remaining_groups(
    values: &[Option<String>],
    already_mapped: &HashSet<&str>,
) -> Vec<SimilarityGroup> {
    let mut groups: Vec<SimilarityGroup> = Vec::new();
    let mut group_by_key: HashMap<String, usize> = HashMap::new();
    let mut position: HashMap<&str, (usize, usize)> = HashMap::new();

    for value in values.iter().flatten() {
        if already_mapped.contains(value.as_str()) {
            continue;
        }
        if let Some(&(group, member)) = position.get(value.as_str()) {
            groups[group].occurrences[member] += 1;
            continue;
        }
        let key = normalization_key(value);
        let group = *group_by_key.entry(key.clone()).or_insert_with(|| {
            groups.push(SimilarityGroup {
                key,
                members: Vec::new(),
                occurrences: Vec::new(),
            });
            groups.len() - 1
        });
        let entry = &mut groups[group];
        entry.members.push(value.clone());
        entry.occurrences.push(1);
        position.insert(value.as_str(), (group, entry.members.len() - 1));
    }

    groups.retain(|group| group.members.len() >= 2);
    groups
}

/// Asks `decider` for a canonical member, validating that the answer belongs
/// to the group.
///
/// Returns [`Decision::Skip`] once [`MAX_DECISION_ATTEMPTS`] out-of-group
/// answers have been rejected.
pub fn request_decision<D>(decider: &mut D, column: &str, group: &SimilarityGroup) -> Decision
where
    D: DecisionMaker + ?Sized,
{
    for attempt in 1..=MAX_DECISION_ATTEMPTS {
        match decider.decide(column, group) {
            Decision::Canonical(value) if group.contains(&value) => {
                return Decision::Canonical(value);
            }
            Decision::Canonical(value) => {
                warn!(
                    "Rejected '{value}' for column '{column}' group '{}': not a member (attempt {attempt}/{MAX_DECISION_ATTEMPTS})",
                    group.key
                );
            }
            other => return other,
        }
    }
    Decision::Skip
}

/// Cells rewritten and records appended by one integrated decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Integration {
    pub cells_rewritten: usize,
    pub records_added: usize,
}

/// Rewrites every member of `group` in `column` to `canonical` and records one
/// mapping per non-canonical member.
pub fn integrate_decision(
    dataset: &mut Dataset,
    store: &mut MappingStore,
    column: &str,
    group: &SimilarityGroup,
    canonical: &str,
) -> Result<Integration, NormalizeError> {
    if !group.contains(canonical) {
        return Err(NormalizeError::NotAMember {
            column: column.to_string(),
            key: group.key.clone(),
            value: canonical.to_string(),
        });
    }
    let target = dataset
        .column_mut(column)
        .ok_or_else(|| NormalizeError::UnknownColumn {
            column: column.to_string(),
        })?;

    let mut integration = Integration::default();
    for member in group.members.iter().filter(|member| *member != canonical) {
        integration.cells_rewritten += target.replace(member, canonical);
        store.push(MappingRecord::new(column, member.as_str(), canonical));
        integration.records_added += 1;
    }
    Ok(integration)
}

/// Outcome of processing one column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnOutcome {
    pub column: String,
    pub groups_found: usize,
    pub integrated: usize,
    pub skipped: usize,
    pub records_added: usize,
    pub cells_rewritten: usize,
    pub aborted: bool,
}

/// Surfaces every remaining group of `column`, asks for a decision, and folds
/// each accepted decision into `dataset` and `store`.
pub fn process_column<D>(
    dataset: &mut Dataset,
    column: &str,
    store: &mut MappingStore,
    decider: &mut D,
) -> Result<ColumnOutcome, NormalizeError>
where
    D: DecisionMaker + ?Sized,
{
    let groups = {
        let values = dataset
            .column(column)
            .ok_or_else(|| NormalizeError::UnknownColumn {
                column: column.to_string(),
            })?
            .values();
        find_remaining_groups(values, &store.originals_for(column))
    };

    let mut outcome = ColumnOutcome {
        column: column.to_string(),
        groups_found: groups.len(),
        ..ColumnOutcome::default()
    };
    if groups.is_empty() {
        debug!("No anomalies in column '{column}'");
        return Ok(outcome);
    }
    info!("Anomalies found in column '{column}': {} group(s)", groups.len());

    for (idx, group) in groups.iter().enumerate() {
        match request_decision(decider, column, group) {
            Decision::Canonical(canonical) => {
                let integration = integrate_decision(dataset, store, column, group, &canonical)?;
                debug!(
                    "Column '{column}' group '{}' -> '{canonical}' ({} cell(s))",
                    group.key, integration.cells_rewritten
                );
                outcome.integrated += 1;
                outcome.records_added += integration.records_added;
                outcome.cells_rewritten += integration.cells_rewritten;
            }
            Decision::Skip => {
                warn!(
                    "Skipped group '{}' in column '{column}'; it will be offered again next run",
                    group.key
                );
                outcome.skipped += 1;
            }
            Decision::Abort => {
                let abandoned = groups.len() - idx;
                warn!("Stopped in column '{column}'; {abandoned} group(s) left undecided");
                outcome.skipped += abandoned;
                outcome.aborted = true;
                break;
            }
        }
    }
    Ok(outcome)
}

/// Summary of one normalization run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationReport {
    /// Cells rewritten by previously stored mappings.
    pub applied_cells: usize,
    pub columns: Vec<ColumnOutcome>,
    pub aborted: bool,
}

impl NormalizationReport {
    pub fn records_added(&self) -> usize {
        self.columns.iter().map(|column| column.records_added).sum()
    }

    pub fn groups_found(&self) -> usize {
        self.columns.iter().map(|column| column.groups_found).sum()
    }

    pub fn skipped(&self) -> usize {
        self.columns.iter().map(|column| column.skipped).sum()
    }
}

/// Applies `store` to `dataset`, then processes each selected column (every
/// column in dataset order when `selection` is `None`).
///
/// Unknown selected columns are rejected before anything is modified.
pub fn normalize<D>(
    dataset: &mut Dataset,
    store: &mut MappingStore,
    selection: Option<&[String]>,
    decider: &mut D,
) -> Result<NormalizationReport, NormalizeError>
where
    D: DecisionMaker + ?Sized,
{
    let columns = match selection {
        Some(names) => {
            if let Some(missing) = names.iter().find(|name| dataset.column(name).is_none()) {
                return Err(NormalizeError::UnknownColumn {
                    column: missing.clone(),
                });
            }
            names.to_vec()
        }
        None => dataset.column_names().map(str::to_string).collect(),
    };

    let mut report = NormalizationReport {
        applied_cells: store.apply(dataset),
        ..NormalizationReport::default()
    };
    debug!("Stored mappings rewrote {} cell(s)", report.applied_cells);

    for column in &columns {
        let outcome = process_column(dataset, column, store, decider)?;
        let aborted = outcome.aborted;
        report.columns.push(outcome);
        if aborted {
            report.aborted = true;
            break;
        }
    }
    Ok(report)
}
