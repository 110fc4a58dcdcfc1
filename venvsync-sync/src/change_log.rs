//! Human-readable change reports.
//!
//! Reports are for observability only; nothing here influences whether a pass
//! installs.

use std::collections::BTreeMap;

use similar::TextDiff;

use venvsync_core::EnvironmentSpec;

use crate::drift::{
    file_key, file_list_key, DriftCause, DriftState, ExpectedState,
    INDIVIDUAL_REQUIREMENTS_KEY, INDIVIDUAL_REQUIREMENTS_LIST_KEY,
};
use crate::requirements::package_name;
use crate::state_store::StateRecord;

/// Label used for the inline requirements unit in reports.
pub const INLINE_UNIT_LABEL: &str = "inline requirements";

/// A package whose specifier changed (`six==1.15.0` → `six==1.16.0`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionChange {
    pub package: String,
    pub old: String,
    pub new: String,
}

/// Changes of one requirement unit since the last successful pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitChange {
    pub unit: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<VersionChange>,
    /// Canonical list as last reconciled (empty when never recorded).
    pub previous: Vec<String>,
    /// Canonical list as currently declared.
    pub current: Vec<String>,
}

impl UnitChange {
    /// The unit's content changed but its requirement list did not (comments,
    /// whitespace, ordering).
    pub fn is_content_only(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Unified diff of the canonical lists, previous → current.
    pub fn unified_diff(&self) -> String {
        let mut old = self.previous.join("\n");
        let mut new = self.current.join("\n");
        if !old.is_empty() {
            old.push('\n');
        }
        if !new.is_empty() {
            new.push('\n');
        }
        let old_header = format!("a/{}", self.unit);
        let new_header = format!("b/{}", self.unit);
        TextDiff::from_lines(&old, &new)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string()
    }
}

/// Every change that explains why a pass reinstalls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeReport {
    pub units: Vec<UnitChange>,
    pub externally_modified: bool,
}

impl ChangeReport {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && !self.externally_modified
    }
}

/// Split two canonical lists into additions, removals and version changes.
///
/// Entries are compared as multisets, so a repeated entry that appears or
/// disappears is reported as added or removed. An added and a removed entry
/// with the same package name become one version change; the first matching
/// removal wins.
pub fn diff_lists(
    expected: &[String],
    actual: &[String],
) -> (Vec<String>, Vec<String>, Vec<VersionChange>) {
    let additions = multiset_difference(expected, actual);
    let mut removals = multiset_difference(actual, expected);

    let mut added = Vec::new();
    let mut changed = Vec::new();
    for new in additions {
        let name = package_name(new);
        match removals.iter().position(|old| package_name(old) == name) {
            Some(index) => {
                let old = removals.remove(index);
                changed.push(VersionChange {
                    package: name,
                    old: old.clone(),
                    new: new.clone(),
                });
            }
            None => added.push(new.clone()),
        }
    }
    let removed = removals.into_iter().cloned().collect();
    (added, removed, changed)
}

/// Entries of `left` not matched one-for-one by an equal entry of `right`,
/// sorted.
fn multiset_difference<'a>(left: &'a [String], right: &[String]) -> Vec<&'a String> {
    let mut remaining: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in right {
        *remaining.entry(entry.as_str()).or_default() += 1;
    }
    let mut out: Vec<&String> = left
        .iter()
        .filter(|entry| match remaining.get_mut(entry.as_str()) {
            Some(count) if *count > 0 => {
                *count -= 1;
                false
            }
            _ => true,
        })
        .collect();
    out.sort();
    out
}

/// Build the report for a pass that is about to install.
pub fn build_report(
    spec: &EnvironmentSpec,
    expected: &ExpectedState,
    actual: &StateRecord,
    state: &DriftState,
) -> ChangeReport {
    let mut units = Vec::new();
    for file in &spec.requirements_files {
        let key = file_key(file);
        if expected.get(&key) == actual.get(&key) {
            continue;
        }
        let list_key = file_list_key(file);
        units.push(unit_change(
            file.display().to_string(),
            expected.list(&list_key).unwrap_or_default(),
            actual.list(&list_key).unwrap_or_default(),
        ));
    }

    if let Some(current) = expected.get(INDIVIDUAL_REQUIREMENTS_KEY) {
        if actual.get(INDIVIDUAL_REQUIREMENTS_KEY) != Some(current) {
            units.push(unit_change(
                INLINE_UNIT_LABEL.to_string(),
                expected
                    .list(INDIVIDUAL_REQUIREMENTS_LIST_KEY)
                    .unwrap_or_default(),
                actual
                    .list(INDIVIDUAL_REQUIREMENTS_LIST_KEY)
                    .unwrap_or_default(),
            ));
        }
    }

    ChangeReport {
        units,
        externally_modified: matches!(
            state,
            DriftState::Drifted(DriftCause::ExternallyModified { .. })
        ),
    }
}

fn unit_change(unit: String, current: &[String], previous: &[String]) -> UnitChange {
    let (added, removed, changed) = diff_lists(current, previous);
    UnitChange {
        unit,
        added,
        removed,
        changed,
        previous: previous.to_vec(),
        current: current.to_vec(),
    }
}

/// Log `report` at info level, one line per entry.
pub fn log_report(report: &ChangeReport) {
    if report.externally_modified {
        tracing::info!("installed packages modified externally");
    }
    for unit in &report.units {
        if unit.is_content_only() {
            tracing::info!("{}: content changed, requirements unchanged", unit.unit);
            continue;
        }
        for entry in &unit.added {
            tracing::info!("{}: added {entry}", unit.unit);
        }
        for entry in &unit.removed {
            tracing::info!("{}: removed {entry}", unit.unit);
        }
        for change in &unit.changed {
            tracing::info!(
                "{}: {} changed {} -> {}",
                unit.unit,
                change.package,
                change.old,
                change.new
            );
        }
    }
}
