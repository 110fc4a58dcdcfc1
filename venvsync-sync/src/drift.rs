//! Drift classification.
//!
//! Signal precedence:
//! 1. `NeverSynced` (state record missing, malformed or empty)
//! 2. `Drifted(SpecChanged)` (any expected key differs from the record)
//! 3. `Drifted(ExternallyModified)` (installed packages differ from the
//!    recorded fingerprint; skipped when the fingerprint is unavailable)
//! 4. `InSync`

use std::path::Path;

use venvsync_core::EnvironmentSpec;

use crate::fingerprint::{canonical_list, hash_file, list_hash};
use crate::package_manager::{current_fingerprint, EnvironmentFingerprint, PackageManager};
use crate::requirements::parse_requirements_file;
use crate::state_store::{StateEntries, StateRecord, StateValue};
use crate::SyncError;

/// Key of the inline requirements hash.
pub const INDIVIDUAL_REQUIREMENTS_KEY: &str = "individual_requirements";
/// Key of the canonical inline requirements list.
pub const INDIVIDUAL_REQUIREMENTS_LIST_KEY: &str = "individual_requirements_list";

/// `file:<path>`: raw content hash of a requirements file.
pub fn file_key(path: &Path) -> String {
    format!("file:{}", path.display())
}

/// `file_list:<path>`: canonical parsed list of a requirements file.
pub fn file_list_key(path: &Path) -> String {
    format!("file_list:{}", path.display())
}

// ---------------------------------------------------------------------------
// Expected state
// ---------------------------------------------------------------------------

/// State the environment should be in, derived only from the declared spec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedState {
    entries: StateEntries,
}

impl ExpectedState {
    /// Build the expected state for `spec`.
    ///
    /// Fails with [`SyncError::Configuration`] on the first declared
    /// requirements file that does not exist.
    pub fn build(spec: &EnvironmentSpec) -> Result<Self, SyncError> {
        let mut entries = StateEntries::new();
        for file in &spec.requirements_files {
            if !file.exists() {
                return Err(SyncError::Configuration { path: file.clone() });
            }
            entries.insert(file_key(file), StateValue::Digest(hash_file(file)?));
            entries.insert(
                file_list_key(file),
                StateValue::List(parse_requirements_file(file)),
            );
        }

        if !spec.requirements.is_empty() {
            entries.insert(
                INDIVIDUAL_REQUIREMENTS_KEY.to_string(),
                StateValue::Digest(list_hash(&spec.requirements)),
            );
            entries.insert(
                INDIVIDUAL_REQUIREMENTS_LIST_KEY.to_string(),
                StateValue::List(canonical_list(&spec.requirements)),
            );
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &StateEntries {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.entries.get(key)
    }

    pub fn list(&self, key: &str) -> Option<&[String]> {
        self.get(key).and_then(StateValue::as_list)
    }

    /// Keys whose value in `actual` is missing or different, in key order.
    pub fn mismatched_keys(&self, actual: &StateRecord) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(key, value)| actual.get(key) != Some(*value))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// The record to persist after a successful install.
    pub fn into_record(self, environment_fingerprint: Option<String>) -> StateRecord {
        StateRecord {
            environment_fingerprint,
            entries: self.entries,
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Why an environment needs a reinstall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftCause {
    /// The declared requirements differ from the last reconciled ones.
    SpecChanged { keys: Vec<String> },
    /// Packages were installed or removed outside this tool.
    ExternallyModified { recorded: String, observed: String },
}

/// Classification of an environment against its declared requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftState {
    NeverSynced,
    InSync,
    Drifted(DriftCause),
}

impl DriftState {
    pub fn needs_install(&self) -> bool {
        !matches!(self, DriftState::InSync)
    }

    /// Stable machine-readable name.
    pub fn key(&self) -> &'static str {
        match self {
            DriftState::NeverSynced => "never_synced",
            DriftState::InSync => "in_sync",
            DriftState::Drifted(DriftCause::SpecChanged { .. }) => "spec_changed",
            DriftState::Drifted(DriftCause::ExternallyModified { .. }) => "externally_modified",
        }
    }
}

/// Everything a pass knows before deciding whether to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftReport {
    pub expected: ExpectedState,
    pub actual: StateRecord,
    pub state: DriftState,
}

/// Classify `actual` against `expected`.
///
/// The package manager is queried only when the declared requirements match
/// and the record carries a fingerprint to compare with.
pub fn classify(
    expected: &ExpectedState,
    actual: &StateRecord,
    package_manager: &dyn PackageManager,
) -> DriftState {
    if actual.is_empty() {
        return DriftState::NeverSynced;
    }

    let keys = expected.mismatched_keys(actual);
    if !keys.is_empty() {
        tracing::debug!("declared requirements changed: {}", keys.join(", "));
        return DriftState::Drifted(DriftCause::SpecChanged { keys });
    }

    let Some(recorded) = actual.environment_fingerprint.as_deref() else {
        return DriftState::InSync;
    };
    match current_fingerprint(package_manager) {
        EnvironmentFingerprint::Observed(observed) if observed != recorded => {
            DriftState::Drifted(DriftCause::ExternallyModified {
                recorded: recorded.to_string(),
                observed,
            })
        }
        EnvironmentFingerprint::Observed(_) => DriftState::InSync,
        EnvironmentFingerprint::Unavailable { .. } => {
            tracing::warn!("skipping external modification check for this pass");
            DriftState::InSync
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs;

    use tempfile::TempDir;
    use venvsync_core::ProcessError;

    use crate::fingerprint::hash_bytes;

    struct FakeFreeze {
        listing: Option<&'static str>,
        queries: Cell<usize>,
    }

    impl FakeFreeze {
        fn new(listing: Option<&'static str>) -> Self {
            Self {
                listing,
                queries: Cell::new(0),
            }
        }
    }

    impl PackageManager for FakeFreeze {
        fn install(&self, _: &Path, _: &[String]) -> Result<(), ProcessError> {
            unreachable!("classification never installs")
        }

        fn list_installed(&self) -> Result<Vec<u8>, ProcessError> {
            self.queries.set(self.queries.get() + 1);
            self.listing
                .map(|listing| listing.as_bytes().to_vec())
                .ok_or_else(|| ProcessError::Failed {
                    program: "pip".into(),
                    code: Some(1),
                    stderr: "no pip".to_string(),
                })
        }
    }

    fn spec_with_file(tmp: &TempDir, content: &str) -> EnvironmentSpec {
        let file = tmp.path().join("requirements.txt");
        fs::write(&file, content).unwrap();
        EnvironmentSpec::new(tmp.path().join(".venv"))
            .with_requirements(["setuptools", "six==1.16.0"])
            .with_requirements_files([file])
    }

    #[test]
    fn expected_state_has_all_keys() {
        let tmp = TempDir::new().unwrap();
        let spec = spec_with_file(&tmp, "requests # http\n");
        let file = &spec.requirements_files[0];
        let expected = ExpectedState::build(&spec).unwrap();

        assert_eq!(
            expected.get(&file_key(file)),
            Some(&StateValue::Digest(hash_bytes(b"requests # http\n")))
        );
        assert_eq!(
            expected.list(&file_list_key(file)),
            Some(&["requests".to_string()][..])
        );
        assert_eq!(
            expected.get(INDIVIDUAL_REQUIREMENTS_KEY),
            Some(&StateValue::Digest(list_hash(&["setuptools", "six==1.16.0"])))
        );
        assert_eq!(expected.entries().len(), 4);
    }

    #[test]
    fn empty_inline_list_has_no_inline_keys() {
        let tmp = TempDir::new().unwrap();
        let spec = EnvironmentSpec::new(tmp.path());
        let expected = ExpectedState::build(&spec).unwrap();
        assert!(expected.entries().is_empty());
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let spec = EnvironmentSpec::new(tmp.path())
            .with_requirements_files([tmp.path().join("missing.txt")]);
        let err = ExpectedState::build(&spec).unwrap_err();
        assert!(matches!(err, SyncError::Configuration { .. }), "got: {err}");
    }

    #[test]
    fn empty_record_is_never_synced_without_querying() {
        let tmp = TempDir::new().unwrap();
        let expected = ExpectedState::build(&spec_with_file(&tmp, "requests\n")).unwrap();
        let pm = FakeFreeze::new(Some("x"));
        assert_eq!(
            classify(&expected, &StateRecord::default(), &pm),
            DriftState::NeverSynced
        );
        assert_eq!(pm.queries.get(), 0);
    }

    #[test]
    fn comment_edit_is_spec_change_on_file_key_only() {
        let tmp = TempDir::new().unwrap();
        let spec = spec_with_file(&tmp, "requests\n");
        let recorded = ExpectedState::build(&spec).unwrap().into_record(None);

        fs::write(&spec.requirements_files[0], "requests # now commented\n").unwrap();
        let expected = ExpectedState::build(&spec).unwrap();
        let pm = FakeFreeze::new(None);
        assert_eq!(
            classify(&expected, &recorded, &pm),
            DriftState::Drifted(DriftCause::SpecChanged {
                keys: vec![file_key(&spec.requirements_files[0])]
            })
        );
    }

    #[test]
    fn matching_fingerprint_is_in_sync() {
        let tmp = TempDir::new().unwrap();
        let expected = ExpectedState::build(&spec_with_file(&tmp, "requests\n")).unwrap();
        let recorded = expected
            .clone()
            .into_record(Some(hash_bytes(b"requests==2.31.0\n")));
        let pm = FakeFreeze::new(Some("requests==2.31.0\n"));
        assert_eq!(classify(&expected, &recorded, &pm), DriftState::InSync);
        assert_eq!(pm.queries.get(), 1);
    }

    #[test]
    fn different_fingerprint_is_externally_modified() {
        let tmp = TempDir::new().unwrap();
        let expected = ExpectedState::build(&spec_with_file(&tmp, "requests\n")).unwrap();
        let recorded = expected.clone().into_record(Some("old".to_string()));
        let pm = FakeFreeze::new(Some("requests==2.31.0\nrich==13.0\n"));
        match classify(&expected, &recorded, &pm) {
            DriftState::Drifted(DriftCause::ExternallyModified { recorded, observed }) => {
                assert_eq!(recorded, "old");
                assert_eq!(observed, hash_bytes(b"requests==2.31.0\nrich==13.0\n"));
            }
            other => panic!("expected externally modified, got {other:?}"),
        }
    }

    #[test]
    fn unavailable_fingerprint_does_not_flip_state() {
        let tmp = TempDir::new().unwrap();
        let expected = ExpectedState::build(&spec_with_file(&tmp, "requests\n")).unwrap();
        let recorded = expected.clone().into_record(Some("old".to_string()));
        let pm = FakeFreeze::new(None);
        assert_eq!(classify(&expected, &recorded, &pm), DriftState::InSync);
    }

    #[test]
    fn record_without_fingerprint_skips_query() {
        let tmp = TempDir::new().unwrap();
        let expected = ExpectedState::build(&spec_with_file(&tmp, "requests\n")).unwrap();
        let recorded = expected.clone().into_record(None);
        let pm = FakeFreeze::new(Some("anything"));
        assert_eq!(classify(&expected, &recorded, &pm), DriftState::InSync);
        assert_eq!(pm.queries.get(), 0);
    }

    #[test]
    fn duplicate_inline_entry_is_a_spec_change() {
        let tmp = TempDir::new().unwrap();
        let spec = EnvironmentSpec::new(tmp.path()).with_requirements(["six"]);
        let recorded = ExpectedState::build(&spec).unwrap().into_record(None);

        let doubled = EnvironmentSpec::new(tmp.path()).with_requirements(["six", "six"]);
        let expected = ExpectedState::build(&doubled).unwrap();
        let pm = FakeFreeze::new(None);
        assert!(matches!(
            classify(&expected, &recorded, &pm),
            DriftState::Drifted(DriftCause::SpecChanged { .. })
        ));
    }
}
