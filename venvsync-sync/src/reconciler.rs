//! One reconciliation pass over one environment.
//!
//! Shared entrypoint used by every CLI command that looks at or converges an
//! environment.

use venvsync_core::{CommandRunner, EnvironmentSpec};

use crate::change_log::{build_report, log_report, ChangeReport};
use crate::drift::{classify, DriftReport, DriftState, ExpectedState};
use crate::installer::{install_units, requirement_units, RequirementUnit};
use crate::package_manager::{current_fingerprint, PackageManager, Pip};
use crate::{state_store, SyncError};

/// Outcome of [`Reconciler::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing changed; no install ran and the state record was not written.
    InSync,
    /// Every unit was reinstalled and a new state record was written.
    Reconciled {
        trigger: DriftState,
        installed: Vec<RequirementUnit>,
        changes: ChangeReport,
        /// `None` when the fingerprint could not be observed after installing.
        environment_fingerprint: Option<String>,
    },
}

/// Converges the environment of a declared spec using a package manager.
///
/// The caller must not run two passes against the same environment at once.
#[derive(Debug)]
pub struct Reconciler<P> {
    spec: EnvironmentSpec,
    package_manager: P,
}

impl<R: CommandRunner> Reconciler<Pip<R>> {
    /// Reconcile with the environment's own pip, run through `runner`.
    pub fn with_pip(spec: EnvironmentSpec, runner: R) -> Self {
        let pip = Pip::for_environment(&spec.path, runner);
        Self::new(spec, pip)
    }
}

impl<P: PackageManager> Reconciler<P> {
    pub fn new(spec: EnvironmentSpec, package_manager: P) -> Self {
        Self {
            spec,
            package_manager,
        }
    }

    pub fn spec(&self) -> &EnvironmentSpec {
        &self.spec
    }

    /// `true` iff the environment directory is present and structurally valid.
    pub fn exists(&self) -> bool {
        venvsync_env::exists(&self.spec.path)
    }

    /// Expected state of the declared spec; fails if a requirements file is
    /// missing. Touches nothing on disk.
    pub fn expected_state(&self) -> Result<ExpectedState, SyncError> {
        ExpectedState::build(&self.spec)
    }

    /// Classify the environment without installing anything.
    pub fn check(&self) -> Result<DriftReport, SyncError> {
        let expected = self.expected_state()?;
        let actual = state_store::load_at(&self.spec.path);
        let state = classify(&expected, &actual, &self.package_manager);
        Ok(DriftReport {
            expected,
            actual,
            state,
        })
    }

    /// Changes a pass would act on, without installing anything.
    pub fn changes(&self) -> Result<(DriftState, ChangeReport), SyncError> {
        let report = self.check()?;
        let changes = build_report(&self.spec, &report.expected, &report.actual, &report.state);
        Ok((report.state, changes))
    }

    /// Run one pass: classify, and reinstall every unit unless in sync.
    ///
    /// On failure the previous state record is left as it was, so the next
    /// pass retries the whole batch.
    pub fn reconcile(&self) -> Result<ReconcileOutcome, SyncError> {
        let DriftReport {
            expected,
            actual,
            state,
        } = self.check()?;

        if !state.needs_install() {
            tracing::debug!("in sync: {}", self.spec.path.display());
            return Ok(ReconcileOutcome::InSync);
        }
        tracing::info!(
            "reconciling {} ({})",
            self.spec.path.display(),
            state.key()
        );

        let changes = build_report(&self.spec, &expected, &actual, &state);
        log_report(&changes);

        let units = requirement_units(&self.spec);
        let installed = install_units(&units, &self.spec.pip_args, &self.package_manager)?;

        let environment_fingerprint = current_fingerprint(&self.package_manager).into_digest();
        let record = expected.into_record(environment_fingerprint.clone());
        state_store::save_at(&self.spec.path, &record)?;

        Ok(ReconcileOutcome::Reconciled {
            trigger: state,
            installed,
            changes,
            environment_fingerprint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::path::{Path, PathBuf};

    use tempfile::TempDir;
    use venvsync_core::ProcessError;

    use crate::state_store::{state_path_at, StateRecord};

    struct FakePip {
        installs: RefCell<Vec<PathBuf>>,
        freeze_calls: Cell<usize>,
    }

    impl FakePip {
        fn new() -> Self {
            Self {
                installs: RefCell::new(Vec::new()),
                freeze_calls: Cell::new(0),
            }
        }
    }

    impl PackageManager for FakePip {
        fn install(&self, file: &Path, _: &[String]) -> Result<(), ProcessError> {
            self.installs.borrow_mut().push(file.to_path_buf());
            Ok(())
        }

        fn list_installed(&self) -> Result<Vec<u8>, ProcessError> {
            self.freeze_calls.set(self.freeze_calls.get() + 1);
            Ok(self.installs.borrow().len().to_string().into_bytes())
        }
    }

    #[test]
    fn check_does_not_install_or_write() {
        let tmp = TempDir::new().unwrap();
        let pm = FakePip::new();
        let reconciler = Reconciler::new(
            EnvironmentSpec::new(tmp.path()).with_requirements(["six"]),
            &pm,
        );

        let report = reconciler.check().unwrap();
        assert_eq!(report.state, DriftState::NeverSynced);
        assert!(report.actual.is_empty());
        assert!(pm.installs.borrow().is_empty());
        assert!(!state_path_at(tmp.path()).exists());
    }

    #[test]
    fn never_synced_pass_records_fingerprint_after_install() {
        let tmp = TempDir::new().unwrap();
        let pm = FakePip::new();
        let reconciler = Reconciler::new(
            EnvironmentSpec::new(tmp.path()).with_requirements(["six"]),
            &pm,
        );

        let outcome = reconciler.reconcile().unwrap();
        match outcome {
            ReconcileOutcome::Reconciled {
                trigger,
                installed,
                environment_fingerprint,
                ..
            } => {
                assert_eq!(trigger, DriftState::NeverSynced);
                assert_eq!(installed.len(), 1);
                assert!(environment_fingerprint.is_some());
            }
            other => panic!("expected reconcile, got {other:?}"),
        }
        // NeverSynced skips the pre-install query; one query after install.
        assert_eq!(pm.freeze_calls.get(), 1);

        let record: StateRecord = state_store::try_load_at(tmp.path()).unwrap().unwrap();
        assert_eq!(
            record.environment_fingerprint,
            Some(crate::fingerprint::hash_bytes(b"1"))
        );
    }

    #[test]
    fn changes_reports_inline_additions() {
        let tmp = TempDir::new().unwrap();
        let pm = FakePip::new();
        Reconciler::new(
            EnvironmentSpec::new(tmp.path()).with_requirements(["six"]),
            &pm,
        )
        .reconcile()
        .unwrap();

        let reconciler = Reconciler::new(
            EnvironmentSpec::new(tmp.path()).with_requirements(["six", "wheel"]),
            &pm,
        );
        let (state, changes) = reconciler.changes().unwrap();
        assert!(matches!(state, DriftState::Drifted(_)));
        assert_eq!(changes.units.len(), 1);
        assert_eq!(changes.units[0].added, vec!["wheel".to_string()]);
    }
}
