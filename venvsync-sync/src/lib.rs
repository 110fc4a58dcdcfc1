//! # venvsync-sync
//!
//! Reconciliation of a Python environment against its declared requirements.
//!
//! Build a [`Reconciler`] from an [`EnvironmentSpec`](venvsync_core::EnvironmentSpec)
//! and a [`PackageManager`], then call [`Reconciler::reconcile`] once per
//! convergence cycle. The pass is a no-op when neither the declared
//! requirements nor the installed package set changed since the last
//! successful pass.

pub mod change_log;
pub mod drift;
pub mod error;
pub mod fingerprint;
pub mod installer;
pub mod package_manager;
pub mod reconciler;
pub mod requirements;
pub mod state_store;

pub use change_log::{ChangeReport, UnitChange, VersionChange};
pub use drift::{DriftCause, DriftReport, DriftState, ExpectedState};
pub use error::{ErrorKind, SyncError};
pub use installer::RequirementUnit;
pub use package_manager::{EnvironmentFingerprint, PackageManager, Pip};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use state_store::{StateRecord, StateValue};
