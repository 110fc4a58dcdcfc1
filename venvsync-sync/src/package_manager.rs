//! Package-manager backend and environment fingerprinting.
//!
//! [`PackageManager`] is the only way the reconciler touches the environment's
//! packages. [`Pip`] is the shell-backed implementation; it runs the
//! environment's own `pip` through an injected [`CommandRunner`].

use std::path::{Path, PathBuf};

use venvsync_core::{CommandRunner, Invocation, ProcessError};
use venvsync_env::EnvironmentLayout;

use crate::fingerprint::hash_bytes;

/// Installs requirement files into, and lists packages of, one environment.
pub trait PackageManager {
    /// Install everything listed in `requirements_file`, forwarding
    /// `extra_args` verbatim.
    fn install(&self, requirements_file: &Path, extra_args: &[String]) -> Result<(), ProcessError>;

    /// Full listing of locally installed packages, byte for byte as the tool
    /// prints it.
    fn list_installed(&self) -> Result<Vec<u8>, ProcessError>;
}

impl<P: PackageManager + ?Sized> PackageManager for &P {
    fn install(&self, requirements_file: &Path, extra_args: &[String]) -> Result<(), ProcessError> {
        (**self).install(requirements_file, extra_args)
    }

    fn list_installed(&self) -> Result<Vec<u8>, ProcessError> {
        (**self).list_installed()
    }
}

/// `pip` inside a virtualenv.
#[derive(Debug, Clone)]
pub struct Pip<R> {
    pip: PathBuf,
    runner: R,
}

impl<R: CommandRunner> Pip<R> {
    /// Use the pip executable at `pip`.
    pub fn new(pip: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            pip: pip.into(),
            runner,
        }
    }

    /// Use the pip that belongs to the environment rooted at `root`.
    pub fn for_environment(root: &Path, runner: R) -> Self {
        Self::new(EnvironmentLayout::at(root).pip, runner)
    }
}

impl<R: CommandRunner> PackageManager for Pip<R> {
    fn install(&self, requirements_file: &Path, extra_args: &[String]) -> Result<(), ProcessError> {
        let invocation = Invocation::new(&self.pip)
            .args(["install", "-r"])
            .arg(requirements_file)
            .args(extra_args);
        self.runner.run(&invocation)?;
        Ok(())
    }

    fn list_installed(&self) -> Result<Vec<u8>, ProcessError> {
        let invocation = Invocation::new(&self.pip).args(["freeze", "--local"]);
        Ok(self.runner.run(&invocation)?.stdout)
    }
}

// ---------------------------------------------------------------------------
// Environment fingerprint
// ---------------------------------------------------------------------------

/// Observed identity of the installed package set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentFingerprint {
    Observed(String),
    /// The listing could not be obtained; the check is skipped for this pass.
    Unavailable { reason: String },
}

impl EnvironmentFingerprint {
    pub fn digest(&self) -> Option<&str> {
        match self {
            EnvironmentFingerprint::Observed(digest) => Some(digest),
            EnvironmentFingerprint::Unavailable { .. } => None,
        }
    }

    pub fn into_digest(self) -> Option<String> {
        match self {
            EnvironmentFingerprint::Observed(digest) => Some(digest),
            EnvironmentFingerprint::Unavailable { .. } => None,
        }
    }
}

/// Hash the package manager's installed listing verbatim.
///
/// Failures are logged and reported as [`EnvironmentFingerprint::Unavailable`],
/// never raised.
pub fn current_fingerprint(package_manager: &dyn PackageManager) -> EnvironmentFingerprint {
    match package_manager.list_installed() {
        Ok(listing) => EnvironmentFingerprint::Observed(hash_bytes(&listing)),
        Err(err) => {
            tracing::warn!("environment fingerprint unavailable: {err}");
            EnvironmentFingerprint::Unavailable {
                reason: err.to_string(),
            }
        }
    }
}
