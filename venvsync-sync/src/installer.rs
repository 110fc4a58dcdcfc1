//! Requirement units and their installation.
//!
//! ## Install protocol
//!
//! 1. One unit per declared requirements file, in declared order.
//! 2. One inline unit, if the inline list is non-empty: the canonical list is
//!    written to `<env>/.individual_requirements.txt` (`.tmp` + rename).
//! 3. Units are installed one after another; the first failure aborts the rest.
//!
//! Every unit is re-submitted on every install pass, whichever one changed.

use std::fmt;
use std::path::{Path, PathBuf};

use venvsync_core::EnvironmentSpec;

use crate::error::{io_err, SyncError};
use crate::fingerprint::canonical_list;
use crate::package_manager::PackageManager;

/// File name of the materialized inline requirements.
pub const INLINE_REQUIREMENTS_FILE: &str = ".individual_requirements.txt";

/// One addressable source of requirement specifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementUnit {
    /// A declared requirements file.
    File(PathBuf),
    /// The inline list, canonicalized, to be written to `path`.
    Inline {
        path: PathBuf,
        requirements: Vec<String>,
    },
}

impl RequirementUnit {
    /// File handed to the package manager.
    pub fn requirements_path(&self) -> &Path {
        match self {
            RequirementUnit::File(path) => path,
            RequirementUnit::Inline { path, .. } => path,
        }
    }
}

impl fmt::Display for RequirementUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementUnit::File(path) => write!(f, "{}", path.display()),
            RequirementUnit::Inline { requirements, .. } => {
                write!(f, "inline requirements ({})", requirements.len())
            }
        }
    }
}

/// Path of the materialized inline requirements for the environment at `env`.
pub fn inline_requirements_path(env: &Path) -> PathBuf {
    env.join(INLINE_REQUIREMENTS_FILE)
}

/// All units of `spec`, files first, inline last.
pub fn requirement_units(spec: &EnvironmentSpec) -> Vec<RequirementUnit> {
    let mut units: Vec<RequirementUnit> = spec
        .requirements_files
        .iter()
        .cloned()
        .map(RequirementUnit::File)
        .collect();
    if !spec.requirements.is_empty() {
        units.push(RequirementUnit::Inline {
            path: inline_requirements_path(&spec.path),
            requirements: canonical_list(&spec.requirements),
        });
    }
    units
}

/// Write the inline list, one entry per line with a trailing newline.
pub(crate) fn materialize_inline(path: &Path, requirements: &[String]) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let mut content = requirements.join("\n");
    content.push('\n');

    let tmp = path.with_extension("txt.tmp");
    std::fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Install `units` in order with `pip_args` forwarded to each invocation.
///
/// Returns the installed units. Units installed before a failure stay
/// installed.
pub fn install_units(
    units: &[RequirementUnit],
    pip_args: &[String],
    package_manager: &dyn PackageManager,
) -> Result<Vec<RequirementUnit>, SyncError> {
    let mut installed = Vec::with_capacity(units.len());
    for unit in units {
        if let RequirementUnit::Inline { path, requirements } = unit {
            materialize_inline(path, requirements)?;
        }

        tracing::info!("installing {unit}");
        package_manager
            .install(unit.requirements_path(), pip_args)
            .map_err(|source| SyncError::Install {
                unit: unit.to_string(),
                source,
            })?;
        installed.push(unit.clone());
    }
    Ok(installed)
}
