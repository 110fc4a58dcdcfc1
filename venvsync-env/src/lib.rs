//! Environment inspection and bootstrap for `venvsync-env`.
//!
//! `inspect(root)` looks at the indicator files of a virtualenv (`pyvenv.cfg`,
//! the interpreter, pip) and reports whether the directory is usable.
//! `bootstrap(spec, runner)` creates one with `python -m venv` when it is not.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use venvsync_core::{CommandRunner, EnvironmentSpec, Invocation, ProcessError};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Well-known paths inside a virtualenv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentLayout {
    pub root: PathBuf,
    pub bin_dir: PathBuf,
    pub python: PathBuf,
    pub pip: PathBuf,
    pub pyvenv_cfg: PathBuf,
}

impl EnvironmentLayout {
    pub fn at(root: &Path) -> Self {
        let bin_dir = if cfg!(windows) {
            root.join("Scripts")
        } else {
            root.join("bin")
        };
        let exe = |name: &str| {
            if cfg!(windows) {
                bin_dir.join(format!("{name}.exe"))
            } else {
                bin_dir.join(name)
            }
        };
        Self {
            root: root.to_path_buf(),
            python: exe("python"),
            pip: exe("pip"),
            pyvenv_cfg: root.join("pyvenv.cfg"),
            bin_dir,
        }
    }

    fn required_paths(&self) -> [&Path; 3] {
        [
            self.pyvenv_cfg.as_path(),
            self.python.as_path(),
            self.pip.as_path(),
        ]
    }
}

/// Values read from `pyvenv.cfg`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PyvenvConfig {
    /// Interpreter home the environment was created from.
    pub home: Option<PathBuf>,
    /// `version` (older venv) or `version_info` (3.11+).
    pub version: Option<String>,
    pub include_system_site_packages: bool,
}

/// Result of looking at an environment directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentStatus {
    /// Directory does not exist.
    Missing,
    /// Directory exists but indicator files are absent.
    Incomplete { missing: Vec<PathBuf> },
    Valid(PyvenvConfig),
}

/// Errors from environment inspection or bootstrap.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create environment at {path}: {source}")]
    Bootstrap {
        path: PathBuf,
        #[source]
        source: ProcessError,
    },

    #[error("environment at {path} is still incomplete after bootstrap; missing: {}", join_paths(.missing))]
    Incomplete { path: PathBuf, missing: Vec<PathBuf> },
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> EnvError {
    EnvError::Io {
        path: path.into(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Inspect the environment at `root`.
///
/// Checks the directory, then each indicator file; `pyvenv.cfg` is parsed only
/// when all indicators are present.
pub fn inspect(root: &Path) -> Result<EnvironmentStatus, EnvError> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Ok(EnvironmentStatus::Incomplete {
                missing: vec![root.to_path_buf()],
            })
        }
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(EnvironmentStatus::Missing),
        Err(err) => return Err(io_err(root, err)),
    }

    let layout = EnvironmentLayout::at(root);
    let missing: Vec<PathBuf> = layout
        .required_paths()
        .into_iter()
        .filter(|p| !p.exists())
        .map(Path::to_path_buf)
        .collect();
    if !missing.is_empty() {
        return Ok(EnvironmentStatus::Incomplete { missing });
    }

    let content =
        fs::read_to_string(&layout.pyvenv_cfg).map_err(|e| io_err(&layout.pyvenv_cfg, e))?;
    Ok(EnvironmentStatus::Valid(parse_pyvenv_cfg(&content)))
}

/// `true` iff the environment directory is present and structurally valid.
///
/// Inspection errors count as "not present".
pub fn exists(root: &Path) -> bool {
    match inspect(root) {
        Ok(EnvironmentStatus::Valid(_)) => true,
        Ok(_) => false,
        Err(err) => {
            tracing::warn!("cannot inspect {}: {err}", root.display());
            false
        }
    }
}

/// Create the environment declared by `spec` using its interpreter.
///
/// Runs `<python_executable> -m venv [--system-site-packages] <path>` and
/// re-inspects the result. An already valid environment is left untouched.
pub fn bootstrap(
    spec: &EnvironmentSpec,
    runner: &dyn CommandRunner,
) -> Result<EnvironmentLayout, EnvError> {
    let root = spec.path.as_path();
    if exists(root) {
        tracing::debug!("environment already present: {}", root.display());
        return Ok(EnvironmentLayout::at(root));
    }

    let mut invocation = Invocation::new(&spec.python_executable).args(["-m", "venv"]);
    if spec.system_site_packages {
        invocation = invocation.arg("--system-site-packages");
    }
    invocation = invocation.arg(root);

    tracing::info!("creating environment: {}", root.display());
    runner
        .run(&invocation)
        .map_err(|source| EnvError::Bootstrap {
            path: root.to_path_buf(),
            source,
        })?;

    match inspect(root)? {
        EnvironmentStatus::Valid(_) => Ok(EnvironmentLayout::at(root)),
        EnvironmentStatus::Missing => Err(EnvError::Incomplete {
            path: root.to_path_buf(),
            missing: vec![root.to_path_buf()],
        }),
        EnvironmentStatus::Incomplete { missing } => Err(EnvError::Incomplete {
            path: root.to_path_buf(),
            missing,
        }),
    }
}

/// Parse `key = value` lines of a `pyvenv.cfg`.
///
/// Unknown keys and lines without `=` are ignored.
pub fn parse_pyvenv_cfg(content: &str) -> PyvenvConfig {
    let mut cfg = PyvenvConfig::default();
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "home" => cfg.home = Some(PathBuf::from(value)),
            "version" | "version_info" => {
                if cfg.version.is_none() {
                    cfg.version = Some(value.to_string());
                }
            }
            "include-system-site-packages" => {
                cfg.include_system_site_packages = value.eq_ignore_ascii_case("true");
            }
            _ => {}
        }
    }
    cfg
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_uses_platform_bin_dir() {
        let layout = EnvironmentLayout::at(Path::new("/srv/venv"));
        if cfg!(windows) {
            assert!(layout.pip.ends_with("Scripts/pip.exe"));
        } else {
            assert_eq!(layout.python, PathBuf::from("/srv/venv/bin/python"));
            assert_eq!(layout.pip, PathBuf::from("/srv/venv/bin/pip"));
        }
        assert_eq!(layout.pyvenv_cfg, PathBuf::from("/srv/venv/pyvenv.cfg"));
    }

    #[test]
    fn pyvenv_cfg_prefers_first_version_key() {
        let cfg = parse_pyvenv_cfg("version = 3.10.4\nversion_info = 3.10.4.final.0\n");
        assert_eq!(cfg.version.as_deref(), Some("3.10.4"));
    }

    #[test]
    fn pyvenv_cfg_ignores_garbage_lines() {
        let cfg = parse_pyvenv_cfg("not a pair\n\nhome = /usr/bin\n");
        assert_eq!(cfg.home, Some(PathBuf::from("/usr/bin")));
        assert!(!cfg.include_system_site_packages);
    }
}
