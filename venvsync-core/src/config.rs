//! YAML config describing one managed environment.
//!
//! # Storage layout
//!
//! ```text
//! <project>/
//!   venvsync.yaml     (one file per environment)
//! ```
//!
//! Relative paths inside the file (`path`, `requirements_files`) are resolved
//! against the directory holding the config, so a checked-in config works from
//! any working directory.

use std::path::{Component, Path, PathBuf};

use crate::error::{io_err, ConfigError};
use crate::types::EnvironmentSpec;

/// File name looked up when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "venvsync.yaml";

// ---------------------------------------------------------------------------
// 1. Load
// ---------------------------------------------------------------------------

/// Load and validate the environment spec stored at `path`.
///
/// Returns `ConfigError::NotFound` if absent, `ConfigError::Parse` (with path +
/// line context) if malformed YAML, `ConfigError::Invalid` if a field fails
/// [`validate`].
pub fn load_at(path: &Path) -> Result<EnvironmentSpec, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let mut spec: EnvironmentSpec =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

    let base = base_dir(path)?;
    resolve_relative(&mut spec, &base);
    validate(&spec)?;
    tracing::debug!(
        "loaded config {} ({} inline, {} files)",
        path.display(),
        spec.requirements.len(),
        spec.requirements_files.len()
    );
    Ok(spec)
}

fn base_dir(config_path: &Path) -> Result<PathBuf, ConfigError> {
    let parent = config_path.parent().unwrap_or(Path::new(""));
    if parent.is_absolute() {
        return Ok(normalize(parent));
    }
    let cwd = std::env::current_dir().map_err(|e| io_err(parent, e))?;
    Ok(normalize(&cwd.join(parent)))
}

// Paths end up in state record keys, so one file must always be spelled the
// same way regardless of the working directory.
fn resolve_relative(spec: &mut EnvironmentSpec, base: &Path) {
    spec.path = normalize(&base.join(&spec.path));
    for file in &mut spec.requirements_files {
        *file = normalize(&base.join(&*file));
    }
}

/// Lexically drop `.` segments and fold `..` into the preceding segment.
///
/// Symlinks are not resolved; nothing on disk is touched.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component.as_os_str()),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// 2. Validate
// ---------------------------------------------------------------------------

/// Check the shape of a spec before it reaches the reconciler.
///
/// Existence of requirement files is deliberately not checked here; the
/// reconciler reports missing files itself, before touching any state.
pub fn validate(spec: &EnvironmentSpec) -> Result<(), ConfigError> {
    if !spec.path.is_absolute() {
        return Err(ConfigError::Invalid {
            field: "path",
            reason: format!("'{}' is not an absolute path", spec.path.display()),
        });
    }
    if spec.python_executable.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field: "python_executable",
            reason: "must not be empty".to_string(),
        });
    }
    if let Some(index) = spec.requirements.iter().position(|r| r.trim().is_empty()) {
        return Err(ConfigError::Invalid {
            field: "requirements",
            reason: format!("entry {index} is empty"),
        });
    }
    if let Some(file) = spec.requirements_files.iter().find(|f| !f.is_absolute()) {
        return Err(ConfigError::Invalid {
            field: "requirements_files",
            reason: format!("'{}' is not an absolute path", file.display()),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically write `spec` to `path`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `rename`.
pub fn save_at(path: &Path, spec: &EnvironmentSpec) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let yaml = serde_yaml::to_string(spec)?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
