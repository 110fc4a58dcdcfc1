//! Declared specification of a managed Python environment.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Interpreter used to bootstrap a missing environment when none is declared.
pub const DEFAULT_PYTHON: &str = "python3";

/// What an environment should contain, as declared by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    /// Environment directory. Relative paths are resolved against the config
    /// file's directory on load.
    pub path: PathBuf,

    /// Inline requirement specifiers (`six==1.16.0`, `setuptools`).
    #[serde(default)]
    pub requirements: Vec<String>,

    /// Requirement files, installed in declared order before the inline list.
    #[serde(default)]
    pub requirements_files: Vec<PathBuf>,

    /// Extra flags forwarded verbatim to every install invocation.
    #[serde(default)]
    pub pip_args: Vec<String>,

    #[serde(default = "default_python")]
    pub python_executable: String,

    #[serde(default)]
    pub system_site_packages: bool,
}

fn default_python() -> String {
    DEFAULT_PYTHON.to_string()
}

impl EnvironmentSpec {
    /// A spec for `path` with no requirements and default bootstrap settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            requirements: Vec::new(),
            requirements_files: Vec::new(),
            pip_args: Vec::new(),
            python_executable: default_python(),
            system_site_packages: false,
        }
    }

    pub fn with_requirements<I, S>(mut self, requirements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requirements = requirements.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_requirements_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.requirements_files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pip_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pip_args = args.into_iter().map(Into::into).collect();
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
