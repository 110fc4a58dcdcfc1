//! `venvsync init [--path <dir>] [--config <file>] [--force]`

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use venvsync_core::{config, EnvironmentSpec};

/// Environment directory created next to the requirement files.
const DEFAULT_ENV_DIR: &str = ".venv";

/// Requirement files picked up automatically when present in `--path`.
const KNOWN_REQUIREMENTS_FILES: [&str; 2] = ["requirements.txt", "requirements-dev.txt"];

/// Write a starter config.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to write venvsync.yaml into.
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Config file to write (defaults to venvsync.yaml inside --path).
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Overwrite an existing config.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let target = self
            .config
            .clone()
            .unwrap_or_else(|| self.path.join(config::DEFAULT_CONFIG_FILE));
        if target.exists() && !self.force {
            bail!(
                "'{}' already exists; pass --force to overwrite",
                target.display()
            );
        }

        let cwd = std::env::current_dir().context("could not determine working directory")?;
        let project_dir = config::normalize(&cwd.join(&self.path));
        let config_dir = config::normalize(&cwd.join(&target))
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| project_dir.clone());

        let files: Vec<&str> = KNOWN_REQUIREMENTS_FILES
            .into_iter()
            .filter(|name| project_dir.join(name).is_file())
            .collect();
        let env_dir = relative_to(&config_dir, &project_dir.join(DEFAULT_ENV_DIR));
        let spec = EnvironmentSpec::new(env_dir).with_requirements_files(
            files
                .iter()
                .map(|name| relative_to(&config_dir, &project_dir.join(name))),
        );

        config::save_at(&target, &spec)
            .with_context(|| format!("failed to write '{}'", target.display()))?;

        println!("✓ Wrote {}", target.display());
        if files.is_empty() {
            println!("  No requirements files found; add entries under `requirements:`.");
        } else {
            println!("  Tracking: {}", files.join(", "));
        }
        Ok(())
    }
}

/// `path` as written into a config stored in `config_dir`: relative when it
/// lives under that directory, absolute otherwise.
fn relative_to(config_dir: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(config_dir) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => path.to_path_buf(),
    }
}
