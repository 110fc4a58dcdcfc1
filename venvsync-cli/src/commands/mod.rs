pub mod diff;
pub mod init;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use venvsync_core::{config, EnvironmentSpec};

/// `--config` flag shared by every command that reads a spec.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Path to the environment config.
    #[arg(long, short = 'c', default_value = config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<EnvironmentSpec> {
        config::load_at(&self.config)
            .with_context(|| format!("failed to load config '{}'", self.config.display()))
    }
}
