//! `venvsync diff`: show what changed since the last successful sync.

use anyhow::{Context, Result};
use clap::Args;

use venvsync_core::SystemRunner;
use venvsync_sync::{installer::requirement_units, DriftState, Reconciler};

use super::ConfigArgs;

/// Arguments for `venvsync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let spec = self.config.load()?;
        let environment = spec.path.display().to_string();
        let reconciler = Reconciler::with_pip(spec, SystemRunner);

        if !reconciler.exists() {
            reconciler
                .expected_state()
                .context("declared requirements are not usable")?;
            println!("Environment '{environment}' does not exist; sync would create it and install:");
            for unit in requirement_units(reconciler.spec()) {
                println!("  {unit}");
            }
            return Ok(());
        }

        let (state, report) = reconciler
            .changes()
            .with_context(|| format!("diff failed for '{environment}'"))?;

        if matches!(state, DriftState::InSync) {
            println!("No differences for '{environment}'.");
            return Ok(());
        }
        if matches!(state, DriftState::NeverSynced) {
            println!("'{environment}' has never been synced; every unit would be installed.");
        }
        if report.externally_modified {
            println!("Installed packages were modified outside venvsync.");
        }

        for unit in &report.units {
            if unit.is_content_only() {
                println!("{}: content changed, requirements unchanged", unit.unit);
                continue;
            }
            let diff = unit.unified_diff();
            print!("{diff}");
            if !diff.ends_with('\n') {
                println!();
            }
        }

        Ok(())
    }
}
