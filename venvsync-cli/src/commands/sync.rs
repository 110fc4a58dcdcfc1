//! `venvsync sync [--no-create]`

use anyhow::{bail, Context, Result};
use clap::Args;

use venvsync_core::SystemRunner;
use venvsync_sync::{DriftCause, DriftState, ReconcileOutcome, Reconciler};

use super::ConfigArgs;

/// Arguments for `venvsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Fail instead of creating a missing environment.
    #[arg(long)]
    pub no_create: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let spec = self.config.load()?;
        let env_display = spec.path.display().to_string();
        let reconciler = Reconciler::with_pip(spec, SystemRunner);

        // Missing requirement files abort before the environment is created.
        reconciler
            .expected_state()
            .context("declared requirements are not usable")?;

        if !reconciler.exists() {
            if self.no_create {
                bail!("environment '{env_display}' does not exist");
            }
            venvsync_env::bootstrap(reconciler.spec(), &SystemRunner)
                .with_context(|| format!("failed to create environment '{env_display}'"))?;
            println!("✓ Created environment '{env_display}'");
        }

        let outcome = reconciler
            .reconcile()
            .with_context(|| format!("sync failed for '{env_display}'"))?;
        print_outcome(&env_display, &outcome);
        Ok(())
    }
}

fn print_outcome(env: &str, outcome: &ReconcileOutcome) {
    match outcome {
        ReconcileOutcome::InSync => println!("✓ '{env}' is up to date"),
        ReconcileOutcome::Reconciled {
            trigger, installed, ..
        } => {
            println!(
                "✓ '{env}' synced ({}; {} unit(s) installed)",
                trigger_label(trigger),
                installed.len()
            );
            for unit in installed {
                println!("  ✎  {unit}");
            }
        }
    }
}

fn trigger_label(state: &DriftState) -> &'static str {
    match state {
        DriftState::NeverSynced => "first sync",
        DriftState::InSync => "in sync",
        DriftState::Drifted(DriftCause::SpecChanged { .. }) => "requirements changed",
        DriftState::Drifted(DriftCause::ExternallyModified { .. }) => {
            "packages modified externally"
        }
    }
}
