//! venvsync: keep a Python virtualenv converged to its declared requirements.
//!
//! # Usage
//!
//! ```text
//! venvsync init [--path <dir>] [--config <file>] [--force]
//! venvsync sync [--config <file>] [--no-create]
//! venvsync status [--config <file>] [--json]
//! venvsync diff [--config <file>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, init::InitArgs, status::StatusArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "venvsync",
    version,
    about = "Converge a Python virtualenv to its declared requirements",
    long_about = None,
)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter venvsync.yaml.
    Init(InitArgs),

    /// Create the environment if needed and install declared requirements.
    Sync(SyncArgs),

    /// Show whether the environment matches its declared requirements.
    Status(StatusArgs),

    /// Show requirement changes since the last successful sync.
    Diff(DiffArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Diff(args) => args.run(),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
