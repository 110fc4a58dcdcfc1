//! `venvsync status`: drift and sync visibility for one environment.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use venvsync_core::{EnvironmentSpec, SystemRunner};
use venvsync_env::{EnvironmentStatus, PyvenvConfig};
use venvsync_sync::{
    change_log::INLINE_UNIT_LABEL,
    drift::{file_key, file_list_key, INDIVIDUAL_REQUIREMENTS_KEY, INDIVIDUAL_REQUIREMENTS_LIST_KEY},
    state_store::{format_datetime_age, last_synced_at},
    DriftCause, DriftState, ExpectedState, Reconciler, StateRecord,
};

use super::ConfigArgs;

/// Arguments for `venvsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let spec = self.config.load()?;
        let report = build_report(spec)?;
        if self.json {
            print_json(report)?;
            return Ok(());
        }

        print_table(report);
        Ok(())
    }
}

/// Environment-level status shown in the header line.
#[derive(Debug, Clone)]
enum Signal {
    Absent,
    Incomplete { missing: usize },
    Drift(DriftState),
}

#[derive(Debug, Clone)]
struct UnitStatus {
    unit: String,
    state: &'static str,
    requirements: usize,
}

#[derive(Debug, Clone)]
struct StatusReport {
    environment: String,
    signal: Signal,
    detail: String,
    python: PyvenvConfig,
    last_sync_age: String,
    last_sync_at: Option<String>,
    units: Vec<UnitStatus>,
}

#[derive(Serialize)]
struct StatusReportJson {
    environment: String,
    present: bool,
    status: String,
    detail: String,
    python_version: Option<String>,
    python_home: Option<String>,
    last_sync_age: String,
    last_sync_at: Option<String>,
    units: Vec<UnitStatusJson>,
}

#[derive(Serialize)]
struct UnitStatusJson {
    unit: String,
    state: String,
    requirements: usize,
}

#[derive(Tabled)]
struct UnitTableRow {
    #[tabled(rename = "unit")]
    unit: String,
    #[tabled(rename = "state")]
    state: String,
    #[tabled(rename = "requirements")]
    requirements: usize,
}

fn build_report(spec: EnvironmentSpec) -> Result<StatusReport> {
    let environment = spec.path.display().to_string();
    let inspected = venvsync_env::inspect(&spec.path)
        .with_context(|| format!("failed to inspect '{environment}'"))?;
    let reconciler = Reconciler::with_pip(spec, SystemRunner);

    let (signal, python, expected, actual) = match inspected {
        EnvironmentStatus::Missing => {
            let expected = reconciler
                .expected_state()
                .context("declared requirements are not usable")?;
            let python = PyvenvConfig::default();
            (Signal::Absent, python, expected, StateRecord::default())
        }
        EnvironmentStatus::Incomplete { missing } => {
            let expected = reconciler
                .expected_state()
                .context("declared requirements are not usable")?;
            let signal = Signal::Incomplete {
                missing: missing.len(),
            };
            let python = PyvenvConfig::default();
            (signal, python, expected, StateRecord::default())
        }
        EnvironmentStatus::Valid(python) => {
            let report = reconciler
                .check()
                .with_context(|| format!("status check failed for '{environment}'"))?;
            let signal = Signal::Drift(report.state);
            (signal, python, report.expected, report.actual)
        }
    };

    let (last_sync_at, last_sync_age) = match last_synced_at(&reconciler.spec().path) {
        Some(at) if !matches!(signal, Signal::Absent) => {
            (Some(at.to_rfc3339()), format_datetime_age(at))
        }
        _ => (None, "never".to_string()),
    };

    Ok(StatusReport {
        environment,
        detail: signal_detail(&signal),
        signal,
        python,
        last_sync_age,
        last_sync_at,
        units: unit_statuses(reconciler.spec(), &expected, &actual),
    })
}

fn unit_statuses(
    spec: &EnvironmentSpec,
    expected: &ExpectedState,
    actual: &StateRecord,
) -> Vec<UnitStatus> {
    let mut units: Vec<UnitStatus> = spec
        .requirements_files
        .iter()
        .map(|file| UnitStatus {
            unit: file.display().to_string(),
            state: unit_state(expected, actual, &file_key(file)),
            requirements: expected.list(&file_list_key(file)).map_or(0, <[_]>::len),
        })
        .collect();

    if expected.get(INDIVIDUAL_REQUIREMENTS_KEY).is_some() {
        units.push(UnitStatus {
            unit: INLINE_UNIT_LABEL.to_string(),
            state: unit_state(expected, actual, INDIVIDUAL_REQUIREMENTS_KEY),
            requirements: expected
                .list(INDIVIDUAL_REQUIREMENTS_LIST_KEY)
                .map_or(0, <[_]>::len),
        });
    }
    units
}

fn unit_state(expected: &ExpectedState, actual: &StateRecord, key: &str) -> &'static str {
    match actual.get(key) {
        None => "new",
        Some(value) if expected.get(key) == Some(value) => "current",
        Some(_) => "changed",
    }
}

fn print_json(report: StatusReport) -> Result<()> {
    let payload = StatusReportJson {
        environment: report.environment,
        present: !matches!(report.signal, Signal::Absent),
        status: signal_key(&report.signal).to_string(),
        detail: report.detail,
        python_version: report.python.version,
        python_home: report.python.home.map(|home| home.display().to_string()),
        last_sync_age: report.last_sync_age,
        last_sync_at: report.last_sync_at,
        units: report
            .units
            .into_iter()
            .map(|unit| UnitStatusJson {
                unit: unit.unit,
                state: unit.state.to_string(),
                requirements: unit.requirements,
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(report: StatusReport) {
    println!(
        "{} {} | {} | last sync {}",
        signal_indicator(&report.signal),
        report.environment.bold(),
        signal_label(&report.signal),
        report.last_sync_age,
    );
    println!("  {}", report.detail);
    if let Some(version) = report.python.version.as_deref() {
        match report.python.home.as_deref() {
            Some(home) => println!("  Python {version} ({})", home.display()),
            None => println!("  Python {version}"),
        }
    }

    if report.units.is_empty() {
        println!("No requirements declared.");
        return;
    }

    let rows: Vec<UnitTableRow> = report
        .units
        .into_iter()
        .map(|unit| UnitTableRow {
            unit: unit.unit,
            state: unit.state.to_string(),
            requirements: unit.requirements,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if needs_sync(&report.signal) {
        println!("Run 'venvsync sync' to converge the environment.");
    }
}

fn needs_sync(signal: &Signal) -> bool {
    match signal {
        Signal::Absent | Signal::Incomplete { .. } => true,
        Signal::Drift(state) => state.needs_install(),
    }
}

fn signal_key(signal: &Signal) -> &'static str {
    match signal {
        Signal::Absent => "absent",
        Signal::Incomplete { .. } => "incomplete",
        Signal::Drift(state) => state.key(),
    }
}

fn signal_label(signal: &Signal) -> &'static str {
    match signal {
        Signal::Absent => "ABSENT",
        Signal::Incomplete { .. } => "INCOMPLETE",
        Signal::Drift(DriftState::NeverSynced) => "NEVER SYNCED",
        Signal::Drift(DriftState::InSync) => "IN SYNC",
        Signal::Drift(DriftState::Drifted(DriftCause::SpecChanged { .. })) => "SPEC CHANGED",
        Signal::Drift(DriftState::Drifted(DriftCause::ExternallyModified { .. })) => "MODIFIED",
    }
}

fn signal_indicator(signal: &Signal) -> String {
    match signal {
        Signal::Absent | Signal::Drift(DriftState::NeverSynced) => {
            "■".bright_black().bold().to_string()
        }
        Signal::Incomplete { .. } => "■".magenta().bold().to_string(),
        Signal::Drift(DriftState::InSync) => "■".green().bold().to_string(),
        Signal::Drift(DriftState::Drifted(DriftCause::SpecChanged { .. })) => {
            "■".yellow().bold().to_string()
        }
        Signal::Drift(DriftState::Drifted(DriftCause::ExternallyModified { .. })) => {
            "■".red().bold().to_string()
        }
    }
}

fn signal_detail(signal: &Signal) -> String {
    match signal {
        Signal::Absent => "environment does not exist".to_string(),
        Signal::Incomplete { missing } => format!("{missing} indicator file(s) missing"),
        Signal::Drift(DriftState::NeverSynced) => "no state record".to_string(),
        Signal::Drift(DriftState::InSync) => "up to date".to_string(),
        Signal::Drift(DriftState::Drifted(DriftCause::SpecChanged { keys })) => {
            format!("{} entr(ies) changed", keys.len())
        }
        Signal::Drift(DriftState::Drifted(DriftCause::ExternallyModified { .. })) => {
            "installed packages differ from the last sync".to_string()
        }
    }
}
