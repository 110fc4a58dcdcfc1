use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use venvsync_core::config;
use venvsync_sync::{state_store, ExpectedState};

fn venvsync_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("venvsync"));
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join(config::DEFAULT_CONFIG_FILE);
    fs::write(&path, body).expect("write config");
    path
}

/// Lay out the indicator files of a virtualenv without running Python.
fn fake_environment(root: &Path) {
    let bin = if cfg!(windows) {
        root.join("Scripts")
    } else {
        root.join("bin")
    };
    fs::create_dir_all(&bin).expect("bin dir");
    let exe = |name: &str| {
        if cfg!(windows) {
            bin.join(format!("{name}.exe"))
        } else {
            bin.join(name)
        }
    };
    fs::write(exe("python"), "").expect("python");
    fs::write(exe("pip"), "").expect("pip");
    fs::write(
        root.join("pyvenv.cfg"),
        "home = /usr/bin\ninclude-system-site-packages = false\nversion = 3.12.1\n",
    )
    .expect("pyvenv.cfg");
}

/// Record the current declared state as reconciled, without a fingerprint so
/// no pip invocation is needed to classify it.
fn mark_synced(config_path: &Path) {
    let spec = config::load_at(config_path).expect("load config");
    let record = ExpectedState::build(&spec)
        .expect("expected state")
        .into_record(None);
    state_store::save_at(&spec.path, &record).expect("save state");
}

#[test]
fn init_writes_config_tracking_existing_requirements_file() {
    let dir = TempDir::new().expect("dir");
    fs::write(dir.path().join("requirements.txt"), "six==1.16.0\n").expect("reqs");

    venvsync_cmd(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("requirements.txt"));

    let spec = config::load_at(&dir.path().join(config::DEFAULT_CONFIG_FILE)).expect("load");
    assert_eq!(spec.path, dir.path().join(".venv"));
    assert_eq!(
        spec.requirements_files,
        vec![dir.path().join("requirements.txt")]
    );
}

#[test]
fn init_with_config_in_subdirectory_points_back_at_project_files() {
    let dir = TempDir::new().expect("dir");
    fs::write(dir.path().join("requirements.txt"), "six==1.16.0\n").expect("reqs");

    venvsync_cmd(dir.path())
        .args(["init", "--config", "conf/venvsync.yaml"])
        .assert()
        .success();

    let spec = config::load_at(&dir.path().join("conf").join(config::DEFAULT_CONFIG_FILE))
        .expect("load");
    assert_eq!(spec.path, dir.path().join(".venv"));
    assert_eq!(
        spec.requirements_files,
        vec![dir.path().join("requirements.txt")]
    );
    assert!(spec.requirements_files[0].is_file());
}

#[test]
fn init_with_path_keeps_entries_relative_to_config() {
    let dir = TempDir::new().expect("dir");
    let project = dir.path().join("project");
    fs::create_dir_all(&project).expect("project dir");
    fs::write(project.join("requirements-dev.txt"), "pytest\n").expect("reqs");

    venvsync_cmd(dir.path())
        .args(["init", "--path", "project"])
        .assert()
        .success();

    let config_path = project.join(config::DEFAULT_CONFIG_FILE);
    let raw = fs::read_to_string(&config_path).expect("raw config");
    assert!(raw.contains("- requirements-dev.txt"), "unexpected config:\n{raw}");

    let spec = config::load_at(&config_path).expect("load");
    assert_eq!(spec.path, project.join(".venv"));
    assert_eq!(spec.requirements_files, vec![project.join("requirements-dev.txt")]);
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let dir = TempDir::new().expect("dir");
    venvsync_cmd(dir.path()).arg("init").assert().success();

    venvsync_cmd(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(contains("already exists"));

    venvsync_cmd(dir.path())
        .args(["init", "--force"])
        .assert()
        .success();
}

#[test]
fn missing_config_is_reported() {
    let dir = TempDir::new().expect("dir");
    venvsync_cmd(dir.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(contains("config not found"));
}

#[test]
fn sync_with_missing_requirements_file_creates_nothing() {
    let dir = TempDir::new().expect("dir");
    write_config(
        dir.path(),
        "path: env\nrequirements_files:\n  - missing.txt\n",
    );

    venvsync_cmd(dir.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains("does not exist"));

    assert!(!dir.path().join("env").exists());
}

#[test]
fn sync_no_create_fails_on_absent_environment() {
    let dir = TempDir::new().expect("dir");
    write_config(dir.path(), "path: env\nrequirements:\n  - six\n");

    venvsync_cmd(dir.path())
        .args(["sync", "--no-create"])
        .assert()
        .failure()
        .stderr(contains("does not exist"));

    assert!(!dir.path().join("env").exists());
}

#[test]
fn status_json_reports_absent_environment() {
    let dir = TempDir::new().expect("dir");
    write_config(dir.path(), "path: env\nrequirements:\n  - six\n");

    let assert = venvsync_cmd(dir.path())
        .args(["status", "--json"])
        .assert()
        .success();
    let payload: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("status json");

    assert_eq!(payload["present"], false);
    assert_eq!(payload["status"], "absent");
    assert!(payload["python_version"].is_null());
    assert_eq!(payload["last_sync_age"], "never");
    assert_eq!(payload["units"][0]["unit"], "inline requirements");
    assert_eq!(payload["units"][0]["state"], "new");
}

#[test]
fn status_json_reports_in_sync_and_changed_units() {
    let dir = TempDir::new().expect("dir");
    let reqs = dir.path().join("requirements.txt");
    fs::write(&reqs, "six==1.16.0\n").expect("reqs");
    let config_path = write_config(
        dir.path(),
        "path: env\nrequirements_files:\n  - requirements.txt\n",
    );
    fake_environment(&dir.path().join("env"));
    mark_synced(&config_path);

    let assert = venvsync_cmd(dir.path())
        .args(["status", "--json"])
        .assert()
        .success();
    let payload: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("status json");
    assert_eq!(payload["present"], true);
    assert_eq!(payload["status"], "in_sync");
    assert_eq!(payload["python_version"], "3.12.1");
    assert_eq!(payload["python_home"], "/usr/bin");
    assert_eq!(payload["units"][0]["state"], "current");
    assert_eq!(payload["units"][0]["requirements"], 1);

    fs::write(&reqs, "six==1.16.0\nwheel\n").expect("edit reqs");
    let assert = venvsync_cmd(dir.path())
        .args(["status", "--json"])
        .assert()
        .success();
    let payload: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("status json");
    assert_eq!(payload["status"], "spec_changed");
    assert_eq!(payload["units"][0]["state"], "changed");
    assert_eq!(payload["units"][0]["requirements"], 2);
}

#[test]
fn config_reached_through_parent_dir_stays_in_sync() {
    let dir = TempDir::new().expect("dir");
    let nested = dir.path().join("sub");
    fs::create_dir_all(&nested).expect("sub dir");
    fs::write(dir.path().join("requirements.txt"), "six==1.16.0\n").expect("reqs");
    let config_path = write_config(
        dir.path(),
        "path: env\nrequirements_files:\n  - requirements.txt\n",
    );
    fake_environment(&dir.path().join("env"));
    mark_synced(&config_path);

    let assert = venvsync_cmd(&nested)
        .args(["status", "--json", "--config", "../venvsync.yaml"])
        .assert()
        .success();
    let payload: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("status json");
    assert_eq!(payload["status"], "in_sync");
    assert_eq!(payload["units"][0]["state"], "current");
}

#[test]
fn diff_on_absent_environment_lists_units() {
    let dir = TempDir::new().expect("dir");
    write_config(dir.path(), "path: env\nrequirements:\n  - six\n  - wheel\n");

    venvsync_cmd(dir.path())
        .arg("diff")
        .assert()
        .success()
        .stdout(contains("does not exist"))
        .stdout(contains("inline requirements (2)"));
}

#[test]
fn diff_shows_added_requirement_as_unified_diff() {
    let dir = TempDir::new().expect("dir");
    let config_path = write_config(
        dir.path(),
        "path: env\nrequirements:\n  - six==1.15.0\n",
    );
    fake_environment(&dir.path().join("env"));
    mark_synced(&config_path);

    venvsync_cmd(dir.path())
        .arg("diff")
        .assert()
        .success()
        .stdout(contains("No differences"));

    write_config(
        dir.path(),
        "path: env\nrequirements:\n  - six==1.16.0\n  - wheel\n",
    );
    let assert = venvsync_cmd(dir.path()).arg("diff").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");

    assert!(
        stdout.lines().any(|line| line == "+wheel"),
        "expected an added line for wheel:\n{stdout}"
    );
    assert!(stdout.lines().any(|line| line == "-six==1.15.0"));
    assert!(stdout.lines().any(|line| line == "+six==1.16.0"));
}

#[test]
fn diff_reports_comment_only_edit_as_content_change() {
    let dir = TempDir::new().expect("dir");
    let reqs = dir.path().join("requirements.txt");
    fs::write(&reqs, "six==1.16.0\n").expect("reqs");
    let config_path = write_config(
        dir.path(),
        "path: env\nrequirements_files:\n  - requirements.txt\n",
    );
    fake_environment(&dir.path().join("env"));
    mark_synced(&config_path);

    fs::write(&reqs, "# pinned\nsix==1.16.0\n").expect("edit reqs");
    venvsync_cmd(dir.path())
        .arg("diff")
        .assert()
        .success()
        .stdout(contains("content changed, requirements unchanged"));
}
