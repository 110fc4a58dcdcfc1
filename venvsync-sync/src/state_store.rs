//! State record: the last successfully reconciled state of an environment.
//!
//! Persists a flat JSON object at `<env>/.requirements_state`.
//! Writes use an atomic `.tmp` + rename, so a record is either the previous
//! one or the new one, never a mix.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, SyncError};

/// File name of the state record inside the environment directory.
pub const STATE_FILE: &str = ".requirements_state";

/// Key of the installed-package fingerprint inside the record.
pub const ENVIRONMENT_FINGERPRINT_KEY: &str = "environment_fingerprint";

/// One value of the flat record: a digest or a canonical requirement list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Digest(String),
    List(Vec<String>),
}

impl StateValue {
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            StateValue::List(list) => Some(list),
            StateValue::Digest(_) => None,
        }
    }
}

/// Flat key → value map shared by expected and persisted state.
pub type StateEntries = BTreeMap<String, StateValue>;

/// On-disk state record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_fingerprint: Option<String>,
    #[serde(flatten)]
    pub entries: StateEntries,
}

impl StateRecord {
    /// An empty record means "never reconciled".
    pub fn is_empty(&self) -> bool {
        self.environment_fingerprint.is_none() && self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.entries.get(key)
    }

    pub fn list(&self, key: &str) -> Option<&[String]> {
        self.get(key).and_then(StateValue::as_list)
    }
}

/// Path to the state record of the environment rooted at `env`.
///
/// `<env>/.requirements_state`
pub fn state_path_at(env: &Path) -> PathBuf {
    env.join(STATE_FILE)
}

/// Load the state record strictly.
///
/// `Ok(None)` when no record exists; malformed JSON is an error.
pub fn try_load_at(env: &Path) -> Result<Option<StateRecord>, SyncError> {
    let path = state_path_at(env);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(&path, err)),
    };
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Load the state record for the reconciler.
///
/// A missing, unreadable or malformed record is logged and returned as an
/// empty record, which classifies as never synced.
pub fn load_at(env: &Path) -> StateRecord {
    match try_load_at(env) {
        Ok(Some(record)) => record,
        Ok(None) => {
            tracing::warn!(
                "no state record at {}; treating environment as never synced",
                state_path_at(env).display()
            );
            StateRecord::default()
        }
        Err(err) => {
            tracing::warn!(
                "ignoring unusable state record at {}: {err}",
                state_path_at(env).display()
            );
            StateRecord::default()
        }
    }
}

/// Save the state record atomically, replacing any previous one.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn save_at(env: &Path, record: &StateRecord) -> Result<(), SyncError> {
    std::fs::create_dir_all(env).map_err(|e| io_err(env, e))?;

    let path = state_path_at(env);
    let json = serde_json::to_string_pretty(record)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    tracing::info!("saved state record: {}", path.display());
    Ok(())
}

/// Modification time of the state record, i.e. when the last successful pass
/// finished.
pub fn last_synced_at(env: &Path) -> Option<DateTime<Utc>> {
    let meta = std::fs::metadata(state_path_at(env)).ok()?;
    meta.modified().ok().map(DateTime::<Utc>::from)
}

/// Compact age of a timestamp (`42s`, `5m`, `3h`, `2d`).
pub fn format_datetime_age(timestamp: DateTime<Utc>) -> String {
    let age = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0) as u64;
    format_seconds(age)
}

fn format_seconds(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
