//! Error types for venvsync-sync.
//!
//! Only fatal failures are represented here. A corrupt state record and an
//! unavailable environment fingerprint are absorbed where they happen and only
//! logged.

use std::path::PathBuf;

use thiserror::Error;

use venvsync_core::ProcessError;

/// All errors that abort a reconciliation pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A declared requirements file does not exist. Raised before any state is
    /// read or written.
    #[error("requirements file {path} does not exist")]
    Configuration { path: PathBuf },

    /// The package manager failed to install a requirement unit.
    #[error("failed to install {unit}: {source}")]
    Install {
        unit: String,
        #[source]
        source: ProcessError,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (state record).
    #[error("state record JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of a [`SyncError`], for callers that branch on the
/// kind of failure rather than on its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Install,
    Io,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Configuration { .. } => ErrorKind::Configuration,
            SyncError::Install { .. } => ErrorKind::Install,
            SyncError::Io { .. } | SyncError::Json(_) => ErrorKind::Io,
        }
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
