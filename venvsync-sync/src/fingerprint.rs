//! SHA-256 fingerprints of files and requirement lists.
//!
//! Lists are canonicalized before hashing: sorted, newline-joined. Duplicate
//! entries are kept, so `[a, a]` and `[a]` hash differently.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{io_err, SyncError};

/// Lower-case hex SHA-256 of `bytes`.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash of the raw bytes of the file at `path`.
///
/// No line-ending or comment normalisation: any byte change alters the hash.
/// A missing file is returned as [`SyncError::Io`] with a `NotFound` source.
pub fn hash_file(path: &Path) -> Result<String, SyncError> {
    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    Ok(hash_bytes(&bytes))
}

/// Sorted copy of `list`.
pub fn canonical_list<S: AsRef<str>>(list: &[S]) -> Vec<String> {
    let mut out: Vec<String> = list.iter().map(|s| s.as_ref().to_string()).collect();
    out.sort();
    out
}

/// Canonical string form of `list`: sorted entries joined with `\n`.
pub fn canonicalize<S: AsRef<str>>(list: &[S]) -> String {
    canonical_list(list).join("\n")
}

/// `hash_bytes(canonicalize(list))`.
pub fn list_hash<S: AsRef<str>>(list: &[S]) -> String {
    hash_bytes(canonicalize(list).as_bytes())
}
