//! Requirement-file parsing and package-name extraction.

use std::path::Path;

use crate::fingerprint::canonical_list;

/// Characters that end a package name: version comparators, extras,
/// environment markers and direct references.
const NAME_TERMINATORS: [char; 8] = ['=', '>', '<', '!', '~', ';', '[', '@'];

/// Parse requirement text into its canonical (sorted) list.
///
/// Everything from the first `#` on a line is dropped, lines are trimmed and
/// blank lines discarded.
pub fn parse_requirements(text: &str) -> Vec<String> {
    let entries: Vec<&str> = text
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .collect();
    canonical_list(&entries)
}

/// Read and parse the requirements file at `path`.
///
/// Read failures are logged and yield an empty list; callers that need the
/// file to exist check that themselves.
pub fn parse_requirements_file(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_requirements(&text),
        Err(err) => {
            tracing::warn!("cannot read requirements file {}: {err}", path.display());
            Vec::new()
        }
    }
}

/// Lower-cased package name of a specifier (`Django>=4.2` → `django`).
///
/// The specifier is cut at the first comparator, extras bracket, marker
/// separator, `@` or inner whitespace; a bare name is returned as-is apart
/// from trimming and case.
pub fn package_name(specifier: &str) -> String {
    let trimmed = specifier.trim();
    let end = trimmed
        .find(|c: char| NAME_TERMINATORS.contains(&c) || c.is_whitespace())
        .unwrap_or(trimmed.len());
    trimmed[..end].to_lowercase()
}
