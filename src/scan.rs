//! Local mirror scanning.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::Error;

/// Suffix of in-flight downloads; renamed into place once complete.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Placeholder files that keep otherwise-empty folders alive, plus OS litter.
const SENTINEL_NAMES: &[&str] = &[
    ".gitkeep",
    ".keep",
    ".placeholder",
    ".ds_store",
    "thumbs.db",
    "desktop.ini",
];

/// Return `true` for files that are never part of the mirror.
#[must_use]
pub fn is_sentinel(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SENTINEL_NAMES.contains(&lower.as_str()) || lower.ends_with(PARTIAL_SUFFIX)
}

/// Walk `root` and map each mirrored file's relative path (forward slashes)
/// to its location on disk.
///
/// # Errors
/// Returns [`Error::BadDir`] if `root` is missing or not a directory.
pub fn scan_mirror(root: &Path) -> Result<BTreeMap<String, PathBuf>, Error> {
    if !root.is_dir() {
        return Err(Error::BadDir(root.display().to_string()));
    }

    let mut out = BTreeMap::new();
    // Dot-directories are walked: remote folder names keep their leading dot.
    for entry in WalkDir::new(root).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_str().is_none_or(is_sentinel) {
            continue;
        }
        if let Some(rel) = relative_key(root, entry.path()) {
            out.insert(rel, entry.into_path());
        }
    }
    Ok(out)
}

/// Forward-slash relative path of `path` under `root`.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = rel
        .components()
        .map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();
    let parts = parts?;
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
