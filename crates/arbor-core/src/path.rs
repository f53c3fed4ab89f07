//! Path classification helpers.
//!
//! Everything here is synchronous and side-effect free apart from metadata
//! queries.

use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

/// What a path currently resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum PathKind {
    /// An existing file (symlinks are followed).
    File,
    /// An existing directory (symlinks are followed).
    Directory,
    /// Nothing resolvable: missing path or broken symlink.
    Missing,
}

impl PathKind {
    /// Classify a path.
    pub fn of(path: &Path) -> Self {
        match std::fs::metadata(path) {
            Ok(m) if m.is_dir() => Self::Directory,
            Ok(_) => Self::File,
            Err(_) => Self::Missing,
        }
    }
}

/// True iff `path` resolves to an existing file or directory.
pub fn exists(path: &Path) -> bool {
    PathKind::of(path) != PathKind::Missing
}

/// True iff `path` resolves to an existing directory.
pub fn is_directory(path: &Path) -> bool {
    PathKind::of(path) == PathKind::Directory
}

/// Parent of `path`, or `None` at a file system root.
///
/// Relative paths are resolved against the current directory first so that
/// "docs" has a parent even though it has no separator.
pub fn parent_of(path: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    absolute
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

/// The initial directory shown to the user: the home directory, falling back
/// to the current directory and finally the file system root.
pub fn default_directory() -> PathBuf {
    dirs::home_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from(std::path::MAIN_SEPARATOR_STR))
}

/// Check whether `candidate` is `ancestor` or lies beneath it.
///
/// Both paths are canonicalized when possible so that symlinked or relative
/// spellings of the same directory are caught. A `candidate` that does not
/// exist yet is compared through its nearest existing ancestor.
pub fn is_within(candidate: &Path, ancestor: &Path) -> bool {
    let ancestor = ancestor
        .canonicalize()
        .unwrap_or_else(|_| ancestor.to_path_buf());
    let mut probe = candidate.to_path_buf();
    let mut suffix = Vec::new();
    loop {
        if let Ok(resolved) = probe.canonicalize() {
            let full = suffix.iter().rev().fold(resolved, |acc, part| acc.join(part));
            return full.starts_with(&ancestor);
        }
        match (probe.file_name().map(|n| n.to_os_string()), probe.parent()) {
            (Some(name), Some(parent)) => {
                suffix.push(name);
                probe = parent.to_path_buf();
            }
            _ => return candidate.starts_with(&ancestor),
        }
    }
}

/// Whether the existing `item` lives on the same storage volume as the
/// directory `dir`.
///
/// A final symlink in `item` is not followed, so a link is placed by where
/// the link itself lives. `dir` is resolved. Compares device ids on Unix.
/// Elsewhere this conservatively answers `true` and callers rely on the
/// rename attempt to detect a cross-volume move.
#[cfg(unix)]
pub fn same_volume(item: &Path, dir: &Path) -> bool {
    match (std::fs::symlink_metadata(item), std::fs::metadata(dir)) {
        (Ok(mi), Ok(md)) => mi.dev() == md.dev(),
        _ => false,
    }
}

#[cfg(not(unix))]
pub fn same_volume(_item: &Path, _dir: &Path) -> bool {
    true
}
