//! Single-directory lister producing uniform [`FileSystemEntry`] values.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use arbor_core::{path, EntryKind, FailureKind, FileSystemEntry, FsError, ListConfig};

use crate::drives::list_drives;

/// Errors that abort a listing.
///
/// Permission and I/O problems during enumeration are not errors: they yield a
/// partial [`Listing`] with warnings instead.
#[derive(Debug, Error)]
pub enum ListError {
    /// The directory does not exist.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// The path exists but is not a directory.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// The caller cancelled the enumeration.
    #[error("Listing cancelled")]
    Cancelled,
}

/// Non-fatal problem encountered while enumerating a directory.
#[derive(Debug, Clone)]
pub struct ListWarning {
    /// Path where the problem occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Failure category.
    pub kind: FailureKind,
}

impl ListWarning {
    fn from_io(path: &Path, error: std::io::Error) -> Self {
        let fs_error = FsError::io(path, error);
        Self {
            path: path.to_path_buf(),
            message: fs_error.to_string(),
            kind: fs_error.kind().unwrap_or(FailureKind::Io),
        }
    }
}

/// The result of listing one directory (or the volume set).
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// The listed directory, `None` for the root (volume) view.
    pub path: Option<PathBuf>,
    /// Entries in display order.
    pub entries: Vec<FileSystemEntry>,
    /// Problems that cut the enumeration short or skipped entries.
    pub warnings: Vec<ListWarning>,
}

impl Listing {
    /// Whether enumeration hit a problem and the entries may be incomplete.
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Entries excluding the ".." marker.
    pub fn children(&self) -> impl Iterator<Item = &FileSystemEntry> {
        self.entries
            .iter()
            .filter(|e| e.kind != EntryKind::ParentDirectory)
    }

    /// Count directories, files and file bytes in this listing.
    pub fn summary(&self) -> ListSummary {
        let mut summary = ListSummary::default();
        for entry in self.children() {
            match entry.kind {
                EntryKind::Directory => summary.directories += 1,
                EntryKind::File => {
                    summary.files += 1;
                    summary.total_bytes += entry.size;
                }
                EntryKind::Drive => summary.drives += 1,
                EntryKind::ParentDirectory => {}
            }
        }
        summary
    }
}

/// Counts shown in a panel status line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListSummary {
    pub directories: usize,
    pub files: usize,
    pub drives: usize,
    pub total_bytes: u64,
}

/// Lists directory contents into [`FileSystemEntry`] values.
#[derive(Debug, Clone, Default)]
pub struct DirectoryLister {
    config: ListConfig,
}

impl DirectoryLister {
    /// Create a lister with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a lister with a specific configuration.
    pub fn with_config(config: ListConfig) -> Self {
        Self { config }
    }

    /// A lister suited to tree walks: every entry, no ".." marker.
    pub fn for_walk() -> Self {
        Self::with_config(ListConfig {
            show_hidden: true,
            include_parent: false,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    /// List `path`, or the available drives when `path` is `None` or empty.
    ///
    /// Directories come before files, each group sorted by name. A ".."
    /// marker is injected first when the directory has a parent and the
    /// configuration asks for it.
    pub fn list(
        &self,
        path: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<Listing, ListError> {
        let Some(dir) = path.filter(|p| !p.as_os_str().is_empty()) else {
            let entries = list_drives(cancel)?;
            return Ok(Listing {
                path: None,
                entries,
                warnings: Vec::new(),
            });
        };

        let mut listing = self.enumerate(dir, cancel)?;
        if self.config.include_parent {
            if let Some(parent) = path::parent_of(dir) {
                listing
                    .entries
                    .insert(0, FileSystemEntry::parent_marker(parent));
            }
        }
        Ok(listing)
    }

    /// Enumerate the members of `dir` without a ".." marker.
    pub fn enumerate(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Listing, ListError> {
        if cancel.is_cancelled() {
            return Err(ListError::Cancelled);
        }

        match fs::metadata(dir) {
            Ok(m) if m.is_dir() => {}
            Ok(_) => {
                return Err(ListError::NotADirectory {
                    path: dir.to_path_buf(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ListError::NotFound {
                    path: dir.to_path_buf(),
                })
            }
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "cannot stat directory");
                return Ok(Listing {
                    path: Some(dir.to_path_buf()),
                    entries: Vec::new(),
                    warnings: vec![ListWarning::from_io(dir, e)],
                });
            }
        }

        let mut listing = Listing {
            path: Some(dir.to_path_buf()),
            ..Default::default()
        };

        let read_dir = match fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "cannot read directory");
                listing.warnings.push(ListWarning::from_io(dir, e));
                return Ok(listing);
            }
        };

        for entry in read_dir {
            if cancel.is_cancelled() {
                return Err(ListError::Cancelled);
            }

            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    // Enumeration itself broke; keep what was gathered so far.
                    tracing::warn!(path = %dir.display(), error = %e, "directory enumeration interrupted");
                    listing.warnings.push(ListWarning::from_io(dir, e));
                    break;
                }
            };

            let name = entry.file_name();
            if self.config.should_skip(&name.to_string_lossy()) {
                continue;
            }

            match build_entry(&entry.path()) {
                Ok(e) => listing.entries.push(e),
                Err(warning) => {
                    tracing::debug!(path = %warning.path.display(), "skipping unreadable entry");
                    listing.warnings.push(warning);
                }
            }
        }

        listing.entries.sort_by(compare_entries);
        Ok(listing)
    }
}

/// Build an entry for one directory member, following symlinks for its kind.
fn build_entry(path: &Path) -> Result<FileSystemEntry, ListWarning> {
    let link_meta = fs::symlink_metadata(path).map_err(|e| ListWarning::from_io(path, e))?;
    let is_symlink = link_meta.file_type().is_symlink();

    let meta = if is_symlink {
        match fs::metadata(path) {
            Ok(m) => m,
            // Broken link: show it as an empty file.
            Err(_) => {
                return Ok(
                    FileSystemEntry::file(path.to_path_buf(), 0, link_meta.modified().ok())
                        .with_symlink(true),
                );
            }
        }
    } else {
        link_meta
    };

    let entry = if meta.is_dir() {
        FileSystemEntry::directory(path.to_path_buf(), meta.modified().ok())
    } else {
        FileSystemEntry::file(path.to_path_buf(), meta.len(), meta.modified().ok())
    };
    Ok(entry.with_symlink(is_symlink))
}

/// Directories first, then files; case-insensitive name order within each
/// group with the exact name as tie-breaker.
fn compare_entries(a: &FileSystemEntry, b: &FileSystemEntry) -> Ordering {
    let rank = |e: &FileSystemEntry| match e.kind {
        EntryKind::ParentDirectory => 0,
        EntryKind::Drive => 1,
        EntryKind::Directory => 2,
        EntryKind::File => 3,
    };
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}
