//! Recursive tree walk shared by copy and move.
//!
//! Each invocation walks sequentially: directories of a level before its
//! files, names in listing order. Cancellation is checked before every file
//! and before every directory descent. Per-item failures are recorded on the
//! tracker and the walk moves on to the next sibling.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use arbor_core::{path, FailureKind, FsError, PathKind};
use arbor_scan::{measure, DirectoryLister, ListError, TreeTotals};

use crate::conflict::{check_not_ancestor, clear_destination, Occupant};
use crate::progress::{OperationReport, ProgressTracker};

/// Whether the walk should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Cancelled,
}

/// Per-invocation walk settings.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WalkOptions {
    pub overwrite: bool,
    pub preserve_timestamps: bool,
    /// Skip the rename fast path and always move by copy then delete.
    pub copy_across: bool,
}

pub(crate) struct TreeWalker<'a> {
    tracker: ProgressTracker<'a>,
    cancel: &'a CancellationToken,
    lister: DirectoryLister,
    options: WalkOptions,
    /// Canonical directories on the current descent, for loop detection.
    ancestors: Vec<PathBuf>,
}

impl<'a> TreeWalker<'a> {
    pub fn new(
        tracker: ProgressTracker<'a>,
        cancel: &'a CancellationToken,
        options: WalkOptions,
    ) -> Self {
        Self {
            tracker,
            cancel,
            lister: DirectoryLister::for_walk(),
            options,
            ancestors: Vec::new(),
        }
    }

    pub fn finish(self, flow: Flow) -> OperationReport {
        self.tracker.finish(flow == Flow::Cancelled)
    }

    /// Copy `source` (file or directory) to `dest_dir/basename(source)`.
    pub fn copy_into(&mut self, source: &Path, dest_dir: &Path) -> Flow {
        if self.cancel.is_cancelled() {
            return Flow::Cancelled;
        }

        let Some(name) = target_name(source) else {
            self.tracker.fail_item(source, &no_file_name(source));
            return Flow::Continue;
        };
        let target = dest_dir.join(name);

        match PathKind::of(source) {
            PathKind::File => {
                self.copy_file(source, &target);
                Flow::Continue
            }
            PathKind::Directory => self.copy_directory(source, &target),
            PathKind::Missing => {
                self.tracker.fail_item(
                    source,
                    &FsError::NotFound {
                        path: source.to_path_buf(),
                    },
                );
                Flow::Continue
            }
        }
    }

    fn copy_file(&mut self, source: &Path, target: &Path) {
        self.tracker.begin_item(target);
        let result = clear_destination(source, target, self.options.overwrite, false)
            .and_then(|()| copy_file_contents(source, target, self.options.preserve_timestamps));
        match result {
            Ok(bytes) => self.tracker.complete_item(target, 1, bytes),
            Err(e) => self.tracker.fail_item(target, &e),
        }
    }

    fn copy_directory(&mut self, source: &Path, target: &Path) -> Flow {
        let prepared = check_not_ancestor(source, target)
            .and_then(|()| clear_destination(source, target, self.options.overwrite, true))
            .and_then(|()| fs::create_dir_all(target).map_err(|e| FsError::io(target, e)));
        if let Err(e) = prepared {
            self.tracker.fail_item(source, &e);
            return Flow::Continue;
        }

        self.descend(source, |walker, child| walker.copy_into(child, target))
    }

    /// Move `source` to `dest_dir/basename(source)`.
    ///
    /// Same-volume moves are a single rename of the whole item. Cross-volume
    /// moves recurse, copying each file and deleting its source, then remove
    /// the emptied source directories. `totals` is the already measured size
    /// of `source`, if known.
    pub fn move_into(
        &mut self,
        source: &Path,
        dest_dir: &Path,
        totals: Option<TreeTotals>,
    ) -> Flow {
        if self.cancel.is_cancelled() {
            return Flow::Cancelled;
        }

        let Some(name) = target_name(source) else {
            self.tracker.fail_item(source, &no_file_name(source));
            return Flow::Continue;
        };
        let target = dest_dir.join(name);

        let source_occupant = Occupant::of(source);
        if source_occupant == Occupant::Vacant {
            self.tracker.fail_item(
                source,
                &FsError::NotFound {
                    path: source.to_path_buf(),
                },
            );
            return Flow::Continue;
        }

        let ancestry = match source_occupant {
            Occupant::Directory => check_not_ancestor(source, &target),
            _ => Ok(()),
        };
        let prepared = ancestry
            .and_then(|()| clear_destination(source, &target, self.options.overwrite, false));
        if let Err(e) = prepared {
            self.tracker.fail_item(source, &e);
            return Flow::Continue;
        }

        if !self.options.copy_across && path::same_volume(source, dest_dir) {
            let totals = totals.unwrap_or_else(|| measure(source, self.cancel));
            self.tracker.begin_item(&target);
            match fs::rename(source, &target) {
                Ok(()) => {
                    self.tracker
                        .complete_item(&target, totals.files, totals.bytes);
                    return Flow::Continue;
                }
                Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                    tracing::debug!(path = %source.display(), "rename crosses devices, copying instead");
                }
                Err(e) => {
                    self.tracker.fail_item(&target, &FsError::io(source, e));
                    return Flow::Continue;
                }
            }
        }

        if source_occupant == Occupant::Directory {
            self.move_directory_across(source, &target)
        } else {
            self.move_file_across(source, &target);
            Flow::Continue
        }
    }

    fn move_file_across(&mut self, source: &Path, target: &Path) {
        self.tracker.begin_item(target);
        let result = transfer_leaf(source, target).and_then(|bytes| {
            fs::remove_file(source)
                .map(|()| bytes)
                .map_err(|e| FsError::io(source, e))
        });
        match result {
            Ok(bytes) => self.tracker.complete_item(target, 1, bytes),
            Err(e) => self.tracker.fail_item(target, &e),
        }
    }

    fn move_directory_across(&mut self, source: &Path, target: &Path) -> Flow {
        if let Err(e) = fs::create_dir_all(target) {
            self.tracker.fail_item(source, &FsError::io(target, e));
            return Flow::Continue;
        }

        let failures_before = self.tracker.failed();
        let flow = self.descend(source, |walker, child| walker.move_into(child, target, None));
        if flow == Flow::Cancelled {
            return flow;
        }

        // Only an emptied source can go; children that failed keep it alive
        // and were already reported.
        if self.tracker.failed() == failures_before {
            if let Err(e) = fs::remove_dir(source) {
                self.tracker.fail_item(source, &FsError::io(source, e));
            }
        }
        Flow::Continue
    }

    /// Enumerate `dir` and apply `step` to each child, directories first.
    fn descend<F>(&mut self, dir: &Path, mut step: F) -> Flow
    where
        F: FnMut(&mut Self, &Path) -> Flow,
    {
        if self.cancel.is_cancelled() {
            return Flow::Cancelled;
        }

        let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        if self.ancestors.contains(&canonical) {
            let error = FsError::Io {
                path: dir.to_path_buf(),
                source: io::Error::other("symbolic link loop"),
            };
            self.tracker.fail_item(dir, &error);
            return Flow::Continue;
        }

        let listing = match self.lister.enumerate(dir, self.cancel) {
            Ok(listing) => listing,
            Err(ListError::Cancelled) => return Flow::Cancelled,
            Err(ListError::NotFound { path }) => {
                self.tracker.fail_item(dir, &FsError::NotFound { path });
                return Flow::Continue;
            }
            Err(e @ ListError::NotADirectory { .. }) => {
                let error = FsError::Io {
                    path: dir.to_path_buf(),
                    source: io::Error::other(e.to_string()),
                };
                self.tracker.fail_item(dir, &error);
                return Flow::Continue;
            }
        };

        for warning in &listing.warnings {
            let path = warning.path.clone();
            let error = match warning.kind {
                FailureKind::AccessDenied => FsError::AccessDenied { path },
                FailureKind::NotFound => FsError::NotFound { path },
                _ => FsError::Io {
                    path,
                    source: io::Error::other(warning.message.clone()),
                },
            };
            self.tracker.fail_item(&warning.path, &error);
        }

        self.ancestors.push(canonical);
        let mut flow = Flow::Continue;
        for child in &listing.entries {
            if step(self, &child.full_path) == Flow::Cancelled {
                flow = Flow::Cancelled;
                break;
            }
        }
        self.ancestors.pop();
        flow
    }
}

/// Copy one file's bytes, optionally carrying over its modification time.
pub(crate) fn copy_file_contents(
    source: &Path,
    target: &Path,
    preserve_timestamps: bool,
) -> Result<u64, FsError> {
    let bytes = fs::copy(source, target).map_err(|e| FsError::io(source, e))?;

    if preserve_timestamps {
        let modified = fs::metadata(source)
            .and_then(|m| m.modified())
            .map_err(|e| FsError::io(source, e))?;
        fs::File::options()
            .write(true)
            .open(target)
            .and_then(|f| f.set_modified(modified))
            .map_err(|e| FsError::io(target, e))?;
    }

    Ok(bytes)
}

/// Carry one non-directory item across volumes, keeping symlinks as links.
fn transfer_leaf(source: &Path, target: &Path) -> Result<u64, FsError> {
    let meta = fs::symlink_metadata(source).map_err(|e| FsError::io(source, e))?;
    if meta.file_type().is_symlink() {
        recreate_symlink(source, target)?;
        return Ok(0);
    }
    copy_file_contents(source, target, true)
}

#[cfg(unix)]
fn recreate_symlink(source: &Path, target: &Path) -> Result<(), FsError> {
    let link = fs::read_link(source).map_err(|e| FsError::io(source, e))?;
    std::os::unix::fs::symlink(&link, target).map_err(|e| FsError::io(target, e))
}

#[cfg(windows)]
fn recreate_symlink(source: &Path, target: &Path) -> Result<(), FsError> {
    let link = fs::read_link(source).map_err(|e| FsError::io(source, e))?;
    let result = if fs::metadata(source).is_ok_and(|m| m.is_dir()) {
        std::os::windows::fs::symlink_dir(&link, target)
    } else {
        std::os::windows::fs::symlink_file(&link, target)
    };
    result.map_err(|e| FsError::io(target, e))
}

#[cfg(not(any(unix, windows)))]
fn recreate_symlink(source: &Path, target: &Path) -> Result<(), FsError> {
    copy_file_contents(source, target, true).map(|_| ())
}

/// The name a source takes at its destination.
///
/// Paths like "." or "dir/.." have no final component, so they are resolved
/// first.
pub(crate) fn target_name(source: &Path) -> Option<OsString> {
    source
        .file_name()
        .map(|n| n.to_os_string())
        .or_else(|| source.canonicalize().ok()?.file_name().map(|n| n.to_os_string()))
}

pub(crate) fn no_file_name(source: &Path) -> FsError {
    FsError::Io {
        path: source.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
    }
}
