//! Recursive copy with progress reporting.

use std::fs;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use arbor_core::{FsError, OperationConfig, PathKind};
use arbor_scan::measure;

use crate::conflict::check_not_ancestor;
use crate::event::{spawn_operation, OperationEvent};
use crate::progress::{OperationReport, OperationType, ProgressSink, ProgressTracker};
use crate::walk::{Flow, TreeWalker, WalkOptions};

/// Options for copy operations.
#[derive(Debug, Clone, Copy)]
pub struct CopyOptions {
    /// Replace existing destination items instead of failing them.
    pub overwrite: bool,
    /// Whether to preserve modification times.
    pub preserve_timestamps: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            preserve_timestamps: false,
        }
    }
}

impl From<&OperationConfig> for CopyOptions {
    fn from(config: &OperationConfig) -> Self {
        Self {
            overwrite: config.overwrite,
            preserve_timestamps: config.preserve_timestamps,
        }
    }
}

/// Copy `source` (a file or a directory tree) into the directory
/// `destination`, producing `destination/basename(source)`.
///
/// Reports flow to `sink` on the calling thread. The walk is sequential and
/// checks `cancel` before every file and directory.
pub fn copy(
    source: &Path,
    destination: &Path,
    options: &CopyOptions,
    sink: &mut dyn ProgressSink,
    cancel: &CancellationToken,
) -> OperationReport {
    let mut tracker = ProgressTracker::new(OperationType::Copy, source, sink);
    tracker.start();

    if cancel.is_cancelled() {
        return tracker.finish(true);
    }
    match PathKind::of(source) {
        PathKind::Missing => {
            tracker.fail_item(
                source,
                &FsError::NotFound {
                    path: source.to_path_buf(),
                },
            );
            return tracker.finish(false);
        }
        PathKind::Directory => {
            if let Err(e) = check_not_ancestor(source, destination) {
                tracker.fail_item(source, &e);
                return tracker.finish(false);
            }
        }
        PathKind::File => {}
    }
    if let Err(e) = fs::create_dir_all(destination) {
        tracker.fail_item(destination, &FsError::io(destination, e));
        return tracker.finish(false);
    }

    let totals = measure(source, cancel);
    tracker.set_totals(totals.files, totals.bytes);

    let walk_options = WalkOptions {
        overwrite: options.overwrite,
        preserve_timestamps: options.preserve_timestamps,
        copy_across: false,
    };
    let mut walker = TreeWalker::new(tracker, cancel, walk_options);
    let flow: Flow = walker.copy_into(source, destination);
    walker.finish(flow)
}

/// Start a copy on the blocking pool.
///
/// Returns a receiver for progress updates, ending with
/// [`OperationEvent::Complete`].
pub fn start_copy(
    source: PathBuf,
    destination: PathBuf,
    options: CopyOptions,
    cancel: CancellationToken,
) -> mpsc::Receiver<OperationEvent> {
    spawn_operation(move |sink| copy(&source, &destination, &options, sink, &cancel))
}
