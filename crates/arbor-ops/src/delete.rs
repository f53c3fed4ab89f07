//! Delete as one logical step.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use arbor_core::{FsError, OperationConfig};
use arbor_scan::measure;

use crate::conflict::Occupant;
use crate::event::{spawn_operation, OperationEvent};
use crate::progress::{OperationReport, OperationType, ProgressSink, ProgressTracker};

/// Options for delete operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    /// Move to the platform trash instead of removing permanently.
    pub use_trash: bool,
}

impl From<&OperationConfig> for DeleteOptions {
    fn from(config: &OperationConfig) -> Self {
        Self {
            use_trash: config.use_trash,
        }
    }
}

/// Delete `path` and everything below it.
///
/// Deleting a path that does not exist completes with zero items. There is
/// no per-child progress; one item report covers the whole tree.
pub fn delete(
    path: &Path,
    options: &DeleteOptions,
    sink: &mut dyn ProgressSink,
    cancel: &CancellationToken,
) -> OperationReport {
    let mut tracker = ProgressTracker::new(OperationType::Delete, path, sink);
    tracker.start();

    if cancel.is_cancelled() {
        return tracker.finish(true);
    }

    let occupant = Occupant::of(path);
    if occupant == Occupant::Vacant {
        tracing::debug!(path = %path.display(), "nothing to delete");
        return tracker.finish(false);
    }

    let totals = measure(path, cancel);
    tracker.set_totals(totals.files, totals.bytes);
    tracker.begin_item(path);

    match remove(path, occupant, options.use_trash) {
        Ok(()) => tracker.complete_item(path, totals.files, totals.bytes),
        Err(e) => tracker.fail_item(path, &e),
    }
    tracker.finish(false)
}

fn remove(path: &Path, occupant: Occupant, use_trash: bool) -> Result<(), FsError> {
    if use_trash {
        return trash::delete(path).map_err(|e| FsError::Io {
            path: path.to_path_buf(),
            source: io::Error::other(e.to_string()),
        });
    }

    let result = match occupant {
        Occupant::Directory => fs::remove_dir_all(path),
        Occupant::File => fs::remove_file(path),
        Occupant::Vacant => Ok(()),
    };
    match result {
        // Lost a race with another deleter; the outcome is the same.
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other.map_err(|e| FsError::io(path, e)),
    }
}

/// Start a delete on the blocking pool.
pub fn start_delete(
    path: PathBuf,
    options: DeleteOptions,
    cancel: CancellationToken,
) -> mpsc::Receiver<OperationEvent> {
    spawn_operation(move |sink| delete(&path, &options, sink, &cancel))
}
