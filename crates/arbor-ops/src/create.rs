//! Directory creation.

use std::fs;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use arbor_core::{FsError, PathKind};

use crate::event::{spawn_operation, OperationEvent};
use crate::progress::{OperationReport, OperationType, ProgressSink, ProgressTracker};

/// Create `path` and any missing parents.
///
/// An existing directory counts as success; an existing file is a
/// destination conflict.
pub fn create_directory(
    path: &Path,
    sink: &mut dyn ProgressSink,
    cancel: &CancellationToken,
) -> OperationReport {
    let mut tracker = ProgressTracker::new(OperationType::CreateDirectory, path, sink);
    tracker.start();

    if cancel.is_cancelled() {
        return tracker.finish(true);
    }

    tracker.begin_item(path);
    let result = match PathKind::of(path) {
        PathKind::Directory => Ok(()),
        PathKind::File => Err(FsError::DestinationConflict {
            path: path.to_path_buf(),
        }),
        PathKind::Missing => fs::create_dir_all(path).map_err(|e| FsError::io(path, e)),
    };
    match result {
        Ok(()) => tracker.complete_item(path, 0, 0),
        Err(e) => tracker.fail_item(path, &e),
    }
    tracker.finish(false)
}

/// Start a directory creation on the blocking pool.
pub fn start_create_directory(
    path: PathBuf,
    cancel: CancellationToken,
) -> mpsc::Receiver<OperationEvent> {
    spawn_operation(move |sink| create_directory(&path, sink, &cancel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NullSink, OperationState};
    use tempfile::TempDir;

    #[test]
    fn test_create_nested() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a/b/c");
        let report = create_directory(&path, &mut NullSink, &CancellationToken::new());
        assert!(report.is_success());
        assert!(path.is_dir());
        assert_eq!(report.summary(), "Created 1 items");
    }

    #[test]
    fn test_create_over_file_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("taken");
        fs::write(&path, "x").unwrap();
        let report = create_directory(&path, &mut NullSink, &CancellationToken::new());
        assert_eq!(report.state, OperationState::Failed);
        assert!(path.is_file());
    }
}
