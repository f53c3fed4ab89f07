//! Move with progress reporting.

use std::fs;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use arbor_core::{FsError, OperationConfig};
use arbor_scan::measure;

use crate::conflict::{check_not_ancestor, Occupant};
use crate::event::{spawn_operation, OperationEvent};
use crate::progress::{OperationReport, OperationType, ProgressSink, ProgressTracker};
use crate::walk::{TreeWalker, WalkOptions};

/// Options for move operations.
#[derive(Debug, Clone, Copy)]
pub struct MoveOptions {
    /// Remove an existing destination item before moving over it.
    pub overwrite: bool,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self { overwrite: true }
    }
}

impl From<&OperationConfig> for MoveOptions {
    fn from(config: &OperationConfig) -> Self {
        Self {
            overwrite: config.overwrite,
        }
    }
}

/// Move `source` into the directory `destination`.
///
/// A move within one volume is a single rename and reports one item. Across
/// volumes each file is copied then deleted, and source directories are
/// removed once everything below them has moved.
pub fn move_to(
    source: &Path,
    destination: &Path,
    options: &MoveOptions,
    sink: &mut dyn ProgressSink,
    cancel: &CancellationToken,
) -> OperationReport {
    let mut tracker = ProgressTracker::new(OperationType::Move, source, sink);
    tracker.start();

    if cancel.is_cancelled() {
        return tracker.finish(true);
    }
    match Occupant::of(source) {
        Occupant::Vacant => {
            tracker.fail_item(
                source,
                &FsError::NotFound {
                    path: source.to_path_buf(),
                },
            );
            return tracker.finish(false);
        }
        Occupant::Directory => {
            if let Err(e) = check_not_ancestor(source, destination) {
                tracker.fail_item(source, &e);
                return tracker.finish(false);
            }
        }
        Occupant::File => {}
    }
    if let Err(e) = fs::create_dir_all(destination) {
        tracker.fail_item(destination, &FsError::io(destination, e));
        return tracker.finish(false);
    }

    let totals = measure(source, cancel);
    tracker.set_totals(totals.files, totals.bytes);

    let walk_options = WalkOptions {
        overwrite: options.overwrite,
        preserve_timestamps: true,
        copy_across: false,
    };
    let mut walker = TreeWalker::new(tracker, cancel, walk_options);
    let flow = walker.move_into(source, destination, Some(totals));
    walker.finish(flow)
}

/// Start a move on the blocking pool.
pub fn start_move(
    source: PathBuf,
    destination: PathBuf,
    options: MoveOptions,
    cancel: CancellationToken,
) -> mpsc::Receiver<OperationEvent> {
    spawn_operation(move |sink| move_to(&source, &destination, &options, sink, &cancel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NullSink, OperationState};
    use tempfile::TempDir;

    #[test]
    fn test_move_file_within_volume() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.txt");
        fs::write(&source, "12345").unwrap();
        let destination = temp.path().join("dst");

        let report = move_to(
            &source,
            &destination,
            &MoveOptions::default(),
            &mut NullSink,
            &CancellationToken::new(),
        );

        assert_eq!(report.state, OperationState::Completed);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.bytes_processed, 5);
        assert!(!source.exists());
        assert_eq!(fs::read_to_string(destination.join("a.txt")).unwrap(), "12345");
    }

    #[test]
    fn test_move_without_overwrite_keeps_both() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.txt");
        let destination = temp.path().join("dst");
        fs::create_dir(&destination).unwrap();
        fs::write(&source, "new").unwrap();
        fs::write(destination.join("a.txt"), "old").unwrap();

        let report = move_to(
            &source,
            &destination,
            &MoveOptions { overwrite: false },
            &mut NullSink,
            &CancellationToken::new(),
        );

        assert_eq!(report.state, OperationState::Failed);
        assert_eq!(
            report.errors[0].kind,
            arbor_core::FailureKind::DestinationConflict
        );
        assert!(source.exists());
        assert_eq!(fs::read_to_string(destination.join("a.txt")).unwrap(), "old");
    }

    #[test]
    fn test_move_directory_over_existing() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("docs");
        fs::create_dir_all(source.join("nested")).unwrap();
        fs::write(source.join("nested/readme.md"), "# hi").unwrap();
        let destination = temp.path().join("dst");
        fs::create_dir_all(destination.join("docs/stale")).unwrap();

        let report = move_to(
            &source,
            &destination,
            &MoveOptions::default(),
            &mut NullSink,
            &CancellationToken::new(),
        );

        assert!(report.is_success());
        assert!(!source.exists());
        assert!(destination.join("docs/nested/readme.md").exists());
        assert!(!destination.join("docs/stale").exists());
    }
}
