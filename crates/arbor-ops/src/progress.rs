//! Progress reporting types for file operations.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use arbor_core::FsError;

use crate::OperationError;

/// The type of operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Copy,
    Move,
    Delete,
    CreateDirectory,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Copy => write!(f, "Copy"),
            Self::Move => write!(f, "Move"),
            Self::Delete => write!(f, "Delete"),
            Self::CreateDirectory => write!(f, "Create directory"),
        }
    }
}

/// Lifecycle state carried by a progress report.
///
/// `Completed` and `Failed` are used both for single items and, on the final
/// report of an invocation, for the operation as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum OperationState {
    Starting,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl OperationState {
    /// Check if this state can end an invocation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Point-in-time report emitted during an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationProgress {
    /// The type of operation.
    pub operation_type: OperationType,
    /// State of the item (or of the whole operation when `terminal`).
    pub state: OperationState,
    /// The path currently being processed; the invocation root on
    /// `Starting` and on the terminal report.
    pub current_file: PathBuf,
    /// Total number of files to process (0 if not yet known).
    pub total_files: usize,
    /// Number of files processed so far.
    pub processed_files: usize,
    /// Total bytes to process (0 if not yet known).
    pub total_bytes: u64,
    /// Number of bytes processed so far.
    pub processed_bytes: u64,
    /// Whether this is the final report of the invocation.
    pub terminal: bool,
    /// The failure behind a `Failed` item report.
    pub error: Option<OperationError>,
}

impl OperationProgress {
    /// Create the initial progress for an operation rooted at `root`.
    pub fn new(operation_type: OperationType, root: impl Into<PathBuf>) -> Self {
        Self {
            operation_type,
            state: OperationState::Starting,
            current_file: root.into(),
            total_files: 0,
            processed_files: 0,
            total_bytes: 0,
            processed_bytes: 0,
            terminal: false,
            error: None,
        }
    }

    /// Get the progress as a percentage (0.0 to 100.0).
    ///
    /// Defined as 0 while the byte total is unknown.
    pub fn percent_complete(&self) -> f64 {
        if self.total_bytes > 0 {
            (self.processed_bytes as f64 / self.total_bytes as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Check if this report is about a single item rather than the operation.
    pub fn is_item_report(&self) -> bool {
        !self.terminal && self.state != OperationState::Starting
    }
}

/// Receives progress reports from a running operation.
///
/// Called synchronously from whichever thread performs the I/O; consumers
/// that drive a UI must hop to their own thread themselves.
pub trait ProgressSink {
    /// Handle one progress report.
    fn report(&mut self, progress: OperationProgress);
}

impl<F> ProgressSink for F
where
    F: FnMut(OperationProgress),
{
    fn report(&mut self, progress: OperationProgress) {
        self(progress)
    }
}

/// A sink that discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&mut self, _progress: OperationProgress) {}
}

/// Result of a finished operation invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationReport {
    /// The type of operation.
    pub operation_type: OperationType,
    /// The root path the invocation operated on.
    pub source: PathBuf,
    /// Terminal state.
    pub state: OperationState,
    /// Number of items successfully processed.
    pub succeeded: usize,
    /// Number of items that failed.
    pub failed: usize,
    /// Number of files processed.
    pub files_processed: usize,
    /// Total bytes processed.
    pub bytes_processed: u64,
    /// Errors that occurred.
    pub errors: Vec<OperationError>,
}

impl OperationReport {
    /// Check if the operation was fully successful.
    pub fn is_success(&self) -> bool {
        self.state == OperationState::Completed && self.failed == 0
    }

    /// Get a human-readable summary of the operation.
    pub fn summary(&self) -> String {
        summarize(self.operation_type, self.state, self.succeeded, self.failed)
    }
}

pub(crate) fn summarize(
    operation_type: OperationType,
    state: OperationState,
    succeeded: usize,
    failed: usize,
) -> String {
    let action = match operation_type {
        OperationType::Copy => "Copied",
        OperationType::Move => "Moved",
        OperationType::Delete => "Deleted",
        OperationType::CreateDirectory => "Created",
    };

    let mut summary = if failed == 0 {
        format!("{} {} items", action, succeeded)
    } else {
        format!("{} {} items, {} failed", action, succeeded, failed)
    };
    if state == OperationState::Cancelled {
        summary.push_str(" (cancelled)");
    }
    summary
}

/// Internal tracker that turns walk events into progress reports.
pub(crate) struct ProgressTracker<'a> {
    progress: OperationProgress,
    sink: &'a mut dyn ProgressSink,
    succeeded: usize,
    failed: usize,
    errors: Vec<OperationError>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(
        operation_type: OperationType,
        root: &Path,
        sink: &'a mut dyn ProgressSink,
    ) -> Self {
        Self {
            progress: OperationProgress::new(operation_type, root),
            sink,
            succeeded: 0,
            failed: 0,
            errors: Vec::new(),
        }
    }

    /// Emit the single `Starting` report.
    pub fn start(&mut self) {
        tracing::info!(
            operation = %self.progress.operation_type,
            root = %self.progress.current_file.display(),
            "operation starting"
        );
        self.emit(OperationState::Starting, None, None);
    }

    /// Record pre-counted totals for percentage reporting.
    pub fn set_totals(&mut self, files: usize, bytes: u64) {
        self.progress.total_files = files;
        self.progress.total_bytes = bytes;
    }

    /// An item is about to be processed.
    pub fn begin_item(&mut self, path: &Path) {
        tracing::debug!(path = %path.display(), "processing");
        self.emit(OperationState::InProgress, Some(path), None);
    }

    /// An item (covering `files` files and `bytes` bytes) finished.
    pub fn complete_item(&mut self, path: &Path, files: usize, bytes: u64) {
        self.succeeded += 1;
        self.progress.processed_files += files;
        self.progress.processed_bytes += bytes;
        self.emit(OperationState::Completed, Some(path), None);
    }

    /// An item failed; the walk carries on.
    pub fn fail_item(&mut self, path: &Path, error: &FsError) {
        tracing::warn!(path = %path.display(), error = %error, "item failed");
        let error = OperationError::from_fs(path, error);
        self.failed += 1;
        self.errors.push(error.clone());
        self.emit(OperationState::Failed, Some(path), Some(error));
    }

    /// Number of failed items so far.
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Emit the terminal report and build the final result.
    pub fn finish(mut self, cancelled: bool) -> OperationReport {
        let state = if cancelled {
            OperationState::Cancelled
        } else if self.failed > 0 && self.succeeded == 0 {
            OperationState::Failed
        } else {
            OperationState::Completed
        };

        let root = self.progress.current_file.clone();
        self.progress.terminal = true;
        self.emit(state, None, None);

        let report = OperationReport {
            operation_type: self.progress.operation_type,
            source: root,
            state,
            succeeded: self.succeeded,
            failed: self.failed,
            files_processed: self.progress.processed_files,
            bytes_processed: self.progress.processed_bytes,
            errors: self.errors,
        };
        tracing::info!(summary = %report.summary(), state = %state, "operation finished");
        report
    }

    fn emit(&mut self, state: OperationState, path: Option<&Path>, error: Option<OperationError>) {
        let mut snapshot = self.progress.clone();
        snapshot.state = state;
        if let Some(path) = path {
            snapshot.current_file = path.to_path_buf();
        }
        snapshot.error = error;
        self.sink.report(snapshot);
    }
}
