//! File operation types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use arbor_core::{FailureKind, FsError};

use crate::progress::OperationType;

/// A batch file operation: one engine invocation per top-level source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FileOperation {
    /// Copy files/directories into a destination directory.
    Copy {
        sources: Vec<PathBuf>,
        destination: PathBuf,
    },
    /// Move files/directories into a destination directory.
    Move {
        sources: Vec<PathBuf>,
        destination: PathBuf,
    },
    /// Delete files/directories.
    Delete { targets: Vec<PathBuf> },
    /// Create a directory (and any missing parents).
    CreateDirectory { path: PathBuf },
}

impl FileOperation {
    /// Create a copy operation.
    pub fn copy(sources: Vec<PathBuf>, destination: PathBuf) -> Self {
        Self::Copy {
            sources,
            destination,
        }
    }

    /// Create a move operation.
    pub fn move_to(sources: Vec<PathBuf>, destination: PathBuf) -> Self {
        Self::Move {
            sources,
            destination,
        }
    }

    /// Create a delete operation.
    pub fn delete(targets: Vec<PathBuf>) -> Self {
        Self::Delete { targets }
    }

    /// Create a directory creation operation.
    pub fn create_directory(path: PathBuf) -> Self {
        Self::CreateDirectory { path }
    }

    /// The kind of operation.
    pub fn operation_type(&self) -> OperationType {
        match self {
            Self::Copy { .. } => OperationType::Copy,
            Self::Move { .. } => OperationType::Move,
            Self::Delete { .. } => OperationType::Delete,
            Self::CreateDirectory { .. } => OperationType::CreateDirectory,
        }
    }

    /// The top-level items, one engine invocation each.
    pub fn sources(&self) -> Vec<PathBuf> {
        match self {
            Self::Copy { sources, .. } | Self::Move { sources, .. } => sources.clone(),
            Self::Delete { targets } => targets.clone(),
            Self::CreateDirectory { path } => vec![path.clone()],
        }
    }

    /// The destination directory, for copy and move.
    pub fn destination(&self) -> Option<&Path> {
        match self {
            Self::Copy { destination, .. } | Self::Move { destination, .. } => {
                Some(destination)
            }
            Self::Delete { .. } | Self::CreateDirectory { .. } => None,
        }
    }
}

/// A per-item failure recorded during an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    /// The path that caused the error.
    pub path: PathBuf,
    /// Failure category.
    pub kind: FailureKind,
    /// A human-readable error message.
    pub message: String,
}

impl OperationError {
    /// Create a new operation error.
    pub fn new(path: PathBuf, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }

    /// Record an [`FsError`] against the item at `path`.
    pub fn from_fs(path: &Path, error: &FsError) -> Self {
        Self::new(
            path.to_path_buf(),
            error.kind().unwrap_or(FailureKind::Io),
            error.to_string(),
        )
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}
