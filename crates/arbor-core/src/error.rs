//! Error types for file system operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while listing, classifying or operating on paths.
#[derive(Debug, Error)]
pub enum FsError {
    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Permission denied or the item is locked by another process.
    #[error("Access denied: {path}")]
    AccessDenied { path: PathBuf },

    /// Destination exists and overwriting is disallowed.
    #[error("Destination already exists: {path}")]
    DestinationConflict { path: PathBuf },

    /// A directory cannot be copied or moved into its own subtree.
    #[error("Cannot copy or move {source_path} into itself ({destination})")]
    SourceIsAncestor {
        source_path: PathBuf,
        destination: PathBuf,
    },

    /// Operation was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl FsError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::AccessDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// The failure category for per-item reporting.
    ///
    /// Returns `None` for cancellation, which is a terminal state and not a
    /// failure.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::NotFound { .. } => Some(FailureKind::NotFound),
            Self::AccessDenied { .. } => Some(FailureKind::AccessDenied),
            Self::DestinationConflict { .. } => Some(FailureKind::DestinationConflict),
            Self::SourceIsAncestor { .. } => Some(FailureKind::SourceIsAncestor),
            Self::Io { .. } | Self::InvalidConfig { .. } => Some(FailureKind::Io),
            Self::Cancelled => None,
        }
    }

    /// The path the error refers to, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::NotFound { path }
            | Self::AccessDenied { path }
            | Self::DestinationConflict { path }
            | Self::Io { path, .. } => Some(path),
            Self::SourceIsAncestor { source_path, .. } => Some(source_path),
            Self::Cancelled | Self::InvalidConfig { .. } => None,
        }
    }
}

/// Category of a per-item failure recorded during a tree walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum FailureKind {
    /// The item vanished before or during the operation.
    #[strum(to_string = "Not found")]
    NotFound,
    /// Permission or lock conflict.
    #[strum(to_string = "Access denied")]
    AccessDenied,
    /// Destination exists and overwrite is disallowed.
    #[strum(to_string = "Destination exists")]
    DestinationConflict,
    /// Source directory contains the destination.
    #[strum(to_string = "Destination inside source")]
    SourceIsAncestor,
    /// Any other I/O failure (disk full, device error, ...).
    #[strum(to_string = "I/O error")]
    Io,
}
