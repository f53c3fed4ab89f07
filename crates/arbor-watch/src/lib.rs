//! Shallow directory watch service for arbor.
//!
//! Watches the direct children of one directory and publishes coalesced
//! change batches to any number of subscribers, so listings can refresh
//! while operations mutate the tree.
//!
//! # Example
//!
//! ```no_run
//! use arbor_watch::DirectoryWatcher;
//!
//! # async fn run() -> Result<(), arbor_watch::WatchError> {
//! let mut watcher = DirectoryWatcher::default();
//! let mut rx = watcher.subscribe();
//! watcher.start("/tmp")?;
//!
//! while let Ok(batch) = rx.recv().await {
//!     for change in batch.events {
//!         println!("{} {}", change.change_type, change.path.display());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use thiserror::Error;

mod event;
mod watcher;

pub use event::{classify, coalesce, ChangeKind, FileSystemChangeEvent, WatchNotification};
pub use watcher::DirectoryWatcher;

/// Errors that can occur when starting a watch.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Watch backend error: {0}")]
    Backend(#[from] notify::Error),
}
