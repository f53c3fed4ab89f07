//! Directory listing engine for arbor.
//!
//! This crate turns directories into ordered [`FileSystemEntry`] listings
//! and measures trees before long-running operations.
//!
//! # Overview
//!
//! - **Listing** of one directory: directories before files, ".." first
//! - **Root view**: an empty path lists mounted volumes instead
//! - **Soft failures**: permission or I/O errors yield a partial listing
//! - **Cancellation** via [`CancellationToken`](tokio_util::sync::CancellationToken)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use arbor_scan::DirectoryLister;
//! use tokio_util::sync::CancellationToken;
//!
//! let lister = DirectoryLister::new();
//! let listing = lister
//!     .list(Some(Path::new("/tmp")), &CancellationToken::new())
//!     .unwrap();
//!
//! for entry in &listing.entries {
//!     println!("{:>10} {}", entry.size, entry.name);
//! }
//! if listing.is_partial() {
//!     eprintln!("some entries could not be read");
//! }
//! ```

mod drives;
mod lister;
mod totals;

pub use drives::list_drives;
pub use lister::{DirectoryLister, ListError, ListSummary, ListWarning, Listing};
pub use totals::{measure, TreeTotals};

// Re-export core types for convenience
pub use arbor_core::{EntryKind, FileSystemEntry, ListConfig};
