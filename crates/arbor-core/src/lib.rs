//! Core types and traits for arbor.
//!
//! This crate provides the fundamental data structures shared by the lister,
//! the operation engine and the watch service: listing entries, the error
//! taxonomy, path classification and configuration.

mod config;
mod entry;
mod error;
pub mod path;

pub use config::{
    ArborConfig, ListConfig, ListConfigBuilder, OperationConfig, OperationConfigBuilder,
    WatchConfig, WatchConfigBuilder,
};
pub use entry::{DriveInfo, EntryKind, FileSystemEntry, PARENT_MARKER};
pub use error::{FailureKind, FsError};
pub use path::PathKind;
