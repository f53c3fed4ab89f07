//! Tree operation engine for arbor.
//!
//! Copy, move and delete a file or a whole directory tree with incremental
//! progress reports, cooperative cancellation and per-item failure isolation.
//!
//! Each operation comes in two forms:
//!
//! - a blocking function (`copy`, `move_to`, `delete`, `create_directory`)
//!   that reports through a [`ProgressSink`] on the calling thread and
//!   returns an [`OperationReport`];
//! - a `start_*` adapter that runs the same function on tokio's blocking pool
//!   and returns an `mpsc::Receiver<OperationEvent>`.
//!
//! [`OperationExecutor`] runs a multi-item [`FileOperation`] with bounded
//! concurrency and aggregates the per-item reports in source order.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use arbor_ops::{copy, CopyOptions, OperationProgress};
//! use tokio_util::sync::CancellationToken;
//!
//! let mut sink = |p: OperationProgress| println!("{} {}", p.state, p.current_file.display());
//! let report = copy(
//!     Path::new("/data/src"),
//!     Path::new("/backup"),
//!     &CopyOptions::default(),
//!     &mut sink,
//!     &CancellationToken::new(),
//! );
//! println!("{}", report.summary());
//! ```

mod conflict;
mod copy;
mod create;
mod delete;
mod event;
mod executor;
mod move_op;
mod operation;
mod progress;
mod walk;

pub use conflict::{check_not_ancestor, clear_destination, is_same_item, Occupant};
pub use copy::{copy, start_copy, CopyOptions};
pub use create::{create_directory, start_create_directory};
pub use delete::{delete, start_delete, DeleteOptions};
pub use event::OperationEvent;
pub use executor::{BatchReport, ExecutorEvent, OperationExecutor};
pub use move_op::{move_to, start_move, MoveOptions};
pub use operation::{FileOperation, OperationError};
pub use progress::{
    NullSink, OperationProgress, OperationReport, OperationState, OperationType, ProgressSink,
};

/// Default channel buffer size for operation progress updates.
pub const OPERATION_CHANNEL_SIZE: usize = 100;
