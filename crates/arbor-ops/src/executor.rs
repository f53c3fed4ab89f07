//! Bounded executor that runs one engine invocation per top-level item.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use arbor_core::{FailureKind, OperationConfig};

use crate::copy::{copy, CopyOptions};
use crate::create::create_directory;
use crate::delete::{delete, DeleteOptions};
use crate::move_op::{move_to, MoveOptions};
use crate::operation::{FileOperation, OperationError};
use crate::progress::{
    summarize, OperationProgress, OperationReport, OperationState, OperationType, ProgressSink,
};
use crate::OPERATION_CHANNEL_SIZE;

/// Message sent through the channel of a running batch.
#[derive(Debug, Clone)]
pub enum ExecutorEvent {
    /// A progress report from the invocation for `sources()[index]`.
    Progress {
        index: usize,
        progress: OperationProgress,
        /// Byte percentage across every invocation that has reported totals.
        overall_percent: f64,
    },
    /// Every invocation has finished; always the last message.
    Finished(BatchReport),
}

/// Aggregated result of a batch, one report per source in source order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub operation_type: OperationType,
    pub state: OperationState,
    pub reports: Vec<OperationReport>,
}

impl BatchReport {
    fn new(operation_type: OperationType, reports: Vec<OperationReport>, cancelled: bool) -> Self {
        let state = if cancelled || reports.iter().any(|r| r.state == OperationState::Cancelled) {
            OperationState::Cancelled
        } else if !reports.is_empty() && reports.iter().all(|r| r.state == OperationState::Failed)
        {
            OperationState::Failed
        } else {
            OperationState::Completed
        };

        Self {
            operation_type,
            state,
            reports,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.reports.iter().map(|r| r.succeeded).sum()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().map(|r| r.failed).sum()
    }

    pub fn bytes_processed(&self) -> u64 {
        self.reports.iter().map(|r| r.bytes_processed).sum()
    }

    /// All per-item failures across the batch.
    pub fn errors(&self) -> impl Iterator<Item = &OperationError> {
        self.reports.iter().flat_map(|r| r.errors.iter())
    }

    pub fn is_success(&self) -> bool {
        self.state == OperationState::Completed && self.failed() == 0
    }

    /// Get a human-readable summary of the batch.
    pub fn summary(&self) -> String {
        summarize(
            self.operation_type,
            self.state,
            self.succeeded(),
            self.failed(),
        )
    }
}

/// Runs a [`FileOperation`] with at most `max_concurrency` invocations in
/// flight.
///
/// Each top-level source gets its own independent, internally sequential
/// engine invocation on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct OperationExecutor {
    config: OperationConfig,
}

impl OperationExecutor {
    pub fn new(config: OperationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OperationConfig {
        &self.config
    }

    /// Start the batch and return its event stream.
    ///
    /// Must be called from within a tokio runtime. Cancelling `cancel` stops
    /// every invocation at its next checkpoint, including those still waiting
    /// for a slot.
    pub fn run(
        &self,
        operation: FileOperation,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<ExecutorEvent> {
        let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);
        let config = self.config.clone();

        tokio::spawn(async move {
            run_batch(Arc::new(operation), config, cancel, tx).await;
        });

        rx
    }
}

async fn run_batch(
    operation: Arc<FileOperation>,
    config: OperationConfig,
    cancel: CancellationToken,
    tx: mpsc::Sender<ExecutorEvent>,
) {
    let sources = operation.sources();
    let operation_type = operation.operation_type();
    let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
    let (progress_tx, mut progress_rx) =
        mpsc::channel::<(usize, OperationProgress)>(OPERATION_CHANNEL_SIZE);

    tracing::info!(
        operation = %operation_type,
        items = sources.len(),
        max_concurrency = config.max_concurrency,
        "batch starting"
    );

    let mut tasks = JoinSet::new();
    for (index, source) in sources.iter().cloned().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let operation = Arc::clone(&operation);
        let config = config.clone();
        let cancel = cancel.clone();
        let progress_tx = progress_tx.clone();

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let worker_source = source.clone();
            let joined = tokio::task::spawn_blocking(move || {
                // Blocks while the forwarder is behind.
                let mut sink = |progress: OperationProgress| {
                    let _ = progress_tx.blocking_send((index, progress));
                };
                run_one(&operation, &worker_source, &config, &mut sink, &cancel)
            })
            .await;
            (index, source, joined)
        });
    }
    drop(progress_tx);

    let mut reports: Vec<Option<OperationReport>> = vec![None; sources.len()];
    let mut byte_totals = vec![(0u64, 0u64); sources.len()];
    let mut receiver_gone = false;

    loop {
        tokio::select! {
            Some((index, progress)) = progress_rx.recv() => {
                byte_totals[index] = (progress.processed_bytes, progress.total_bytes);
                if receiver_gone {
                    continue;
                }
                let event = ExecutorEvent::Progress {
                    index,
                    progress,
                    overall_percent: overall_percent(&byte_totals),
                };
                receiver_gone = tx.send(event).await.is_err();
            }
            Some(joined) = tasks.join_next() => {
                match joined {
                    Ok((index, _, Ok(report))) => reports[index] = Some(report),
                    Ok((index, source, Err(e))) => {
                        reports[index] = Some(panicked_report(operation_type, source, &e));
                    }
                    Err(e) => tracing::error!(error = %e, "executor task failed"),
                }
            }
            else => break,
        }
    }

    let reports = reports
        .into_iter()
        .zip(sources)
        .map(|(report, source)| {
            report.unwrap_or_else(|| OperationReport {
                operation_type,
                source,
                state: OperationState::Cancelled,
                succeeded: 0,
                failed: 0,
                files_processed: 0,
                bytes_processed: 0,
                errors: Vec::new(),
            })
        })
        .collect();

    let batch = BatchReport::new(operation_type, reports, cancel.is_cancelled());
    tracing::info!(summary = %batch.summary(), state = %batch.state, "batch finished");
    let _ = tx.send(ExecutorEvent::Finished(batch)).await;
}

fn run_one(
    operation: &FileOperation,
    source: &std::path::Path,
    config: &OperationConfig,
    sink: &mut dyn ProgressSink,
    cancel: &CancellationToken,
) -> OperationReport {
    match operation {
        FileOperation::Copy { destination, .. } => {
            copy(source, destination, &CopyOptions::from(config), sink, cancel)
        }
        FileOperation::Move { destination, .. } => {
            move_to(source, destination, &MoveOptions::from(config), sink, cancel)
        }
        FileOperation::Delete { .. } => delete(source, &DeleteOptions::from(config), sink, cancel),
        FileOperation::CreateDirectory { .. } => create_directory(source, sink, cancel),
    }
}

fn panicked_report(
    operation_type: OperationType,
    source: PathBuf,
    error: &JoinError,
) -> OperationReport {
    tracing::error!(path = %source.display(), error = %error, "operation task panicked");
    let error = OperationError::new(source.clone(), FailureKind::Io, format!("task failed: {error}"));
    OperationReport {
        operation_type,
        source,
        state: OperationState::Failed,
        succeeded: 0,
        failed: 1,
        files_processed: 0,
        bytes_processed: 0,
        errors: vec![error],
    }
}

fn overall_percent(byte_totals: &[(u64, u64)]) -> f64 {
    let (processed, total) = byte_totals
        .iter()
        .fold((0u64, 0u64), |(p, t), (bp, bt)| (p + bp, t + bt));
    if total > 0 {
        (processed as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}
