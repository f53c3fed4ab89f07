//! Channel adapter that runs a blocking operation and streams its reports.

use tokio::sync::mpsc;

use crate::progress::{OperationProgress, OperationReport, ProgressSink};
use crate::OPERATION_CHANNEL_SIZE;

/// Message sent through the channel of a started operation.
#[derive(Debug, Clone)]
pub enum OperationEvent {
    /// A progress report, in emission order.
    Progress(OperationProgress),
    /// The operation finished; always the last message.
    Complete(OperationReport),
}

/// Forwards every report into the channel from the worker thread.
struct ChannelSink {
    tx: mpsc::Sender<OperationEvent>,
}

impl ProgressSink for ChannelSink {
    fn report(&mut self, progress: OperationProgress) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.blocking_send(OperationEvent::Progress(progress));
    }
}

/// Run `operation` on the blocking pool and return its event stream.
///
/// Must be called from within a tokio runtime.
pub(crate) fn spawn_operation<F>(operation: F) -> mpsc::Receiver<OperationEvent>
where
    F: FnOnce(&mut dyn ProgressSink) -> OperationReport + Send + 'static,
{
    let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);

    tokio::task::spawn_blocking(move || {
        let mut sink = ChannelSink { tx: tx.clone() };
        let report = operation(&mut sink);
        let _ = tx.blocking_send(OperationEvent::Complete(report));
    });

    rx
}
