//! Directory watch service.
//!
//! One [`DirectoryWatcher`] watches at most one directory at a time. Raw
//! notifications are classified and held for the configured debounce window
//! on a worker thread, then coalesced and broadcast as one
//! [`WatchNotification`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast;

use arbor_core::{PathKind, WatchConfig};

use crate::event::{classify, coalesce, FileSystemChangeEvent, WatchNotification};
use crate::WatchError;

/// Messages for a session's debounce worker.
enum Signal {
    Event(notify::Result<notify::Event>),
    Stop,
}

/// State shared between the service and its workers.
struct Shared {
    /// Bumped on every start and stop. A worker may only publish while it
    /// holds this lock and its own generation is current.
    generation: Mutex<u64>,
    tx: broadcast::Sender<WatchNotification>,
}

impl Shared {
    fn advance(&self) -> u64 {
        let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        *generation += 1;
        *generation
    }
}

/// The OS-level watch. Dropping it ends the watch; a failed session's
/// worker drops it early.
type OsWatch = Arc<Mutex<Option<RecommendedWatcher>>>;

struct Session {
    path: PathBuf,
    failed: Arc<AtomicBool>,
    signals: Sender<Signal>,
    worker: Option<JoinHandle<()>>,
    os_watch: OsWatch,
}

/// Watches one directory for changes to its direct children.
pub struct DirectoryWatcher {
    config: WatchConfig,
    shared: Arc<Shared>,
    session: Option<Session>,
}

impl DirectoryWatcher {
    pub fn new(config: WatchConfig) -> Self {
        let (tx, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            config,
            shared: Arc::new(Shared {
                generation: Mutex::new(0),
                tx,
            }),
            session: None,
        }
    }

    /// Receive every notification published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchNotification> {
        self.shared.tx.subscribe()
    }

    /// Start watching `path`, replacing any current watch.
    ///
    /// Once this returns, no notification from an earlier watch is
    /// delivered.
    pub fn start(&mut self, path: impl AsRef<Path>) -> Result<(), WatchError> {
        let path = path.as_ref();
        self.stop();

        match PathKind::of(path) {
            PathKind::Directory => {}
            PathKind::File => {
                return Err(WatchError::NotADirectory {
                    path: path.to_path_buf(),
                })
            }
            PathKind::Missing => {
                return Err(WatchError::NotFound {
                    path: path.to_path_buf(),
                })
            }
        }
        let root = path.canonicalize().map_err(|source| WatchError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let generation = self.shared.advance();
        let (signals, receiver) = mpsc::channel();
        let handler_signals = signals.clone();
        let mut watcher = notify::recommended_watcher(move |result| {
            let _ = handler_signals.send(Signal::Event(result));
        })?;
        watcher.watch(&root, RecursiveMode::NonRecursive)?;

        let failed = Arc::new(AtomicBool::new(false));
        let os_watch: OsWatch = Arc::new(Mutex::new(Some(watcher)));
        let worker = Debouncer {
            root: root.clone(),
            generation,
            debounce: self.config.debounce(),
            shared: Arc::clone(&self.shared),
            failed: Arc::clone(&failed),
            os_watch: Arc::clone(&os_watch),
        };
        let worker = std::thread::Builder::new()
            .name("arbor-watch".to_string())
            .spawn(move || worker.run(receiver))
            .map_err(|source| WatchError::Io {
                path: root.clone(),
                source,
            })?;

        tracing::info!(path = %root.display(), generation, "watch started");
        self.session = Some(Session {
            path: root,
            failed,
            signals,
            worker: Some(worker),
            os_watch,
        });
        Ok(())
    }

    /// Stop watching. Does nothing when idle.
    pub fn stop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        self.shared.advance();
        let _ = session.signals.send(Signal::Stop);
        if let Some(worker) = session.worker.take() {
            if worker.join().is_err() {
                tracing::warn!(path = %session.path.display(), "watch worker panicked");
            }
        }
        release(&session.os_watch);
        tracing::info!(path = %session.path.display(), "watch stopped");
    }

    /// Whether a watch is active and has not failed.
    pub fn is_watching(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.failed.load(Ordering::Acquire))
    }

    /// The directory being watched, while [`is_watching`](Self::is_watching).
    pub fn watched_path(&self) -> Option<&Path> {
        self.session
            .as_ref()
            .filter(|s| !s.failed.load(Ordering::Acquire))
            .map(|s| s.path.as_path())
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }
}

impl Default for DirectoryWatcher {
    fn default() -> Self {
        Self::new(WatchConfig::default())
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("config", &self.config)
            .field("watched_path", &self.watched_path())
            .finish()
    }
}

/// Per-session worker that batches classified events.
struct Debouncer {
    root: PathBuf,
    generation: u64,
    debounce: Duration,
    shared: Arc<Shared>,
    failed: Arc<AtomicBool>,
    os_watch: OsWatch,
}

impl Debouncer {
    fn run(self, signals: Receiver<Signal>) {
        let mut pending: Vec<FileSystemChangeEvent> = Vec::new();
        let mut deadline: Option<Instant> = None;

        loop {
            let signal = match deadline {
                None => match signals.recv() {
                    Ok(signal) => signal,
                    Err(_) => return,
                },
                Some(at) => match signals.recv_timeout(at.saturating_duration_since(Instant::now())) {
                    Ok(signal) => signal,
                    Err(RecvTimeoutError::Timeout) => {
                        self.publish(std::mem::take(&mut pending));
                        deadline = None;
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => return,
                },
            };

            match signal {
                Signal::Stop => return,
                Signal::Event(Ok(event)) => {
                    if matches!(event.kind, EventKind::Remove(_))
                        && event.paths.iter().any(|p| *p == self.root)
                    {
                        self.fail("watched directory was removed");
                        return;
                    }
                    let changes = classify(&event, &self.root);
                    if !changes.is_empty() {
                        pending.extend(changes);
                        deadline.get_or_insert_with(|| Instant::now() + self.debounce);
                    }
                }
                Signal::Event(Err(e)) => {
                    self.fail(&e.to_string());
                    return;
                }
            }
        }
    }

    fn publish(&self, events: Vec<FileSystemChangeEvent>) {
        let events = coalesce(events);
        if events.is_empty() {
            return;
        }

        let current = self
            .shared
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *current != self.generation {
            return;
        }
        tracing::debug!(path = %self.root.display(), count = events.len(), "publishing changes");
        // No subscribers is not an error.
        let _ = self.shared.tx.send(WatchNotification {
            path: self.root.clone(),
            events,
        });
    }

    fn fail(&self, reason: &str) {
        tracing::warn!(path = %self.root.display(), reason, "watch failed, stopping");
        release(&self.os_watch);
        self.failed.store(true, Ordering::Release);
    }
}

fn release(os_watch: &OsWatch) {
    let watcher = os_watch
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    drop(watcher);
}
