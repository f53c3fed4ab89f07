//! Change events, their mapping from raw notifications, and coalescing.

use std::path::{Path, PathBuf};

use notify::event::{Event, EventKind, ModifyKind, RenameMode};
use serde::{Deserialize, Serialize};

/// What happened to a watched entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum ChangeKind {
    Created,
    Deleted,
    Modified,
    Renamed,
}

/// One change to a direct child of the watched directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileSystemChangeEvent {
    /// The affected path (the new path for renames).
    pub path: PathBuf,
    pub change_type: ChangeKind,
    /// The previous path, for renames only.
    pub old_path: Option<PathBuf>,
}

impl FileSystemChangeEvent {
    pub fn new(path: impl Into<PathBuf>, change_type: ChangeKind) -> Self {
        Self {
            path: path.into(),
            change_type,
            old_path: None,
        }
    }

    pub fn renamed(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            path: to.into(),
            change_type: ChangeKind::Renamed,
            old_path: Some(from.into()),
        }
    }
}

/// A coalesced batch of changes for one watched directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchNotification {
    /// The watched directory.
    pub path: PathBuf,
    /// Changes in arrival order, after coalescing.
    pub events: Vec<FileSystemChangeEvent>,
}

/// Map one raw notification to zero or more change events for `root`.
///
/// Only direct children of `root` are kept, and `Modified` on a directory is
/// dropped.
pub fn classify(event: &Event, root: &Path) -> Vec<FileSystemChangeEvent> {
    match event.kind {
        EventKind::Create(_) => collect(event, root, ChangeKind::Created),
        EventKind::Remove(_) => collect(event, root, ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            collect(event, root, ChangeKind::Deleted)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            collect(event, root, ChangeKind::Created)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => match (is_child(from, root), is_child(to, root)) {
                (true, true) => vec![FileSystemChangeEvent::renamed(from, to)],
                (true, false) => vec![FileSystemChangeEvent::new(from, ChangeKind::Deleted)],
                (false, true) => vec![FileSystemChangeEvent::new(to, ChangeKind::Created)],
                (false, false) => Vec::new(),
            },
            _ => Vec::new(),
        },
        // One side of a rename whose direction the backend could not tell.
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .filter(|p| is_child(p, root))
            .map(|p| {
                let kind = if p.exists() {
                    ChangeKind::Created
                } else {
                    ChangeKind::Deleted
                };
                FileSystemChangeEvent::new(p, kind)
            })
            .collect(),
        EventKind::Modify(_) => event
            .paths
            .iter()
            .filter(|p| is_child(p, root) && !p.is_dir())
            .map(|p| FileSystemChangeEvent::new(p, ChangeKind::Modified))
            .collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

fn collect(event: &Event, root: &Path, kind: ChangeKind) -> Vec<FileSystemChangeEvent> {
    event
        .paths
        .iter()
        .filter(|p| is_child(p, root))
        .map(|p| FileSystemChangeEvent::new(p, kind))
        .collect()
}

fn is_child(path: &Path, root: &Path) -> bool {
    path.parent() == Some(root)
}

/// Collapse a burst of changes into the smallest equivalent list.
///
/// A rename swallows the delete of its old path and the create of its new
/// one, a create swallows modifications of the same path, and duplicates are
/// removed. Order of first appearance is kept.
pub fn coalesce(events: Vec<FileSystemChangeEvent>) -> Vec<FileSystemChangeEvent> {
    let renames: Vec<(PathBuf, PathBuf)> = events
        .iter()
        .filter(|e| e.change_type == ChangeKind::Renamed)
        .filter_map(|e| Some((e.old_path.clone()?, e.path.clone())))
        .collect();
    let created: Vec<PathBuf> = events
        .iter()
        .filter(|e| e.change_type == ChangeKind::Created)
        .map(|e| e.path.clone())
        .collect();

    let mut kept: Vec<FileSystemChangeEvent> = Vec::with_capacity(events.len());
    for event in events {
        let absorbed = match event.change_type {
            ChangeKind::Deleted => renames.iter().any(|(from, _)| *from == event.path),
            ChangeKind::Created => renames.iter().any(|(_, to)| *to == event.path),
            ChangeKind::Modified => created.contains(&event.path),
            ChangeKind::Renamed => false,
        };
        if !absorbed && !kept.contains(&event) {
            kept.push(event);
        }
    }
    kept
}
