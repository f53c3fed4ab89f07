use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use arbor_core::{FailureKind, OperationConfig};
use arbor_ops::{
    copy, delete, move_to, start_copy, start_delete, CopyOptions, DeleteOptions, ExecutorEvent,
    FileOperation, MoveOptions, NullSink, OperationEvent, OperationExecutor, OperationProgress,
    OperationState,
};
use arbor_scan::DirectoryLister;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Relative path, directory flag and size of every entry below `root`.
fn snapshot(root: &Path) -> BTreeSet<(PathBuf, bool, u64)> {
    let lister = DirectoryLister::for_walk();
    let cancel = CancellationToken::new();
    let mut seen = BTreeSet::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let listing = lister.enumerate(&dir, &cancel).unwrap();
        for entry in listing.entries {
            let relative = entry.relative_to(root).unwrap().to_path_buf();
            let size = if entry.is_dir() { 0 } else { entry.size };
            seen.insert((relative, entry.is_dir(), size));
            if entry.is_dir() {
                pending.push(entry.full_path);
            }
        }
    }
    seen
}

fn create_example_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    fs::create_dir_all(src.join("sub")).unwrap();
    fs::write(src.join("a.txt"), "12345").unwrap();
    fs::write(src.join("sub/b.txt"), "0123456789").unwrap();
    temp
}

fn create_flat_tree(temp: &TempDir, count: usize) -> PathBuf {
    let src = temp.path().join("src");
    fs::create_dir(&src).unwrap();
    for i in 0..count {
        fs::write(src.join(format!("f{:02}.txt", i)), "x").unwrap();
    }
    src
}

#[test]
fn test_copy_reproduces_tree() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("project");
    fs::create_dir_all(src.join("a/b/c")).unwrap();
    fs::create_dir_all(src.join("empty")).unwrap();
    fs::write(src.join("top.txt"), "top").unwrap();
    fs::write(src.join("a/one.rs"), "fn one() {}").unwrap();
    fs::write(src.join("a/b/two.md"), "# two").unwrap();
    fs::write(src.join("a/b/c/three.bin"), vec![7u8; 300]).unwrap();
    fs::write(src.join(".hidden"), "h").unwrap();
    let dst = temp.path().join("dst");

    let report = copy(
        &src,
        &dst,
        &CopyOptions::default(),
        &mut NullSink,
        &CancellationToken::new(),
    );

    assert!(report.is_success(), "{:?}", report.errors);
    assert_eq!(report.files_processed, 5);
    assert_eq!(snapshot(&src), snapshot(&dst.join("project")));
}

#[test]
fn test_copy_empty_directory() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("empty");
    fs::create_dir(&src).unwrap();
    let dst = temp.path().join("dst");

    let report = copy(
        &src,
        &dst,
        &CopyOptions::default(),
        &mut NullSink,
        &CancellationToken::new(),
    );

    assert_eq!(report.state, OperationState::Completed);
    assert!(dst.join("empty").is_dir());
}

#[test]
fn test_copy_event_order() {
    let temp = create_example_tree();
    let src = temp.path().join("src");
    let dst = temp.path().join("dst");

    let mut events = Vec::new();
    let mut sink = |p: OperationProgress| events.push((p.state, p.current_file, p.terminal));
    let report = copy(
        &src,
        &dst,
        &CopyOptions::default(),
        &mut sink,
        &CancellationToken::new(),
    );

    let copied_b = dst.join("src/sub/b.txt");
    let copied_a = dst.join("src/a.txt");
    assert_eq!(
        events,
        vec![
            (OperationState::Starting, src.clone(), false),
            (OperationState::InProgress, copied_b.clone(), false),
            (OperationState::Completed, copied_b.clone(), false),
            (OperationState::InProgress, copied_a.clone(), false),
            (OperationState::Completed, copied_a.clone(), false),
            (OperationState::Completed, src.clone(), true),
        ]
    );
    assert_eq!(report.bytes_processed, 15);
    assert_eq!(fs::read_to_string(copied_a).unwrap(), "12345");
    assert_eq!(fs::read_to_string(copied_b).unwrap(), "0123456789");
}

#[test]
fn test_copy_reports_totals() {
    let temp = create_example_tree();
    let mut last = None;
    let mut sink = |p: OperationProgress| last = Some(p);
    copy(
        &temp.path().join("src"),
        &temp.path().join("dst"),
        &CopyOptions::default(),
        &mut sink,
        &CancellationToken::new(),
    );

    let last = last.unwrap();
    assert!(last.terminal);
    assert_eq!(last.total_files, 2);
    assert_eq!(last.total_bytes, 15);
    assert_eq!(last.processed_files, 2);
    assert_eq!(last.percent_complete(), 100.0);
}

#[test]
fn test_cancel_then_resume() {
    let temp = TempDir::new().unwrap();
    let src = create_flat_tree(&temp, 10);
    let dst = temp.path().join("dst");

    let cancel = CancellationToken::new();
    let mut completed = 0;
    let mut sink = |p: OperationProgress| {
        if p.is_item_report() && p.state == OperationState::Completed {
            completed += 1;
            if completed == 4 {
                cancel.cancel();
            }
        }
    };
    let report = copy(&src, &dst, &CopyOptions::default(), &mut sink, &cancel);

    assert_eq!(report.state, OperationState::Cancelled);
    assert_eq!(report.succeeded, 4);
    assert_eq!(fs::read_dir(dst.join("src")).unwrap().count(), 4);

    let report = copy(
        &src,
        &dst,
        &CopyOptions::default(),
        &mut NullSink,
        &CancellationToken::new(),
    );
    assert!(report.is_success());
    assert_eq!(fs::read_dir(dst.join("src")).unwrap().count(), 10);
}

#[cfg(unix)]
#[test]
fn test_one_bad_entry_does_not_abort() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    fs::create_dir_all(src.join("nested/deeper")).unwrap();
    for i in 0..3 {
        fs::write(src.join(format!("top{i}.txt")), "t").unwrap();
        fs::write(src.join(format!("nested/mid{i}.txt")), "m").unwrap();
        fs::write(src.join(format!("nested/deeper/low{i}.txt")), "l").unwrap();
    }
    std::os::unix::fs::symlink(src.join("vanished"), src.join("nested/dangling")).unwrap();
    let dst = temp.path().join("dst");

    let mut completed_items = 0;
    let mut failed_items = 0;
    let mut sink = |p: OperationProgress| {
        if p.is_item_report() {
            match p.state {
                OperationState::Completed => completed_items += 1,
                OperationState::Failed => failed_items += 1,
                _ => {}
            }
        }
    };
    let report = copy(
        &src,
        &dst,
        &CopyOptions::default(),
        &mut sink,
        &CancellationToken::new(),
    );

    assert_eq!(report.state, OperationState::Completed);
    assert_eq!(completed_items, 9);
    assert_eq!(failed_items, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, FailureKind::NotFound);
    assert!(dst.join("src/nested/deeper/low2.txt").exists());
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_access_denied() {
    use std::os::unix::fs::PermissionsExt;

    let temp = create_example_tree();
    let src = temp.path().join("src");
    let locked = src.join("locked.txt");
    fs::write(&locked, "secret").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read(&locked).is_ok() {
        // Running with privileges that ignore file modes.
        return;
    }
    let dst = temp.path().join("dst");

    let report = copy(
        &src,
        &dst,
        &CopyOptions::default(),
        &mut NullSink,
        &CancellationToken::new(),
    );
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(report.state, OperationState::Completed);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors[0].kind, FailureKind::AccessDenied);
    assert!(dst.join("src/a.txt").exists());
    assert!(dst.join("src/sub/b.txt").exists());
}

#[test]
fn test_no_overwrite_conflict_is_per_item() {
    let temp = create_example_tree();
    let src = temp.path().join("src");
    let dst = temp.path().join("dst");
    fs::create_dir_all(dst.join("src")).unwrap();
    fs::write(dst.join("src/a.txt"), "old").unwrap();

    let options = CopyOptions {
        overwrite: false,
        ..CopyOptions::default()
    };
    let report = copy(&src, &dst, &options, &mut NullSink, &CancellationToken::new());

    assert_eq!(report.state, OperationState::Completed);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors[0].kind, FailureKind::DestinationConflict);
    assert_eq!(fs::read_to_string(dst.join("src/a.txt")).unwrap(), "old");
    assert!(dst.join("src/sub/b.txt").exists());
}

#[test]
fn test_overwrite_replaces_existing() {
    let temp = create_example_tree();
    let src = temp.path().join("src");
    let dst = temp.path().join("dst");
    fs::create_dir_all(dst.join("src")).unwrap();
    fs::write(dst.join("src/a.txt"), "old").unwrap();

    let report = copy(
        &src,
        &dst,
        &CopyOptions::default(),
        &mut NullSink,
        &CancellationToken::new(),
    );

    assert!(report.is_success());
    assert_eq!(fs::read_to_string(dst.join("src/a.txt")).unwrap(), "12345");
}

#[test]
fn test_delete_is_idempotent() {
    let temp = create_example_tree();
    let src = temp.path().join("src");

    let first = delete(
        &src,
        &DeleteOptions::default(),
        &mut NullSink,
        &CancellationToken::new(),
    );
    assert_eq!(first.state, OperationState::Completed);
    assert_eq!(first.succeeded, 1);
    assert!(!src.exists());

    let second = delete(
        &src,
        &DeleteOptions::default(),
        &mut NullSink,
        &CancellationToken::new(),
    );
    assert_eq!(second.state, OperationState::Completed);
    assert_eq!(second.succeeded, 0);
}

#[test]
fn test_move_directory_same_volume() {
    let temp = create_example_tree();
    let src = temp.path().join("src");
    let dst = temp.path().join("dst");
    let before = snapshot(&src);

    let mut states = Vec::new();
    let mut sink = |p: OperationProgress| states.push(p.state);
    let report = move_to(
        &src,
        &dst,
        &MoveOptions::default(),
        &mut sink,
        &CancellationToken::new(),
    );

    assert!(report.is_success());
    assert_eq!(report.files_processed, 2);
    assert_eq!(report.bytes_processed, 15);
    assert!(!src.exists());
    assert_eq!(snapshot(&dst.join("src")), before);
    assert_eq!(
        states,
        vec![
            OperationState::Starting,
            OperationState::InProgress,
            OperationState::Completed,
            OperationState::Completed
        ]
    );
}

#[test]
fn test_move_into_own_subtree_fails() {
    let temp = create_example_tree();
    let src = temp.path().join("src");
    fs::create_dir_all(src.join("sub/src")).unwrap();
    fs::write(src.join("sub/src/keep.txt"), "keep").unwrap();

    let report = move_to(
        &src,
        &src.join("sub"),
        &MoveOptions { overwrite: true },
        &mut NullSink,
        &CancellationToken::new(),
    );

    assert_eq!(report.state, OperationState::Failed);
    assert_eq!(report.errors[0].kind, FailureKind::SourceIsAncestor);
    assert!(src.join("a.txt").exists());
    assert_eq!(
        fs::read_to_string(src.join("sub/src/keep.txt")).unwrap(),
        "keep"
    );
}

#[test]
fn test_copy_into_own_subtree_creates_nothing() {
    let temp = create_example_tree();
    let src = temp.path().join("src");
    let before = snapshot(&src);

    let report = copy(
        &src,
        &src.join("sub/inner"),
        &CopyOptions::default(),
        &mut NullSink,
        &CancellationToken::new(),
    );

    assert_eq!(report.state, OperationState::Failed);
    assert_eq!(report.errors[0].kind, FailureKind::SourceIsAncestor);
    assert_eq!(snapshot(&src), before);
}

#[cfg(unix)]
#[test]
fn test_move_dangling_symlink() {
    let temp = TempDir::new().unwrap();
    let link = temp.path().join("dangling");
    let pointee = temp.path().join("vanished");
    std::os::unix::fs::symlink(&pointee, &link).unwrap();
    let dst = temp.path().join("dst");

    let report = move_to(
        &link,
        &dst,
        &MoveOptions::default(),
        &mut NullSink,
        &CancellationToken::new(),
    );

    assert_eq!(report.state, OperationState::Completed);
    assert_eq!(report.succeeded, 1);
    assert!(fs::symlink_metadata(&link).is_err());
    assert_eq!(fs::read_link(dst.join("dangling")).unwrap(), pointee);
}

#[tokio::test]
async fn test_start_copy_streams_events() {
    let temp = create_example_tree();
    let mut rx = start_copy(
        temp.path().join("src"),
        temp.path().join("dst"),
        CopyOptions::default(),
        CancellationToken::new(),
    );

    let mut progress = Vec::new();
    let mut complete = None;
    while let Some(event) = rx.recv().await {
        match event {
            OperationEvent::Progress(p) => progress.push(p),
            OperationEvent::Complete(report) => complete = Some(report),
        }
    }

    let report = complete.unwrap();
    assert!(report.is_success());
    assert_eq!(progress.first().unwrap().state, OperationState::Starting);
    assert!(progress.last().unwrap().terminal);
    assert_eq!(progress.iter().filter(|p| p.terminal).count(), 1);
}

#[tokio::test]
async fn test_start_delete_missing_path() {
    let temp = TempDir::new().unwrap();
    let mut rx = start_delete(
        temp.path().join("ghost"),
        DeleteOptions::default(),
        CancellationToken::new(),
    );

    let mut last = None;
    while let Some(event) = rx.recv().await {
        last = Some(event);
    }
    match last {
        Some(OperationEvent::Complete(report)) => {
            assert_eq!(report.state, OperationState::Completed)
        }
        other => panic!("unexpected final event: {:?}", other),
    }
}

#[tokio::test]
async fn test_executor_orders_reports_by_source() {
    let temp = create_example_tree();
    let src = temp.path().join("src");
    let sources = vec![
        src.join("sub"),
        temp.path().join("missing"),
        src.join("a.txt"),
    ];
    let dst = temp.path().join("dst");

    let config = OperationConfig::builder()
        .max_concurrency(2usize)
        .build()
        .unwrap();
    let executor = OperationExecutor::new(config);
    let mut rx = executor.run(
        FileOperation::copy(sources.clone(), dst.clone()),
        CancellationToken::new(),
    );

    let mut indices = BTreeSet::new();
    let mut batch = None;
    while let Some(event) = rx.recv().await {
        match event {
            ExecutorEvent::Progress { index, .. } => {
                indices.insert(index);
            }
            ExecutorEvent::Finished(report) => batch = Some(report),
        }
    }

    let batch = batch.unwrap();
    assert_eq!(indices, BTreeSet::from([0, 1, 2]));
    let reported: Vec<_> = batch.reports.iter().map(|r| r.source.clone()).collect();
    assert_eq!(reported, sources);
    assert_eq!(batch.state, OperationState::Completed);
    assert_eq!(batch.reports[1].state, OperationState::Failed);
    assert_eq!(batch.succeeded(), 2);
    assert_eq!(batch.failed(), 1);
    assert_eq!(batch.summary(), "Copied 2 items, 1 failed");
    assert!(dst.join("sub/b.txt").exists());
    assert!(dst.join("a.txt").exists());
}

#[tokio::test]
async fn test_executor_cancelled_batch() {
    let temp = TempDir::new().unwrap();
    let src = create_flat_tree(&temp, 3);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let executor = OperationExecutor::default();
    let mut rx = executor.run(
        FileOperation::copy(vec![src], temp.path().join("dst")),
        cancel,
    );

    let mut batch = None;
    while let Some(event) = rx.recv().await {
        if let ExecutorEvent::Finished(report) = event {
            batch = Some(report);
        }
    }

    let batch = batch.unwrap();
    assert_eq!(batch.state, OperationState::Cancelled);
    assert_eq!(batch.succeeded(), 0);
    assert!(!temp.path().join("dst").exists());
}

#[tokio::test]
async fn test_executor_stalled_consumer_throttles_walk() {
    let temp = TempDir::new().unwrap();
    let src = create_flat_tree(&temp, 300);
    let dst = temp.path().join("dst");

    let executor = OperationExecutor::default();
    let mut rx = executor.run(
        FileOperation::copy(vec![src], dst.clone()),
        CancellationToken::new(),
    );

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    let copied = fs::read_dir(dst.join("src")).map_or(0, |dir| dir.count());
    assert!(copied < 300, "walk ran ahead of its consumer: {copied} files");

    let mut batch = None;
    while let Some(event) = rx.recv().await {
        if let ExecutorEvent::Finished(report) = event {
            batch = Some(report);
        }
    }
    let batch = batch.unwrap();
    assert!(batch.is_success());
    assert_eq!(batch.succeeded(), 300);
}
