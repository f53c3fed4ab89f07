//! arbor - recursive copy, move and delete with progress, plus directory
//! listing and watching.
//!
//! Usage:
//!   arbor list [PATH]               List a directory (no path: volumes)
//!   arbor copy SRC... DEST          Copy files/trees into DEST
//!   arbor move SRC... DEST          Move files/trees into DEST
//!   arbor delete PATH...            Delete files/trees
//!   arbor mkdir PATH                Create a directory
//!   arbor watch [PATH]              Print changes to a directory
//!   arbor --help                    Show help

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use clap::{ArgAction, Parser, Subcommand};
use color_eyre::eyre::{bail, eyre, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use arbor_core::{ArborConfig, EntryKind, FileSystemEntry, OperationConfig};
use arbor_ops::{BatchReport, ExecutorEvent, FileOperation, OperationExecutor, OperationState};
use arbor_scan::{DirectoryLister, ListConfig};
use arbor_watch::DirectoryWatcher;

#[derive(Parser)]
#[command(
    name = "arbor",
    version,
    about = "Recursive file operations with progress and cancellation",
    long_about = "arbor copies, moves and deletes files and whole directory trees, \
                  reporting progress per file. Failures on single items are \
                  collected and summarized instead of aborting the run. \
                  Press Ctrl-C to cancel."
)]
struct Cli {
    /// Configuration file (defaults to <config dir>/arbor/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a directory, or the mounted volumes when no path is given
    List {
        /// Directory to list
        path: Option<PathBuf>,

        /// Include hidden entries
        #[arg(short, long)]
        all: bool,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Copy files or directory trees into a destination directory
    Copy {
        /// Sources followed by the destination directory
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        transfer: TransferArgs,

        /// Keep source modification times
        #[arg(short, long)]
        preserve_timestamps: bool,
    },

    /// Move files or directory trees into a destination directory
    Move {
        /// Sources followed by the destination directory
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        transfer: TransferArgs,
    },

    /// Delete files or directory trees
    Delete {
        /// Paths to delete
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Move to the trash instead of deleting permanently
        #[arg(short, long)]
        trash: bool,
    },

    /// Create a directory and any missing parents
    Mkdir {
        path: PathBuf,
    },

    /// Print changes to the direct children of a directory
    Watch {
        /// Directory to watch (defaults to the current directory)
        path: Option<PathBuf>,

        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },
}

#[derive(clap::Args)]
struct TransferArgs {
    /// Fail items whose destination exists instead of replacing them
    #[arg(long)]
    no_overwrite: bool,

    /// Maximum number of sources processed at once
    #[arg(short = 'j', long)]
    jobs: Option<usize>,
}

impl TransferArgs {
    fn apply(&self, config: &mut OperationConfig) {
        if self.no_overwrite {
            config.overwrite = false;
        }
        if let Some(jobs) = self.jobs {
            config.max_concurrency = jobs.max(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.clone().or_else(ArborConfig::default_path);
    let config = match &config_path {
        Some(path) => ArborConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ArborConfig::default(),
    };

    match cli.command {
        Command::List { path, all, json } => {
            let mut list_config = config.list.clone();
            if all {
                list_config.show_hidden = true;
            }
            run_list(path.as_deref(), list_config, json)?;
        }
        Command::Copy {
            paths,
            transfer,
            preserve_timestamps,
        } => {
            let mut ops = config.operations.clone();
            transfer.apply(&mut ops);
            if preserve_timestamps {
                ops.preserve_timestamps = true;
            }
            let (sources, destination) = split_destination(paths)?;
            run_batch(FileOperation::copy(sources, destination), ops).await?;
        }
        Command::Move { paths, transfer } => {
            let mut ops = config.operations.clone();
            transfer.apply(&mut ops);
            let (sources, destination) = split_destination(paths)?;
            run_batch(FileOperation::move_to(sources, destination), ops).await?;
        }
        Command::Delete { paths, trash } => {
            let mut ops = config.operations.clone();
            if trash {
                ops.use_trash = true;
            }
            run_batch(FileOperation::delete(paths), ops).await?;
        }
        Command::Mkdir { path } => {
            run_batch(FileOperation::create_directory(path), config.operations.clone()).await?;
        }
        Command::Watch { path, duration } => {
            let path = match path {
                Some(path) => path,
                None => std::env::current_dir().context("No current directory")?,
            };
            run_watch(&path, config.watch.clone(), duration.map(Duration::from_secs)).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Split `SRC... DEST` into sources and destination.
fn split_destination(mut paths: Vec<PathBuf>) -> Result<(Vec<PathBuf>, PathBuf)> {
    let destination = paths
        .pop()
        .ok_or_else(|| eyre!("Missing destination directory"))?;
    if paths.is_empty() {
        bail!("Missing source paths");
    }
    Ok((paths, destination))
}

/// List a directory and print it.
fn run_list(path: Option<&Path>, list_config: ListConfig, json: bool) -> Result<()> {
    let lister = DirectoryLister::with_config(list_config);
    let listing = lister
        .list(path, &CancellationToken::new())
        .context("Listing failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&listing.entries)?);
        return Ok(());
    }

    let title = match &listing.path {
        Some(path) => path.display().to_string(),
        None => "Volumes".to_string(),
    };
    println!();
    println!("{}", "─".repeat(70));
    println!(" {}", title);
    println!("{}", "─".repeat(70));

    for entry in &listing.entries {
        print_entry(entry);
    }

    let summary = listing.summary();
    println!("{}", "─".repeat(70));
    if listing.path.is_some() {
        println!(
            " {} directories, {} files, {}",
            summary.directories,
            summary.files,
            format_size(summary.total_bytes)
        );
    } else {
        println!(" {} volumes", summary.drives);
    }

    for warning in &listing.warnings {
        eprintln!("warning: {}: {}", warning.path.display(), warning.message);
    }
    if listing.is_partial() {
        eprintln!("{} entries could not be read", listing.warnings.len());
    }

    Ok(())
}

fn print_entry(entry: &FileSystemEntry) {
    let (marker, size) = match entry.kind {
        EntryKind::ParentDirectory => ("▲ ", String::new()),
        EntryKind::Directory => ("▼ ", String::new()),
        EntryKind::File => ("  ", format_size(entry.size)),
        EntryKind::Drive => {
            let ready = entry.drive.as_ref().is_some_and(|d| d.is_ready);
            if ready {
                ("◆ ", format_size(entry.size))
            } else {
                ("◇ ", "not ready".to_string())
            }
        }
    };

    let name = match (&entry.kind, &entry.drive) {
        (EntryKind::Drive, Some(info)) if !info.volume_label.is_empty() => {
            format!("{} ({}, {})", entry.full_path.display(), info.volume_label, info.drive_format)
        }
        (EntryKind::Drive, _) => entry.full_path.display().to_string(),
        (EntryKind::Directory, _) => format!("{}/", entry.name),
        _ => entry.name.to_string(),
    };
    let link = if entry.is_symlink { " →" } else { "" };

    println!(
        " {}{:<44}{} {:>10}  {}",
        marker,
        truncate(&name, 44),
        link,
        size,
        entry.last_modified.map(format_time).unwrap_or_default()
    );
}

/// Run a batch through the executor, printing progress to stderr.
async fn run_batch(operation: FileOperation, ops: OperationConfig) -> Result<()> {
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling...");
            ctrl_c.cancel();
        }
    });

    let executor = OperationExecutor::new(ops);
    let mut rx = executor.run(operation, cancel);
    let mut batch: Option<BatchReport> = None;

    while let Some(event) = rx.recv().await {
        match event {
            ExecutorEvent::Progress {
                progress,
                overall_percent,
                ..
            } => {
                if !progress.is_item_report() {
                    continue;
                }
                match progress.state {
                    OperationState::Completed => eprintln!(
                        "[{:>5.1}%] {}",
                        overall_percent,
                        progress.current_file.display()
                    ),
                    OperationState::Failed => {
                        if let Some(error) = &progress.error {
                            eprintln!("[ fail ] {} ({})", error, error.kind);
                        }
                    }
                    _ => {}
                }
            }
            ExecutorEvent::Finished(report) => batch = Some(report),
        }
    }

    let batch = batch.ok_or_else(|| eyre!("Operation ended without a result"))?;
    println!(
        "{} ({})",
        batch.summary(),
        format_size(batch.bytes_processed())
    );

    if !batch.is_success() {
        bail!(
            "{} {}",
            batch.operation_type,
            match batch.state {
                OperationState::Cancelled => "was cancelled",
                _ => "finished with failures",
            }
        );
    }
    Ok(())
}

/// Print coalesced change batches until Ctrl-C or the optional deadline.
async fn run_watch(
    path: &Path,
    watch_config: arbor_core::WatchConfig,
    duration: Option<Duration>,
) -> Result<()> {
    let mut watcher = DirectoryWatcher::new(watch_config);
    let mut rx = watcher.subscribe();
    watcher
        .start(path)
        .with_context(|| format!("Cannot watch {}", path.display()))?;

    if let Some(root) = watcher.watched_path() {
        eprintln!("Watching {} (Ctrl-C to stop)", root.display());
    }

    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut health = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(batch) => {
                    let stamp = format_time(SystemTime::now());
                    for change in batch.events {
                        match &change.old_path {
                            Some(old) => println!(
                                "{} {:<8} {} -> {}",
                                stamp,
                                change.change_type,
                                old.display(),
                                change.path.display()
                            ),
                            None => println!(
                                "{} {:<8} {}",
                                stamp,
                                change.change_type,
                                change.path.display()
                            ),
                        }
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "watch output fell behind");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = health.tick() => {
                if !watcher.is_watching() {
                    bail!("Watch on {} stopped", path.display());
                }
            }
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut deadline => break,
        }
    }

    watcher.stop();
    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

fn format_time(time: SystemTime) -> String {
    let local: DateTime<Local> = time.into();
    local.format("%Y-%m-%d %H:%M").to_string()
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_len - 1).collect();
        out.push('…');
        out
    }
}
