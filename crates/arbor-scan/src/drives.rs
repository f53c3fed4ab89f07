//! Mounted volume enumeration for the root view.

use compact_str::CompactString;
use sysinfo::Disks;
use tokio_util::sync::CancellationToken;

use arbor_core::{DriveInfo, FileSystemEntry};

use crate::lister::ListError;

/// List mounted volumes as [`EntryKind::Drive`](arbor_core::EntryKind::Drive)
/// entries, sorted by mount point.
///
/// A system with no visible volumes yields an empty list, never an error.
pub fn list_drives(cancel: &CancellationToken) -> Result<Vec<FileSystemEntry>, ListError> {
    let disks = Disks::new_with_refreshed_list();
    let mut entries = Vec::with_capacity(disks.list().len());

    for disk in disks.list() {
        if cancel.is_cancelled() {
            return Err(ListError::Cancelled);
        }

        let mount = disk.mount_point().to_path_buf();
        if !mount.is_absolute() {
            continue;
        }

        let info = DriveInfo {
            is_ready: mount.exists(),
            volume_label: CompactString::new(disk.name().to_string_lossy()),
            drive_format: CompactString::new(disk.file_system().to_string_lossy()),
        };
        entries.push(FileSystemEntry::drive(mount, disk.total_space(), info));
    }

    entries.sort_by(|a, b| a.full_path.cmp(&b.full_path));
    entries.dedup_by(|a, b| a.full_path == b.full_path);
    tracing::debug!(count = entries.len(), "enumerated volumes");
    Ok(entries)
}
