//! Directory listing entry types.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Display name used for the parent-navigation marker.
pub const PARENT_MARKER: &str = "..";

/// Type of a listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum EntryKind {
    /// Regular file (or a symlink that does not resolve to a directory).
    File,
    /// Directory.
    Directory,
    /// Drive or mounted volume (root view only).
    Drive,
    /// The ".." marker injected at the top of a listing.
    ParentDirectory,
}

/// Volume details carried by [`EntryKind::Drive`] entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveInfo {
    /// Whether the volume is mounted and readable.
    pub is_ready: bool,
    /// Volume label (disk name).
    pub volume_label: CompactString,
    /// File system name, e.g. "ext4" or "NTFS".
    pub drive_format: CompactString,
}

/// Immutable snapshot of one directory member.
///
/// Entries are created fresh on every listing and never mutated; a refresh
/// replaces the whole set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemEntry {
    /// Display name.
    pub name: CompactString,
    /// Absolute path, unique within a single listing.
    pub full_path: PathBuf,
    /// Kind of entry.
    pub kind: EntryKind,
    /// Byte length for files, total capacity for drives, 0 for directories.
    pub size: u64,
    /// Last modification time (if available).
    pub last_modified: Option<SystemTime>,
    /// File suffix including the dot (".txt"); empty for directories.
    pub extension: CompactString,
    /// Whether the name starts with a dot.
    pub is_hidden: bool,
    /// Whether the entry itself is a symbolic link.
    pub is_symlink: bool,
    /// Drive-only fields.
    pub drive: Option<DriveInfo>,
}

impl FileSystemEntry {
    /// Create a file entry.
    pub fn file(full_path: PathBuf, size: u64, last_modified: Option<SystemTime>) -> Self {
        let name = display_name(&full_path);
        let extension = full_path
            .extension()
            .map(|e| CompactString::new(format!(".{}", e.to_string_lossy())))
            .unwrap_or_default();
        Self {
            is_hidden: name.starts_with('.'),
            name,
            full_path,
            kind: EntryKind::File,
            size,
            last_modified,
            extension,
            is_symlink: false,
            drive: None,
        }
    }

    /// Create a directory entry.
    pub fn directory(full_path: PathBuf, last_modified: Option<SystemTime>) -> Self {
        let name = display_name(&full_path);
        Self {
            is_hidden: name.starts_with('.'),
            name,
            full_path,
            kind: EntryKind::Directory,
            size: 0,
            last_modified,
            extension: CompactString::default(),
            is_symlink: false,
            drive: None,
        }
    }

    /// Create the ".." marker pointing at `parent`.
    pub fn parent_marker(parent: PathBuf) -> Self {
        Self {
            name: CompactString::const_new(PARENT_MARKER),
            full_path: parent,
            kind: EntryKind::ParentDirectory,
            size: 0,
            last_modified: None,
            extension: CompactString::default(),
            is_hidden: false,
            is_symlink: false,
            drive: None,
        }
    }

    /// Create a drive entry for a mount point.
    pub fn drive(mount_point: PathBuf, total_size: u64, info: DriveInfo) -> Self {
        Self {
            name: CompactString::new(mount_point.to_string_lossy()),
            full_path: mount_point,
            kind: EntryKind::Drive,
            size: if info.is_ready { total_size } else { 0 },
            last_modified: None,
            extension: CompactString::default(),
            is_hidden: false,
            is_symlink: false,
            drive: Some(info),
        }
    }

    /// Mark this entry as a symbolic link.
    pub fn with_symlink(mut self, is_symlink: bool) -> Self {
        self.is_symlink = is_symlink;
        self
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Check if this is a navigable container (directory, drive or "..").
    pub fn is_navigable(&self) -> bool {
        !self.is_file()
    }

    /// Get the path relative to `base`, if it lies beneath it.
    pub fn relative_to(&self, base: &Path) -> Option<&Path> {
        self.full_path.strip_prefix(base).ok()
    }
}

fn display_name(path: &Path) -> CompactString {
    path.file_name()
        .map(|n| CompactString::new(n.to_string_lossy()))
        .unwrap_or_else(|| CompactString::new(path.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_entry_fields() {
        let entry = FileSystemEntry::file(PathBuf::from("/tmp/report.txt"), 42, None);
        assert_eq!(entry.name.as_str(), "report.txt");
        assert_eq!(entry.extension.as_str(), ".txt");
        assert_eq!(entry.size, 42);
        assert!(entry.is_file());
        assert!(!entry.is_hidden);
    }

    #[test]
    fn test_directory_has_no_extension_or_size() {
        let entry = FileSystemEntry::directory(PathBuf::from("/tmp/archive.d"), None);
        assert!(entry.is_dir());
        assert!(entry.extension.is_empty());
        assert_eq!(entry.size, 0);
    }

    #[test]
    fn test_hidden_detection() {
        let entry = FileSystemEntry::file(PathBuf::from("/home/u/.bashrc"), 1, None);
        assert!(entry.is_hidden);
    }

    #[test]
    fn test_parent_marker() {
        let entry = FileSystemEntry::parent_marker(PathBuf::from("/home"));
        assert_eq!(entry.name.as_str(), PARENT_MARKER);
        assert_eq!(entry.kind, EntryKind::ParentDirectory);
        assert!(entry.is_navigable());
    }

    #[test]
    fn test_unready_drive_reports_zero_size() {
        let info = DriveInfo {
            is_ready: false,
            volume_label: CompactString::default(),
            drive_format: CompactString::default(),
        };
        let entry = FileSystemEntry::drive(PathBuf::from("/mnt/cdrom"), 700, info);
        assert_eq!(entry.size, 0);
        assert_eq!(entry.kind, EntryKind::Drive);
    }
}
