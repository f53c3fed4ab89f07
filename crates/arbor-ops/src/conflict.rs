//! Destination conflict detection and the overwrite policy.

use std::fs;
use std::path::Path;

use arbor_core::{path, FsError};

/// What already occupies a destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupant {
    /// Nothing; the destination is free.
    Vacant,
    /// A file or symlink.
    File,
    /// A real directory (not a symlink to one).
    Directory,
}

impl Occupant {
    /// Inspect `target` without following a final symlink.
    pub fn of(target: &Path) -> Self {
        match fs::symlink_metadata(target) {
            Ok(m) if m.is_dir() => Self::Directory,
            Ok(_) => Self::File,
            Err(_) => Self::Vacant,
        }
    }
}

/// Check whether `source` and `target` are the same existing file system
/// object.
pub fn is_same_item(source: &Path, target: &Path) -> bool {
    match (source.canonicalize(), target.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Clear `target` so `source` can be written there.
///
/// With `overwrite` the occupant is removed; without it any occupant is a
/// [`FsError::DestinationConflict`]. A directory is left in place when
/// `merge_directories` is set so that a directory copy merges into it.
pub fn clear_destination(
    source: &Path,
    target: &Path,
    overwrite: bool,
    merge_directories: bool,
) -> Result<(), FsError> {
    let occupant = Occupant::of(target);
    if occupant == Occupant::Vacant {
        return Ok(());
    }
    if is_same_item(source, target) {
        return Err(FsError::DestinationConflict {
            path: target.to_path_buf(),
        });
    }
    if merge_directories && occupant == Occupant::Directory {
        return Ok(());
    }
    if !overwrite {
        return Err(FsError::DestinationConflict {
            path: target.to_path_buf(),
        });
    }
    remove_occupant(target, occupant)
}

/// Reject a directory whose destination lies inside itself.
pub fn check_not_ancestor(source: &Path, target: &Path) -> Result<(), FsError> {
    if path::is_within(target, source) {
        return Err(FsError::SourceIsAncestor {
            source_path: source.to_path_buf(),
            destination: target.to_path_buf(),
        });
    }
    Ok(())
}

fn remove_occupant(target: &Path, occupant: Occupant) -> Result<(), FsError> {
    tracing::debug!(path = %target.display(), "removing existing destination");
    let result = match occupant {
        Occupant::Directory => fs::remove_dir_all(target),
        Occupant::File => fs::remove_file(target),
        Occupant::Vacant => Ok(()),
    };
    result.map_err(|e| FsError::io(target, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_vacant_destination() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("free");
        assert_eq!(Occupant::of(&target), Occupant::Vacant);
        assert!(clear_destination(temp.path(), &target, false, false).is_ok());
    }

    #[test]
    fn test_conflict_without_overwrite() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.txt");
        let target = temp.path().join("b.txt");
        fs::write(&source, "new").unwrap();
        fs::write(&target, "old").unwrap();

        let err = clear_destination(&source, &target, false, false).unwrap_err();
        assert!(matches!(err, FsError::DestinationConflict { .. }));
        assert!(target.exists());
    }

    #[test]
    fn test_overwrite_removes_directory() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.txt");
        let target = temp.path().join("occupied");
        fs::write(&source, "new").unwrap();
        fs::create_dir_all(target.join("inner")).unwrap();

        clear_destination(&source, &target, true, false).unwrap();
        assert_eq!(Occupant::of(&target), Occupant::Vacant);
    }

    #[test]
    fn test_merge_keeps_directory() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src");
        let target = temp.path().join("dst");
        fs::create_dir(&source).unwrap();
        fs::create_dir(&target).unwrap();

        clear_destination(&source, &target, false, true).unwrap();
        assert_eq!(Occupant::of(&target), Occupant::Directory);
    }

    #[test]
    fn test_same_item_is_conflict_even_with_overwrite() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        fs::write(&file, "keep me").unwrap();

        let err = clear_destination(&file, &file, true, false).unwrap_err();
        assert!(matches!(err, FsError::DestinationConflict { .. }));
        assert_eq!(fs::read_to_string(&file).unwrap(), "keep me");
    }

    #[test]
    fn test_ancestor_check() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src");
        fs::create_dir(&source).unwrap();
        assert!(check_not_ancestor(&source, &source.join("sub/src")).is_err());
        assert!(check_not_ancestor(&source, &temp.path().join("dst/src")).is_ok());
    }
}
