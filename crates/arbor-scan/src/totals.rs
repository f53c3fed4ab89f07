//! Tree measurement used to pre-count work before an operation starts.

use std::path::Path;
use std::time::Duration;

use jwalk::{Parallelism, WalkDir};
use tokio_util::sync::CancellationToken;

/// File count and byte total of a path and its descendants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeTotals {
    /// Number of leaf items (files and symlinks).
    pub files: usize,
    /// Sum of file sizes.
    pub bytes: u64,
}

impl TreeTotals {
    /// Add another total into this one.
    pub fn add(&mut self, other: TreeTotals) {
        self.files += other.files;
        self.bytes += other.bytes;
    }
}

/// Measure a file or directory tree.
///
/// The numbers are advisory: unreadable subtrees are silently skipped and
/// symlinked directories below the root are counted as single leaves. A
/// dangling symlink counts as one empty leaf. Once `cancel` fires the walk
/// stops and the totals gathered so far are returned.
pub fn measure(path: &Path, cancel: &CancellationToken) -> TreeTotals {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(_) if std::fs::symlink_metadata(path).is_ok() => {
            return TreeTotals { files: 1, bytes: 0 };
        }
        Err(_) => return TreeTotals::default(),
    };

    if !meta.is_dir() {
        return TreeTotals {
            files: 1,
            bytes: meta.len(),
        };
    }

    let walker = WalkDir::new(path)
        .parallelism(Parallelism::RayonDefaultPool {
            busy_timeout: Duration::from_millis(100),
        })
        .skip_hidden(false)
        .follow_links(false)
        .min_depth(1);

    let mut totals = TreeTotals::default();
    for entry in walker.into_iter().flatten() {
        if cancel.is_cancelled() {
            tracing::debug!(path = %path.display(), "measurement cancelled");
            break;
        }
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        totals.files += 1;
        if file_type.is_file() {
            totals.bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        } else if file_type.is_symlink() {
            totals.bytes += std::fs::metadata(entry.path())
                .ok()
                .filter(|m| m.is_file())
                .map(|m| m.len())
                .unwrap_or(0);
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_measure_tree() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("a.txt"), "hello").unwrap();
        fs::write(root.join("sub/b.txt"), "0123456789").unwrap();
        fs::write(root.join("sub/deeper/.c"), "xyz").unwrap();

        let totals = measure(root, &CancellationToken::new());
        assert_eq!(totals.files, 3);
        assert_eq!(totals.bytes, 18);
    }

    #[test]
    fn test_measure_single_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("f.bin");
        fs::write(&file, [1u8; 7]).unwrap();
        assert_eq!(
            measure(&file, &CancellationToken::new()),
            TreeTotals { files: 1, bytes: 7 }
        );
    }

    #[test]
    fn test_measure_missing_is_zero() {
        let temp = TempDir::new().unwrap();
        let gone = temp.path().join("gone");
        assert_eq!(
            measure(&gone, &CancellationToken::new()),
            TreeTotals::default()
        );
    }

    #[test]
    fn test_empty_directory() {
        let temp = TempDir::new().unwrap();
        assert_eq!(
            measure(temp.path(), &CancellationToken::new()),
            TreeTotals::default()
        );
    }

    #[test]
    fn test_cancelled_measure_stops_early() {
        let temp = TempDir::new().unwrap();
        for i in 0..20 {
            fs::write(temp.path().join(format!("f{i}.txt")), "x").unwrap();
        }
        let cancel = CancellationToken::new();
        cancel.cancel();

        let totals = measure(temp.path(), &cancel);
        assert!(totals.files < 20);
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_one_leaf() {
        let temp = TempDir::new().unwrap();
        let link = temp.path().join("dangling");
        std::os::unix::fs::symlink(temp.path().join("vanished"), &link).unwrap();
        assert_eq!(
            measure(&link, &CancellationToken::new()),
            TreeTotals { files: 1, bytes: 0 }
        );
    }
}
