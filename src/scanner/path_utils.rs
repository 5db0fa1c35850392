//! Path helpers: canonical roots and repeated-path detection.
//!
//! Every root is resolved once with [`std::fs::canonicalize`]. The walk does
//! not follow symlinks, so every path below a canonical root is itself
//! absolute and free of `.`/`..` components. That makes plain path equality
//! enough to notice the same file reached through two overlapping roots.
//!
//! # Example
//!
//! ```
//! use dupreclaim::scanner::path_utils::PathDuplicateSet;
//! use std::path::Path;
//!
//! let mut seen = PathDuplicateSet::new();
//! assert!(seen.insert(Path::new("/data/a.bin")));
//! assert!(!seen.insert(Path::new("/data/a.bin")));
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::ScanError;

/// Resolve a user-supplied root to its canonical absolute form.
///
/// # Errors
///
/// Returns [`ScanError::RootUnreadable`] when the root does not exist or
/// cannot be resolved.
pub fn canonical_root(root: &Path) -> Result<PathBuf, ScanError> {
    std::fs::canonicalize(root).map_err(|source| ScanError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })
}

/// Set of paths already admitted into the pipeline.
#[derive(Debug, Default)]
pub struct PathDuplicateSet {
    seen: HashSet<PathBuf>,
}

impl PathDuplicateSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path`. Returns `false` if it was already admitted.
    pub fn insert(&mut self, path: &Path) -> bool {
        if self.seen.contains(path) {
            return false;
        }
        self.seen.insert(path.to_path_buf())
    }

    /// Number of distinct paths admitted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether no path has been admitted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
