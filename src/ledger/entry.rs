//! Ledger entry definitions.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Identity of a file on disk at one moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileState {
    /// Size in bytes
    pub size: u64,
    /// Modification time in nanoseconds since the Unix epoch
    pub mtime_ns: i64,
    /// Inode number, or 0 where the platform has none
    pub inode: u64,
}

impl FileState {
    /// Read the current state of `path` (following symlinks).
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be stat'ed.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        std::fs::metadata(path).map(|m| Self::from_metadata(&m))
    }

    /// Build a state from already-fetched metadata.
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            size: metadata.len(),
            mtime_ns: mtime_nanos(metadata),
            inode: inode(metadata),
        }
    }
}

/// One recorded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Path of the file
    pub path: PathBuf,
    /// State right after the reclaim
    pub state: FileState,
    /// Lowercase hex full digest shared with its partner
    pub digest: String,
}

impl LedgerEntry {
    /// Whether `current` still matches the recorded state and `digest`.
    #[must_use]
    pub fn matches(&self, current: &FileState, digest: &str) -> bool {
        self.state == *current && self.digest == digest
    }
}

fn mtime_nanos(metadata: &Metadata) -> i64 {
    let Ok(modified) = metadata.modified() else {
        return 0;
    };
    match modified.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
        Err(before) => -i64::try_from(before.duration().as_nanos()).unwrap_or(i64::MAX),
    }
}

#[cfg(unix)]
fn inode(metadata: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn inode(_metadata: &Metadata) -> u64 {
    0
}
