//! Scanner module for directory traversal and file hashing.
//!
//! This module provides functionality for:
//! - Deterministic depth-first directory walking using walkdir
//! - Prefix hashing with BLAKE3 and full-content hashing with SHA-512
//! - Root canonicalization and repeated-path detection
//!
//! # Architecture
//!
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: Partial and full digests
//! - [`path_utils`]: Canonical roots and the [`PathDuplicateSet`]
//!
//! # Example
//!
//! ```no_run
//! use dupreclaim::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("."), WalkerConfig::default());
//! for entry in walker.walk().expect("root is readable") {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod path_utils;
pub mod walker;

use std::path::PathBuf;

pub use hasher::{hex_digest, FullDigest, Hasher, PartialDigest, PREHASH_SIZE};
pub use path_utils::PathDuplicateSet;
pub use walker::Walker;

/// One filesystem entry produced by the walk.
///
/// Directories are never emitted. Symlinks are emitted (not followed) so the
/// size stage can reject them explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Absolute path below a canonical root
    pub path: PathBuf,
    /// Size in bytes (of the link itself for symlinks)
    pub size: u64,
    /// Whether this entry is a symbolic link
    pub is_symlink: bool,
}

impl WalkEntry {
    /// Create a new entry for a regular file.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self {
            path,
            size,
            is_symlink: false,
        }
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Do not descend into directories on a different filesystem than the root.
    /// Clones cannot cross filesystems, so files there can never be reclaimed.
    pub same_file_system: bool,
}

impl WalkerConfig {
    /// Restrict the walk to the root's filesystem.
    #[must_use]
    pub fn with_same_file_system(mut self, enabled: bool) -> Self {
        self.same_file_system = enabled;
        self
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// The root itself could not be resolved or read. Always fatal.
    #[error("Cannot read root {path}: {source}")]
    RootUnreadable {
        /// The root as supplied
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The entry vanished between listing and inspection.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing an entry.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Whether this error must abort the whole run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RootUnreadable { .. })
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Fewer bytes could be read than required.
    #[error("short read on {path}: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// File being hashed
        path: PathBuf,
        /// Bytes required
        expected: u64,
        /// Bytes actually read
        actual: u64,
    },

    /// The file grew while it was being hashed.
    #[error("size changed while hashing {path}: expected {expected} bytes, read {actual}")]
    SizeChanged {
        /// File being hashed
        path: PathBuf,
        /// Size recorded by the walk
        expected: u64,
        /// Bytes actually read
        actual: u64,
    },

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// The file the error refers to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::ShortRead { path: p, .. }
            | Self::SizeChanged { path: p, .. }
            | Self::Io { path: p, .. } => p,
        }
    }

    /// Classify an I/O error raised while opening or reading `path`.
    #[must_use]
    pub fn from_io(path: &std::path::Path, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}
