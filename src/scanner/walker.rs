//! Directory walker built on walkdir.
//!
//! # Overview
//!
//! The [`Walker`] produces a lazy, finite sequence of [`WalkEntry`] values
//! for everything below a root except directories. The walk is depth-first
//! and single-threaded with children sorted by name, so the order in which
//! files are discovered (and therefore which file of a duplicate set is
//! "first seen") is stable across runs over the same tree.
//!
//! Per-entry failures are yielded as non-fatal [`ScanError`] values and the
//! walk continues. A root that cannot be resolved or listed is fatal.
//!
//! # Example
//!
//! ```no_run
//! use dupreclaim::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/srv/backups"), WalkerConfig::default());
//! let files: Vec<_> = walker
//!     .walk()
//!     .expect("root is readable")
//!     .filter_map(Result::ok)
//!     .collect();
//! println!("Found {} files", files.len());
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::{DirEntry, WalkDir};

use super::path_utils::canonical_root;
use super::{ScanError, WalkEntry, WalkerConfig};

/// Depth-first directory walker for one root.
#[derive(Debug)]
pub struct Walker {
    /// Root path as supplied by the caller
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Stop yielding entries once `flag` becomes `true`.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the tree below the root.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::RootUnreadable`] up front if the root cannot be
    /// canonicalized. Failing to list the root directory itself is yielded
    /// as a fatal error from the iterator; everything else is non-fatal.
    pub fn walk(
        &self,
    ) -> Result<impl Iterator<Item = Result<WalkEntry, ScanError>> + '_, ScanError> {
        let root = canonical_root(&self.root)?;
        log::debug!("Walking {}", root.display());

        let walk_dir = WalkDir::new(&root)
            .follow_links(false)
            .same_file_system(self.config.same_file_system)
            .sort_by_file_name();

        Ok(walk_dir
            .into_iter()
            .take_while(move |_| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    return false;
                }
                true
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => self.process_entry(entry),
                Err(e) => Some(Err(self.handle_walk_error(e))),
            }))
    }

    fn process_entry(&self, entry: DirEntry) -> Option<Result<WalkEntry, ScanError>> {
        let file_type = entry.file_type();
        if file_type.is_dir() {
            return None;
        }

        let is_symlink = file_type.is_symlink();
        if !is_symlink && !file_type.is_file() {
            log::trace!("Skipping special file: {}", entry.path().display());
            return None;
        }

        // follow_links(false): this is the link's own metadata for symlinks
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => return Some(Err(self.handle_walk_error(e))),
        };

        Some(Ok(WalkEntry {
            path: entry.into_path(),
            size: metadata.len(),
            is_symlink,
        }))
    }

    fn handle_walk_error(&self, error: walkdir::Error) -> ScanError {
        use std::io::ErrorKind;

        let path = error
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);

        if error.depth() == 0 {
            log::error!("Cannot read root {}: {}", path.display(), error);
            let source = error
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop at root"));
            return ScanError::RootUnreadable { path, source };
        }

        let Some(kind) = error.io_error().map(std::io::Error::kind) else {
            log::warn!("Walker error for {}: {}", path.display(), error);
            return ScanError::Io {
                path,
                source: std::io::Error::other(error.to_string()),
            };
        };

        match kind {
            ErrorKind::PermissionDenied => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path)
            }
            ErrorKind::NotFound => {
                log::debug!("File not found (may have been deleted): {}", path.display());
                ScanError::NotFound(path)
            }
            _ => {
                log::warn!("I/O error for {}: {}", path.display(), error);
                let source = error
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walk error"));
                ScanError::Io { path, source }
            }
        }
    }
}
