//! The three filtering stages.
//!
//! # Overview
//!
//! - [`SizeBucketStage`] runs on the walking thread. It drops small files,
//!   symlinks and repeated paths, then groups by exact size.
//! - [`PartialHashStage`] groups by `(size, BLAKE3 of the first 4 KiB)`.
//! - [`FullHashStage`] groups by `(size, SHA-512 of the whole file)` and
//!   pairs each later member with the first-seen one.
//!
//! The hash stages are shared by a pool of workers. File I/O happens with
//! no lock held; the index mutex is taken only around
//! [`GroupIndex::admit`].

use std::sync::{Arc, Mutex, PoisonError};

use super::candidate::FileCandidate;
use super::groups::{Admission, GroupIndex, Promotion};
use super::stats::RunStatistics;
use crate::ledger::FileState;
use crate::scanner::{FullDigest, HashError, Hasher, PartialDigest, PathDuplicateSet, WalkEntry};

/// A pool-driven stage: consumes one candidate and yields what to forward.
pub trait Stage: Send + Sync {
    /// Stage name used for worker thread names and logs.
    const NAME: &'static str;

    /// Evaluate one candidate.
    ///
    /// # Errors
    ///
    /// Returns the [`HashError`] that forced the candidate to be dropped.
    fn process(&self, candidate: FileCandidate) -> Result<Vec<FileCandidate>, HashError>;
}

fn released(admission: Admission<FileCandidate>) -> Vec<FileCandidate> {
    match admission {
        Admission::Held => Vec::new(),
        Admission::Forward(items) => items,
    }
}

/// Groups walk entries by exact size.
#[derive(Debug)]
pub struct SizeBucketStage {
    min_size: u64,
    seen_paths: PathDuplicateSet,
    index: GroupIndex<u64, FileCandidate>,
    stats: Arc<RunStatistics>,
}

impl SizeBucketStage {
    /// Create the stage; files smaller than `min_size` bytes are ignored.
    #[must_use]
    pub fn new(min_size: u64, stats: Arc<RunStatistics>) -> Self {
        Self {
            min_size,
            seen_paths: PathDuplicateSet::new(),
            index: GroupIndex::new(Promotion::ForwardBoth),
            stats,
        }
    }

    /// Admit one walk entry, returning the candidates to hash next.
    pub fn accept(&mut self, entry: WalkEntry) -> Vec<FileCandidate> {
        if entry.size < self.min_size {
            return Vec::new();
        }
        if entry.is_symlink {
            log::trace!("Skipping symlink: {}", entry.path.display());
            return Vec::new();
        }
        if !self.seen_paths.insert(&entry.path) {
            log::info!("skipping duplicated path entry: {}", entry.path.display());
            self.stats.record_skipped();
            return Vec::new();
        }

        self.stats.record_seen(entry.size);
        let candidate = FileCandidate::new(entry.path, entry.size);
        released(self.index.admit(entry.size, candidate))
    }

    /// Number of distinct sizes seen.
    #[must_use]
    pub fn distinct_sizes(&self) -> usize {
        self.index.len()
    }

    /// Number of sizes only one file had, which were never hashed.
    #[must_use]
    pub fn unique_sizes(&self) -> usize {
        self.index.unique_keys()
    }
}

/// Groups size-matched candidates by a digest of their first bytes.
#[derive(Debug)]
pub struct PartialHashStage {
    hasher: Hasher,
    index: Mutex<GroupIndex<(u64, PartialDigest), FileCandidate>>,
}

impl PartialHashStage {
    /// Create the stage.
    #[must_use]
    pub fn new(hasher: Hasher) -> Self {
        Self {
            hasher,
            index: Mutex::new(GroupIndex::new(Promotion::ForwardBoth)),
        }
    }
}

impl Stage for PartialHashStage {
    const NAME: &'static str = "partial-hash";

    fn process(&self, candidate: FileCandidate) -> Result<Vec<FileCandidate>, HashError> {
        let digest = self.hasher.partial_hash(&candidate.path)?;

        let admission = self
            .index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .admit((candidate.size, digest), candidate);
        Ok(released(admission))
    }
}

/// Confirms identity with a whole-file digest and pairs duplicates.
#[derive(Debug)]
pub struct FullHashStage {
    hasher: Hasher,
    index: Mutex<GroupIndex<(u64, FullDigest), FileCandidate>>,
    stats: Arc<RunStatistics>,
}

impl FullHashStage {
    /// Create the stage.
    #[must_use]
    pub fn new(hasher: Hasher, stats: Arc<RunStatistics>) -> Self {
        Self {
            hasher,
            index: Mutex::new(GroupIndex::new(Promotion::ForwardNewOnly)),
            stats,
        }
    }
}

impl Stage for FullHashStage {
    const NAME: &'static str = "full-hash";

    fn process(&self, mut candidate: FileCandidate) -> Result<Vec<FileCandidate>, HashError> {
        // taken before hashing so that an edit made while hashing is caught too
        let state =
            FileState::read(&candidate.path).map_err(|e| HashError::from_io(&candidate.path, e))?;
        let digest = self.hasher.full_hash(&candidate.path, candidate.size)?;
        candidate.state = Some(state);
        self.stats.record_hashed(candidate.size);
        candidate.digest = Some(digest);

        let admission = self
            .index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .admit((candidate.size, digest), candidate);

        let duplicates = released(admission);
        for _ in &duplicates {
            self.stats.record_duplicate();
        }
        Ok(duplicates)
    }
}
