//! Process-wide run counters.
//!
//! Every counter is an [`AtomicU64`] that only ever grows. Workers bump
//! them with relaxed increments; the reporter reads a [`StatsSnapshot`].
//! Individual counters are exact, but a snapshot is not a consistent cut
//! across counters while the pipeline is running.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared counters updated by every stage.
#[derive(Debug, Default)]
pub struct RunStatistics {
    files_seen: AtomicU64,
    bytes_seen: AtomicU64,
    files_hashed: AtomicU64,
    bytes_hashed: AtomicU64,
    duplicates_found: AtomicU64,
    files_reclaimed: AtomicU64,
    bytes_reclaimed: AtomicU64,
    already_reclaimed: AtomicU64,
    files_dropped: AtomicU64,
    entries_skipped: AtomicU64,
}

/// Point-in-time copy of [`RunStatistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Candidates admitted by the size stage
    pub files_seen: u64,
    /// Bytes of admitted candidates
    pub bytes_seen: u64,
    /// Files whose full digest was computed
    pub files_hashed: u64,
    /// Bytes covered by full digests
    pub bytes_hashed: u64,
    /// Confirmed duplicates handed to the reclaim stage
    pub duplicates_found: u64,
    /// Duplicates replaced by a clone (or that would be, in a dry run)
    pub files_reclaimed: u64,
    /// Bytes freed by those replacements
    pub bytes_reclaimed: u64,
    /// Pairs found already settled by an earlier run
    pub already_reclaimed: u64,
    /// Candidates dropped on an error
    pub files_dropped: u64,
    /// Walk entries skipped (repeated paths, non-fatal walk errors)
    pub entries_skipped: u64,
}

impl RunStatistics {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A candidate of `size` bytes entered the pipeline.
    pub fn record_seen(&self, size: u64) {
        self.files_seen.fetch_add(1, Ordering::Relaxed);
        self.bytes_seen.fetch_add(size, Ordering::Relaxed);
    }

    /// A file of `size` bytes was fully hashed.
    pub fn record_hashed(&self, size: u64) {
        self.files_hashed.fetch_add(1, Ordering::Relaxed);
        self.bytes_hashed.fetch_add(size, Ordering::Relaxed);
    }

    /// A confirmed duplicate was forwarded to reclaim.
    pub fn record_duplicate(&self) {
        self.duplicates_found.fetch_add(1, Ordering::Relaxed);
    }

    /// A duplicate of `size` bytes was reclaimed.
    pub fn record_reclaimed(&self, size: u64) {
        self.files_reclaimed.fetch_add(1, Ordering::Relaxed);
        self.bytes_reclaimed.fetch_add(size, Ordering::Relaxed);
    }

    /// A pair was already settled by an earlier run.
    pub fn record_already_reclaimed(&self) {
        self.already_reclaimed.fetch_add(1, Ordering::Relaxed);
    }

    /// A candidate was dropped on an error.
    pub fn record_dropped(&self) {
        self.files_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// A walk entry was skipped.
    pub fn record_skipped(&self) {
        self.entries_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            files_seen: self.files_seen.load(Ordering::Relaxed),
            bytes_seen: self.bytes_seen.load(Ordering::Relaxed),
            files_hashed: self.files_hashed.load(Ordering::Relaxed),
            bytes_hashed: self.bytes_hashed.load(Ordering::Relaxed),
            duplicates_found: self.duplicates_found.load(Ordering::Relaxed),
            files_reclaimed: self.files_reclaimed.load(Ordering::Relaxed),
            bytes_reclaimed: self.bytes_reclaimed.load(Ordering::Relaxed),
            already_reclaimed: self.already_reclaimed.load(Ordering::Relaxed),
            files_dropped: self.files_dropped.load(Ordering::Relaxed),
            entries_skipped: self.entries_skipped.load(Ordering::Relaxed),
        }
    }
}
