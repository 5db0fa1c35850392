//! The unit of work that flows through the pipeline.

use std::path::{Path, PathBuf};

use super::groups::Partnered;
use crate::ledger::FileState;
use crate::scanner::FullDigest;

/// One file under evaluation.
///
/// A candidate is created by the size stage, handed from queue to queue,
/// and consumed by the reclaim stage. Exactly one stage owns it at a time.
/// Its lifecycle is `Discovered -> SizeGrouped -> PartialHashed ->
/// FullHashed -> (Retained | Reclaimed)`, or dropped on an I/O error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    /// Absolute, canonical path
    pub path: PathBuf,
    /// Size in bytes as recorded by the walk
    pub size: u64,
    /// Retained file this one is identical to; set only when the full-hash
    /// stage confirms the pair
    pub partner: Option<PathBuf>,
    /// Full-content digest, once computed
    pub digest: Option<FullDigest>,
    /// On-disk state taken just before the full hash
    pub state: Option<FileState>,
    /// The partner's state taken just before its full hash
    pub partner_state: Option<FileState>,
}

impl FileCandidate {
    /// Create a freshly discovered candidate.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self {
            path,
            size,
            partner: None,
            digest: None,
            state: None,
            partner_state: None,
        }
    }

    /// The retained partner, if this candidate is a confirmed duplicate.
    #[must_use]
    pub fn partner(&self) -> Option<&Path> {
        self.partner.as_deref()
    }

    /// Whether the full-hash stage has paired this candidate.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.partner.is_some()
    }
}

impl Partnered for FileCandidate {
    fn pair_with(&mut self, representative: &Self) {
        self.partner = Some(representative.path.clone());
        self.partner_state = representative.state;
    }
}
