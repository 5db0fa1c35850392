//! Replace a confirmed duplicate with a copy-on-write clone of its partner.
//!
//! # Overview
//!
//! Reclaiming a duplicate is the only destructive step of a run, so it is
//! staged to never leave a half-written file behind:
//!
//! 1. Check the ledger: a pair settled by an earlier run is skipped.
//! 2. Check that neither file changed size since it was hashed.
//! 3. Optionally re-verify both files with an external checksum tool.
//! 4. Clone the partner to a hidden sibling of the duplicate
//!    (`.<name>.dupreclaim-tmp`). An existing temporary is an error and is
//!    never overwritten, so leftovers of an earlier crash stay visible.
//! 5. Copy the partner's permissions and timestamps onto the clone.
//! 6. Atomically rename the clone over the duplicate.
//!
//! Any failure before step 6 removes the temporary and leaves the duplicate
//! untouched. All reclaims of a [`Reclaimer`] are serialized behind one lock.
//!
//! # Example
//!
//! ```no_run
//! use dupreclaim::actions::reclaim::{ReclaimConfig, Reclaimer};
//! use dupreclaim::duplicates::FileCandidate;
//! use std::path::PathBuf;
//!
//! let reclaimer = Reclaimer::new(ReclaimConfig::default());
//! let mut dup = FileCandidate::new(PathBuf::from("/data/copy.iso"), 4 << 30);
//! dup.partner = Some(PathBuf::from("/data/original.iso"));
//!
//! match reclaimer.reclaim(&dup) {
//!     Ok(outcome) => println!("{:?}", outcome),
//!     Err(e) => eprintln!("Failed: {}", e),
//! }
//! ```

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use filetime::FileTime;

use super::verify::{PairCheck, Verifier, VerifyError};
use crate::duplicates::FileCandidate;
use crate::ledger::{FileState, ReclaimLedger};
use crate::scanner::hex_digest;

/// Suffix of the temporary clone created next to each duplicate.
pub const TEMP_SUFFIX: &str = ".dupreclaim-tmp";

/// Longest single path component most filesystems accept, in bytes.
const MAX_NAME_BYTES: usize = 255;

/// What to do when the filesystem cannot clone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClonePolicy {
    /// Fail with [`ReclaimError::CloneUnsupported`].
    #[default]
    ReflinkOnly,
    /// Fall back to a full byte copy. Saves no space.
    ReflinkOrCopy,
}

/// Configuration for the reclaim stage.
#[derive(Debug, Clone, Default)]
pub struct ReclaimConfig {
    /// Clone fallback policy
    pub policy: ClonePolicy,
    /// Count what would be reclaimed without touching anything
    pub dry_run: bool,
    /// External re-verification before each replacement
    pub verifier: Option<Verifier>,
}

impl ReclaimConfig {
    /// Set the clone fallback policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ClonePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable or disable dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Re-verify each pair with `verifier` before replacing.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Verifier) -> Self {
        self.verifier = Some(verifier);
        self
    }
}

/// Result of handling one confirmed duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimOutcome {
    /// The duplicate now shares storage with its partner.
    Reclaimed {
        /// Size of the duplicate
        bytes: u64,
    },
    /// Dry run: the duplicate would have been reclaimed.
    WouldReclaim {
        /// Size of the duplicate
        bytes: u64,
    },
    /// An earlier run already settled this pair.
    AlreadyReclaimed,
}

impl ReclaimOutcome {
    /// Bytes freed (or that would be freed).
    #[must_use]
    pub fn bytes(&self) -> u64 {
        match self {
            Self::Reclaimed { bytes } | Self::WouldReclaim { bytes } => *bytes,
            Self::AlreadyReclaimed => 0,
        }
    }
}

/// Errors that can occur while reclaiming a duplicate.
#[derive(thiserror::Error, Debug)]
pub enum ReclaimError {
    /// The candidate reached reclaim without a partner.
    #[error("no partner recorded for {0}")]
    Unpaired(PathBuf),

    /// A file vanished before it could be reclaimed.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// A file changed since it was hashed.
    #[error("file modified since it was hashed: {0}")]
    Modified(PathBuf),

    /// The temporary sibling already exists.
    #[error("temporary file already exists: {0} (left over from an interrupted run? remove it to retry)")]
    TempExists(PathBuf),

    /// The filesystem cannot clone between these paths.
    #[error(
        "cannot clone {partner}: copy-on-write clones are not supported here ({source}); \
         both files must be on the same filesystem with reflink support, or pass \
         --allow-copy-fallback to copy instead"
    )]
    CloneUnsupported {
        /// File that would have been cloned
        partner: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The clone failed for another reason.
    #[error("cannot clone {partner} to {temp}: {source}")]
    CloneFailed {
        /// File being cloned
        partner: PathBuf,
        /// Temporary destination
        temp: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Permissions or timestamps could not be applied to the clone.
    #[error("cannot copy attributes onto {path}: {source}")]
    Attributes {
        /// Temporary clone
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The final rename failed.
    #[error("cannot rename {temp} over {path}: {source}")]
    RenameFailed {
        /// Temporary clone
        temp: PathBuf,
        /// Duplicate being replaced
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The external checksum could not be obtained.
    #[error("verification could not run: {0}")]
    VerifyFailed(#[from] VerifyError),

    /// The external checksum disagrees: the files are not identical.
    #[error(
        "integrity check failed: {duplicate} ({duplicate_sum}) differs from {partner} ({partner_sum})"
    )]
    IntegrityMismatch {
        /// Duplicate path
        duplicate: PathBuf,
        /// Partner path
        partner: PathBuf,
        /// Checksum of the duplicate
        duplicate_sum: String,
        /// Checksum of the partner
        partner_sum: String,
    },

    /// Any other I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl ReclaimError {
    /// Whether this error must stop the whole run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::IntegrityMismatch { .. })
    }

    fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// Path of the temporary clone for `path`: a hidden sibling in the same
/// directory, so the final rename never crosses filesystems.
///
/// Names too long to take the dot and [`TEMP_SUFFIX`] are cut short first,
/// so the temporary name never exceeds [`MAX_NAME_BYTES`].
///
/// # Errors
///
/// [`ReclaimError::Io`] if `path` has no file name.
pub fn temp_sibling(path: &Path) -> Result<PathBuf, ReclaimError> {
    let name = path.file_name().ok_or_else(|| ReclaimError::Io {
        path: path.to_path_buf(),
        source: io::Error::new(ErrorKind::InvalidInput, "path has no file name"),
    })?;

    let mut temp_name = std::ffi::OsString::from(".");
    temp_name.push(shorten_name(name, MAX_NAME_BYTES - 1 - TEMP_SUFFIX.len()));
    temp_name.push(TEMP_SUFFIX);
    Ok(path.with_file_name(temp_name))
}

fn shorten_name(name: &std::ffi::OsStr, limit: usize) -> std::ffi::OsString {
    if name.len() <= limit {
        return name.to_os_string();
    }
    if let Some(text) = name.to_str() {
        let mut end = limit;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        return text[..end].into();
    }
    #[cfg(unix)]
    {
        use std::os::unix::ffi::{OsStrExt, OsStringExt};
        std::ffi::OsString::from_vec(name.as_bytes()[..limit].to_vec())
    }
    #[cfg(not(unix))]
    {
        name.to_os_string()
    }
}

/// Temporary clone that is removed on drop unless committed.
struct StagedClone {
    path: PathBuf,
    committed: bool,
}

impl StagedClone {
    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for StagedClone {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                log::warn!("Cannot remove temporary {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(target_os = "linux")]
const UNSUPPORTED_CLONE_ERRNOS: &[i32] = &[
    18, // EXDEV
    22, // EINVAL
    25, // ENOTTY
    95, // EOPNOTSUPP
];

#[cfg(target_os = "macos")]
const UNSUPPORTED_CLONE_ERRNOS: &[i32] = &[
    18, // EXDEV
    45, // ENOTSUP
];

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
const UNSUPPORTED_CLONE_ERRNOS: &[i32] = &[];

fn is_clone_unsupported(err: &io::Error) -> bool {
    err.kind() == ErrorKind::Unsupported
        || err
            .raw_os_error()
            .is_some_and(|code| UNSUPPORTED_CLONE_ERRNOS.contains(&code))
}

/// Serialized executor of the reclaim step.
#[derive(Debug)]
pub struct Reclaimer {
    config: ReclaimConfig,
    /// Global reclaim lock; also guards the non-`Sync` ledger connection
    state: Mutex<Option<ReclaimLedger>>,
}

impl Reclaimer {
    /// Create a reclaimer without a ledger.
    #[must_use]
    pub fn new(config: ReclaimConfig) -> Self {
        Self {
            config,
            state: Mutex::new(None),
        }
    }

    /// Consult and update `ledger` to skip pairs settled by earlier runs.
    #[must_use]
    pub fn with_ledger(self, ledger: ReclaimLedger) -> Self {
        Self {
            config: self.config,
            state: Mutex::new(Some(ledger)),
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ReclaimConfig {
        &self.config
    }

    /// Reclaim one confirmed duplicate.
    ///
    /// Holds the global reclaim lock for the whole operation.
    ///
    /// # Errors
    ///
    /// See [`ReclaimError`]. Only [`ReclaimError::IntegrityMismatch`] is
    /// fatal; for every other error the duplicate is left as it was.
    pub fn reclaim(&self, candidate: &FileCandidate) -> Result<ReclaimOutcome, ReclaimError> {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.reclaim_locked(guard.as_ref(), candidate)
    }

    /// Like [`Reclaimer::reclaim`], but once the lock is held, give up
    /// with `Ok(None)` if `proceed` returns `false`.
    ///
    /// # Errors
    ///
    /// See [`Reclaimer::reclaim`].
    pub fn reclaim_if(
        &self,
        candidate: &FileCandidate,
        proceed: impl FnOnce() -> bool,
    ) -> Result<Option<ReclaimOutcome>, ReclaimError> {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !proceed() {
            return Ok(None);
        }
        self.reclaim_locked(guard.as_ref(), candidate).map(Some)
    }

    fn reclaim_locked(
        &self,
        ledger: Option<&ReclaimLedger>,
        candidate: &FileCandidate,
    ) -> Result<ReclaimOutcome, ReclaimError> {
        let duplicate = candidate.path.as_path();
        let partner = candidate
            .partner()
            .ok_or_else(|| ReclaimError::Unpaired(candidate.path.clone()))?;
        let digest = candidate.digest.as_ref().map(|d| hex_digest(d));

        if let (Some(ledger), Some(digest)) = (ledger, digest.as_deref()) {
            match ledger.is_settled(duplicate, partner, digest) {
                Ok(true) => {
                    log::debug!(
                        "Already reclaimed: {} -> {}",
                        duplicate.display(),
                        partner.display()
                    );
                    return Ok(ReclaimOutcome::AlreadyReclaimed);
                }
                Ok(false) => {}
                Err(e) => log::warn!("Ledger lookup failed for {}: {}", duplicate.display(), e),
            }
        }

        ensure_unchanged(duplicate, candidate.size, candidate.state.as_ref())?;
        ensure_unchanged(partner, candidate.size, candidate.partner_state.as_ref())?;

        if self.config.dry_run {
            return Ok(ReclaimOutcome::WouldReclaim {
                bytes: candidate.size,
            });
        }

        if let Some(verifier) = &self.config.verifier {
            if let PairCheck::Different {
                duplicate: duplicate_sum,
                partner: partner_sum,
            } = verifier.compare(duplicate, partner)?
            {
                return Err(ReclaimError::IntegrityMismatch {
                    duplicate: duplicate.to_path_buf(),
                    partner: partner.to_path_buf(),
                    duplicate_sum,
                    partner_sum,
                });
            }
        }

        self.replace_with_clone(duplicate, partner)?;
        log::info!(
            "Reclaimed {} ({} bytes) from {}",
            duplicate.display(),
            candidate.size,
            partner.display()
        );

        if let (Some(ledger), Some(digest)) = (ledger, digest.as_deref()) {
            for path in [duplicate, partner] {
                let recorded = FileState::read(path)
                    .map_err(|e| e.to_string())
                    .and_then(|state| {
                        ledger
                            .record(path, &state, digest)
                            .map_err(|e| e.to_string())
                    });
                if let Err(e) = recorded {
                    log::warn!("Cannot record {} in ledger: {}", path.display(), e);
                }
            }
        }

        Ok(ReclaimOutcome::Reclaimed {
            bytes: candidate.size,
        })
    }

    fn replace_with_clone(&self, duplicate: &Path, partner: &Path) -> Result<(), ReclaimError> {
        let temp = temp_sibling(duplicate)?;
        if temp.symlink_metadata().is_ok() {
            return Err(ReclaimError::TempExists(temp));
        }

        self.clone_to(partner, &temp)?;
        let staged = StagedClone {
            path: temp.clone(),
            committed: false,
        };

        copy_attributes(partner, &temp)?;

        fs::rename(&temp, duplicate).map_err(|source| ReclaimError::RenameFailed {
            temp: temp.clone(),
            path: duplicate.to_path_buf(),
            source,
        })?;
        staged.commit();
        Ok(())
    }

    fn clone_to(&self, partner: &Path, temp: &Path) -> Result<(), ReclaimError> {
        let result = match self.config.policy {
            ClonePolicy::ReflinkOnly => reflink_copy::reflink(partner, temp),
            ClonePolicy::ReflinkOrCopy => {
                reflink_copy::reflink_or_copy(partner, temp).map(|copied| {
                    if copied.is_some() {
                        log::debug!(
                            "Clone unsupported, copied {} instead",
                            partner.display()
                        );
                    }
                })
            }
        };

        result.map_err(|source| {
            // a partially written destination must not survive
            if source.kind() != ErrorKind::AlreadyExists {
                let _ = fs::remove_file(temp);
            }
            if source.kind() == ErrorKind::AlreadyExists {
                ReclaimError::TempExists(temp.to_path_buf())
            } else if is_clone_unsupported(&source) {
                ReclaimError::CloneUnsupported {
                    partner: partner.to_path_buf(),
                    source,
                }
            } else {
                ReclaimError::CloneFailed {
                    partner: partner.to_path_buf(),
                    temp: temp.to_path_buf(),
                    source,
                }
            }
        })
    }
}

/// Fail with [`ReclaimError::Modified`] if `path` no longer has the size
/// it was hashed at, or, when a state was recorded, a different mtime or
/// inode. Same-length edits are only visible through the recorded state.
fn ensure_unchanged(
    path: &Path,
    expected_size: u64,
    recorded: Option<&FileState>,
) -> Result<(), ReclaimError> {
    let metadata = fs::metadata(path).map_err(|e| ReclaimError::from_io(path, e))?;
    if metadata.len() != expected_size {
        log::warn!(
            "File modified since it was hashed: {} (size {} -> {})",
            path.display(),
            expected_size,
            metadata.len()
        );
        return Err(ReclaimError::Modified(path.to_path_buf()));
    }
    if let Some(recorded) = recorded {
        let current = FileState::from_metadata(&metadata);
        if current != *recorded {
            log::warn!(
                "File modified since it was hashed: {} (mtime {} -> {}, inode {} -> {})",
                path.display(),
                recorded.mtime_ns,
                current.mtime_ns,
                recorded.inode,
                current.inode
            );
            return Err(ReclaimError::Modified(path.to_path_buf()));
        }
    }
    Ok(())
}

fn copy_attributes(partner: &Path, temp: &Path) -> Result<(), ReclaimError> {
    let attr_err = |source| ReclaimError::Attributes {
        path: temp.to_path_buf(),
        source,
    };

    let metadata = fs::metadata(partner).map_err(|e| ReclaimError::from_io(partner, e))?;
    fs::set_permissions(temp, metadata.permissions()).map_err(attr_err)?;

    let atime = FileTime::from_last_access_time(&metadata);
    let mtime = FileTime::from_last_modification_time(&metadata);
    filetime::set_file_times(temp, atime, mtime).map_err(attr_err)?;
    Ok(())
}
