//! File actions module.
//!
//! This module provides functionality for:
//! - Replacing confirmed duplicates with copy-on-write clones
//! - Independent re-verification through an external checksum tool
//!
//! # Reclaim
//!
//! The reclaim module performs the one destructive step of a run:
//! - Clone the partner to a temporary sibling, never overwriting one
//! - Carry over permissions and timestamps like `cp -p`
//! - Atomically rename the clone over the duplicate
//! - Skip pairs an earlier run already settled
//!
//! ```no_run
//! use dupreclaim::actions::{ClonePolicy, ReclaimConfig, Reclaimer};
//!
//! let reclaimer = Reclaimer::new(
//!     ReclaimConfig::default().with_policy(ClonePolicy::ReflinkOnly),
//! );
//! ```
//!
//! # Verification
//!
//! ```no_run
//! use dupreclaim::actions::Verifier;
//! use std::path::Path;
//!
//! let sum = Verifier::default().checksum(Path::new("file.iso"));
//! ```

pub mod reclaim;
pub mod verify;

pub use reclaim::{
    temp_sibling, ClonePolicy, ReclaimConfig, ReclaimError, ReclaimOutcome, Reclaimer,
    TEMP_SUFFIX,
};
pub use verify::{command_available, PairCheck, Verifier, VerifyError, DEFAULT_VERIFY_COMMAND};
