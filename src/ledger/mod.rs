//! Reclaim ledger for repeatable runs.
//!
//! A reclaimed duplicate is still byte-identical to its partner, so a second
//! run over the same tree would pair the two again. The ledger remembers
//! every file touched by a successful reclaim so that pair can be reported
//! as already settled instead of being cloned a second time.
//!
//! # Architecture
//!
//! * [`database`]: SQLite persistence via rusqlite.
//! * [`entry`]: The recorded file state and its validation.
//!
//! # Invalidation
//!
//! An entry only counts while the file still matches it:
//! * File path (primary key)
//! * File size
//! * Modification time (nanoseconds)
//! * Inode (on platforms that have one)
//! * Full-content digest of the pair
//!
//! Any difference means the file changed since it was reclaimed, and the
//! pair is evaluated again from scratch.

pub mod database;
pub mod entry;

pub use database::{LedgerError, LedgerResult, ReclaimLedger};
pub use entry::{FileState, LedgerEntry};
