//! SQLite-backed reclaim ledger.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use super::entry::{FileState, LedgerEntry};

/// Errors raised by the ledger.
#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    /// The SQLite layer failed.
    #[error("ledger database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The ledger directory could not be created.
    #[error("cannot create ledger directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS reclaimed (
        path     TEXT PRIMARY KEY NOT NULL,
        size     INTEGER NOT NULL,
        mtime_ns INTEGER NOT NULL,
        inode    INTEGER NOT NULL,
        digest   TEXT NOT NULL
    );
";

/// Persistent record of files settled by earlier reclaims.
///
/// The connection is not `Sync`; the reclaim stage keeps the ledger behind
/// its global reclaim lock.
pub struct ReclaimLedger {
    conn: Connection,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for ReclaimLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReclaimLedger")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ReclaimLedger {
    /// Open or create the ledger at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created or the database cannot be
    /// opened or migrated.
    pub fn open(path: &Path) -> LedgerResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| LedgerError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        let ledger = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        ledger.initialize()?;
        log::debug!("Opened reclaim ledger at {}", path.display());
        Ok(ledger)
    }

    /// Open a throwaway in-memory ledger (for testing).
    ///
    /// # Errors
    ///
    /// Fails if SQLite cannot allocate the database.
    pub fn open_in_memory() -> LedgerResult<Self> {
        let ledger = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        ledger.initialize()?;
        Ok(ledger)
    }

    fn initialize(&self) -> LedgerResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Location on disk, or `None` for an in-memory ledger.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record `path` in `state` as settled with `digest`.
    ///
    /// # Errors
    ///
    /// Returns a database error if the write fails.
    pub fn record(&self, path: &Path, state: &FileState, digest: &str) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO reclaimed (path, size, mtime_ns, inode, digest)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                path.to_string_lossy(),
                i64::try_from(state.size).unwrap_or(i64::MAX),
                state.mtime_ns,
                state.inode as i64,
                digest,
            ],
        )?;
        Ok(())
    }

    /// Fetch the entry for `path`, if any.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub fn lookup(&self, path: &Path) -> LedgerResult<Option<LedgerEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT size, mtime_ns, inode, digest FROM reclaimed WHERE path = ?1",
                params![path.to_string_lossy()],
                |row| {
                    let size: i64 = row.get(0)?;
                    let inode: i64 = row.get(2)?;
                    Ok(LedgerEntry {
                        path: path.to_path_buf(),
                        state: FileState {
                            size: u64::try_from(size).unwrap_or(0),
                            mtime_ns: row.get(1)?,
                            inode: inode as u64,
                        },
                        digest: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    /// Whether `duplicate` and `partner` were both settled with `digest` and
    /// neither has changed on disk since.
    ///
    /// # Errors
    ///
    /// Returns a database error if a lookup fails. A file that cannot be
    /// stat'ed is simply not settled.
    pub fn is_settled(&self, duplicate: &Path, partner: &Path, digest: &str) -> LedgerResult<bool> {
        for path in [duplicate, partner] {
            let Some(entry) = self.lookup(path)? else {
                return Ok(false);
            };
            let Ok(current) = FileState::read(path) else {
                return Ok(false);
            };
            if !entry.matches(&current, digest) {
                log::debug!("Ledger entry for {} is stale", path.display());
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Number of recorded files.
    ///
    /// # Errors
    ///
    /// Returns a database error if the count fails.
    pub fn len(&self) -> LedgerResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM reclaimed", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Whether nothing has been recorded.
    ///
    /// # Errors
    ///
    /// Returns a database error if the count fails.
    pub fn is_empty(&self) -> LedgerResult<bool> {
        Ok(self.len()? == 0)
    }
}
