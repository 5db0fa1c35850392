//! Partial and full file digests.
//!
//! # Overview
//!
//! - [`Hasher::partial_hash`] reads exactly [`PREHASH_SIZE`] bytes from the
//!   start of a file and digests them with BLAKE3. It is only a filter: two
//!   files with the same partial digest still have to be fully hashed.
//! - [`Hasher::full_hash`] streams the entire file through SHA-512. Equal
//!   full digests (and equal sizes) are treated as proof of identity.
//!
//! Both fail rather than guess when the file does not match what the walk
//! recorded: a file shorter than the probe window cannot be prefix-hashed,
//! and a file whose length changed during hashing is dropped.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use sha2::{Digest, Sha512};

use super::HashError;

/// Number of leading bytes covered by the partial digest.
pub const PREHASH_SIZE: usize = 4096;

/// Read buffer used when streaming whole files.
const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// BLAKE3 digest of a file prefix.
pub type PartialDigest = [u8; 32];

/// SHA-512 digest of a whole file.
pub type FullDigest = [u8; 64];

/// Render a digest as lowercase hex.
#[must_use]
pub fn hex_digest(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}

/// File hasher shared by the hashing stages.
#[derive(Debug, Clone)]
pub struct Hasher {
    buffer_size: usize,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default streaming buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer_size: STREAM_BUFFER_SIZE,
        }
    }

    /// Use a different buffer size for full-file streaming.
    #[cfg(test)]
    #[must_use]
    fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Digest the first [`PREHASH_SIZE`] bytes of `path`.
    ///
    /// # Errors
    ///
    /// [`HashError::ShortRead`] if the file holds fewer than
    /// [`PREHASH_SIZE`] bytes, or an open/read error.
    pub fn partial_hash(&self, path: &Path) -> Result<PartialDigest, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut buf = [0u8; PREHASH_SIZE];

        let read = read_up_to(&mut file, &mut buf).map_err(|e| HashError::from_io(path, e))?;
        if read < PREHASH_SIZE {
            return Err(HashError::ShortRead {
                path: path.to_path_buf(),
                expected: PREHASH_SIZE as u64,
                actual: read as u64,
            });
        }

        Ok(*blake3::hash(&buf).as_bytes())
    }

    /// Digest the whole content of `path`, which the walk saw as
    /// `expected_size` bytes long.
    ///
    /// # Errors
    ///
    /// [`HashError::ShortRead`] if fewer bytes could be read,
    /// [`HashError::SizeChanged`] if more could, or an open/read error.
    pub fn full_hash(&self, path: &Path, expected_size: u64) -> Result<FullDigest, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut hasher = Sha512::new();
        let mut buf = vec![0u8; self.buffer_size];
        let mut total: u64 = 0;

        loop {
            let n = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buf[..n]);
            total += n as u64;
        }

        if total < expected_size {
            return Err(HashError::ShortRead {
                path: path.to_path_buf(),
                expected: expected_size,
                actual: total,
            });
        }
        if total > expected_size {
            return Err(HashError::SizeChanged {
                path: path.to_path_buf(),
                expected: expected_size,
                actual: total,
            });
        }

        let mut digest = [0u8; 64];
        digest.copy_from_slice(&hasher.finalize());
        Ok(digest)
    }
}

/// Fill `buf` as far as the reader allows, returning the number of bytes read.
fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
