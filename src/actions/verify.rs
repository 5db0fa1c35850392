//! Independent re-verification through an external checksum tool.
//!
//! Before a duplicate is replaced, both files can be checksummed again by a
//! separate program (`sha512sum` by default) so that a bug in the in-process
//! hashing can never be the only thing standing between a file and its
//! replacement.
//!
//! The command is split on whitespace; the file path is appended as the last
//! argument and the first whitespace-separated token of its standard output
//! is taken as the checksum.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Checksum command used when none is configured.
pub const DEFAULT_VERIFY_COMMAND: &str = "sha512sum";

/// Why a checksum could not be obtained.
#[derive(thiserror::Error, Debug)]
pub enum VerifyError {
    /// The command could not be started.
    #[error("cannot run `{program}` on {path}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// File being checksummed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The command ran but reported failure or printed nothing usable.
    #[error("`{program}` failed on {path}: {message}")]
    Failed {
        /// Program that failed
        program: String,
        /// File being checksummed
        path: PathBuf,
        /// Exit status or stderr summary
        message: String,
    },
}

/// Verdict of comparing a pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairCheck {
    /// Both checksums agree.
    Identical,
    /// The checksums differ.
    Different {
        /// Checksum of the duplicate
        duplicate: String,
        /// Checksum of the partner
        partner: String,
    },
}

/// External checksum runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verifier {
    program: String,
    args: Vec<String>,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(DEFAULT_VERIFY_COMMAND)
    }
}

impl Verifier {
    /// Build a verifier from a command line such as `"sha512sum"` or
    /// `"b3sum --no-names"`. A blank command means the default.
    #[must_use]
    pub fn new(command: &str) -> Self {
        let mut parts = command.split_whitespace().map(str::to_string);
        match parts.next() {
            Some(program) => Self {
                program,
                args: parts.collect(),
            },
            None => Self {
                program: DEFAULT_VERIFY_COMMAND.to_string(),
                args: Vec::new(),
            },
        }
    }

    /// The program that will be run.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Checksum one file.
    ///
    /// # Errors
    ///
    /// [`VerifyError`] if the command cannot be run, exits unsuccessfully,
    /// or prints no checksum.
    pub fn checksum(&self, path: &Path) -> Result<String, VerifyError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .map_err(|source| VerifyError::Spawn {
                program: self.program.clone(),
                path: path.to_path_buf(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VerifyError::Failed {
                program: self.program.clone(),
                path: path.to_path_buf(),
                message: format!("{} ({})", output.status, stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        // coreutils prefixes the line with '\' when the file name needed escaping
        stdout
            .split_whitespace()
            .next()
            .map(|token| token.trim_start_matches('\\').to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| VerifyError::Failed {
                program: self.program.clone(),
                path: path.to_path_buf(),
                message: "no checksum in output".to_string(),
            })
    }

    /// Checksum both files and compare.
    ///
    /// # Errors
    ///
    /// [`VerifyError`] if either checksum cannot be obtained.
    pub fn compare(&self, duplicate: &Path, partner: &Path) -> Result<PairCheck, VerifyError> {
        let dup_sum = self.checksum(duplicate)?;
        let partner_sum = self.checksum(partner)?;

        log::debug!(
            "{} {}: {} vs {}",
            self.program,
            duplicate.display(),
            dup_sum,
            partner_sum
        );

        if dup_sum == partner_sum {
            Ok(PairCheck::Identical)
        } else {
            Ok(PairCheck::Different {
                duplicate: dup_sum,
                partner: partner_sum,
            })
        }
    }
}

/// Whether `program` can be started at all.
#[must_use]
pub fn command_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}
