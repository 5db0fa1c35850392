//! Structured error handling and exit codes.

use serde::Serialize;

use crate::duplicates::PipelineError;

/// Exit codes for the dupreclaim binary.
///
/// - 0: Success (completed normally, with or without duplicates)
/// - 1: General error (bad configuration, unexpected failure)
/// - 2: Traversal error (a requested root could not be walked)
/// - 3: Integrity error (verification found a pair that is not identical)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// The run completed normally.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// A root path could not be traversed.
    TraversalError = 2,
    /// A pre-reclaim verification disagreed with the full hash.
    IntegrityError = 3,
    /// The run was interrupted by the user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DR000",
            Self::GeneralError => "DR001",
            Self::TraversalError => "DR002",
            Self::IntegrityError => "DR003",
            Self::Interrupted => "DR130",
        }
    }

    /// Pick the exit code for a top-level error.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::Traversal(_)) => Self::TraversalError,
            Some(PipelineError::Integrity(_)) => Self::IntegrityError,
            Some(PipelineError::Interrupted) => Self::Interrupted,
            _ => Self::GeneralError,
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DR001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
