//! Ctrl+C handling for an orderly stop.
//!
//! The handler only raises a shared `AtomicBool`. The pipeline polls it: the
//! walk stops producing entries, no new reclaim starts, queued work drains,
//! and the run ends with [`PipelineError::Interrupted`]. A clone that is
//! already being swapped into place always finishes or is rolled back.
//!
//! # Usage
//!
//! ```rust,no_run
//! use dupreclaim::duplicates::PipelineConfig;
//! use dupreclaim::signal::install_handler;
//!
//! let handler = install_handler().expect("Failed to install signal handler");
//! let config = PipelineConfig::default().with_shutdown_flag(handler.get_flag());
//! ```
//!
//! [`PipelineError::Interrupted`]: crate::duplicates::PipelineError::Interrupted

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Exit code for SIGINT (Ctrl+C) interruption: 128 + 2.
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared stop flag raised by Ctrl+C.
///
/// Cloning shares the flag.
#[derive(Debug, Clone)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with the flag lowered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Raise the flag by hand.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag, for [`PipelineConfig::with_shutdown_flag`].
    ///
    /// [`PipelineConfig::with_shutdown_flag`]: crate::duplicates::PipelineConfig::with_shutdown_flag
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Lower the flag again.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl Default for ShutdownHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C handler, or reuse the installed one.
///
/// A reused handler has its flag lowered so that a second run in the same
/// process (as in tests) starts clean. If some other code already owns the
/// Ctrl+C hook, an unhooked handler is returned; it still honours
/// [`ShutdownHandler::request_shutdown`].
///
/// # Errors
///
/// Currently always succeeds; the `Result` leaves room for platforms where a
/// missing hook should be reported.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    let installed = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let _ = writeln!(
            std::io::stderr(),
            "\nInterrupted. Finishing in-flight clones..."
        );
        let _ = std::io::stderr().flush();
        log::info!("Shutdown signal received");
    });

    if let Err(err) = installed {
        log::debug!("Ctrl+C handler not installed ({err}), using unhooked handler");
    }

    let handler = GLOBAL_HANDLER.get_or_init(|| handler).clone();
    handler.reset();
    Ok(handler)
}
