//! Progress reporting utilities using indicatif.
//!
//! This module provides the [`PipelineObserver`] trait, through which the
//! pipeline announces individual events, and the [`Progress`] reporter,
//! which renders the run counters as a single status line on stderr.
//!
//! The reporter is purely observational: it polls
//! [`RunStatistics`](crate::duplicates::RunStatistics) every 10 ms and only
//! redraws when the rendered text actually changed.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytesize::ByteSize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::actions::ReclaimOutcome;
use crate::duplicates::{RunStatistics, StatsSnapshot};

/// Interval between two polls of the run counters.
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(10);

/// Observer for individual pipeline events.
///
/// All methods default to doing nothing. Implementations are called from
/// worker threads and must not block for long.
pub trait PipelineObserver: Send + Sync {
    /// A confirmed duplicate is about to be handed to the reclaim stage.
    ///
    /// # Arguments
    ///
    /// * `duplicate` - File that will be replaced
    /// * `partner` - Retained file it is identical to
    /// * `size` - Size of both files in bytes
    fn on_duplicate_found(&self, _duplicate: &Path, _partner: &Path, _size: u64) {}

    /// The reclaim stage finished with a duplicate.
    fn on_reclaim_complete(&self, _duplicate: &Path, _partner: &Path, _outcome: &ReclaimOutcome) {}

    /// A candidate was dropped on an error.
    fn on_dropped(&self, _path: &Path, _reason: &str) {}
}

/// Render the status line for `snapshot`.
#[must_use]
pub fn format_status(snapshot: &StatsSnapshot, dry_run: bool) -> String {
    let verb = if dry_run { "reclaimable" } else { "reclaimed" };
    format!(
        "files {}/{}, bytes {}/{}, {} {} ({})",
        snapshot.files_hashed,
        snapshot.files_seen,
        ByteSize(snapshot.bytes_hashed),
        ByteSize(snapshot.bytes_seen),
        verb,
        snapshot.files_reclaimed,
        ByteSize(snapshot.bytes_reclaimed),
    )
}

/// Status-line reporter using indicatif.
pub struct Progress {
    bar: ProgressBar,
    last: Mutex<String>,
    print_pairs: bool,
    dry_run: bool,
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("hidden", &self.bar.is_hidden())
            .field("print_pairs", &self.print_pairs)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no status line is drawn.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupreclaim::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };

        Self {
            bar,
            last: Mutex::new(String::new()),
            print_pairs: false,
            dry_run: false,
        }
    }

    /// Print each duplicate pair to stdout as it is processed.
    #[must_use]
    pub fn with_pair_printing(mut self, enabled: bool) -> Self {
        self.print_pairs = enabled;
        self
    }

    /// Word the status line for a dry run.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Redraw from `snapshot` if the text changed. Returns whether it did.
    pub fn refresh(&self, snapshot: &StatsSnapshot) -> bool {
        let status = format_status(snapshot, self.dry_run);
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if *last == status {
            return false;
        }
        self.bar.set_message(status.clone());
        *last = status;
        true
    }

    /// Poll `stats` every [`REFRESH_INTERVAL`] until `done` is set.
    pub fn report_until(&self, stats: &RunStatistics, done: &AtomicBool) {
        while !done.load(Ordering::SeqCst) {
            self.refresh(&stats.snapshot());
            std::thread::sleep(REFRESH_INTERVAL);
        }
        self.refresh(&stats.snapshot());
    }

    /// Remove the status line.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn print_line(&self, line: String) {
        self.bar.suspend(|| println!("{line}"));
    }
}

impl PipelineObserver for Progress {
    fn on_duplicate_found(&self, duplicate: &Path, partner: &Path, _size: u64) {
        if self.print_pairs {
            self.print_line(format!(
                "== {} {} ...",
                duplicate.display(),
                partner.display()
            ));
        }
    }

    fn on_reclaim_complete(&self, duplicate: &Path, partner: &Path, outcome: &ReclaimOutcome) {
        if !self.print_pairs {
            return;
        }
        let status = match outcome {
            ReclaimOutcome::Reclaimed { .. } => "complete",
            ReclaimOutcome::WouldReclaim { .. } => "would reclaim",
            ReclaimOutcome::AlreadyReclaimed => "already reclaimed",
        };
        self.print_line(format!(
            "== {} {} {}",
            duplicate.display(),
            partner.display(),
            status
        ));
    }
}
