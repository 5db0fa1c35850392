//! Pipeline orchestrator.
//!
//! # Overview
//!
//! ```text
//! walk ─▶ size bucket ═▶ partial-hash pool ═▶ full-hash pool ═▶ reclaim pool
//! ```
//!
//! The size stage runs on the calling thread, driven by the walk. Every
//! `═▶` is a bounded crossbeam channel feeding a pool of named worker
//! threads. Teardown happens strictly in pipeline order: the walk ends, the
//! partial-hash queue is closed, its workers are joined, then the full-hash
//! queue is closed, and so on. A worker exits only once its queue is closed
//! and drained, so no stage is torn down while work can still reach it.
//!
//! A fatal error (unreadable root, failed integrity check) or Ctrl+C halts
//! the run: the walk stops, workers keep draining their queues without
//! doing any more work, and the run returns the first fatal error.
//!
//! # Example
//!
//! ```no_run
//! use dupreclaim::actions::{ReclaimConfig, Reclaimer};
//! use dupreclaim::duplicates::{Pipeline, PipelineConfig};
//! use std::path::PathBuf;
//!
//! let reclaimer = Reclaimer::new(ReclaimConfig::default().with_dry_run(true));
//! let pipeline = Pipeline::new(PipelineConfig::default(), reclaimer);
//! let summary = pipeline.run(&[PathBuf::from("/srv/backups")]).expect("run failed");
//! println!("{}", summary);
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, Scope, ScopedJoinHandle};
use std::time::{Duration, Instant};

use bytesize::ByteSize;
use crossbeam_channel::{bounded, Receiver, Sender};

use super::candidate::FileCandidate;
use super::stages::{FullHashStage, PartialHashStage, SizeBucketStage, Stage};
use super::stats::{RunStatistics, StatsSnapshot};
use crate::actions::{ReclaimError, ReclaimOutcome, Reclaimer};
use crate::progress::PipelineObserver;
use crate::scanner::{Hasher, ScanError, Walker, WalkerConfig};

/// Files below this size are ignored unless configured otherwise.
pub const DEFAULT_MIN_SIZE: u64 = 1024 * 1024;

/// Default capacity of each inter-stage queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100_000;

/// Configuration for a pipeline run.
#[derive(Clone)]
pub struct PipelineConfig {
    /// Smallest file size considered, in bytes
    pub min_size: u64,
    /// Partial-hash worker count
    pub partial_workers: usize,
    /// Full-hash worker count
    pub full_workers: usize,
    /// Reclaim worker count
    pub reclaim_workers: usize,
    /// Capacity of each inter-stage queue
    pub queue_capacity: usize,
    /// Walker configuration for directory traversal
    pub walker_config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional observer for per-file events
    pub observer: Option<Arc<dyn PipelineObserver>>,
}

impl std::fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("min_size", &self.min_size)
            .field("partial_workers", &self.partial_workers)
            .field("full_workers", &self.full_workers)
            .field("reclaim_workers", &self.reclaim_workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("walker_config", &self.walker_config)
            .field("shutdown_flag", &self.shutdown_flag)
            .field("observer", &self.observer.as_ref().map(|_| "<observer>"))
            .finish()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            partial_workers: 2,
            full_workers: 2,
            reclaim_workers: 1,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            walker_config: WalkerConfig::default(),
            shutdown_flag: None,
            observer: None,
        }
    }
}

impl PipelineConfig {
    /// Set the minimum file size.
    #[must_use]
    pub fn with_min_size(mut self, bytes: u64) -> Self {
        self.min_size = bytes;
        self
    }

    /// Set the worker count of each pool (clamped to at least 1).
    #[must_use]
    pub fn with_workers(mut self, partial: usize, full: usize, reclaim: usize) -> Self {
        self.partial_workers = partial.max(1);
        self.full_workers = full.max(1);
        self.reclaim_workers = reclaim.max(1);
        self
    }

    /// Set the inter-stage queue capacity (clamped to at least 1).
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the event observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }
}

/// Errors that end a pipeline run.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// A root could not be traversed.
    #[error(transparent)]
    Traversal(ScanError),

    /// Re-verification found a pair that is not identical.
    #[error(transparent)]
    Integrity(ReclaimError),

    /// The run was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Run interrupted by user")]
    Interrupted,

    /// A worker thread panicked.
    #[error("a {stage} worker panicked")]
    WorkerPanicked {
        /// Stage the worker belonged to
        stage: &'static str,
    },

    /// A worker thread could not be started.
    #[error("cannot spawn {stage} worker: {source}")]
    Spawn {
        /// Stage the worker belongs to
        stage: &'static str,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A downstream queue lost all of its consumers.
    #[error("queue after {0} closed unexpectedly")]
    QueueClosed(&'static str),
}

/// Totals of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Final counter values
    pub stats: StatsSnapshot,
    /// Whether the reclaim stage only counted
    pub dry_run: bool,
    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl RunSummary {
    /// Files reclaimed (or that would be, in a dry run).
    #[must_use]
    pub fn files_reclaimed(&self) -> u64 {
        self.stats.files_reclaimed
    }

    /// Bytes reclaimed (or that would be, in a dry run).
    #[must_use]
    pub fn bytes_reclaimed(&self) -> u64 {
        self.stats.bytes_reclaimed
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = &self.stats;
        writeln!(
            f,
            "Scanned {} files ({}), fully hashed {} ({}), found {} duplicates",
            s.files_seen,
            ByteSize(s.bytes_seen),
            s.files_hashed,
            ByteSize(s.bytes_hashed),
            s.duplicates_found
        )?;
        let verb = if self.dry_run {
            "Would reclaim"
        } else {
            "Reclaimed"
        };
        write!(
            f,
            "{} {} files ({}), {} already reclaimed, {} dropped, in {:.2?}",
            verb,
            s.files_reclaimed,
            ByteSize(s.bytes_reclaimed),
            s.already_reclaimed,
            s.files_dropped,
            self.duration
        )
    }
}

/// Halt flag and first fatal error, shared by every thread of a run.
struct RunControl {
    halted: AtomicBool,
    fatal: Mutex<Option<PipelineError>>,
    shutdown: Option<Arc<AtomicBool>>,
}

impl RunControl {
    fn new(shutdown: Option<Arc<AtomicBool>>) -> Self {
        Self {
            halted: AtomicBool::new(false),
            fatal: Mutex::new(None),
            shutdown,
        }
    }

    fn is_interrupted(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst) || self.is_interrupted()
    }

    /// Halt the run, keeping only the first error.
    fn fail(&self, error: PipelineError) {
        let mut fatal = self.fatal.lock().unwrap_or_else(PoisonError::into_inner);
        if fatal.is_none() {
            *fatal = Some(error);
        }
        self.halted.store(true, Ordering::SeqCst);
    }

    fn into_result(self) -> Result<(), PipelineError> {
        let interrupted = self.is_interrupted();
        match self.fatal.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Some(error) => Err(error),
            None if interrupted => Err(PipelineError::Interrupted),
            None => Ok(()),
        }
    }
}

/// The multi-stage reclaim pipeline.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    hasher: Hasher,
    reclaimer: Reclaimer,
    stats: Mutex<Arc<RunStatistics>>,
    started: AtomicBool,
}

impl Pipeline {
    /// Create a pipeline that hands confirmed duplicates to `reclaimer`.
    #[must_use]
    pub fn new(config: PipelineConfig, reclaimer: Reclaimer) -> Self {
        Self {
            config,
            hasher: Hasher::new(),
            reclaimer,
            stats: Mutex::new(Arc::new(RunStatistics::new())),
            started: AtomicBool::new(false),
        }
    }

    /// Counters of the current run, or of the next one if none has
    /// started yet, for a reporter running alongside.
    #[must_use]
    pub fn stats(&self) -> Arc<RunStatistics> {
        Arc::clone(&self.stats.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Counters for a run that is starting. Every run after the first gets
    /// fresh ones, so a summary never includes an earlier run.
    fn begin_run(&self) -> Arc<RunStatistics> {
        let mut current = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        if self.started.swap(true, Ordering::SeqCst) {
            *current = Arc::new(RunStatistics::new());
        }
        Arc::clone(&current)
    }

    /// Run the pipeline over `roots`, in order.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Traversal`] if a root cannot be walked
    /// - [`PipelineError::Integrity`] if re-verification fails
    /// - [`PipelineError::Interrupted`] if the shutdown flag was raised
    /// - [`PipelineError::WorkerPanicked`], [`PipelineError::Spawn`] or
    ///   [`PipelineError::QueueClosed`] on internal failure
    pub fn run(&self, roots: &[PathBuf]) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        log::info!(
            "Starting run over {} root(s) with {} partial, {} full, {} reclaim worker(s)",
            roots.len(),
            self.config.partial_workers,
            self.config.full_workers,
            self.config.reclaim_workers
        );

        let stats = self.begin_run();
        let control = RunControl::new(self.config.shutdown_flag.clone());
        let partial = PartialHashStage::new(self.hasher.clone());
        let full = FullHashStage::new(self.hasher.clone(), Arc::clone(&stats));
        let mut sizes = SizeBucketStage::new(self.config.min_size, Arc::clone(&stats));

        let (control_ref, stats_ref, partial, full) = (&control, &*stats, &partial, &full);
        let observer = self.config.observer.as_deref();

        thread::scope(|scope| -> Result<(), PipelineError> {
            let capacity = self.config.queue_capacity.max(1);
            let (partial_tx, partial_rx) = bounded::<FileCandidate>(capacity);
            let (full_tx, full_rx) = bounded::<FileCandidate>(capacity);
            let (reclaim_tx, reclaim_rx) = bounded::<FileCandidate>(capacity);

            // Downstream pools first so every queue has consumers before
            // anything is sent into it.
            let reclaim_pool = spawn_pool(scope, "reclaim", self.config.reclaim_workers, || {
                let input = reclaim_rx.clone();
                move || self.reclaim_worker(&input, control_ref, stats_ref, observer)
            })?;
            let full_pool = spawn_pool(scope, FullHashStage::NAME, self.config.full_workers, || {
                let (input, output) = (full_rx.clone(), reclaim_tx.clone());
                move || hash_worker(full, &input, &output, control_ref, stats_ref, observer)
            })?;
            let partial_pool =
                spawn_pool(scope, PartialHashStage::NAME, self.config.partial_workers, || {
                    let (input, output) = (partial_rx.clone(), full_tx.clone());
                    move || {
                        hash_worker(partial, &input, &output, control_ref, stats_ref, observer);
                    }
                })?;
            drop((partial_rx, full_rx, reclaim_rx));

            self.walk_roots(roots, &mut sizes, &partial_tx, control_ref, stats_ref);
            log::debug!(
                "Walk finished: {} distinct sizes, {} held by a single file",
                sizes.distinct_sizes(),
                sizes.unique_sizes()
            );

            drop(partial_tx);
            join_pool(partial_pool, PartialHashStage::NAME, control_ref);
            drop(full_tx);
            join_pool(full_pool, FullHashStage::NAME, control_ref);
            drop(reclaim_tx);
            join_pool(reclaim_pool, "reclaim", control_ref);
            Ok(())
        })?;

        control.into_result()?;

        let summary = RunSummary {
            stats: stats.snapshot(),
            dry_run: self.reclaimer.config().dry_run,
            duration: started.elapsed(),
        };
        log::info!(
            "Run complete: {} duplicates, {} reclaimed",
            summary.stats.duplicates_found,
            summary.stats.files_reclaimed
        );
        Ok(summary)
    }

    /// Drive the size stage from the walk of every root.
    fn walk_roots(
        &self,
        roots: &[PathBuf],
        sizes: &mut SizeBucketStage,
        output: &Sender<FileCandidate>,
        control: &RunControl,
        stats: &RunStatistics,
    ) {
        for root in roots {
            let mut walker = Walker::new(root, self.config.walker_config.clone());
            if let Some(flag) = &self.config.shutdown_flag {
                walker = walker.with_shutdown_flag(Arc::clone(flag));
            }

            let entries = match walker.walk() {
                Ok(entries) => entries,
                Err(e) => {
                    log::error!("{}", e);
                    control.fail(PipelineError::Traversal(e));
                    return;
                }
            };

            for entry in entries {
                if control.is_halted() {
                    log::debug!("Walk halted");
                    return;
                }
                match entry {
                    Ok(entry) => {
                        for candidate in sizes.accept(entry) {
                            if output.send(candidate).is_err() {
                                control.fail(PipelineError::QueueClosed("size bucket"));
                                return;
                            }
                        }
                    }
                    Err(e) if e.is_fatal() => {
                        control.fail(PipelineError::Traversal(e));
                        return;
                    }
                    Err(e) => {
                        log::warn!("Skipping entry: {}", e);
                        stats.record_skipped();
                    }
                }
            }
        }
    }

    fn reclaim_worker(
        &self,
        input: &Receiver<FileCandidate>,
        control: &RunControl,
        stats: &RunStatistics,
        observer: Option<&dyn PipelineObserver>,
    ) {
        for candidate in input {
            if control.is_halted() {
                continue;
            }
            let Some(partner) = candidate.partner() else {
                log::error!(
                    "Unpaired candidate reached reclaim: {}",
                    candidate.path.display()
                );
                stats.record_dropped();
                continue;
            };
            if let Some(obs) = observer {
                obs.on_duplicate_found(&candidate.path, partner, candidate.size);
            }

            match self.reclaimer.reclaim_if(&candidate, || !control.is_halted()) {
                Ok(None) => {}
                Ok(Some(outcome)) => {
                    if outcome == ReclaimOutcome::AlreadyReclaimed {
                        stats.record_already_reclaimed();
                    } else {
                        stats.record_reclaimed(outcome.bytes());
                    }
                    if let Some(obs) = observer {
                        obs.on_reclaim_complete(&candidate.path, partner, &outcome);
                    }
                }
                Err(e) if e.is_fatal() => {
                    log::error!("{}", e);
                    control.fail(PipelineError::Integrity(e));
                }
                Err(e) => {
                    log::warn!("Cannot reclaim {}: {}", candidate.path.display(), e);
                    stats.record_dropped();
                    if let Some(obs) = observer {
                        obs.on_dropped(&candidate.path, &e.to_string());
                    }
                }
            }
        }
    }
}

/// Worker loop shared by the hashing stages.
fn hash_worker<S: Stage>(
    stage: &S,
    input: &Receiver<FileCandidate>,
    output: &Sender<FileCandidate>,
    control: &RunControl,
    stats: &RunStatistics,
    observer: Option<&dyn PipelineObserver>,
) {
    for candidate in input {
        if control.is_halted() {
            continue;
        }
        match stage.process(candidate) {
            Ok(forward) => {
                for next in forward {
                    if output.send(next).is_err() {
                        control.fail(PipelineError::QueueClosed(S::NAME));
                        break;
                    }
                }
            }
            Err(e) => {
                log::warn!("Dropping candidate in {}: {}", S::NAME, e);
                stats.record_dropped();
                if let Some(obs) = observer {
                    obs.on_dropped(e.path(), &e.to_string());
                }
            }
        }
    }
}

fn spawn_pool<'scope, 'env, W, F>(
    scope: &'scope Scope<'scope, 'env>,
    stage: &'static str,
    workers: usize,
    mut make_worker: W,
) -> Result<Vec<ScopedJoinHandle<'scope, ()>>, PipelineError>
where
    W: FnMut() -> F,
    F: FnOnce() + Send + 'scope,
{
    (0..workers.max(1))
        .map(|i| {
            thread::Builder::new()
                .name(format!("{stage}-{i}"))
                .spawn_scoped(scope, make_worker())
                .map_err(|source| PipelineError::Spawn { stage, source })
        })
        .collect()
}

fn join_pool(handles: Vec<ScopedJoinHandle<'_, ()>>, stage: &'static str, control: &RunControl) {
    for handle in handles {
        if handle.join().is_err() {
            log::error!("A {} worker panicked", stage);
            control.fail(PipelineError::WorkerPanicked { stage });
        }
    }
}
