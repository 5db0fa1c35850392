//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use dupreclaim::actions::{ClonePolicy, ReclaimConfig, ReclaimOutcome, Reclaimer};
use dupreclaim::duplicates::{Pipeline, PipelineConfig, RunSummary};
use dupreclaim::ledger::ReclaimLedger;
use dupreclaim::progress::PipelineObserver;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const MIB: usize = 1024 * 1024;

/// Deterministic content of `len` bytes seeded by `seed`.
pub fn content(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

pub fn write(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, data).unwrap();
    path
}

/// Single worker per stage so the first-seen file is the walk order.
pub fn config(min_size: u64) -> PipelineConfig {
    PipelineConfig::default()
        .with_min_size(min_size)
        .with_workers(1, 1, 1)
}

pub fn reclaimer(dry_run: bool) -> Reclaimer {
    Reclaimer::new(
        ReclaimConfig::default()
            .with_policy(ClonePolicy::ReflinkOrCopy)
            .with_dry_run(dry_run),
    )
}

pub fn run(roots: &[&Path], min_size: u64, dry_run: bool) -> RunSummary {
    let roots: Vec<PathBuf> = roots.iter().map(|p| p.to_path_buf()).collect();
    Pipeline::new(config(min_size), reclaimer(dry_run))
        .run(&roots)
        .unwrap()
}

pub fn run_with_ledger(root: &Path, min_size: u64, ledger: &Path) -> RunSummary {
    let reclaimer = reclaimer(false).with_ledger(ReclaimLedger::open(ledger).unwrap());
    Pipeline::new(config(min_size), reclaimer)
        .run(&[root.to_path_buf()])
        .unwrap()
}

/// Observer that records every pair the reclaim stage finished.
#[derive(Debug, Default)]
pub struct PairLog {
    pub pairs: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl PairLog {
    pub fn pairs(&self) -> Vec<(PathBuf, PathBuf)> {
        let mut pairs = self.pairs.lock().unwrap().clone();
        pairs.sort();
        pairs
    }
}

impl PipelineObserver for PairLog {
    fn on_reclaim_complete(&self, duplicate: &Path, partner: &Path, _outcome: &ReclaimOutcome) {
        self.pairs
            .lock()
            .unwrap()
            .push((duplicate.to_path_buf(), partner.to_path_buf()));
    }
}

pub fn run_observed(root: &Path, min_size: u64, dry_run: bool) -> (RunSummary, Vec<(PathBuf, PathBuf)>) {
    let log = Arc::new(PairLog::default());
    let config = config(min_size).with_observer(Arc::clone(&log) as Arc<dyn PipelineObserver>);
    let summary = Pipeline::new(config, reclaimer(dry_run))
        .run(&[root.to_path_buf()])
        .unwrap();
    (summary, log.pairs())
}
