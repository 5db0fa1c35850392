//! dupreclaim - reclaim space held by duplicate files
//!
//! Finds byte-identical regular files under one or more roots and replaces
//! each later duplicate with a copy-on-write clone of the first-seen copy.
//! Both paths stay in place; they simply share their data blocks afterwards.
//!
//! Candidates flow through a staged pipeline (walk, size, prefix digest,
//! full digest, reclaim) in which each stage only forwards files that still
//! have a potential match. See [`duplicates::pipeline`] for the orchestration
//! and [`actions::reclaim`] for the replacement itself.

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;

use crate::actions::{ClonePolicy, ReclaimConfig, Reclaimer, Verifier};
use crate::cli::Cli;
use crate::config::Settings;
use crate::duplicates::{Pipeline, PipelineConfig};
use crate::error::ExitCode;
use crate::ledger::ReclaimLedger;
use crate::progress::Progress;
use crate::scanner::WalkerConfig;

/// Run the application for parsed command-line arguments.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the pipeline
/// fails. [`ExitCode::for_error`] maps it to the process exit code.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let settings = Settings::load(cli.config.as_deref())
        .context("Failed to load configuration")?
        .merge_cli(&cli);

    if cli.print_config {
        print!("{}", settings.to_toml()?);
        return Ok(ExitCode::Success);
    }
    log::debug!("Effective settings: {:?}", settings);

    let handler = signal::install_handler().context("Failed to install signal handler")?;
    let reclaimer = build_reclaimer(&settings, cli.dry_run);

    let progress = Arc::new(
        Progress::new(cli.quiet || cli.no_progress)
            .with_pair_printing(cli.verbose >= 1 && !cli.quiet)
            .with_dry_run(cli.dry_run),
    );

    let config = PipelineConfig::default()
        .with_min_size(settings.min_size)
        .with_workers(
            settings.partial_workers,
            settings.full_workers,
            settings.reclaim_workers,
        )
        .with_queue_capacity(settings.queue_capacity)
        .with_walker_config(WalkerConfig::default().with_same_file_system(settings.one_file_system))
        .with_shutdown_flag(handler.get_flag())
        .with_observer(Arc::clone(&progress) as Arc<dyn progress::PipelineObserver>);

    let pipeline = Pipeline::new(config, reclaimer);
    let stats = pipeline.stats();
    let done = AtomicBool::new(false);

    let result = std::thread::scope(|scope| {
        let reporter = std::thread::Builder::new()
            .name("reporter".to_string())
            .spawn_scoped(scope, || progress.report_until(&stats, &done));

        let result = pipeline.run(&cli.paths);
        done.store(true, Ordering::SeqCst);
        if let Ok(reporter) = reporter {
            let _ = reporter.join();
        }
        result
    });
    progress.finish();

    let summary = result?;
    if !cli.quiet {
        println!("{summary}");
    }
    Ok(ExitCode::Success)
}

fn build_reclaimer(settings: &Settings, dry_run: bool) -> Reclaimer {
    let policy = if settings.allow_copy_fallback {
        ClonePolicy::ReflinkOrCopy
    } else {
        ClonePolicy::ReflinkOnly
    };
    let mut config = ReclaimConfig::default()
        .with_policy(policy)
        .with_dry_run(dry_run);
    if settings.verify {
        config = config.with_verifier(Verifier::new(&settings.verify_command));
    }
    let reclaimer = Reclaimer::new(config);

    let Some(path) = settings.resolved_ledger_path() else {
        return reclaimer;
    };
    // a dry run never creates the ledger, it only reads an existing one
    if dry_run && !path.is_file() {
        return reclaimer;
    }
    match ReclaimLedger::open(&path) {
        Ok(ledger) => {
            log::debug!("Using reclaim ledger at {}", path.display());
            reclaimer.with_ledger(ledger)
        }
        Err(e) => {
            log::warn!("Continuing without ledger: {}", e);
            reclaimer
        }
    }
}
