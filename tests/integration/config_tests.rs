use super::support::{content, write};
use clap::Parser;
use dupreclaim::cli::Cli;
use dupreclaim::config::{ConfigError, Settings};
use dupreclaim::error::ExitCode;
use std::fs;
use tempfile::tempdir;

fn cli(args: &[&str]) -> Cli {
    let mut argv = vec!["dupreclaim", "-q", "--no-progress", "--no-ledger"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

#[test]
fn test_config_file_drives_the_run() {
    let dir = tempdir().unwrap();
    let conf = tempdir().unwrap();
    let config_path = conf.path().join("dupreclaim.toml");
    fs::write(
        &config_path,
        "min_size = \"4KiB\"\nfull_workers = 3\nallow_copy_fallback = true\n",
    )
    .unwrap();

    write(dir.path(), "a.bin", &content(1, 8192));
    let b = write(dir.path(), "b.bin", &content(1, 8192));
    let before = fs::metadata(&b).unwrap().modified().unwrap();

    let args = cli(&[
        "--dry-run",
        "--config",
        config_path.to_str().unwrap(),
        dir.path().to_str().unwrap(),
    ]);
    let settings = Settings::load(args.config.as_deref()).unwrap().merge_cli(&args);
    assert_eq!(settings.min_size, 4096);
    assert_eq!(settings.full_workers, 3);
    assert!(settings.allow_copy_fallback);
    assert!(!settings.use_ledger);

    assert_eq!(dupreclaim::run_app(args).unwrap(), ExitCode::Success);
    assert_eq!(fs::metadata(&b).unwrap().modified().unwrap(), before);
}

#[test]
fn test_missing_config_file_is_general_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("absent.toml");

    let args = cli(&["--config", missing.to_str().unwrap(), dir.path().to_str().unwrap()]);
    let err = dupreclaim::run_app(args).unwrap_err();

    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::MissingFile(_))
    ));
}

#[test]
fn test_print_config_needs_no_roots() {
    let args = Cli::try_parse_from(["dupreclaim", "-q", "--print-config", "--min-size", "2MiB"])
        .unwrap();
    assert_eq!(dupreclaim::run_app(args).unwrap(), ExitCode::Success);
}
