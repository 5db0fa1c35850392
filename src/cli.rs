//! Command-line interface definitions.
//!
//! A single flat command: every positional argument is a root to scan, and
//! options tune the pipeline. Any option left unset falls back to the config
//! file and environment (see [`crate::config`]).
//!
//! # Example
//!
//! ```bash
//! # Show what would be reclaimed under two roots
//! dupreclaim --dry-run ~/photos /mnt/backup/photos
//!
//! # Reclaim, re-checking every pair with sha512sum first
//! dupreclaim --verify ~/photos
//!
//! # Smaller files too, printing each pair as it is handled
//! dupreclaim -v --min-size 64KiB ~/src
//! ```

use clap::Parser;
use std::path::PathBuf;

/// Reclaim space held by duplicate files using copy-on-write clones.
///
/// Files with identical content are found by size, a prefix digest and a
/// full SHA-512 digest. Each later duplicate is replaced in place by a clone
/// of the first-seen copy, so both paths remain but share their blocks.
#[derive(Debug, Parser)]
#[command(name = "dupreclaim")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directories or files to scan
    #[arg(value_name = "PATH", required_unless_present = "print_config")]
    pub paths: Vec<PathBuf>,

    /// Increase verbosity level (-v prints each pair and enables debug logs, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Report what would be reclaimed without touching any file
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Re-checksum each pair with an external tool before replacing
    #[arg(long)]
    pub verify: bool,

    /// Checksum command used for verification (implies --verify)
    #[arg(long, value_name = "CMD")]
    pub verify_command: Option<String>,

    /// Minimum file size to consider (e.g., 64KiB, 1MiB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Number of partial-hash workers
    #[arg(long, value_name = "N")]
    pub partial_workers: Option<usize>,

    /// Number of full-hash workers
    #[arg(long, value_name = "N")]
    pub full_workers: Option<usize>,

    /// Number of reclaim workers
    #[arg(long, value_name = "N")]
    pub reclaim_workers: Option<usize>,

    /// Capacity of each queue between stages
    #[arg(long, value_name = "N")]
    pub queue_capacity: Option<usize>,

    /// Copy the data when the filesystem cannot clone it
    ///
    /// Warning: a copy keeps the file readable but frees no space.
    #[arg(long)]
    pub allow_copy_fallback: bool,

    /// Do not cross filesystem boundaries below each root
    #[arg(short = 'x', long)]
    pub one_file_system: bool,

    /// Path to a TOML config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path to the reclaim ledger database
    #[arg(long, value_name = "PATH")]
    pub ledger: Option<PathBuf>,

    /// Do not read or write the reclaim ledger
    #[arg(long, conflicts_with = "ledger")]
    pub no_ledger: bool,

    /// Do not draw the status line
    #[arg(long)]
    pub no_progress: bool,

    /// Print errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use dupreclaim::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1MB").unwrap(), 1_000_000);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    // Find where the number ends and the suffix begins
    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    if num < 0.0 {
        return Err("Size cannot be negative".to_string());
    }

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_bytes() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("1024B").unwrap(), 1024);
        assert_eq!(parse_size("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_size_kilobytes() {
        assert_eq!(parse_size("1KB").unwrap(), 1_000);
        assert_eq!(parse_size("1K").unwrap(), 1_000);
        assert_eq!(parse_size("1KiB").unwrap(), 1_024);
        assert_eq!(parse_size("1kib").unwrap(), 1_024); // Case insensitive
    }

    #[test]
    fn test_parse_size_megabytes() {
        assert_eq!(parse_size("1MB").unwrap(), 1_000_000);
        assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
        assert_eq!(parse_size("10MB").unwrap(), 10_000_000);
    }

    #[test]
    fn test_parse_size_gigabytes() {
        assert_eq!(parse_size("1GB").unwrap(), 1_000_000_000);
        assert_eq!(parse_size("1GiB").unwrap(), 1_073_741_824);
    }

    #[test]
    fn test_parse_size_terabytes() {
        assert_eq!(parse_size("1TB").unwrap(), 1_000_000_000_000);
        assert_eq!(parse_size("1TiB").unwrap(), 1_099_511_627_776);
    }

    #[test]
    fn test_parse_size_fractional() {
        assert_eq!(parse_size("1.5MB").unwrap(), 1_500_000);
        assert_eq!(parse_size("0.5GB").unwrap(), 500_000_000);
    }

    #[test]
    fn test_parse_size_with_whitespace() {
        assert_eq!(parse_size("  1024  ").unwrap(), 1024);
        assert_eq!(parse_size("1 MB").unwrap(), 1_000_000);
    }

    #[test]
    fn test_parse_size_errors() {
        assert!(parse_size("").is_err());
        assert!(parse_size("abc").is_err());
        assert!(parse_size("1XB").is_err());
        assert!(parse_size("-1MB").is_err());
    }

    #[test]
    fn test_cli_parse_help() {
        // --help causes an early exit, which is an error in try_parse_from
        assert!(Cli::try_parse_from(["dupreclaim", "--help"]).is_err());
    }

    #[test]
    fn test_cli_parse_basic() {
        let cli = Cli::try_parse_from(["dupreclaim", "/a", "/b"]).unwrap();
        assert_eq!(cli.paths, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.dry_run);
        assert!(cli.min_size.is_none());
        assert!(cli.partial_workers.is_none());
    }

    #[test]
    fn test_cli_parse_with_options() {
        let cli = Cli::try_parse_from([
            "dupreclaim",
            "-v",
            "--dry-run",
            "--min-size",
            "4KiB",
            "--partial-workers",
            "8",
            "--full-workers",
            "3",
            "--reclaim-workers",
            "2",
            "--queue-capacity",
            "16",
            "--allow-copy-fallback",
            "-x",
            "/path",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        assert!(cli.dry_run);
        assert_eq!(cli.min_size, Some(4096));
        assert_eq!(cli.partial_workers, Some(8));
        assert_eq!(cli.full_workers, Some(3));
        assert_eq!(cli.reclaim_workers, Some(2));
        assert_eq!(cli.queue_capacity, Some(16));
        assert!(cli.allow_copy_fallback);
        assert!(cli.one_file_system);
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["dupreclaim", "-v", "-q", "/path"]).is_err());
    }

    #[test]
    fn test_cli_ledger_conflicts_with_no_ledger() {
        assert!(
            Cli::try_parse_from(["dupreclaim", "--ledger", "l.db", "--no-ledger", "/p"]).is_err()
        );
    }

    #[test]
    fn test_cli_missing_path() {
        assert!(Cli::try_parse_from(["dupreclaim"]).is_err());
    }

    #[test]
    fn test_cli_print_config_needs_no_path() {
        let cli = Cli::try_parse_from(["dupreclaim", "--print-config"]).unwrap();
        assert!(cli.print_config);
        assert!(cli.paths.is_empty());
    }

    #[test]
    fn test_cli_invalid_size() {
        assert!(Cli::try_parse_from(["dupreclaim", "--min-size", "1XB", "/p"]).is_err());
    }

    #[test]
    fn test_cli_version_flag() {
        assert!(Cli::try_parse_from(["dupreclaim", "--version"]).is_err());
    }
}
