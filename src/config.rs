//! Layered run settings.
//!
//! Settings are resolved from, lowest to highest precedence:
//!
//! 1. Built-in defaults ([`Settings::default`])
//! 2. A TOML file: `--config <PATH>`, or `config.toml` in the platform
//!    config directory when it exists
//! 3. Environment variables prefixed with `DUPRECLAIM_`
//!    (e.g. `DUPRECLAIM_MIN_SIZE=4MiB`)
//! 4. Command-line flags ([`Settings::merge_cli`])
//!
//! # Example
//!
//! ```toml
//! min_size = "4MiB"
//! partial_workers = 4
//! full_workers = 2
//! verify = true
//! verify_command = "b3sum"
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Deserializer, Serialize};

use crate::actions::DEFAULT_VERIFY_COMMAND;
use crate::cli::{parse_size, Cli};
use crate::duplicates::{DEFAULT_MIN_SIZE, DEFAULT_QUEUE_CAPACITY};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "DUPRECLAIM_";

/// Errors raised while resolving settings.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    MissingFile(PathBuf),

    /// A layer could not be parsed or holds a bad value.
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),

    /// The effective settings could not be rendered as TOML.
    #[error("Cannot render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Effective settings for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Files smaller than this many bytes are ignored.
    #[serde(deserialize_with = "size_value")]
    pub min_size: u64,
    /// Partial-hash worker count.
    pub partial_workers: usize,
    /// Full-hash worker count.
    pub full_workers: usize,
    /// Reclaim worker count.
    pub reclaim_workers: usize,
    /// Capacity of each inter-stage queue.
    pub queue_capacity: usize,
    /// Re-checksum each pair with an external tool before replacing.
    pub verify: bool,
    /// Checksum command used when `verify` is on.
    pub verify_command: String,
    /// Fall back to a plain copy where clones are unsupported.
    pub allow_copy_fallback: bool,
    /// Stay on each root's filesystem.
    pub one_file_system: bool,
    /// Keep a ledger of reclaimed pairs so repeated runs skip them.
    pub use_ledger: bool,
    /// Ledger location; the platform cache directory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            partial_workers: 2,
            full_workers: 2,
            reclaim_workers: 1,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            verify: false,
            verify_command: DEFAULT_VERIFY_COMMAND.to_string(),
            allow_copy_fallback: false,
            one_file_system: false,
            use_ledger: true,
            ledger_path: None,
        }
    }
}

/// Accept either a byte count or a human size string such as `"1MiB"`.
fn size_value<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Bytes(u64),
        Text(String),
    }

    match Size::deserialize(deserializer)? {
        Size::Bytes(n) => Ok(n),
        Size::Text(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "dupreclaim", "dupreclaim")
}

/// Default location of the config file, if a config directory exists.
#[must_use]
pub fn default_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Default location of the reclaim ledger.
#[must_use]
pub fn default_ledger_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.cache_dir().join("ledger.sqlite3"))
}

impl Settings {
    /// Resolve defaults, the config file and the environment.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingFile`] if `explicit` names a file that does not
    /// exist, [`ConfigError::Invalid`] if any layer fails to parse.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match explicit {
            Some(path) if !path.is_file() => {
                return Err(ConfigError::MissingFile(path.to_path_buf()))
            }
            Some(path) => Some(path.to_path_buf()),
            None => default_path().filter(|p| p.is_file()),
        };

        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = &file {
            log::debug!("Loading config from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        let settings: Settings = figment.extract().map_err(Box::new)?;
        Ok(settings.normalize())
    }

    /// Apply command-line flags on top of the loaded layers.
    #[must_use]
    pub fn merge_cli(mut self, cli: &Cli) -> Self {
        if let Some(min_size) = cli.min_size {
            self.min_size = min_size;
        }
        if let Some(n) = cli.partial_workers {
            self.partial_workers = n;
        }
        if let Some(n) = cli.full_workers {
            self.full_workers = n;
        }
        if let Some(n) = cli.reclaim_workers {
            self.reclaim_workers = n;
        }
        if let Some(n) = cli.queue_capacity {
            self.queue_capacity = n;
        }
        if let Some(command) = &cli.verify_command {
            self.verify_command.clone_from(command);
            self.verify = true;
        }
        if cli.verify {
            self.verify = true;
        }
        if cli.allow_copy_fallback {
            self.allow_copy_fallback = true;
        }
        if cli.one_file_system {
            self.one_file_system = true;
        }
        if let Some(path) = &cli.ledger {
            self.ledger_path = Some(path.clone());
            self.use_ledger = true;
        }
        if cli.no_ledger {
            self.use_ledger = false;
        }
        self.normalize()
    }

    /// Clamp counts to at least one.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        self.partial_workers = self.partial_workers.max(1);
        self.full_workers = self.full_workers.max(1);
        self.reclaim_workers = self.reclaim_workers.max(1);
        self.queue_capacity = self.queue_capacity.max(1);
        self
    }

    /// Ledger file to open, or `None` when the ledger is disabled or no
    /// cache directory is known.
    #[must_use]
    pub fn resolved_ledger_path(&self) -> Option<PathBuf> {
        if !self.use_ledger {
            return None;
        }
        self.ledger_path.clone().or_else(default_ledger_path)
    }

    /// Render the effective settings as TOML.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Render`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
