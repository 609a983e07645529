//! Process configuration.
//!
//! Settings are layered, later layers winning:
//!
//! 1. built-in defaults
//! 2. `mdsync.toml` (or the file given with `--config`)
//! 3. environment variables (see [`env`])
//! 4. command-line flags
//!
//! The result is validated once, before anything touches the filesystem.
//!
//! # Sections
//!
//! | Section    | Purpose                                          |
//! |------------|--------------------------------------------------|
//! | `[source]` | Repository URL or local directory                |
//! | `[sync]`   | Refresh interval, profile, timeouts, policies    |
//! | `[serve]`  | HTTP server (interface, port, workers)           |
//! | `[paths]`  | Snapshot, generated and static directories       |
//!
//! # Example
//!
//! ```toml
//! [source]
//! location = "https://github.com/acme/handbook"
//!
//! [sync]
//! profile = "production"
//!
//! [serve]
//! port = 8080
//! ```

pub mod defaults;
mod env;
mod error;
mod paths;
mod serve;
mod sync;

pub use error::ConfigError;
pub use paths::PathsConfig;
pub use serve::ServeConfig;
pub use sync::{Profile, RemovalPolicy, SourceConfig, SyncConfig};

use crate::{cli::Cli, fetch::local_root, utils::fs::sibling};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "mdsync.toml";

/// Root configuration structure representing mdsync.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file, if one was loaded
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub paths: PathsConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: SiteConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let mut config = Self::from_str(&content)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Load from file, process environment and CLI, then validate.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        Self::load_with(cli, |key| std::env::var(key).ok())
    }

    /// [`SiteConfig::load`] with an explicit environment lookup.
    pub fn load_with<F>(cli: &Cli, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &cli.config {
            Some(path) => Self::from_path(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_path(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_env(lookup)?;
        config.update_with_cli(cli);

        let root = config
            .config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.paths.resolve(&root);

        config.validate()?;
        Ok(config)
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        Self::update_option(&mut self.source.location, cli.source.as_ref());
        Self::update_option(&mut self.serve.interface, cli.interface.as_ref());
        Self::update_option(&mut self.serve.port, cli.port.as_ref());
        if cli.interval.is_some() {
            self.sync.interval = cli.interval;
        }
        if cli.profile.is_some() {
            self.sync.profile = cli.profile;
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Time between cycles: the explicit interval, else the profile default.
    pub fn refresh_interval(&self) -> Result<Duration, ConfigError> {
        match (self.sync.interval, self.sync.profile) {
            (Some(0), _) => Err(ConfigError::invalid(
                "REFRESH_INTERVAL",
                "must be a positive number of seconds",
            )),
            (Some(secs), _) => Ok(Duration::from_secs(secs)),
            (None, Some(profile)) => Ok(profile.default_interval()),
            (None, None) => Err(ConfigError::Missing("REFRESH_INTERVAL")),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.fetch_timeout)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.shutdown_timeout)
    }

    /// Validate the merged configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.location.trim().is_empty() {
            return Err(ConfigError::Missing("SOURCE_LOCATION"));
        }

        self.refresh_interval()?;

        if self.sync.fetch_timeout == 0 {
            return Err(ConfigError::invalid("[sync.fetch_timeout]", "must be positive"));
        }

        let ext = &self.sync.extension;
        if ext.is_empty() || ext.contains(['.', '/', '\\']) {
            return Err(ConfigError::invalid(
                "[sync.extension]",
                format!("`{ext}` must be a bare extension such as `md`"),
            ));
        }

        if self.serve.workers == 0 {
            return Err(ConfigError::invalid("[serve.workers]", "need at least one worker"));
        }

        if self.serve.interface.parse::<std::net::IpAddr>().is_err() {
            return Err(ConfigError::invalid(
                "[serve.interface]",
                format!("`{}` is not an IP address", self.serve.interface),
            ));
        }

        let snapshot = &self.paths.snapshot;
        let generated = &self.paths.generated;
        if overlaps(snapshot, generated) {
            return Err(ConfigError::invalid(
                "[paths]",
                "snapshot and generated directories must not overlap",
            ));
        }
        if snapshot.file_name().is_none() || generated.file_name().is_none() {
            return Err(ConfigError::invalid(
                "[paths]",
                "snapshot and generated must name a directory",
            ));
        }

        // Deleted at startup or shutdown
        let owned = [
            generated.clone(),
            snapshot.clone(),
            sibling(snapshot, "staging"),
            sibling(snapshot, "previous"),
        ];

        if owned.iter().any(|dir| overlaps(&self.paths.static_dir, dir)) {
            return Err(ConfigError::invalid(
                "[paths.static]",
                "static directory must not overlap the snapshot or generated directories",
            ));
        }

        if let Some(root) = local_root(&self.source.location) {
            let root = paths::normalize_path(&root);
            if owned.iter().any(|dir| overlaps(&root, dir)) {
                return Err(ConfigError::invalid(
                    "[source.location]",
                    format!(
                        "`{}` overlaps the snapshot or generated directories",
                        root.display()
                    ),
                ));
            }
        }

        Ok(())
    }
}

/// Either path contains the other.
fn overlaps(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}
