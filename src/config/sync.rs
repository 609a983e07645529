//! `[source]` and `[sync]` section configuration.
//!
//! Contains the content source and the refresh loop settings.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `[source]` section in mdsync.toml - where documents come from.
///
/// # Example
/// ```toml
/// [source]
/// location = "https://github.com/acme/handbook"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Git URL, `file://` URL or local directory.
    #[serde(default)]
    pub location: String,
}

/// Deployment profile. Only affects the default refresh interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Rapid iteration while writing content.
    #[serde(alias = "dev")]
    #[value(alias = "dev")]
    Development,
    /// Low churn for a public site.
    #[serde(alias = "prod")]
    #[value(alias = "prod")]
    Production,
}

impl Profile {
    pub const fn default_interval(self) -> Duration {
        match self {
            Self::Development => Duration::from_secs(10),
            Self::Production => Duration::from_secs(300),
        }
    }

    /// Parse a profile name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }
}

/// What happens to a published page whose document disappears upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    /// Keep serving the last compiled page (routes never go away).
    #[default]
    Retain,
    /// Remove the route and its artifact on the next successful fetch.
    Delist,
}

/// `[sync]` section in mdsync.toml - refresh loop settings.
///
/// # Example
/// ```toml
/// [sync]
/// interval = 60          # seconds; falls back to the profile default
/// profile = "production"
/// removed = "retain"     # or "delist"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Seconds between cycles.
    #[serde(default)]
    pub interval: Option<u64>,

    #[serde(default)]
    pub profile: Option<Profile>,

    /// Seconds before an in-flight fetch is interrupted.
    #[serde(default = "defaults::sync::fetch_timeout")]
    #[educe(Default = defaults::sync::fetch_timeout())]
    pub fetch_timeout: u64,

    /// Seconds shutdown waits for the loop to confirm it stopped.
    #[serde(default = "defaults::sync::shutdown_timeout")]
    #[educe(Default = defaults::sync::shutdown_timeout())]
    pub shutdown_timeout: u64,

    /// Extension identifying documents, without the dot.
    #[serde(default = "defaults::sync::extension")]
    #[educe(Default = defaults::sync::extension())]
    pub extension: String,

    #[serde(default)]
    pub removed: RemovalPolicy,

    /// Minify generated HTML.
    #[serde(default)]
    pub minify: bool,
}
