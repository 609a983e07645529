//! `[serve]` section configuration.
//!
//! Contains HTTP server settings.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[serve]` section in mdsync.toml - HTTP server settings.
///
/// # Example
/// ```toml
/// [serve]
/// interface = "127.0.0.1"  # Localhost only
/// port = 3000
/// workers = 8
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `0.0.0.0` (default): all interfaces
    /// - `127.0.0.1`: localhost only
    #[serde(default = "defaults::serve::interface")]
    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    /// HTTP port number (default: 8080).
    #[serde(default = "defaults::serve::port")]
    #[educe(Default = defaults::serve::port())]
    pub port: u16,

    /// Threads accepting requests concurrently.
    #[serde(default = "defaults::serve::workers")]
    #[educe(Default = defaults::serve::workers())]
    pub workers: usize,
}
