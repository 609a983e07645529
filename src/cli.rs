//! Command-line interface definitions.
//!
//! Every flag overrides the matching config file / environment setting.

use crate::config::Profile;
use clap::Parser;
use std::path::PathBuf;

/// Serve a markdown repository as a self-refreshing site
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: mdsync.toml, if present)
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Repository URL or local directory to publish
    #[arg(short, long)]
    pub source: Option<String>,

    /// Seconds between refresh cycles
    #[arg(short = 'n', long)]
    pub interval: Option<u64>,

    /// Deployment profile, selects the default refresh interval
    #[arg(long, value_enum)]
    pub profile: Option<Profile>,

    /// Interface to bind on
    #[arg(short, long)]
    pub interface: Option<String>,

    /// The port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_flags() {
        let cli = Cli::parse_from([
            "mdsync",
            "--config",
            "site.toml",
            "--source",
            "https://example.com/notes.git",
            "-n",
            "30",
            "--profile",
            "prod",
            "--port",
            "9000",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("site.toml")));
        assert_eq!(cli.source.as_deref(), Some("https://example.com/notes.git"));
        assert_eq!(cli.interval, Some(30));
        assert_eq!(cli.profile, Some(Profile::Production));
        assert_eq!(cli.port, Some(9000));
        assert!(cli.interface.is_none());
    }

    #[test]
    fn test_no_flags() {
        let cli = Cli::parse_from(["mdsync"]);
        assert!(cli.config.is_none());
        assert!(cli.source.is_none());
        assert!(cli.profile.is_none());
    }
}
