//! `[paths]` section configuration.
//!
//! Filesystem layout of the running site.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// `[paths]` section in mdsync.toml.
///
/// ```text
/// content/            snapshot of the source (replaced on every fetch)
/// generated/
///   index.html        listing of all published pages
///   pages/<slug>.html one compiled page per document
/// static/             served as-is under /static
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Where the fetched snapshot lives.
    #[serde(default = "defaults::paths::snapshot")]
    #[educe(Default = defaults::paths::snapshot())]
    pub snapshot: PathBuf,

    /// Generated artifacts. Wiped at startup and on shutdown.
    #[serde(default = "defaults::paths::generated")]
    #[educe(Default = defaults::paths::generated())]
    pub generated: PathBuf,

    /// Static assets, never modified.
    #[serde(rename = "static", default = "defaults::paths::static_dir")]
    #[educe(Default = defaults::paths::static_dir())]
    pub static_dir: PathBuf,

    /// HTML fragment for `/about`. Built-in page when unset.
    #[serde(default)]
    pub about: Option<PathBuf>,

    /// Page layout with `{title}` and `{body}` placeholders. Built-in when unset.
    #[serde(default)]
    pub layout: Option<PathBuf>,
}

impl PathsConfig {
    pub fn pages_dir(&self) -> PathBuf {
        self.generated.join("pages")
    }

    pub fn index_file(&self) -> PathBuf {
        self.generated.join("index.html")
    }

    /// Resolve every path against `root`.
    pub(super) fn resolve(&mut self, root: &Path) {
        let resolve = |p: &Path| normalize_path(&root.join(p));
        self.snapshot = resolve(&self.snapshot);
        self.generated = resolve(&self.generated);
        self.static_dir = resolve(&self.static_dir);
        self.about = self.about.as_deref().map(resolve);
        self.layout = self.layout.as_deref().map(resolve);
    }
}

/// Normalize a path to absolute, using canonicalize if the path exists
pub(super) fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        // For non-existent paths, manually make them absolute
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}
