//! Live route table shared by the sync loop and the HTTP workers.
//!
//! Entries are built completely before they are published under the write
//! lock, so a reader sees either no entry for a slug or a finished one.
//! Readers take `Arc` clones and drop the lock before doing any I/O.

use crate::utils::slug::is_reserved;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::{fs, io, path::PathBuf, sync::Arc};

/// Produces the response body for a route.
pub trait RouteHandler: Send + Sync {
    fn render(&self) -> io::Result<Vec<u8>>;
}

/// Serves the artifact file at `path`, re-reading it on every request so a
/// recompiled page shows up without touching the registration.
#[derive(Debug, Clone)]
pub struct ArtifactHandler {
    path: PathBuf,
}

impl ArtifactHandler {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl RouteHandler for ArtifactHandler {
    fn render(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }
}

pub struct RouteEntry {
    pub slug: String,
    pub handler: Arc<dyn RouteHandler>,
    /// Cycle that first published the slug.
    pub registered_at: u64,
}

#[derive(Default)]
struct Routes {
    /// Discovery order.
    order: Vec<Arc<RouteEntry>>,
    by_slug: FxHashMap<String, Arc<RouteEntry>>,
}

#[derive(Default)]
pub struct RouteRegistry {
    routes: RwLock<Routes>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `slug`. Returns `true` if it was newly inserted.
    ///
    /// Registering a live slug is a no-op: the first handler stays.
    /// Reserved slugs are refused.
    pub fn register(&self, slug: &str, handler: Arc<dyn RouteHandler>, generation: u64) -> bool {
        if is_reserved(slug) {
            return false;
        }
        if self.is_registered(slug) {
            return false;
        }

        let entry = Arc::new(RouteEntry {
            slug: slug.to_owned(),
            handler,
            registered_at: generation,
        });

        let mut routes = self.routes.write();
        // Re-check under the write lock
        if routes.by_slug.contains_key(slug) {
            return false;
        }
        routes.by_slug.insert(entry.slug.clone(), Arc::clone(&entry));
        routes.order.push(entry);
        true
    }

    pub fn is_registered(&self, slug: &str) -> bool {
        self.routes.read().by_slug.contains_key(slug)
    }

    pub fn get(&self, slug: &str) -> Option<Arc<RouteEntry>> {
        self.routes.read().by_slug.get(slug).cloned()
    }

    /// Registered slugs in discovery order.
    pub fn list(&self) -> Vec<String> {
        self.routes
            .read()
            .order
            .iter()
            .map(|entry| entry.slug.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.routes.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove a route. Only used by the `delist` removal policy.
    pub fn unregister(&self, slug: &str) -> Option<Arc<RouteEntry>> {
        let mut routes = self.routes.write();
        let entry = routes.by_slug.remove(slug)?;
        routes.order.retain(|e| e.slug != slug);
        Some(entry)
    }
}
