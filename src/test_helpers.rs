//! Shared test utilities: an in-memory content source and a scheduler
//! fixture rooted in a temp directory.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let site = TestSite::new(RemovalPolicy::Retain);
//! site.source.set(&[("a.md", "# A")]);
//! let mut scheduler = site.scheduler();
//! scheduler.prepare().unwrap();
//! let report = scheduler.run_cycle(&CancelToken::new()).unwrap();
//! ```

use crate::{
    cancel::CancelToken,
    config::RemovalPolicy,
    error::FetchError,
    fetch::{ContentFetcher, Transport},
    layout::Layout,
    registry::RouteRegistry,
    scheduler::{CycleReport, SyncScheduler, SyncSettings},
};
use parking_lot::Mutex;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tempfile::TempDir;

// =========================================================================
// Fake source
// =========================================================================

/// Mutable set of files served by [`FakeTransport`].
#[derive(Default)]
pub struct FakeSource {
    files: Mutex<Vec<(String, Vec<u8>)>>,
    fail: AtomicBool,
    pulls: AtomicUsize,
    cancel_on_pull: Mutex<Option<CancelToken>>,
}

impl FakeSource {
    /// Replace the whole source with `files`.
    pub fn set(&self, files: &[(&str, &str)]) {
        *self.files.lock() = files
            .iter()
            .map(|(name, body)| ((*name).to_owned(), body.as_bytes().to_vec()))
            .collect();
    }

    pub fn set_raw(&self, name: &str, body: Vec<u8>) {
        let mut files = self.files.lock();
        files.retain(|(n, _)| n != name);
        files.push((name.to_owned(), body));
    }

    /// Make every following pull fail.
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Cancel `token` during the next pull, which still succeeds.
    pub fn cancel_during_pull(&self, token: &CancelToken) {
        *self.cancel_on_pull.lock() = Some(token.clone());
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

pub struct FakeTransport(pub Arc<FakeSource>);

impl Transport for FakeTransport {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn pull(&self, location: &str, dest: &Path, _: &AtomicBool) -> Result<(), FetchError> {
        self.0.pulls.fetch_add(1, Ordering::SeqCst);
        if self.0.fail.load(Ordering::SeqCst) {
            return Err(FetchError::transport(
                location,
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "remote unreachable"),
            ));
        }

        fs::create_dir_all(dest).unwrap();
        for (name, body) in self.0.files.lock().iter() {
            fs::write(dest.join(name), body).unwrap();
        }
        if let Some(token) = self.0.cancel_on_pull.lock().take() {
            token.cancel();
        }
        Ok(())
    }
}

// =========================================================================
// Site fixture
// =========================================================================

/// A temp directory holding snapshot and generated dirs, plus a fake source.
pub struct TestSite {
    pub dir: TempDir,
    pub source: Arc<FakeSource>,
    pub registry: Arc<RouteRegistry>,
    pub removal: RemovalPolicy,
}

impl TestSite {
    pub fn new(removal: RemovalPolicy) -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            source: Arc::new(FakeSource::default()),
            registry: Arc::new(RouteRegistry::new()),
            removal,
        }
    }

    pub fn generated(&self) -> PathBuf {
        self.dir.path().join("generated")
    }

    pub fn snapshot(&self) -> PathBuf {
        self.dir.path().join("content")
    }

    pub fn index_html(&self) -> String {
        fs::read_to_string(self.generated().join("index.html")).unwrap()
    }

    pub fn scheduler(&self) -> SyncScheduler {
        self.scheduler_with_interval(Duration::from_secs(3600))
    }

    pub fn scheduler_with_interval(&self, interval: Duration) -> SyncScheduler {
        let settings = SyncSettings {
            location: "fake://docs".to_owned(),
            extension: "md".to_owned(),
            interval,
            removal: self.removal,
            generated: self.generated(),
        };
        let fetcher = ContentFetcher::new(
            Box::new(FakeTransport(Arc::clone(&self.source))),
            self.snapshot(),
            Duration::from_secs(5),
        );
        SyncScheduler::new(
            settings,
            fetcher,
            Arc::new(Layout::builtin()),
            Arc::clone(&self.registry),
            false,
        )
    }
}

/// Slugs linked from the page list of an index, decoded, in page order.
pub fn index_links(html: &str) -> Vec<String> {
    let list = html.split("<ul class=\"pages\">").nth(1).unwrap();
    let list = list.split("</ul>").next().unwrap();
    list.split("href=\"/")
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .map(|href| urlencoding::decode(href).unwrap().into_owned())
        .collect()
}

/// Run one cycle on a fresh token and unwrap it.
pub fn cycle(scheduler: &mut SyncScheduler) -> CycleReport {
    scheduler.run_cycle(&CancelToken::new()).unwrap()
}
