//! The sync loop: fetch, compile, publish, index, sleep.
//!
//! # Cycle
//!
//! ```text
//! Idle ─► Fetching ─► Discovering ─► Compiling ─► Publishing ─► Indexing ─► Sleeping ─┐
//!  ▲                                                                                  │
//!  └──────────────────────────────────────────────────────────────────────────────────┘
//!
//! any state ──cancel──► Stopping ─► Stopped
//! ```
//!
//! Cancellation is checked before fetching and before each document while
//! compiling; the fetch itself is interrupted by its watchdog. Publishing and indexing always run to the end
//! once started, so a route is never half registered and the index never
//! lists a slug the registry does not serve.

use crate::{
    cancel::CancelToken,
    compiler::PageCompiler,
    config::{ConfigError, RemovalPolicy, SiteConfig},
    error::{SyncError, chain},
    fetch::{ContentFetcher, discover, transport_for},
    index::IndexBuilder,
    layout::Layout,
    log,
    registry::{ArtifactHandler, RouteRegistry},
    utils::{
        fs::{ensure_dir, remove_dir_if_exists, remove_file_if_exists},
        slug::is_reserved,
    },
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
        mpsc::Sender,
    },
    time::Duration,
};

// =============================================================================
// Phase
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Idle,
    Fetching,
    Discovering,
    Compiling,
    Publishing,
    Indexing,
    Sleeping,
    Stopping,
    Stopped,
}

impl Phase {
    const ALL: [Self; 9] = [
        Self::Idle,
        Self::Fetching,
        Self::Discovering,
        Self::Compiling,
        Self::Publishing,
        Self::Indexing,
        Self::Sleeping,
        Self::Stopping,
        Self::Stopped,
    ];

    fn from_u8(value: u8) -> Self {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .unwrap_or(Self::Idle)
    }
}

/// Shared, lock-free view of the scheduler's current phase.
#[derive(Debug, Clone, Default)]
pub struct PhaseHandle(Arc<AtomicU8>);

impl PhaseHandle {
    pub fn get(&self) -> Phase {
        Phase::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, phase: Phase) {
        self.0.store(phase as u8, Ordering::Release);
    }
}

// =============================================================================
// State and reports
// =============================================================================

/// Settings the loop needs, extracted from [`SiteConfig`].
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub location: String,
    pub extension: String,
    pub interval: Duration,
    pub removal: RemovalPolicy,
    /// Root of every generated artifact.
    pub generated: PathBuf,
}

/// State carried between cycles. Only the scheduler thread touches it.
#[derive(Debug, Default)]
struct SyncState {
    generation: u64,
    /// Slug → version of the last successful compile.
    known: FxHashMap<String, blake3::Hash>,
    /// Published slugs in discovery order.
    pages: Vec<String>,
}

/// Outcome of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub generation: u64,
    pub fetched: bool,
    pub discovered: usize,
    /// Compiler invocations that succeeded.
    pub compiled: usize,
    /// Slugs newly registered this cycle.
    pub published: usize,
    pub failed: usize,
    pub delisted: usize,
    pub indexed: bool,
    pub cancelled: bool,
}

impl CycleReport {
    pub fn log(&self) {
        if self.cancelled {
            log!("sync"; "cycle {} cancelled", self.generation);
            return;
        }
        let mut line = format!(
            "cycle {}: {} documents, {} compiled, {} new",
            self.generation, self.discovered, self.compiled, self.published
        );
        if self.failed > 0 {
            line.push_str(&format!(", {} failed", self.failed));
        }
        if self.delisted > 0 {
            line.push_str(&format!(", {} delisted", self.delisted));
        }
        log!("sync"; "{line}");
    }
}

/// Sent once when [`SyncScheduler::run`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stopped {
    pub generation: u64,
}

/// A page compiled this cycle, waiting to be published.
struct Compiled {
    slug: String,
    version: blake3::Hash,
    path: PathBuf,
}

// =============================================================================
// Scheduler
// =============================================================================

pub struct SyncScheduler {
    settings: SyncSettings,
    fetcher: ContentFetcher,
    compiler: PageCompiler,
    index: IndexBuilder,
    registry: Arc<RouteRegistry>,
    state: SyncState,
    phase: PhaseHandle,
}

impl SyncScheduler {
    pub fn new(
        settings: SyncSettings,
        fetcher: ContentFetcher,
        layout: Arc<Layout>,
        registry: Arc<RouteRegistry>,
        minify: bool,
    ) -> Self {
        let compiler = PageCompiler::new(
            settings.generated.join("pages"),
            Arc::clone(&layout),
            minify,
        );
        let index = IndexBuilder::new(settings.generated.join("index.html"), layout, minify);
        Self {
            settings,
            fetcher,
            compiler,
            index,
            registry,
            state: SyncState::default(),
            phase: PhaseHandle::default(),
        }
    }

    pub fn from_config(
        config: &SiteConfig,
        layout: Arc<Layout>,
        registry: Arc<RouteRegistry>,
    ) -> Result<Self, ConfigError> {
        let settings = SyncSettings {
            location: config.source.location.clone(),
            extension: config.sync.extension.clone(),
            interval: config.refresh_interval()?,
            removal: config.sync.removed,
            generated: config.paths.generated.clone(),
        };
        let fetcher = ContentFetcher::new(
            transport_for(&config.source.location),
            config.paths.snapshot.clone(),
            config.fetch_timeout(),
        );
        Ok(Self::new(settings, fetcher, layout, registry, config.sync.minify))
    }

    pub fn phase(&self) -> PhaseHandle {
        self.phase.clone()
    }

    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    /// Published slugs in discovery order.
    pub fn pages(&self) -> &[String] {
        &self.state.pages
    }

    /// Everything the process writes to disk, for shutdown cleanup.
    pub fn artifact_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.settings.generated.clone()];
        paths.extend(self.fetcher.owned_dirs());
        paths
    }

    /// Reset the generated directory. Fatal at startup.
    pub fn prepare(&self) -> Result<(), SyncError> {
        remove_dir_if_exists(&self.settings.generated)?;
        ensure_dir(self.compiler.pages_dir())?;
        Ok(())
    }

    /// Run one full cycle.
    ///
    /// A fetch failure ends the cycle with an error and leaves the registry and
    /// index untouched. Per-document compile failures are counted, not raised.
    pub fn run_cycle(&mut self, cancel: &CancelToken) -> Result<CycleReport, SyncError> {
        self.state.generation += 1;
        let mut report = CycleReport {
            generation: self.state.generation,
            ..CycleReport::default()
        };

        let result = self.cycle(cancel, &mut report);
        self.phase.set(Phase::Idle);
        result.map(|()| report)
    }

    fn cycle(&mut self, cancel: &CancelToken, report: &mut CycleReport) -> Result<(), SyncError> {
        if cancel.is_cancelled() {
            report.cancelled = true;
            return Ok(());
        }

        // Fetching
        self.phase.set(Phase::Fetching);
        let root = match self.fetcher.fetch(&self.settings.location, cancel) {
            Ok(root) => root.to_path_buf(),
            Err(_) if cancel.is_cancelled() => {
                report.cancelled = true;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        report.fetched = true;

        // Discovering
        self.phase.set(Phase::Discovering);
        let discovery = discover(&root, &self.settings.extension)?;
        let documents = &discovery.documents;
        report.discovered = documents.len();

        // Compiling
        self.phase.set(Phase::Compiling);
        let mut compiled = Vec::new();
        for doc in documents {
            if cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(());
            }
            if is_reserved(&doc.slug) {
                log!("warn"; "`{}` is a reserved route, skipping", doc.source_path.display());
                continue;
            }
            if self.state.known.get(&doc.slug) == Some(&doc.version) {
                continue;
            }
            match self.compiler.compile(doc) {
                Ok(page) => {
                    log!("compile"; "{} \"{}\"", page.slug, page.title);
                    compiled.push(Compiled {
                        slug: page.slug,
                        version: doc.version,
                        path: page.path,
                    });
                }
                Err(err) => {
                    report.failed += 1;
                    log!("compile"; "{}", chain(&err));
                }
            }
        }
        report.compiled = compiled.len();

        // Publishing
        self.phase.set(Phase::Publishing);
        report.published = self.publish(compiled);
        if self.settings.removal == RemovalPolicy::Delist {
            // An unreadable document still exists; only a missing one is delisted
            let present: FxHashSet<&str> = discovery.present().collect();
            report.delisted = self.delist_missing(&present);
        }

        // Indexing
        self.phase.set(Phase::Indexing);
        self.index.build(&self.registry.list())?;
        report.indexed = true;

        Ok(())
    }

    /// Register new slugs and record versions. Returns how many were new.
    fn publish(&mut self, compiled: Vec<Compiled>) -> usize {
        let generation = self.state.generation;
        let mut published = 0;

        for page in compiled {
            // Each handler owns its own path
            let handler = Arc::new(ArtifactHandler::new(page.path));
            if self.registry.register(&page.slug, handler, generation) {
                published += 1;
                self.state.pages.push(page.slug.clone());
            }
            self.state.known.insert(page.slug, page.version);
        }

        published
    }

    /// Drop routes whose documents vanished from the snapshot.
    fn delist_missing(&mut self, present: &FxHashSet<&str>) -> usize {
        let gone: Vec<String> = self
            .state
            .known
            .keys()
            .filter(|slug| !present.contains(slug.as_str()))
            .cloned()
            .collect();

        for slug in &gone {
            self.registry.unregister(slug);
            self.state.known.remove(slug);
            self.state.pages.retain(|s| s != slug);

            let artifact = self.compiler.artifact_path(slug);
            if let Err(err) = remove_file_if_exists(&artifact) {
                log!("warn"; "{}", chain(&err));
            }
            log!("sync"; "delisted {slug}");
        }

        gone.len()
    }

    /// Loop until `cancel` fires: sleep, then cycle. Sends [`Stopped`] on exit.
    ///
    /// The first cycle is expected to have been run by the caller.
    pub fn run(mut self, cancel: CancelToken, stopped: Sender<Stopped>) {
        loop {
            self.phase.set(Phase::Sleeping);
            if cancel.wait_timeout(self.settings.interval) {
                break;
            }

            match self.run_cycle(&cancel) {
                Ok(report) => report.log(),
                Err(err) => {
                    log!("sync"; "cycle {} failed: {}", self.state.generation, chain(&err));
                }
            }

            if cancel.is_cancelled() {
                break;
            }
        }

        self.phase.set(Phase::Stopping);
        log!("sync"; "stopping after {} cycles", self.state.generation);
        self.phase.set(Phase::Stopped);
        let _ = stopped.send(Stopped {
            generation: self.state.generation,
        });
    }
}
