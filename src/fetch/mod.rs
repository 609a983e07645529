//! Content fetching: pulling a consistent snapshot of the source.
//!
//! # Snapshot swap
//!
//! ```text
//! transport.pull() ──► content.staging/        (fresh, complete tree)
//!                           │
//!        content/ ──rename──► content.previous/
//!  content.staging/ ─rename─► content/
//!                            content.previous/ ──► removed
//! ```
//!
//! The snapshot directory is never filled in place, so it is either the old
//! tree or the new one, never a mix.

mod git;
mod local;

pub use git::GitTransport;
pub use local::LocalTransport;

use crate::{
    cancel::CancelToken,
    error::{FetchError, FsError, chain},
    log,
    utils::{fs as ufs, slug::document_slug},
};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::AtomicBool,
    thread,
    time::{Duration, Instant},
};

/// How often the fetch watchdog re-checks for cancellation.
const WATCHDOG_POLL: Duration = Duration::from_millis(100);

/// Moves a content source into a local directory.
pub trait Transport: Send + Sync {
    /// Short name for log output.
    fn name(&self) -> &'static str;

    /// Populate the empty directory `dest` with the content of `location`.
    ///
    /// Implementations should poll `interrupt` and bail out with
    /// [`FetchError::Interrupted`] once it is set.
    fn pull(&self, location: &str, dest: &Path, interrupt: &AtomicBool) -> Result<(), FetchError>;
}

/// Pick the transport for a source location.
///
/// Existing local directories and `file://` URLs are copied, everything else
/// is cloned with git.
pub fn transport_for(location: &str) -> Box<dyn Transport> {
    if local_root(location).is_some() {
        Box::new(LocalTransport)
    } else {
        Box::new(GitTransport)
    }
}

/// The directory a location names, if it is served by [`LocalTransport`].
pub fn local_root(location: &str) -> Option<PathBuf> {
    if let Some(path) = location.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    let path = Path::new(location);
    path.is_dir().then(|| path.to_path_buf())
}

/// One source document read from a snapshot.
#[derive(Debug, Clone)]
pub struct Document {
    pub slug: String,
    pub source_path: PathBuf,
    pub raw: Vec<u8>,
    /// Content hash, used to detect changes between cycles.
    pub version: blake3::Hash,
}

impl Document {
    pub fn new(slug: impl Into<String>, source_path: PathBuf, raw: Vec<u8>) -> Self {
        let version = blake3::hash(&raw);
        Self {
            slug: slug.into(),
            source_path,
            raw,
            version,
        }
    }
}

/// Why the watchdog raised the interrupt flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interruption {
    TimedOut,
    Cancelled,
}

/// Fetches the source into a fixed snapshot directory.
pub struct ContentFetcher {
    transport: Box<dyn Transport>,
    snapshot: PathBuf,
    timeout: Duration,
}

impl ContentFetcher {
    pub fn new(transport: Box<dyn Transport>, snapshot: PathBuf, timeout: Duration) -> Self {
        Self {
            transport,
            snapshot,
            timeout,
        }
    }

    fn staging_dir(&self) -> PathBuf {
        ufs::sibling(&self.snapshot, "staging")
    }

    fn previous_dir(&self) -> PathBuf {
        ufs::sibling(&self.snapshot, "previous")
    }

    /// Every directory this fetcher may leave on disk.
    pub fn owned_dirs(&self) -> Vec<PathBuf> {
        vec![self.snapshot.clone(), self.staging_dir(), self.previous_dir()]
    }

    /// Pull a fresh snapshot and swap it in. Returns the snapshot directory.
    ///
    /// Bounded by the configured timeout; cancelling `cancel` interrupts the
    /// transport. On failure the previous snapshot is left untouched.
    pub fn fetch(&self, location: &str, cancel: &CancelToken) -> Result<&Path, FetchError> {
        if location.trim().is_empty() {
            return Err(FetchError::EmptySource);
        }

        let staging = self.staging_dir();
        ufs::remove_dir_if_exists(&staging)?;
        ufs::remove_dir_if_exists(&self.previous_dir())?;
        if let Some(parent) = staging.parent() {
            ufs::ensure_dir(parent)?;
        }

        log!("fetch"; "pulling {} ({})", location, self.transport.name());

        let interrupt = CancelToken::new();
        let finished = CancelToken::new();
        let (result, interruption) = thread::scope(|s| {
            let watchdog = s.spawn(|| watchdog(cancel, &interrupt, &finished, self.timeout));
            let result = self.transport.pull(location, &staging, interrupt.flag());
            finished.cancel();
            (result, watchdog.join().unwrap_or(None))
        });

        let result = match (result, interruption) {
            (Ok(()), _) => self.swap_in(&staging),
            (Err(_), Some(Interruption::TimedOut)) => {
                Err(FetchError::TimedOut(location.to_owned(), self.timeout))
            }
            (Err(_), Some(Interruption::Cancelled)) => {
                Err(FetchError::Cancelled(location.to_owned()))
            }
            (Err(err), None) => Err(err),
        };

        if result.is_err() {
            let _ = ufs::remove_dir_if_exists(&staging);
        }
        result.map(|()| self.snapshot.as_path())
    }

    /// Replace the snapshot with the staged tree.
    fn swap_in(&self, staging: &Path) -> Result<(), FetchError> {
        let previous = self.previous_dir();
        let had_snapshot = self.snapshot.exists();

        if had_snapshot {
            ufs::rename(&self.snapshot, &previous)?;
        }
        if let Err(err) = ufs::rename(staging, &self.snapshot) {
            if had_snapshot {
                let _ = ufs::rename(&previous, &self.snapshot);
            }
            return Err(err.into());
        }
        if let Err(err) = ufs::remove_dir_if_exists(&previous) {
            log!("warn"; "{}", chain(&err));
        }
        Ok(())
    }
}

/// Raise `interrupt` on timeout or cancellation, until `finished` fires.
fn watchdog(
    cancel: &CancelToken,
    interrupt: &CancelToken,
    finished: &CancelToken,
    timeout: Duration,
) -> Option<Interruption> {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        if finished.is_cancelled() {
            return None;
        }
        if cancel.is_cancelled() {
            interrupt.cancel();
            return Some(Interruption::Cancelled);
        }
        let wait = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    interrupt.cancel();
                    return Some(Interruption::TimedOut);
                }
                WATCHDOG_POLL.min(deadline - now)
            }
            None => WATCHDOG_POLL,
        };
        finished.wait_timeout(wait);
    }
}

/// Documents found in a snapshot.
#[derive(Debug, Default)]
pub struct Discovery {
    pub documents: Vec<Document>,
    /// Slugs of documents that exist but could not be read this time.
    pub unreadable: Vec<String>,
}

impl Discovery {
    /// Every slug the snapshot contains, readable or not.
    pub fn present(&self) -> impl Iterator<Item = &str> {
        self.documents
            .iter()
            .map(|d| d.slug.as_str())
            .chain(self.unreadable.iter().map(String::as_str))
    }
}

/// List the documents at the top level of a snapshot, sorted by file name.
///
/// Only regular files count: directories, symlinks, hidden files and files
/// with other extensions are skipped. A document that cannot be read is
/// logged and reported in [`Discovery::unreadable`].
pub fn discover(root: &Path, extension: &str) -> Result<Discovery, FsError> {
    // `DirEntry::file_type` does not follow symlinks
    let mut entries: Vec<_> = fs::read_dir(root)
        .map_err(|err| FsError::Read(root.to_path_buf(), err))?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .collect();
    entries.sort_by_key(fs::DirEntry::file_name);

    let mut found = Discovery {
        documents: Vec::with_capacity(entries.len()),
        unreadable: Vec::new(),
    };
    for entry in entries {
        let file_name = PathBuf::from(entry.file_name());
        let Some(slug) = document_slug(&file_name, extension) else {
            continue;
        };

        let path = entry.path();
        match fs::read(&path) {
            Ok(raw) => found.documents.push(Document::new(slug, path, raw)),
            Err(err) => {
                let err = FsError::Read(path, err);
                log!("warn"; "skipping {}", chain(&err));
                found.unreadable.push(slug.to_owned());
            }
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use tempfile::TempDir;

    /// Writes one file per pull, numbered by pull count.
    struct CountingTransport {
        pulls: Arc<AtomicUsize>,
    }

    impl Transport for CountingTransport {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn pull(&self, _: &str, dest: &Path, _: &AtomicBool) -> Result<(), FetchError> {
            let n = self.pulls.fetch_add(1, Ordering::SeqCst) + 1;
            fs::create_dir_all(dest).unwrap();
            fs::write(dest.join(format!("doc{n}.md")), format!("# Doc {n}")).unwrap();
            Ok(())
        }
    }

    /// Blocks until interrupted.
    struct HangingTransport;

    impl Transport for HangingTransport {
        fn name(&self) -> &'static str {
            "hanging"
        }

        fn pull(&self, _: &str, dest: &Path, interrupt: &AtomicBool) -> Result<(), FetchError> {
            fs::create_dir_all(dest).unwrap();
            fs::write(dest.join("partial.md"), "half").unwrap();
            while !interrupt.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(5));
            }
            Err(FetchError::Interrupted)
        }
    }

    fn counting_fetcher(dir: &Path) -> (ContentFetcher, Arc<AtomicUsize>) {
        let pulls = Arc::new(AtomicUsize::new(0));
        let fetcher = ContentFetcher::new(
            Box::new(CountingTransport {
                pulls: Arc::clone(&pulls),
            }),
            dir.join("content"),
            Duration::from_secs(5),
        );
        (fetcher, pulls)
    }

    #[test]
    fn test_fetch_replaces_snapshot_completely() {
        let dir = TempDir::new().unwrap();
        let (fetcher, pulls) = counting_fetcher(dir.path());
        let cancel = CancelToken::new();

        let root = fetcher.fetch("anywhere", &cancel).unwrap().to_path_buf();
        assert!(root.join("doc1.md").is_file());

        fetcher.fetch("anywhere", &cancel).unwrap();
        assert!(!root.join("doc1.md").exists());
        assert!(root.join("doc2.md").is_file());
        assert_eq!(pulls.load(Ordering::SeqCst), 2);

        // Nothing left over next to the snapshot
        assert!(!dir.path().join("content.staging").exists());
        assert!(!dir.path().join("content.previous").exists());
    }

    #[test]
    fn test_fetch_rejects_empty_location() {
        let dir = TempDir::new().unwrap();
        let (fetcher, pulls) = counting_fetcher(dir.path());
        let err = fetcher.fetch("  ", &CancelToken::new()).unwrap_err();
        assert!(matches!(err, FetchError::EmptySource));
        assert_eq!(pulls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fetch_times_out_and_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let snapshot = dir.path().join("content");
        fs::create_dir_all(&snapshot).unwrap();
        fs::write(snapshot.join("old.md"), "old").unwrap();

        let fetcher = ContentFetcher::new(
            Box::new(HangingTransport),
            snapshot.clone(),
            Duration::from_millis(50),
        );
        let err = fetcher.fetch("slow", &CancelToken::new()).unwrap_err();

        assert!(matches!(err, FetchError::TimedOut(..)));
        assert!(snapshot.join("old.md").is_file());
        assert!(!snapshot.join("partial.md").exists());
        assert!(!dir.path().join("content.staging").exists());
    }

    #[test]
    fn test_fetch_cancelled() {
        let dir = TempDir::new().unwrap();
        let fetcher = ContentFetcher::new(
            Box::new(HangingTransport),
            dir.path().join("content"),
            Duration::from_secs(60),
        );
        let cancel = CancelToken::new();
        let canceller = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            canceller.cancel();
        });

        let start = Instant::now();
        let err = fetcher.fetch("slow", &cancel).unwrap_err();
        handle.join().unwrap();

        assert!(matches!(err, FetchError::Cancelled(_)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("b.md"), "# B").unwrap();
        fs::write(root.join("a.md"), "# A").unwrap();
        fs::write(root.join("README"), "no extension").unwrap();
        fs::write(root.join(".hidden.md"), "hidden").unwrap();
        fs::create_dir(root.join("nested.md")).unwrap();
        fs::create_dir(root.join(".git")).unwrap();

        let found = discover(root, "md").unwrap();
        let docs = &found.documents;
        let slugs: Vec<_> = docs.iter().map(|d| d.slug.as_str()).collect();

        assert_eq!(slugs, ["a", "b"]);
        assert_eq!(docs[0].raw, b"# A");
        assert_eq!(docs[0].version, blake3::hash(b"# A"));
        assert!(found.unreadable.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_skips_symlinks() {
        use std::os::unix::fs::symlink;

        let outside = TempDir::new().unwrap();
        let secret = outside.path().join("secret.txt");
        fs::write(&secret, "TOP-SECRET").unwrap();

        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("a.md"), "# A").unwrap();
        symlink(&secret, root.join("leak.md")).unwrap();
        symlink(outside.path(), root.join("linked.md")).unwrap();

        let found = discover(root, "md").unwrap();
        let slugs: Vec<_> = found.present().collect();

        assert_eq!(slugs, ["a"]);
        assert!(found.documents.iter().all(|d| d.raw != b"TOP-SECRET"));
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_reports_unreadable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("a.md"), "# A").unwrap();
        let locked = root.join("b.md");
        fs::write(&locked, "# B").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read(&locked).is_ok() {
            // Permissions are not enforced for this user (root)
            return;
        }

        let found = discover(root, "md").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

        assert_eq!(found.documents.len(), 1);
        assert_eq!(found.unreadable, ["b"]);
        assert_eq!(found.present().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn test_discover_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            discover(&dir.path().join("missing"), "md"),
            Err(FsError::Read(..))
        ));
    }

    #[test]
    fn test_transport_for() {
        let dir = TempDir::new().unwrap();
        assert_eq!(transport_for(dir.path().to_str().unwrap()).name(), "local");
        assert_eq!(transport_for("file:///srv/docs").name(), "local");
        assert_eq!(transport_for("https://github.com/acme/handbook").name(), "git");
    }

    #[test]
    fn test_local_root() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_str().unwrap();
        assert_eq!(local_root(path).as_deref(), Some(dir.path()));
        assert_eq!(local_root("file:///srv/docs"), Some(PathBuf::from("/srv/docs")));
        assert_eq!(local_root("https://github.com/acme/handbook"), None);
    }
}
