//! Copy transport for sources already on disk.

use super::Transport;
use crate::{
    error::{FetchError, FsError},
    utils::fs::ensure_dir,
};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};
use walkdir::WalkDir;

/// Copies a local directory (or `file://` URL) tree, skipping `.git`.
pub struct LocalTransport;

impl LocalTransport {
    fn source_root(location: &str) -> PathBuf {
        PathBuf::from(location.strip_prefix("file://").unwrap_or(location))
    }
}

impl Transport for LocalTransport {
    fn name(&self) -> &'static str {
        "local"
    }

    fn pull(&self, location: &str, dest: &Path, interrupt: &AtomicBool) -> Result<(), FetchError> {
        let root = Self::source_root(location);
        if !root.is_dir() {
            return Err(FetchError::NotADirectory(root));
        }

        ensure_dir(dest)?;
        let walker = WalkDir::new(&root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git");

        for entry in walker {
            if interrupt.load(Ordering::Relaxed) {
                return Err(FetchError::Interrupted);
            }

            let entry = entry.map_err(|e| FetchError::transport(location, e))?;
            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            let target = dest.join(relative);

            if entry.file_type().is_dir() {
                ensure_dir(&target)?;
            } else if entry.file_type().is_file() {
                fs::copy(entry.path(), &target)
                    .map_err(|err| FsError::Write(target.clone(), err))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copies_tree_without_git_dir() {
        let src = TempDir::new().unwrap();
        fs::write(src.path().join("a.md"), "# A").unwrap();
        fs::create_dir_all(src.path().join("guides")).unwrap();
        fs::write(src.path().join("guides/b.md"), "# B").unwrap();
        fs::create_dir_all(src.path().join(".git/objects")).unwrap();
        fs::write(src.path().join(".git/HEAD"), "ref").unwrap();

        let out = TempDir::new().unwrap();
        let dest = out.path().join("staging");
        let location = format!("file://{}", src.path().display());
        LocalTransport
            .pull(&location, &dest, &AtomicBool::new(false))
            .unwrap();

        assert_eq!(fs::read_to_string(dest.join("a.md")).unwrap(), "# A");
        assert!(dest.join("guides/b.md").is_file());
        assert!(!dest.join(".git").exists());
    }

    #[test]
    fn test_missing_source_is_not_a_directory() {
        let out = TempDir::new().unwrap();
        let err = LocalTransport
            .pull("/no/such/dir", &out.path().join("s"), &AtomicBool::new(false))
            .unwrap_err();
        assert!(matches!(err, FetchError::NotADirectory(_)));
    }

    #[test]
    fn test_interrupt_stops_copy() {
        let src = TempDir::new().unwrap();
        fs::write(src.path().join("a.md"), "# A").unwrap();
        let out = TempDir::new().unwrap();

        let err = LocalTransport
            .pull(
                src.path().to_str().unwrap(),
                &out.path().join("s"),
                &AtomicBool::new(true),
            )
            .unwrap_err();
        assert!(matches!(err, FetchError::Interrupted));
    }
}
