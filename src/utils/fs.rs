//! Filesystem helpers shared by the fetcher, compiler and shutdown path.

use crate::error::FsError;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// Path next to `path` with `suffix` appended to its file name.
///
/// `content` + `staging` → `content.staging`
pub fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.{suffix}"))
}

/// Create a directory and all its parents.
pub fn ensure_dir(path: &Path) -> Result<(), FsError> {
    fs::create_dir_all(path).map_err(|err| FsError::Create(path.to_path_buf(), err))
}

/// Remove a directory tree, treating "already gone" as success.
///
/// Returns `true` if something was removed.
pub fn remove_dir_if_exists(path: &Path) -> Result<bool, FsError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(FsError::Remove(path.to_path_buf(), err)),
    }
}

/// Remove a single file, treating "already gone" as success.
pub fn remove_file_if_exists(path: &Path) -> Result<bool, FsError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(FsError::Remove(path.to_path_buf(), err)),
    }
}

/// Rename, mapping the error with both paths.
pub fn rename(from: &Path, to: &Path) -> Result<(), FsError> {
    fs::rename(from, to).map_err(|err| FsError::Rename(from.to_path_buf(), to.to_path_buf(), err))
}

/// Replace `path` with `contents` so readers see either the old or the new file.
///
/// Writes a hidden temp file in the same directory, then renames it over the
/// target. The parent directory is created if missing.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), FsError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{name}.tmp"));

    fs::write(&tmp, contents).map_err(|err| FsError::Write(tmp.clone(), err))?;
    if let Err(err) = rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(())
}
