//! Error taxonomy for the sync pipeline.
//!
//! | Error          | At startup | Inside a cycle                     |
//! |----------------|------------|------------------------------------|
//! | `FetchError`   | fatal      | cycle skipped, retried next cycle  |
//! | `FsError`      | fatal      | document skipped / cycle skipped   |
//! | `CompileError` | -          | document skipped                   |
//! | `ConfigError`  | fatal      | -                                  |
//!
//! Errors never carry a policy themselves: the scheduler decides how far a
//! failure propagates, and `main` decides what is fatal.

use crate::config::ConfigError;
use std::{error::Error, io, path::PathBuf, time::Duration};
use thiserror::Error;

/// Filesystem failures while preparing, writing or removing artifacts.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("failed to create `{0}`")]
    Create(PathBuf, #[source] io::Error),

    #[error("failed to read `{0}`")]
    Read(PathBuf, #[source] io::Error),

    #[error("failed to write `{0}`")]
    Write(PathBuf, #[source] io::Error),

    #[error("failed to remove `{0}`")]
    Remove(PathBuf, #[source] io::Error),

    #[error("failed to move `{0}` to `{1}`")]
    Rename(PathBuf, PathBuf, #[source] io::Error),
}

/// Failures while pulling a fresh snapshot of the content source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("source location is empty")]
    EmptySource,

    #[error("local source `{0}` is not a directory")]
    NotADirectory(PathBuf),

    #[error("failed to fetch `{location}`")]
    Transport {
        location: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },

    /// The transport observed its interrupt flag.
    #[error("fetch interrupted")]
    Interrupted,

    #[error("fetch of `{0}` timed out after {1:?}")]
    TimedOut(String, Duration),

    #[error("fetch of `{0}` cancelled")]
    Cancelled(String),

    #[error(transparent)]
    Fs(#[from] FsError),
}

impl FetchError {
    /// Wrap any transport-level error for `location`.
    pub fn transport<E>(location: &str, err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::Transport {
            location: location.to_owned(),
            source: Box::new(err),
        }
    }
}

/// Failures while turning one document into a page.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("`{slug}` is not valid UTF-8")]
    InvalidUtf8 {
        slug: String,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error(transparent)]
    Fs(#[from] FsError),
}

/// Any failure that can end a whole cycle or abort startup.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Fs(#[from] FsError),
}

/// Render an error and all of its sources as `outer: inner: root`.
pub fn chain(err: &dyn Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
