//! Shallow git clone via gix.

use super::Transport;
use crate::error::FetchError;
use std::{num::NonZeroU32, path::Path, sync::atomic::AtomicBool};

/// Clones the default branch at depth 1 into a fresh directory.
///
/// gix checks `interrupt` between network reads and while writing the
/// worktree, so a stuck remote is abandoned once the flag is raised.
pub struct GitTransport;

impl Transport for GitTransport {
    fn name(&self) -> &'static str {
        "git"
    }

    fn pull(&self, location: &str, dest: &Path, interrupt: &AtomicBool) -> Result<(), FetchError> {
        let mut prepare = gix::prepare_clone(location, dest)
            .map_err(|e| FetchError::transport(location, e))?
            .with_shallow(gix::remote::fetch::Shallow::DepthAtRemote(NonZeroU32::MIN));

        let (mut checkout, _) = prepare
            .fetch_then_checkout(gix::progress::Discard, interrupt)
            .map_err(|e| FetchError::transport(location, e))?;

        checkout
            .main_worktree(gix::progress::Discard, interrupt)
            .map_err(|e| FetchError::transport(location, e))?;

        Ok(())
    }
}
