//! Termination handling.
//!
//! ```text
//! Armed ──signal/trigger──► Triggered ──scheduler stopped──► CleaningUp ──► Done
//!                              │         (or timeout)
//!                              ├─ cancel token
//!                              └─ on_trigger hooks (stop the HTTP listener)
//! ```
//!
//! The coordinator is consumed by [`ShutdownCoordinator::shutdown`], so the
//! sequence can only run once. Cleanup errors are collected into the report
//! and never block termination.

use crate::{
    cancel::CancelToken,
    error::{FsError, chain},
    log,
    scheduler::Stopped,
    utils::fs::{remove_dir_if_exists, remove_file_if_exists},
};
use std::{
    path::PathBuf,
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    time::Duration,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Armed,
    Triggered,
    CleaningUp,
    Done,
}

#[derive(Debug)]
pub struct ShutdownReport {
    /// Every state entered, starting with `Armed`.
    pub transitions: Vec<ShutdownState>,
    /// Whether the scheduler confirmed it stopped before the timeout.
    pub scheduler_stopped: bool,
    pub removed: Vec<PathBuf>,
    pub errors: Vec<FsError>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.scheduler_stopped && self.errors.is_empty()
    }
}

/// Cloneable handle that requests shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger(Sender<()>);

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.0.send(());
    }
}

type Hook = Box<dyn FnOnce() + Send>;

pub struct ShutdownCoordinator {
    transitions: Vec<ShutdownState>,
    cancel: CancelToken,
    stopped: Receiver<Stopped>,
    timeout: Duration,
    cleanup: Vec<PathBuf>,
    hooks: Vec<Hook>,
    trigger_tx: Sender<()>,
    trigger_rx: Receiver<()>,
}

impl ShutdownCoordinator {
    pub fn new(cancel: CancelToken, stopped: Receiver<Stopped>, timeout: Duration) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::channel();
        Self {
            transitions: vec![ShutdownState::Armed],
            cancel,
            stopped,
            timeout,
            cleanup: Vec::new(),
            hooks: Vec::new(),
            trigger_tx,
            trigger_rx,
        }
    }

    /// Delete `paths` during cleanup.
    pub fn cleanup_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.cleanup.extend(paths);
        self
    }

    /// Run `hook` right after cancellation is requested.
    ///
    /// Hooks run before the wait for the sync loop, so each one must bound its
    /// own blocking.
    pub fn on_trigger(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn trigger_handle(&self) -> ShutdownTrigger {
        ShutdownTrigger(self.trigger_tx.clone())
    }

    /// Route SIGINT and SIGTERM into this coordinator.
    ///
    /// The token is cancelled from the signal thread right away, so work that
    /// runs before [`ShutdownCoordinator::wait`] is interrupted too.
    pub fn install_signal_handler(&self) -> Result<(), ctrlc::Error> {
        let trigger = self.trigger_handle();
        let cancel = self.cancel.clone();
        ctrlc::set_handler(move || {
            cancel.cancel();
            trigger.trigger();
        })
    }

    /// Block until a trigger arrives, then shut down.
    pub fn wait(self) -> ShutdownReport {
        // The coordinator holds a sender itself, so this only returns on a trigger
        let _ = self.trigger_rx.recv();
        self.shutdown()
    }

    /// Run the shutdown sequence now.
    pub fn shutdown(mut self) -> ShutdownReport {
        self.enter(ShutdownState::Triggered);
        log!("shutdown"; "stopping");
        self.cancel.cancel();
        for hook in self.hooks.drain(..) {
            hook();
        }

        let scheduler_stopped = match self.stopped.recv_timeout(self.timeout) {
            Ok(_) => true,
            Err(RecvTimeoutError::Timeout) => {
                log!("shutdown"; "sync loop did not stop within {:?}, cleaning up anyway", self.timeout);
                false
            }
            Err(RecvTimeoutError::Disconnected) => false,
        };

        self.enter(ShutdownState::CleaningUp);
        let (removed, errors) = remove_artifacts(&self.cleanup);
        for err in &errors {
            log!("shutdown"; "{}", chain(err));
        }

        self.enter(ShutdownState::Done);
        log!("shutdown"; "removed {} paths", removed.len());

        ShutdownReport {
            transitions: self.transitions,
            scheduler_stopped,
            removed,
            errors,
        }
    }

    fn enter(&mut self, state: ShutdownState) {
        self.transitions.push(state);
    }
}

/// Delete each path (file or directory tree). Missing paths are skipped.
///
/// Returns the paths actually removed and the failures.
pub fn remove_artifacts(paths: &[PathBuf]) -> (Vec<PathBuf>, Vec<FsError>) {
    let mut removed = Vec::new();
    let mut errors = Vec::new();

    for path in paths {
        let result = if path.is_dir() {
            remove_dir_if_exists(path)
        } else {
            remove_file_if_exists(path)
        };
        match result {
            Ok(true) => removed.push(path.clone()),
            Ok(false) => {}
            Err(err) => errors.push(err),
        }
    }

    (removed, errors)
}
