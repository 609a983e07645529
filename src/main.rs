//! mdsync - serve a markdown repository as a self-refreshing site.

mod cancel;
mod cli;
mod compiler;
mod config;
mod error;
mod fetch;
mod index;
mod layout;
mod registry;
mod scheduler;
mod serve;
mod shutdown;
mod utils;

#[cfg(test)]
mod test_helpers;

use anyhow::{Context, Result};
use cancel::CancelToken;
use clap::Parser;
use cli::Cli;
use config::SiteConfig;
use layout::Layout;
use registry::RouteRegistry;
use scheduler::{Stopped, SyncScheduler};
use serve::{HttpServer, Router};
use shutdown::{ShutdownCoordinator, ShutdownReport, remove_artifacts};
use std::{
    path::PathBuf,
    process::ExitCode,
    sync::{Arc, mpsc},
    thread,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log!("error"; "{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Startup, steady state, shutdown.
///
/// Any error returned from here is a startup failure.
fn run(cli: &Cli) -> Result<()> {
    let config = SiteConfig::load(cli)?;
    let layout = Arc::new(Layout::load(config.paths.layout.as_deref())?);
    let registry = Arc::new(RouteRegistry::new());
    let mut scheduler =
        SyncScheduler::from_config(&config, Arc::clone(&layout), Arc::clone(&registry))?;
    let cleanup = scheduler.artifact_paths();

    scheduler
        .prepare()
        .context("failed to prepare generated directory")?;

    let cancel = CancelToken::new();
    let (stopped_tx, stopped_rx) = mpsc::channel();
    let coordinator =
        ShutdownCoordinator::new(cancel.clone(), stopped_rx, config.shutdown_timeout())
            .cleanup_paths(cleanup.clone());
    coordinator
        .install_signal_handler()
        .context("failed to install signal handler")?;

    // First cycle runs before the listener opens: no content is fatal
    let report = match scheduler.run_cycle(&cancel) {
        Ok(report) => report,
        Err(e) => {
            discard(&cleanup);
            return Err(e).context("initial synchronization failed");
        }
    };
    report.log();
    log!("sync"; "{} pages published", scheduler.pages().len());

    if report.cancelled {
        let _ = stopped_tx.send(Stopped {
            generation: scheduler.generation(),
        });
        return finish(coordinator.shutdown());
    }

    let router = Router::new(Arc::clone(&registry), &config.paths, layout);
    let server = match HttpServer::bind(&config.serve, router) {
        Ok(server) => server,
        Err(e) => {
            discard(&cleanup);
            return Err(e);
        }
    };
    let phase = scheduler.phase();
    let drain_timeout = config.shutdown_timeout();

    let http = server.spawn().context("failed to start http workers")?;
    let sync = thread::Builder::new()
        .name("sync".into())
        .spawn({
            let cancel = cancel.clone();
            move || scheduler.run(cancel, stopped_tx)
        })
        .context("failed to start sync loop")?;

    // In-flight requests get a bounded grace period before anything is deleted
    let coordinator = coordinator.on_trigger(move || {
        if !http.stop_within(drain_timeout) {
            log!("shutdown"; "http workers abandoned after {drain_timeout:?}");
        }
    });

    let report = coordinator.wait();
    if report.scheduler_stopped {
        let _ = sync.join();
    } else {
        log!("shutdown"; "sync loop abandoned while {:?}", phase.get());
    }
    finish(report)
}

/// Best-effort removal after a failed start.
fn discard(paths: &[PathBuf]) {
    for err in remove_artifacts(paths).1 {
        log!("error"; "{}", error::chain(&err));
    }
}

/// Shutdown always ends in success; cleanup problems are only reported.
fn finish(report: ShutdownReport) -> Result<()> {
    if !report.errors.is_empty() {
        log!("shutdown"; "{} paths could not be removed", report.errors.len());
    }
    Ok(())
}
