use std::process::ExitCode;
use std::sync::{Arc, atomic::AtomicBool};

mod config;
mod handlers;
mod netscan;
mod reconciler;
mod server;
mod state;
mod watcher;

use anyhow::Context;
use crossbeam::channel;
use log::{error, info};
use nixnav_runtime::logging;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;

use config::DaemonConfig;
use state::DaemonState;

fn main() -> ExitCode {
    logging::init().ok();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("fatal: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let config = DaemonConfig::from_env();

    info!(
        "starting nixnav daemon: socket={}, database={}",
        config.socket_path.display(),
        config.database_path.display(),
    );

    // Warm start happens before anything else; watchers, schedulers and
    // the server only see a fully loaded store.
    let state = Arc::new(DaemonState::new(config)?);

    let shutdown = Arc::new(AtomicBool::new(false));
    for sig in [SIGINT, SIGTERM] {
        flag::register(sig, Arc::clone(&shutdown))
            .with_context(|| format!("failed to register signal handler for {sig}"))?;
    }

    let (watch_tx, watch_rx) = channel::unbounded();
    state.set_watch_control(watch_tx);
    watcher::spawn(Arc::clone(&state), watch_rx)?;

    reconciler::spawn(Arc::clone(&state), Arc::clone(&shutdown));
    netscan::spawn(Arc::clone(&state), Arc::clone(&shutdown));

    server::run(Arc::clone(&state), shutdown)?;

    // Accept loop is done; drain the persistence queue before the
    // process exits and takes the worker threads with it.
    state.flush_store();
    Ok(())
}
