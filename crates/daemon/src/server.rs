use std::fs;
use std::io::{self, BufReader};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread::{self, JoinHandle};

use anyhow::Context;
use crossbeam::channel::{self, Receiver};
use log::{debug, error, info, warn};
use nixnav_protocol::codec::{read_line, write_message};
use nixnav_protocol::{DaemonError, ErrorResponse, Request};

use crate::config::{HANDLER_POOL_SIZE, READ_DEADLINE};
use crate::handlers;
use crate::state::DaemonState;

/// RAII guard that ensures the Unix socket file is removed on shutdown,
/// even if we return early or panic.
struct SocketGuard<'a> {
    path: &'a Path,
}

impl<'a> Drop for SocketGuard<'a> {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                error!(
                    "failed to remove socket at {} on shutdown: {err}",
                    self.path.display()
                );
            }
        }
    }
}

/// Binds the socket and serves until the shutdown flag rises. Bind
/// failure is fatal; the caller exits with code 1.
pub fn run(state: Arc<DaemonState>, shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    let socket_path = state.config.socket_path.clone();

    if let Some(parent) = socket_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create runtime dir {}", parent.display()))?;
    }

    // A stale socket from a dead daemon is unlinked and replaced.
    if socket_path.exists() {
        fs::remove_file(&socket_path).with_context(|| {
            format!("failed to remove stale socket at {}", socket_path.display())
        })?;
    }

    let listener = UnixListener::bind(&socket_path)
        .with_context(|| format!("failed to bind socket at {}", socket_path.display()))?;
    fs::set_permissions(&socket_path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to chmod socket at {}", socket_path.display()))?;

    let _socket_guard = SocketGuard { path: &socket_path };

    // Bounded hand-off: open client sockets are capped by the pool.
    let (conn_tx, conn_rx) = channel::bounded::<UnixStream>(HANDLER_POOL_SIZE);
    let workers = spawn_worker_pool(&state, conn_rx);

    info!("daemon listening on {}", socket_path.display());

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("shutdown signal observed; stopping the accept loop");
            break;
        }

        match listener.accept() {
            Ok((stream, _addr)) => {
                if conn_tx.send(stream).is_err() {
                    break;
                }
            }
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {
                // EINTR: either a shutdown signal or spurious.
                if shutdown.load(Ordering::Relaxed) {
                    info!("accept interrupted by shutdown signal");
                    break;
                }
                continue;
            }
            Err(err) => {
                error!("accept error: {err}");
                continue;
            }
        }
    }

    drop(conn_tx);
    for worker in workers {
        if worker.join().is_err() {
            error!("request worker panicked");
        }
    }

    info!("request server shutdown complete");
    Ok(())
}

fn spawn_worker_pool(
    state: &Arc<DaemonState>,
    conn_rx: Receiver<UnixStream>,
) -> Vec<JoinHandle<()>> {
    (0..HANDLER_POOL_SIZE)
        .map(|i| {
            let state = Arc::clone(state);
            let conn_rx = conn_rx.clone();
            thread::Builder::new()
                .name(format!("handler-{i}"))
                .spawn(move || {
                    while let Ok(stream) = conn_rx.recv() {
                        if let Err(err) = handle_connection(stream, &state) {
                            debug!("connection closed with error: {err:#}");
                        }
                    }
                })
                .expect("spawn request worker")
        })
        .collect()
}

/// One request line in, exactly one JSON response line out, then the
/// connection closes. Malformed input never touches daemon state.
fn handle_connection(stream: UnixStream, state: &Arc<DaemonState>) -> anyhow::Result<()> {
    stream
        .set_read_timeout(Some(READ_DEADLINE))
        .context("failed to arm read deadline")?;

    let mut reader = BufReader::new(
        stream
            .try_clone()
            .context("failed to clone client stream")?,
    );
    let mut stream = stream;

    let line = match read_line(&mut reader) {
        Ok(Some(line)) => line,
        Ok(None) => return Ok(()), // peer closed without a request
        Err(err) => {
            let timeout = err
                .downcast_ref::<io::Error>()
                .is_some_and(|e| matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut));
            let response = if timeout {
                ErrorResponse::from(&DaemonError::Timeout(READ_DEADLINE.as_millis() as u64))
            } else {
                ErrorResponse::from(&DaemonError::BadRequest(format!("unreadable request: {err}")))
            };
            let _ = write_message(&mut stream, &response);
            return Ok(());
        }
    };

    debug!("request: {line}");

    let reply = Request::parse(&line).and_then(|request| handlers::handle(state, request));

    match reply {
        Ok(response) => write_message(&mut stream, &response)?,
        Err(err) => {
            warn!("request failed ({}): {err}", err.kind());
            write_message(&mut stream, &ErrorResponse::from(&err))?;
        }
    }

    Ok(())
}
