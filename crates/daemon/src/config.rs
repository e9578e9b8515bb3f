use std::path::PathBuf;
use std::time::Duration;

use nixnav_runtime::{database_path, socket_path};

/// Worker threads in the request-handler pool; also the bound on
/// concurrently open client sockets.
pub const HANDLER_POOL_SIZE: usize = 8;

/// How long a handler may wait for the request line.
pub const READ_DEADLINE: Duration = Duration::from_secs(5);

/// Deadline for ordinary requests.
pub const HANDLER_DEADLINE: Duration = Duration::from_secs(10);

/// Deadline for requests that trigger a scan.
pub const SCAN_HANDLER_DEADLINE: Duration = Duration::from_secs(60);

/// Cadence of the integrity reconciler.
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

/// Records examined per reconciler cycle.
pub const RECONCILE_BATCH: usize = 5000;

/// Cadence of full rescans for network bookmarks.
pub const NETWORK_RESCAN_INTERVAL: Duration = Duration::from_secs(300);

/// The daemon takes no arguments; both paths resolve from the
/// environment.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub socket_path: PathBuf,
    pub database_path: PathBuf,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self {
            socket_path: socket_path(),
            database_path: database_path(),
        }
    }
}
