use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::warn;

use crate::config::NETWORK_RESCAN_INTERVAL;
use crate::state::DaemonState;

/// Network mounts never deliver kernel notifications, so their
/// bookmarks get a periodic full rescan instead. Inserts are idempotent
/// and the reconciler retires whatever a rescan no longer sees.
pub fn spawn(state: Arc<DaemonState>, shutdown: Arc<AtomicBool>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("net-rescan".into())
        .spawn(move || {
            loop {
                let wake = Instant::now() + NETWORK_RESCAN_INTERVAL;
                while Instant::now() < wake {
                    if shutdown.load(Ordering::Relaxed) {
                        return;
                    }
                    thread::sleep(Duration::from_millis(500));
                }

                let roots = state.registry().network_roots();
                for bookmark in roots {
                    if let Err(err) = state.scan_subtree(&bookmark.path, &bookmark) {
                        warn!(
                            "network rescan of {} failed: {err:#}",
                            bookmark.path.display()
                        );
                    }
                }
            }
        })
        .expect("spawn network rescanner")
}
