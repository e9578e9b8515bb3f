use std::fs;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::debug;
use nixnav_engine::FileId;
use nixnav_fs::ScanEntry;

use crate::config::{RECONCILE_BATCH, RECONCILE_INTERVAL};
use crate::state::DaemonState;

/// Periodic sweep that stats a bounded batch of indexed paths, removing
/// records whose files vanished and refreshing drifted metadata. This is
/// the backstop for lost notifications; it bounds the staleness window
/// to `index_size / batch * interval`.
pub fn spawn(state: Arc<DaemonState>, shutdown: Arc<AtomicBool>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("reconciler".into())
        .spawn(move || {
            let mut cursor: Option<FileId> = None;
            loop {
                let wake = Instant::now() + RECONCILE_INTERVAL;
                while Instant::now() < wake {
                    if shutdown.load(Ordering::Relaxed) {
                        return;
                    }
                    thread::sleep(Duration::from_millis(500));
                }
                cursor = run_cycle(&state, cursor);
            }
        })
        .expect("spawn reconciler")
}

/// One reconciliation cycle. Returns the cursor for the next round of
/// the round-robin.
pub fn run_cycle(state: &DaemonState, cursor: Option<FileId>) -> Option<FileId> {
    let batch = state.index().reconcile_batch(cursor, RECONCILE_BATCH);

    let mut removed = 0usize;
    let mut refreshed = 0usize;
    for (_id, path, mtime, size) in &batch.items {
        match fs::metadata(path) {
            Err(_) => {
                state.apply_remove(path);
                removed += 1;
            }
            Ok(md) => {
                let live = ScanEntry::from_metadata(path, &md);
                if live.mtime != *mtime || live.size != *size {
                    state.apply_update_meta(path, live.mtime, live.size);
                    refreshed += 1;
                }
            }
        }
    }

    if removed > 0 || refreshed > 0 {
        debug!(
            "reconciler: {} checked, {removed} removed, {refreshed} refreshed",
            batch.items.len()
        );
    }

    batch.cursor
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
