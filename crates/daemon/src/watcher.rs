use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver};
use log::{debug, warn};
use nixnav_engine::Bookmark;
use nixnav_fs::ScanEntry;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher, recommended_watcher};

use crate::state::DaemonState;

/// How long an unpaired rename-from is kept around waiting for its
/// rename-to half before it degrades into a removal.
const RENAME_PAIR_WINDOW: Duration = Duration::from_millis(500);

/// Runtime additions to the watch set (`ADD_BOOKMARK` on a local root).
pub enum WatchControl {
    Watch(Bookmark),
}

/// Kernel backends deliver a rename as from+to, as two half events, or
/// as both. The tracker holds the from-half briefly so the pair maps to
/// one id-preserving rename; a half that never pairs is a removal.
#[derive(Default)]
struct RenameTracker {
    pending: Option<(PathBuf, Instant)>,
}

impl RenameTracker {
    fn stash(&mut self, state: &Arc<DaemonState>, path: &Path) {
        // Two unpaired from-halves in a row: the older one is a removal.
        if let Some((stale, _)) = self.pending.replace((path.to_path_buf(), Instant::now())) {
            if stale != path {
                state.apply_remove_prefix(&stale);
            }
        }
    }

    fn take_from(&mut self) -> Option<PathBuf> {
        self.pending.take().map(|(p, _)| p)
    }

    fn discard(&mut self, path: &Path) {
        if self.pending.as_ref().is_some_and(|(p, _)| p == path) {
            self.pending = None;
        }
    }

    fn expire(&mut self, state: &Arc<DaemonState>) {
        if self
            .pending
            .as_ref()
            .is_some_and(|(_, t)| t.elapsed() > RENAME_PAIR_WINDOW)
        {
            if let Some((path, _)) = self.pending.take() {
                state.apply_remove_prefix(&path);
            }
        }
    }
}

/// One kernel watcher feeding one dispatcher thread. Local bookmarks are
/// watched recursively; network bookmarks never reach this module.
pub fn spawn(state: Arc<DaemonState>, ctrl_rx: Receiver<WatchControl>) -> Result<JoinHandle<()>> {
    let (event_tx, event_rx) = channel::unbounded::<notify::Result<Event>>();

    let mut watcher = recommended_watcher(move |res: notify::Result<Event>| {
        let _ = event_tx.send(res);
    })
    .context("failed to create filesystem watcher")?;

    let roots = state.registry().local_roots();
    for bookmark in &roots {
        if let Err(err) = watcher.watch(&bookmark.path, RecursiveMode::Recursive) {
            warn!("failed to watch {}: {err}", bookmark.path.display());
        }
    }

    let handle = thread::Builder::new()
        .name("watcher".into())
        .spawn(move || {
            // The watcher lives on this thread so watches can be added
            // while the daemon runs.
            let mut watcher = watcher;
            let mut renames = RenameTracker::default();
            loop {
                crossbeam::select! {
                    recv(ctrl_rx) -> msg => match msg {
                        Ok(WatchControl::Watch(bookmark)) => {
                            if let Err(err) = watcher.watch(&bookmark.path, RecursiveMode::Recursive) {
                                warn!("failed to watch {}: {err}", bookmark.path.display());
                            }
                        }
                        Err(_) => break,
                    },
                    recv(event_rx) -> res => match res {
                        Ok(Ok(event)) => apply_event(&state, event, &mut renames),
                        Ok(Err(err)) => warn!("watcher error: {err}"),
                        Err(_) => break,
                    },
                    default(RENAME_PAIR_WINDOW) => {}
                }
                renames.expire(&state);
            }
            debug!("watcher dispatcher stopped");
        })
        .context("failed to spawn watcher dispatcher")?;

    Ok(handle)
}

/// Translates one kernel notification into index mutations. Events may
/// be duplicated or arrive out of order; every branch is idempotent.
fn apply_event(state: &Arc<DaemonState>, event: Event, renames: &mut RenameTracker) {
    match event.kind {
        EventKind::Access(_) => {}
        EventKind::Create(_) => {
            for path in &event.paths {
                handle_create(state, path);
            }
        }
        EventKind::Remove(_) => {
            for path in &event.paths {
                renames.discard(path);
                state.apply_remove_prefix(path);
            }
        }
        EventKind::Modify(ModifyKind::Name(mode)) => handle_rename(state, mode, &event.paths, renames),
        EventKind::Modify(_) => {
            for path in &event.paths {
                handle_modify(state, path);
            }
        }
        EventKind::Any | EventKind::Other => {}
    }
}

fn handle_create(state: &Arc<DaemonState>, path: &Path) {
    // The entry may already be gone again; that is not an error.
    let Ok(md) = fs::metadata(path) else { return };
    let is_dir = md.is_dir();

    if state.is_excluded(path, is_dir) {
        return;
    }

    let Some(bookmark_id) = state.registry().longest_prefix_match(path).map(|b| b.id) else {
        return;
    };

    state.apply_insert(&ScanEntry::from_metadata(path, &md), bookmark_id);

    // A new directory may already have contents (mkdir -p, unpacking);
    // pick them up with one small sub-scan.
    if is_dir {
        state.scan_directory_now(path, bookmark_id);
    }
}

fn handle_modify(state: &Arc<DaemonState>, path: &Path) {
    match fs::metadata(path) {
        Ok(md) => {
            let entry = ScanEntry::from_metadata(path, &md);
            state.apply_update_meta(path, entry.mtime, entry.size);
        }
        // Modify for a path that is gone: treat as removal.
        Err(_) => state.apply_remove_prefix(path),
    }
}

fn apply_rename_or_create(state: &Arc<DaemonState>, from: &Path, to: &Path) {
    if state.is_excluded(to, to.is_dir()) {
        // Renamed into an excluded location: gone from our view.
        state.apply_remove_prefix(from);
    } else if !state.apply_rename(from, to) {
        // The old path was never indexed; treat as a create.
        handle_create(state, to);
    }
}

fn handle_rename(
    state: &Arc<DaemonState>,
    mode: RenameMode,
    paths: &[PathBuf],
    renames: &mut RenameTracker,
) {
    match mode {
        RenameMode::Both if paths.len() >= 2 => {
            let (from, to) = (&paths[0], &paths[1]);
            renames.discard(from);
            apply_rename_or_create(state, from, to);
        }
        RenameMode::From => {
            for path in paths {
                renames.stash(state, path);
            }
        }
        RenameMode::To => {
            for path in paths {
                match renames.take_from() {
                    Some(from) => apply_rename_or_create(state, &from, path),
                    None => handle_create(state, path),
                }
            }
        }
        // Unpaired or platform-ambiguous rename: resynchronise each
        // path against the filesystem.
        _ => {
            for path in paths {
                if path.exists() {
                    handle_create(state, path);
                } else {
                    renames.discard(path);
                    state.apply_remove_prefix(path);
                }
            }
        }
    }
}
