use std::{
    collections::HashSet,
    fs::{self, read_dir},
    path::{Path, PathBuf},
};

use crossbeam::channel::Sender;
use log::warn;

use crate::{config::BATCH_SIZE, excludes::ExcludeEngine};

/// One filesystem entry observed by a scan.
#[derive(Debug, Clone)]
pub struct ScanEntry {
    pub path: PathBuf,
    pub is_dir: bool,
    pub mtime: i64,
    pub size: u64,
}

impl ScanEntry {
    /// The record shape shared by the scanner, the watcher and the
    /// reconciler: directories carry size 0.
    pub fn from_metadata(path: &Path, md: &fs::Metadata) -> Self {
        let is_dir = md.is_dir();
        ScanEntry {
            path: path.to_path_buf(),
            is_dir,
            mtime: mtime_secs(md),
            size: if is_dir { 0 } else { md.len() },
        }
    }
}

pub struct ScanContext {
    pub excludes: ExcludeEngine,
}

impl Default for ScanContext {
    fn default() -> Self {
        ScanContext {
            excludes: ExcludeEngine::default(),
        }
    }
}

/// Recursive descent under `root`, emitting batches of entries to `tx`.
///
/// Excluded components are pruned without recursion. Symbolic links are
/// followed; a (device, inode) set of visited directories breaks cycles
/// for the duration of this one scan. Per-entry failures are logged and
/// skipped so one unreadable subtree never aborts a scan.
///
/// Returns the number of entries emitted.
pub fn walk(root: &Path, ctx: &ScanContext, tx: &Sender<Vec<ScanEntry>>) -> usize {
    let mut visited: HashSet<(u64, u64)> = HashSet::new();
    if let Ok(md) = fs::metadata(root) {
        if let Some(key) = dir_key(&md) {
            visited.insert(key);
        }
    }

    let mut batch = Vec::with_capacity(BATCH_SIZE);
    let mut count = 0usize;
    scan_dir(root, ctx, &mut visited, &mut batch, tx, &mut count);

    if !batch.is_empty() {
        let _ = tx.send(batch);
    }
    count
}

fn scan_dir(
    dir: &Path,
    ctx: &ScanContext,
    visited: &mut HashSet<(u64, u64)>,
    batch: &mut Vec<ScanEntry>,
    tx: &Sender<Vec<ScanEntry>>,
    count: &mut usize,
) {
    let rd = match read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            warn!("[scan] read_dir({:?}) failed: {e}", dir);
            return;
        }
    };

    for entry_res in rd {
        let entry = match entry_res {
            Ok(e) => e,
            Err(e) => {
                warn!("[scan] error reading entry in {:?}: {e}", dir);
                continue;
            }
        };

        let path = entry.path();

        // Follows symlinks; a broken link surfaces as an error here.
        let metadata = match fs::metadata(&path) {
            Ok(md) => md,
            Err(e) => {
                warn!("[scan] stat({:?}) failed: {e}", path);
                continue;
            }
        };

        let is_dir = metadata.is_dir();
        if ctx.excludes.is_excluded(&path, is_dir) {
            continue;
        }

        batch.push(ScanEntry::from_metadata(&path, &metadata));
        *count += 1;

        if batch.len() >= BATCH_SIZE {
            let to_send = std::mem::take(batch);
            if tx.send(to_send).is_err() {
                return;
            }
        }

        // Directories recurse after being emitted. The inode set stops
        // symlink cycles; the link target's identity is what matters,
        // not the spelling of the path that reached it.
        if is_dir {
            match dir_key(&metadata) {
                Some(key) => {
                    if visited.insert(key) {
                        scan_dir(&path, ctx, visited, batch, tx, count);
                    }
                }
                None => scan_dir(&path, ctx, visited, batch, tx, count),
            }
        }
    }
}

#[cfg(unix)]
fn dir_key(md: &fs::Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((md.dev(), md.ino()))
}

#[cfg(not(unix))]
fn dir_key(_md: &fs::Metadata) -> Option<(u64, u64)> {
    None
}

#[cfg(unix)]
fn mtime_secs(md: &fs::Metadata) -> i64 {
    use std::os::unix::fs::MetadataExt;
    md.mtime()
}

#[cfg(not(unix))]
fn mtime_secs(md: &fs::Metadata) -> i64 {
    use std::time::UNIX_EPOCH;
    md.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "walker_tests.rs"]
mod tests;
