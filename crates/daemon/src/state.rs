use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};
use std::thread;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use crossbeam::channel::{self, Sender};
use log::{info, warn};
use nixnav_engine::{Bookmark, BookmarkId, BookmarkRegistry, IndexStore};
use nixnav_fs::{ScanContext, ScanEntry, walk};
use nixnav_store::{BookmarkRow, Database, FileRow, Mutation, StoreWriter};

use crate::config::DaemonConfig;
use crate::watcher::WatchControl;

/// Everything the worker threads share. The index is the single piece of
/// shared mutable state; its latch covers one logical operation at a
/// time so scans never starve queries.
pub struct DaemonState {
    pub config: DaemonConfig,
    index: RwLock<IndexStore>,
    registry: RwLock<BookmarkRegistry>,
    writer: StoreWriter,
    mutations: Sender<Mutation>,
    scan_ctx: Arc<ScanContext>,
    /// Bookmarks with a scan in flight; at most one per bookmark.
    scanning: Mutex<HashSet<BookmarkId>>,
    watch_ctrl: Mutex<Option<Sender<WatchControl>>>,
}

impl DaemonState {
    /// Warm start: open the database, stream bookmarks and files back
    /// into the in-memory structures with their persisted ids, then hand
    /// the connection to the writer thread. The server binds only after
    /// this returns, so holding the exclusive latch throughout is fine.
    pub fn new(config: DaemonConfig) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create data directory {}", parent.display())
            })?;
        }

        let db = Database::open(&config.database_path).with_context(|| {
            format!("failed to open database at {}", config.database_path.display())
        })?;

        let started = Instant::now();
        let mut registry = BookmarkRegistry::new();
        for row in db.load_bookmarks().context("failed to load bookmarks")? {
            registry.add_with_id(Bookmark {
                id: row.id,
                name: row.name,
                path: row.path.into(),
                is_network: row.is_network,
                last_scan: row.last_scan,
            });
        }

        let mut index = IndexStore::new();
        let loaded = db
            .load_files(|row| {
                index.insert_with_id(
                    row.id,
                    Path::new(&row.path),
                    row.is_dir,
                    row.mtime,
                    row.size,
                    row.bookmark_id,
                );
            })
            .context("failed to load files")?;

        info!(
            "warm start: {loaded} records, {} bookmarks in {:?}",
            registry.len(),
            started.elapsed()
        );

        let writer = StoreWriter::spawn(db).context("failed to spawn store writer")?;
        let mutations = writer.sender();

        Ok(Self {
            config,
            index: RwLock::new(index),
            registry: RwLock::new(registry),
            writer,
            mutations,
            scan_ctx: Arc::new(ScanContext::default()),
            scanning: Mutex::new(HashSet::new()),
            watch_ctrl: Mutex::new(None),
        })
    }

    pub fn index(&self) -> RwLockReadGuard<'_, IndexStore> {
        self.index.read().unwrap()
    }

    pub fn registry(&self) -> RwLockReadGuard<'_, BookmarkRegistry> {
        self.registry.read().unwrap()
    }

    pub fn db_healthy(&self) -> bool {
        self.writer.is_healthy()
    }

    pub fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        self.scan_ctx.excludes.is_excluded(path, is_dir)
    }

    /// Drains the persistence queue. Called on shutdown before the
    /// process exits.
    pub fn flush_store(&self) {
        self.writer.flush();
    }

    pub fn set_watch_control(&self, tx: Sender<WatchControl>) {
        *self.watch_ctrl.lock().unwrap() = Some(tx);
    }

    fn notify_watcher(&self, bookmark: &Bookmark) {
        let guard = self.watch_ctrl.lock().unwrap();
        if let Some(tx) = guard.as_ref() {
            if tx.send(WatchControl::Watch(bookmark.clone())).is_err() {
                warn!("watcher dispatcher is gone; {} will not be watched", bookmark.path.display());
            }
        }
    }

    // ---- index mutations, mirrored to the persistence inbox ----

    /// Insert or refresh one entry under its exclusive latch.
    pub fn apply_insert(&self, entry: &ScanEntry, bookmark_id: BookmarkId) {
        let id = {
            let mut index = self.index.write().unwrap();
            index.insert(&entry.path, entry.is_dir, entry.mtime, entry.size, bookmark_id)
        };
        let _ = self.mutations.send(Mutation::UpsertFile(FileRow {
            id,
            path: entry.path.to_string_lossy().into_owned(),
            is_dir: entry.is_dir,
            mtime: entry.mtime,
            size: entry.size,
            bookmark_id,
        }));
    }

    /// Remove a path and all descendants.
    pub fn apply_remove_prefix(&self, path: &Path) {
        let dropped = {
            let mut index = self.index.write().unwrap();
            index.remove_prefix(path)
        };
        if dropped > 0 {
            let _ = self.mutations.send(Mutation::RemovePrefix {
                prefix: path.to_string_lossy().into_owned(),
            });
        }
    }

    /// Remove a single path (reconciler's per-record cleanup).
    pub fn apply_remove(&self, path: &Path) {
        let removed = {
            let mut index = self.index.write().unwrap();
            index.remove(path)
        };
        if removed.is_some() {
            let _ = self.mutations.send(Mutation::RemoveFile {
                path: path.to_string_lossy().into_owned(),
            });
        }
    }

    /// Rename preserving FileIds. Returns false when the old path was
    /// not indexed; the caller then treats the event as a create.
    pub fn apply_rename(&self, old: &Path, new: &Path) -> bool {
        let renamed = {
            let mut index = self.index.write().unwrap();
            index.rename(old, new)
        };
        if renamed.is_some() {
            let _ = self.mutations.send(Mutation::RenamePrefix {
                old: old.to_string_lossy().into_owned(),
                new: new.to_string_lossy().into_owned(),
            });
            true
        } else {
            false
        }
    }

    /// Metadata-only refresh of an already indexed path.
    pub fn apply_update_meta(&self, path: &Path, mtime: i64, size: u64) {
        let row = {
            let mut index = self.index.write().unwrap();
            let Some(id) = index.lookup(path) else {
                return;
            };
            index.update_meta(id, mtime, size);
            index.get(id).map(|rec| FileRow {
                id,
                path: rec.path.to_string_lossy().into_owned(),
                is_dir: rec.is_dir,
                mtime,
                size,
                bookmark_id: rec.bookmark_id,
            })
        };
        if let Some(row) = row {
            let _ = self.mutations.send(Mutation::UpsertFile(row));
        }
    }

    // ---- bookmarks and scans ----

    /// Registers a bookmark, persists it, attaches a watcher for local
    /// roots and runs the initial scan. Returns the entry count.
    pub fn add_bookmark(&self, name: &str, path: &Path, is_network: bool) -> Result<usize> {
        let bookmark = {
            let mut registry = self.registry.write().unwrap();
            let id = registry.add(name, path, is_network).map_err(|e| anyhow!(e))?;
            registry.get(id).cloned().expect("bookmark just added")
        };

        let _ = self.mutations.send(Mutation::UpsertBookmark(BookmarkRow {
            id: bookmark.id,
            name: bookmark.name.clone(),
            path: bookmark.path.to_string_lossy().into_owned(),
            is_network: bookmark.is_network,
            last_scan: bookmark.last_scan,
        }));

        if !bookmark.is_network {
            self.notify_watcher(&bookmark);
        }

        self.scan_subtree(&bookmark.path, &bookmark)
    }

    /// Full or partial scan under a bookmark. Batches arrive over a
    /// channel and are applied as many short latched inserts, so queries
    /// keep flowing while a scan runs.
    pub fn scan_subtree(&self, root: &Path, bookmark: &Bookmark) -> Result<usize> {
        {
            let mut scanning = self.scanning.lock().unwrap();
            if !scanning.insert(bookmark.id) {
                return Err(anyhow!(
                    "a scan is already running for bookmark {:?}",
                    bookmark.name
                ));
            }
        }

        let result = self.scan_subtree_inner(root, bookmark);

        self.scanning
            .lock()
            .unwrap()
            .remove(&bookmark.id);
        result
    }

    /// Synchronous sub-scan the watcher runs for a freshly created
    /// directory. No single-flight guard: these subtrees are small.
    pub fn scan_directory_now(&self, dir: &Path, bookmark_id: BookmarkId) -> usize {
        let (tx, rx) = channel::unbounded::<Vec<ScanEntry>>();
        let count = walk(dir, &self.scan_ctx, &tx);
        drop(tx);
        while let Ok(batch) = rx.try_recv() {
            for entry in &batch {
                self.apply_insert(entry, bookmark_id);
            }
        }
        count
    }

    fn scan_subtree_inner(&self, root: &Path, bookmark: &Bookmark) -> Result<usize> {
        let (tx, rx) = channel::unbounded::<Vec<ScanEntry>>();

        let walker = {
            let ctx = Arc::clone(&self.scan_ctx);
            let root = root.to_path_buf();
            thread::Builder::new()
                .name("scanner".into())
                .spawn(move || walk(&root, &ctx, &tx))
                .context("failed to spawn scanner thread")?
        };

        while let Ok(batch) = rx.recv() {
            for entry in &batch {
                self.apply_insert(entry, bookmark.id);
            }
        }

        let count = walker
            .join()
            .map_err(|_| anyhow!("scanner thread panicked"))?;

        if root == bookmark.path {
            let now = unix_now();
            {
                let mut registry = self.registry.write().unwrap();
                registry.set_last_scan(bookmark.id, now);
            }
            let _ = self.mutations.send(Mutation::SetLastScan {
                bookmark_id: bookmark.id,
                secs: now,
            });
        }

        info!(
            "scan of {} finished: {count} entries",
            root.display()
        );
        Ok(count)
    }
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
