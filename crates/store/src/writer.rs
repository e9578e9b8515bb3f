use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, error, warn};

use crate::db::{BookmarkRow, Database, FileRow, StoreError};

/// Upper bound on mutations folded into one transaction.
const MAX_BATCH: usize = 512;
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// One record on the persistence inbox. Every component that mutates the
/// in-memory index emits the matching message here; the writer thread is
/// the only code that ever touches the database after warm start.
pub enum Mutation {
    UpsertFile(FileRow),
    RemoveFile { path: String },
    RemovePrefix { prefix: String },
    RenamePrefix { old: String, new: String },
    UpsertBookmark(BookmarkRow),
    SetLastScan { bookmark_id: u64, secs: i64 },
    /// Write fence: acknowledged only after everything queued before it
    /// has been committed (or dropped, once the store is unhealthy).
    Flush(Sender<()>),
}

/// Handle to the single serialising writer thread.
pub struct StoreWriter {
    tx: Sender<Mutation>,
    healthy: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl StoreWriter {
    /// Takes ownership of the database connection; from here on only the
    /// writer thread uses it.
    pub fn spawn(db: Database) -> std::io::Result<Self> {
        let (tx, rx) = channel::unbounded();
        let healthy = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&healthy);
        let handle = thread::Builder::new()
            .name("store-writer".into())
            .spawn(move || writer_loop(db, rx, &flag))?;

        Ok(Self {
            tx,
            healthy,
            handle,
        })
    }

    pub fn sender(&self) -> Sender<Mutation> {
        self.tx.clone()
    }

    /// False once writes have failed past the retry budget. Mutating
    /// requests surface this as `db_error`; queries are unaffected.
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    /// Blocks until everything queued so far has been committed.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = channel::bounded(1);
        if self.tx.send(Mutation::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv_timeout(Duration::from_secs(30));
        }
    }

    /// Drains the queue, stops the writer and joins it.
    pub fn shutdown(self) {
        self.flush();
        let StoreWriter { tx, handle, .. } = self;
        drop(tx);
        if handle.join().is_err() {
            error!("store writer thread panicked during shutdown");
        }
    }
}

fn writer_loop(db: Database, rx: Receiver<Mutation>, healthy: &AtomicBool) {
    loop {
        let first = match rx.recv() {
            Ok(m) => m,
            Err(_) => break,
        };

        let mut ops = Vec::new();
        let mut acks = Vec::new();
        match first {
            Mutation::Flush(ack) => acks.push(ack),
            other => ops.push(other),
        }
        while ops.len() < MAX_BATCH {
            match rx.try_recv() {
                Ok(Mutation::Flush(ack)) => acks.push(ack),
                Ok(m) => ops.push(m),
                Err(_) => break,
            }
        }

        if !ops.is_empty() {
            if healthy.load(Ordering::Relaxed) {
                apply_with_retry(&db, &ops, healthy);
            } else {
                // The reconciler repairs the gap after the store comes
                // back on a restart.
                debug!("database unhealthy; dropping {} queued writes", ops.len());
            }
        }

        for ack in acks {
            let _ = ack.send(());
        }
    }
}

fn apply_with_retry(db: &Database, ops: &[Mutation], healthy: &AtomicBool) {
    for attempt in 1..=RETRY_ATTEMPTS {
        match apply_batch(db, ops) {
            Ok(()) => return,
            Err(e) => {
                warn!("store write failed (attempt {attempt}/{RETRY_ATTEMPTS}): {e}");
                thread::sleep(RETRY_BACKOFF * attempt);
            }
        }
    }

    error!("store writes keep failing; marking database unhealthy");
    healthy.store(false, Ordering::Relaxed);
}

fn apply_batch(db: &Database, ops: &[Mutation]) -> Result<(), StoreError> {
    db.begin()?;

    for op in ops {
        let applied = match op {
            Mutation::UpsertFile(row) => db.upsert_file(row),
            Mutation::RemoveFile { path } => db.remove_file(path),
            Mutation::RemovePrefix { prefix } => db.remove_prefix(prefix),
            Mutation::RenamePrefix { old, new } => db.rename_prefix(old, new),
            Mutation::UpsertBookmark(row) => db.upsert_bookmark(row),
            Mutation::SetLastScan { bookmark_id, secs } => db.set_last_scan(*bookmark_id, *secs),
            Mutation::Flush(_) => Ok(()),
        };
        if let Err(e) = applied {
            db.rollback();
            return Err(e);
        }
    }

    if let Err(e) = db.commit() {
        db.rollback();
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_row(id: u64, path: &str) -> FileRow {
        FileRow {
            id,
            path: path.to_owned(),
            is_dir: false,
            mtime: 100,
            size: 1,
            bookmark_id: 0,
        }
    }

    #[test]
    fn writer_commits_queued_mutations_before_flush_ack() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let db_path = tmp.path().join("index.db");

        let writer = StoreWriter::spawn(Database::open(&db_path).expect("open")).expect("spawn");
        let tx = writer.sender();

        tx.send(Mutation::UpsertFile(file_row(1, "/tmp/h/a.txt")))
            .unwrap();
        tx.send(Mutation::UpsertFile(file_row(2, "/tmp/h/b.txt")))
            .unwrap();
        tx.send(Mutation::RemoveFile {
            path: "/tmp/h/a.txt".into(),
        })
        .unwrap();

        writer.flush();
        assert!(writer.is_healthy());
        writer.shutdown();

        let db = Database::open(&db_path).expect("reopen");
        let mut paths = Vec::new();
        db.load_files(|r| paths.push(r.path)).unwrap();
        assert_eq!(paths, vec!["/tmp/h/b.txt"]);
    }

    #[test]
    fn writer_applies_prefix_operations() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let db_path = tmp.path().join("index.db");

        let writer = StoreWriter::spawn(Database::open(&db_path).expect("open")).expect("spawn");
        let tx = writer.sender();

        tx.send(Mutation::UpsertFile(file_row(1, "/tmp/h/sub")))
            .unwrap();
        tx.send(Mutation::UpsertFile(file_row(2, "/tmp/h/sub/c.txt")))
            .unwrap();
        tx.send(Mutation::RenamePrefix {
            old: "/tmp/h/sub".into(),
            new: "/tmp/h/moved".into(),
        })
        .unwrap();

        writer.flush();
        writer.shutdown();

        let db = Database::open(&db_path).expect("reopen");
        let mut rows = Vec::new();
        db.load_files(|r| rows.push((r.id, r.path))).unwrap();
        assert_eq!(
            rows,
            vec![
                (1, "/tmp/h/moved".to_string()),
                (2, "/tmp/h/moved/c.txt".to_string()),
            ]
        );
    }

    #[test]
    fn writer_persists_bookmarks() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let db_path = tmp.path().join("index.db");

        let writer = StoreWriter::spawn(Database::open(&db_path).expect("open")).expect("spawn");
        let tx = writer.sender();

        tx.send(Mutation::UpsertBookmark(BookmarkRow {
            id: 0,
            name: "home".into(),
            path: "/tmp/h".into(),
            is_network: false,
            last_scan: None,
        }))
        .unwrap();
        tx.send(Mutation::SetLastScan {
            bookmark_id: 0,
            secs: 42,
        })
        .unwrap();

        writer.flush();
        writer.shutdown();

        let db = Database::open(&db_path).expect("reopen");
        let loaded = db.load_bookmarks().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].last_scan, Some(42));
    }
}
