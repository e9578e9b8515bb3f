use std::path::Path;

use rusqlite::Connection;
use thiserror::Error;

/// Bumped when the table layout changes; an older database is dropped
/// and rebuilt from a fresh scan rather than migrated.
const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// One row of the files table.
#[derive(Debug, Clone)]
pub struct FileRow {
    pub id: u64,
    pub path: String,
    pub is_dir: bool,
    pub mtime: i64,
    pub size: u64,
    pub bookmark_id: u64,
}

/// One row of the bookmarks table.
#[derive(Debug, Clone)]
pub struct BookmarkRow {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub is_network: bool,
    pub last_scan: Option<i64>,
}

/// The embedded relational store. Holds files and bookmarks only;
/// posting lists are rebuilt from `files.path` at warm start, which
/// keeps the database small for a few seconds of startup work.
///
/// Not Sync: after warm start the connection moves into the single
/// writer thread and never leaves it.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        apply_pragmas(&conn)?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory database for tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        apply_pragmas(&conn)?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Streams every file row into `f`, in ascending id order.
    pub fn load_files<F>(&self, mut f: F) -> Result<usize, StoreError>
    where
        F: FnMut(FileRow),
    {
        let mut stmt = self.conn.prepare(
            "SELECT id, path, is_dir, mtime, size, bookmark_id FROM files ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(FileRow {
                id: row.get::<_, i64>(0)? as u64,
                path: row.get(1)?,
                is_dir: row.get::<_, i64>(2)? != 0,
                mtime: row.get(3)?,
                size: row.get::<_, i64>(4)? as u64,
                bookmark_id: row.get::<_, i64>(5)? as u64,
            })
        })?;

        let mut n = 0;
        for row in rows {
            f(row?);
            n += 1;
        }
        Ok(n)
    }

    pub fn load_bookmarks(&self) -> Result<Vec<BookmarkRow>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, path, is_network, last_scan FROM bookmarks ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(BookmarkRow {
                    id: row.get::<_, i64>(0)? as u64,
                    name: row.get(1)?,
                    path: row.get(2)?,
                    is_network: row.get::<_, i64>(3)? != 0,
                    last_scan: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn file_count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    pub fn upsert_file(&self, row: &FileRow) -> Result<(), StoreError> {
        self.conn.execute(
            r"
            INSERT INTO files (id, path, is_dir, mtime, size, bookmark_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                path = excluded.path,
                is_dir = excluded.is_dir,
                mtime = excluded.mtime,
                size = excluded.size,
                bookmark_id = excluded.bookmark_id
            ",
            rusqlite::params![
                row.id as i64,
                row.path,
                row.is_dir as i64,
                row.mtime,
                row.size as i64,
                row.bookmark_id as i64
            ],
        )?;
        Ok(())
    }

    pub fn remove_file(&self, path: &str) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM files WHERE path = ?1", rusqlite::params![path])?;
        Ok(())
    }

    /// Deletes a path and all rows beneath it.
    pub fn remove_prefix(&self, prefix: &str) -> Result<(), StoreError> {
        self.conn.execute(
            r"DELETE FROM files WHERE path = ?1 OR path LIKE ?2 ESCAPE '\'",
            rusqlite::params![prefix, like_prefix(prefix)],
        )?;
        Ok(())
    }

    /// Prefix-substitutes the paths of a renamed entry and all rows
    /// beneath it; ids are untouched.
    pub fn rename_prefix(&self, old: &str, new: &str) -> Result<(), StoreError> {
        self.conn.execute(
            r"
            UPDATE files
            SET path = ?2 || substr(path, length(?1) + 1)
            WHERE path = ?1 OR path LIKE ?3 ESCAPE '\'
            ",
            rusqlite::params![old, new, like_prefix(old)],
        )?;
        Ok(())
    }

    pub fn upsert_bookmark(&self, row: &BookmarkRow) -> Result<(), StoreError> {
        self.conn.execute(
            r"
            INSERT INTO bookmarks (id, name, path, is_network, last_scan)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                path = excluded.path,
                is_network = excluded.is_network,
                last_scan = excluded.last_scan
            ",
            rusqlite::params![
                row.id as i64,
                row.name,
                row.path,
                row.is_network as i64,
                row.last_scan
            ],
        )?;
        Ok(())
    }

    pub fn set_last_scan(&self, bookmark_id: u64, secs: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE bookmarks SET last_scan = ?2 WHERE id = ?1",
            rusqlite::params![bookmark_id as i64, secs],
        )?;
        Ok(())
    }

    pub(crate) fn begin(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    pub(crate) fn commit(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    pub(crate) fn rollback(&self) {
        // Best effort; a failed rollback leaves the transaction to die
        // with the connection.
        let _ = self.conn.execute_batch("ROLLBACK");
    }
}

fn apply_pragmas(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;
    Ok(())
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    let existing: Option<u32> = conn
        .query_row(
            "SELECT CAST(value AS INTEGER) FROM schema_info WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .ok();

    match existing {
        Some(v) if v >= SCHEMA_VERSION => return Ok(()),
        Some(_) => {
            conn.execute_batch(
                r"
                DROP TABLE IF EXISTS files;
                DROP TABLE IF EXISTS bookmarks;
                DROP TABLE IF EXISTS schema_info;
                ",
            )?;
        }
        None => {}
    }

    conn.execute_batch(&format!(
        r"
        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            is_dir INTEGER NOT NULL,
            mtime INTEGER NOT NULL,
            size INTEGER NOT NULL,
            bookmark_id INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS bookmarks (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            path TEXT NOT NULL UNIQUE,
            is_network INTEGER NOT NULL,
            last_scan INTEGER
        );

        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        ) WITHOUT ROWID;

        INSERT OR REPLACE INTO schema_info (key, value)
        VALUES ('version', '{SCHEMA_VERSION}');
        "
    ))?;

    Ok(())
}

/// LIKE pattern matching strict descendants of `prefix`, with the LIKE
/// metacharacters escaped so literal `%`/`_` in paths stay literal.
fn like_prefix(prefix: &str) -> String {
    let mut pat = String::with_capacity(prefix.len() + 4);
    for ch in prefix.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pat.push('\\');
        }
        pat.push(ch);
    }
    pat.push_str("/%");
    pat
}
