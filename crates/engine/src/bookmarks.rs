use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;

use crate::BookmarkId;

/// A named filesystem root registered for indexing.
#[derive(Debug, Clone)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub name: String,
    pub path: PathBuf,
    pub is_network: bool,
    /// Seconds since epoch of the last completed scan.
    pub last_scan: Option<i64>,
}

/// The set of roots the daemon currently indexes. Names and paths are
/// both unique; the name doubles as the `name:query` search prefix.
#[derive(Debug, Default)]
pub struct BookmarkRegistry {
    by_id: BTreeMap<BookmarkId, Bookmark>,
    name_to_id: HashMap<String, BookmarkId>,
    path_to_id: HashMap<PathBuf, BookmarkId>,
    next_id: BookmarkId,
}

impl BookmarkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a root. Re-adding the same (name, path) pair returns the
    /// existing bookmark; a clash on either key alone is an error.
    pub fn add(
        &mut self,
        name: &str,
        path: &Path,
        is_network: bool,
    ) -> Result<BookmarkId, String> {
        let by_name = self.name_to_id.get(name).copied();
        let by_path = self.path_to_id.get(path).copied();

        match (by_name, by_path) {
            (Some(a), Some(b)) if a == b => return Ok(a),
            (None, None) => {}
            (Some(_), _) => return Err(format!("bookmark name {name:?} is already in use")),
            (_, Some(_)) => {
                return Err(format!(
                    "bookmark path {} is already registered",
                    path.display()
                ));
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.insert_unchecked(Bookmark {
            id,
            name: name.to_owned(),
            path: path.to_path_buf(),
            is_network,
            last_scan: None,
        });
        Ok(id)
    }

    /// Warm-start insertion of a persisted bookmark, keeping the id
    /// watermark above everything loaded.
    pub fn add_with_id(&mut self, bookmark: Bookmark) {
        if bookmark.id >= self.next_id {
            self.next_id = bookmark.id + 1;
        }
        self.insert_unchecked(bookmark);
    }

    fn insert_unchecked(&mut self, bookmark: Bookmark) {
        self.name_to_id.insert(bookmark.name.clone(), bookmark.id);
        self.path_to_id.insert(bookmark.path.clone(), bookmark.id);
        self.by_id.insert(bookmark.id, bookmark);
    }

    pub fn get(&self, id: BookmarkId) -> Option<&Bookmark> {
        self.by_id.get(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Bookmark> {
        self.name_to_id.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn by_path(&self, path: &Path) -> Option<&Bookmark> {
        self.path_to_id.get(path).and_then(|id| self.by_id.get(id))
    }

    /// The bookmark whose root is the longest prefix-parent of `path`.
    pub fn longest_prefix_match(&self, path: &Path) -> Option<&Bookmark> {
        self.by_id
            .values()
            .filter(|b| path.starts_with(&b.path))
            .max_by_key(|b| b.path.as_os_str().len())
    }

    pub fn set_last_scan(&mut self, id: BookmarkId, secs: i64) {
        if let Some(b) = self.by_id.get_mut(&id) {
            b.last_scan = Some(secs);
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bookmark> {
        self.by_id.values()
    }

    /// Roots that receive kernel change notifications.
    pub fn local_roots(&self) -> Vec<Bookmark> {
        self.by_id
            .values()
            .filter(|b| !b.is_network)
            .cloned()
            .collect()
    }

    /// Roots that must be polled by full rescan instead.
    pub fn network_roots(&self) -> Vec<Bookmark> {
        self.by_id
            .values()
            .filter(|b| b.is_network)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
#[path = "bookmarks_tests.rs"]
mod tests;
