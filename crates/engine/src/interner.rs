use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::FileId;

/// Bidirectional path <-> id map.
///
/// Ids are handed out monotonically and never reused. The forward map is
/// ordered so that all descendants of a directory form one contiguous
/// key range; prefix removals and renames lean on that.
#[derive(Debug, Default)]
pub struct PathInterner {
    forward: BTreeMap<PathBuf, FileId>,
    reverse: BTreeMap<FileId, PathBuf>,
    next_id: FileId,
}

impl PathInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `path`, allocating the next one if the path is
    /// new. The flag reports whether an allocation happened.
    pub fn intern(&mut self, path: &Path) -> (FileId, bool) {
        if let Some(&id) = self.forward.get(path) {
            return (id, false);
        }

        let id = self.next_id;
        self.next_id += 1;
        self.forward.insert(path.to_path_buf(), id);
        self.reverse.insert(id, path.to_path_buf());
        (id, true)
    }

    /// Warm-start insertion of a persisted (path, id) pair. Keeps the
    /// allocation watermark above every id seen so far.
    pub fn intern_with_id(&mut self, path: &Path, id: FileId) {
        self.forward.insert(path.to_path_buf(), id);
        self.reverse.insert(id, path.to_path_buf());
        if id >= self.next_id {
            self.next_id = id + 1;
        }
    }

    pub fn lookup(&self, path: &Path) -> Option<FileId> {
        self.forward.get(path).copied()
    }

    pub fn resolve(&self, id: FileId) -> Option<&Path> {
        self.reverse.get(&id).map(PathBuf::as_path)
    }

    /// Drops both directions. Idempotent: a missing id is a no-op.
    pub fn forget(&mut self, id: FileId) {
        if let Some(path) = self.reverse.remove(&id) {
            self.forward.remove(&path);
        }
    }

    /// Re-keys `id` from its current path to `new_path`, preserving the
    /// id. Returns false if the id is unknown.
    pub fn rekey(&mut self, id: FileId, new_path: &Path) -> bool {
        let Some(old) = self.reverse.get(&id).cloned() else {
            return false;
        };
        self.forward.remove(&old);
        self.forward.insert(new_path.to_path_buf(), id);
        self.reverse.insert(id, new_path.to_path_buf());
        true
    }

    /// Ids of `prefix` itself and every path below it.
    pub fn ids_under(&self, prefix: &Path) -> Vec<FileId> {
        self.forward
            .range(prefix.to_path_buf()..)
            .take_while(|(p, _)| p.starts_with(prefix))
            .map(|(_, &id)| id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, FileId)> {
        self.forward.iter().map(|(p, &id)| (p.as_path(), id))
    }
}

#[cfg(test)]
#[path = "interner_tests.rs"]
mod tests;
