use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use nixnav_protocol::SearchMode;

use crate::{
    BookmarkId, FileId, PathInterner, Trigram, basename_trigrams,
    query::{QuerySpec, contains_lowercase, match_rank},
};

/// Hard ceiling on result-set size, regardless of the requested limit.
pub const MAX_RESULTS: usize = 2000;

/// Per-entry metadata. The path itself lives in the interner.
#[derive(Debug, Clone, Copy)]
struct FileMeta {
    is_dir: bool,
    mtime: i64,
    size: u64,
    bookmark_id: BookmarkId,
}

/// Borrowed view of one indexed entry.
#[derive(Debug, Clone, Copy)]
pub struct FileRecord<'a> {
    pub id: FileId,
    pub path: &'a Path,
    pub is_dir: bool,
    pub mtime: i64,
    pub size: u64,
    pub bookmark_id: BookmarkId,
}

/// One reconciliation slice: records to stat, plus the cursor to resume
/// the round-robin from next cycle.
#[derive(Debug)]
pub struct ReconcileBatch {
    pub items: Vec<(FileId, PathBuf, i64, u64)>,
    pub cursor: Option<FileId>,
}

/// The authoritative in-memory index: path interner, per-entry metadata
/// and the trigram posting lists. All mutation goes through here; the
/// persistence layer only ever receives copies.
#[derive(Debug, Default)]
pub struct IndexStore {
    interner: PathInterner,
    metas: BTreeMap<FileId, FileMeta>,
    postings: HashMap<Trigram, Vec<FileId>>,
    file_count: u64,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or refreshes a path. Idempotent: an existing path keeps
    /// its FileId and only the metadata is updated (a path's basename
    /// cannot change without the path changing).
    pub fn insert(
        &mut self,
        path: &Path,
        is_dir: bool,
        mtime: i64,
        size: u64,
        bookmark_id: BookmarkId,
    ) -> FileId {
        let (id, created) = self.interner.intern(path);
        let meta = FileMeta {
            is_dir,
            mtime,
            size,
            bookmark_id,
        };

        if created {
            for tri in basename_trigrams(path) {
                posting_add(self.postings.entry(tri).or_default(), id);
            }
            if !is_dir {
                self.file_count += 1;
            }
            self.metas.insert(id, meta);
        } else if let Some(existing) = self.metas.get_mut(&id) {
            if existing.is_dir != is_dir {
                if is_dir {
                    self.file_count -= 1;
                } else {
                    self.file_count += 1;
                }
            }
            *existing = meta;
        }

        id
    }

    /// Warm-start insertion of a persisted record with its original id.
    pub fn insert_with_id(
        &mut self,
        id: FileId,
        path: &Path,
        is_dir: bool,
        mtime: i64,
        size: u64,
        bookmark_id: BookmarkId,
    ) {
        self.interner.intern_with_id(path, id);
        for tri in basename_trigrams(path) {
            posting_add(self.postings.entry(tri).or_default(), id);
        }
        if !is_dir {
            self.file_count += 1;
        }
        self.metas.insert(
            id,
            FileMeta {
                is_dir,
                mtime,
                size,
                bookmark_id,
            },
        );
    }

    /// Forgets a single path. Returns the id it held, if any.
    pub fn remove(&mut self, path: &Path) -> Option<FileId> {
        let id = self.interner.lookup(path)?;
        self.remove_by_id(id);
        Some(id)
    }

    /// Forgets a record by id. Idempotent.
    pub fn remove_by_id(&mut self, id: FileId) {
        let Some(path) = self.interner.resolve(id).map(Path::to_path_buf) else {
            return;
        };
        for tri in basename_trigrams(&path) {
            posting_remove(&mut self.postings, tri, id);
        }
        if let Some(meta) = self.metas.remove(&id) {
            if !meta.is_dir {
                self.file_count -= 1;
            }
        }
        self.interner.forget(id);
    }

    /// Forgets a path and every descendant. Returns how many records
    /// were dropped.
    pub fn remove_prefix(&mut self, prefix: &Path) -> usize {
        let ids = self.interner.ids_under(prefix);
        let n = ids.len();
        for id in ids {
            self.remove_by_id(id);
        }
        n
    }

    /// Moves `old` to `new`, preserving every FileId involved. A renamed
    /// directory carries its descendants along by prefix substitution;
    /// their basenames (and hence posting lists) are untouched.
    ///
    /// Returns the id of the renamed entry, or None when `old` was not
    /// indexed (the caller then treats the event as a plain create).
    pub fn rename(&mut self, old: &Path, new: &Path) -> Option<FileId> {
        let id = self.interner.lookup(old)?;
        if old == new {
            return Some(id);
        }

        // A pre-existing record at the target loses; last writer wins.
        if let Some(clobbered) = self.interner.lookup(new) {
            if clobbered != id {
                self.remove_by_id(clobbered);
            }
        }

        for desc in self.interner.ids_under(old) {
            let desc_path = self
                .interner
                .resolve(desc)
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let new_path = if desc == id {
                new.to_path_buf()
            } else {
                match desc_path.strip_prefix(old) {
                    Ok(rel) => new.join(rel),
                    Err(_) => continue,
                }
            };
            self.interner.rekey(desc, &new_path);
        }

        // Only the renamed entry itself can change basename.
        if old.file_name() != new.file_name() {
            for tri in basename_trigrams(old) {
                posting_remove(&mut self.postings, tri, id);
            }
            for tri in basename_trigrams(new) {
                posting_add(self.postings.entry(tri).or_default(), id);
            }
        }

        Some(id)
    }

    /// Refreshes mtime and size after a metadata-only change.
    pub fn update_meta(&mut self, id: FileId, mtime: i64, size: u64) {
        if let Some(meta) = self.metas.get_mut(&id) {
            meta.mtime = mtime;
            meta.size = size;
        }
    }

    pub fn get(&self, id: FileId) -> Option<FileRecord<'_>> {
        let meta = self.metas.get(&id)?;
        let path = self.interner.resolve(id)?;
        Some(FileRecord {
            id,
            path,
            is_dir: meta.is_dir,
            mtime: meta.mtime,
            size: meta.size,
            bookmark_id: meta.bookmark_id,
        })
    }

    pub fn lookup(&self, path: &Path) -> Option<FileId> {
        self.interner.lookup(path)
    }

    /// Count of non-directory records.
    pub fn file_count(&self) -> u64 {
        self.file_count
    }

    /// Count of every record, directories included.
    pub fn entry_count(&self) -> usize {
        self.metas.len()
    }

    /// Number of distinct trigrams with a live posting list.
    pub fn trigram_count(&self) -> usize {
        self.postings.len()
    }

    /// Non-directory records under the given roots (all records when the
    /// root set is empty).
    pub fn files_under(&self, roots: &[PathBuf]) -> u64 {
        if roots.is_empty() {
            return self.file_count;
        }
        let mut n = 0;
        for root in roots {
            for id in self.interner.ids_under(root) {
                if let Some(meta) = self.metas.get(&id) {
                    if !meta.is_dir {
                        n += 1;
                    }
                }
            }
        }
        n
    }

    /// Executes a parsed query. Results carry the full ordering
    /// guarantee: exact basename match, then basename prefix, then plain
    /// substring; ties broken by path length, then path bytes.
    pub fn query(&self, spec: &QuerySpec) -> Vec<FileRecord<'_>> {
        let needle_lower = spec.needle.to_lowercase();
        let tris = crate::trigrams_for_str(&spec.needle);

        let candidates = if tris.is_empty() {
            self.enumerate_candidates(&spec.roots)
        } else {
            self.intersect_postings(&tris)
        };
        log::debug!(
            "query {:?}: {} trigrams, {} candidates",
            spec.needle,
            tris.len(),
            candidates.len()
        );

        let mut hits: Vec<FileRecord<'_>> = Vec::new();
        for id in candidates {
            let Some(rec) = self.get(id) else { continue };

            if !spec.roots.is_empty() && !spec.roots.iter().any(|r| rec.path.starts_with(r)) {
                continue;
            }

            match spec.mode {
                SearchMode::Files => {
                    if rec.is_dir {
                        continue;
                    }
                }
                SearchMode::Dirs => {
                    if !rec.is_dir {
                        continue;
                    }
                }
                // A bare enumeration lists files; directories only
                // surface for a concrete search string or mode=dirs.
                SearchMode::All => {
                    if needle_lower.is_empty() && rec.is_dir {
                        continue;
                    }
                }
            }

            let name = rec
                .path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default();
            if !contains_lowercase(&name, &needle_lower) {
                continue;
            }

            if let Some(filter) = &spec.extension {
                let matches = rec
                    .path
                    .extension()
                    .map(|e| e.eq_ignore_ascii_case(filter.as_str()))
                    .unwrap_or(false);
                if !matches {
                    continue;
                }
            }

            hits.push(rec);
        }

        let mut ranked: Vec<(u8, FileRecord<'_>)> = hits
            .into_iter()
            .map(|rec| {
                let name = rec
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy())
                    .unwrap_or_default();
                (match_rank(&name, &needle_lower), rec)
            })
            .collect();

        ranked.sort_by(|(rank_a, a), (rank_b, b)| {
            rank_a
                .cmp(rank_b)
                .then_with(|| a.path.as_os_str().len().cmp(&b.path.as_os_str().len()))
                .then_with(|| a.path.as_os_str().cmp(b.path.as_os_str()))
        });

        let mut out: Vec<FileRecord<'_>> = ranked.into_iter().map(|(_, rec)| rec).collect();
        out.truncate(spec.limit.min(MAX_RESULTS));
        out
    }

    /// Next slice of the reconciliation round-robin. Wraps to the start
    /// of the id space after the tail.
    pub fn reconcile_batch(&self, after: Option<FileId>, max: usize) -> ReconcileBatch {
        let mut items = Vec::with_capacity(max.min(self.metas.len()));

        let take_from = |items: &mut Vec<(FileId, PathBuf, i64, u64)>, start: Option<FileId>| {
            let range: Box<dyn Iterator<Item = (&FileId, &FileMeta)>> = match start {
                Some(s) => Box::new(
                    self.metas
                        .range((std::ops::Bound::Excluded(s), std::ops::Bound::Unbounded)),
                ),
                None => Box::new(self.metas.iter()),
            };
            for (&id, meta) in range {
                if items.len() >= max {
                    break;
                }
                if let Some(path) = self.interner.resolve(id) {
                    items.push((id, path.to_path_buf(), meta.mtime, meta.size));
                }
            }
        };

        take_from(&mut items, after);
        if items.is_empty() && after.is_some() {
            // Tail reached: wrap around.
            take_from(&mut items, None);
        }

        let cursor = items.last().map(|(id, ..)| *id);
        ReconcileBatch { items, cursor }
    }

    /// Candidate set for zero-trigram queries: everything under the
    /// roots, or the whole index without a root filter.
    fn enumerate_candidates(&self, roots: &[PathBuf]) -> Vec<FileId> {
        if roots.is_empty() {
            return self.metas.keys().copied().collect();
        }
        let mut ids = Vec::new();
        for root in roots {
            ids.extend(self.interner.ids_under(root));
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Intersects the posting lists of all trigrams, shortest first. A
    /// trigram with no posting list proves there is no match.
    fn intersect_postings(&self, tris: &[Trigram]) -> Vec<FileId> {
        let mut lists: Vec<&Vec<FileId>> = Vec::with_capacity(tris.len());
        for tri in tris {
            match self.postings.get(tri) {
                Some(list) => lists.push(list),
                None => return Vec::new(),
            }
        }
        lists.sort_by_key(|l| l.len());

        let mut iter = lists.into_iter();
        let Some(first) = iter.next() else {
            return Vec::new();
        };
        let mut current = first.clone();
        for list in iter {
            current = intersect_sorted(&current, list);
            if current.is_empty() {
                break;
            }
        }
        current
    }
}

/// Insert `id` into a sorted posting list, keeping order and uniqueness.
fn posting_add(list: &mut Vec<FileId>, id: FileId) {
    match list.last() {
        // Ids are usually appended in increasing order.
        Some(&last) if last < id => list.push(id),
        Some(_) => {
            if let Err(pos) = list.binary_search(&id) {
                list.insert(pos, id);
            }
        }
        None => list.push(id),
    }
}

/// Remove `id` from a posting list; drop the list when it empties so a
/// trigram lives exactly as long as a file references it.
fn posting_remove(postings: &mut HashMap<Trigram, Vec<FileId>>, tri: Trigram, id: FileId) {
    if let Some(list) = postings.get_mut(&tri) {
        if let Ok(pos) = list.binary_search(&id) {
            list.remove(pos);
        }
        if list.is_empty() {
            postings.remove(&tri);
        }
    }
}

/// Linear-time intersection of two ascending id lists.
fn intersect_sorted(a: &[FileId], b: &[FileId]) -> Vec<FileId> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
