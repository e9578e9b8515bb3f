mod bookmarks;
mod interner;
mod query;
mod store;
mod trigram;

pub use bookmarks::{Bookmark, BookmarkRegistry};
pub use interner::PathInterner;
pub use query::{DEFAULT_LIMIT, ParsedQuery, QuerySpec, parse_query};
pub use store::{FileRecord, IndexStore, MAX_RESULTS, ReconcileBatch};
pub use trigram::{Trigram, basename_trigrams, trigrams_for_str};

/// Stable identifier for an indexed path. Monotonically assigned and
/// never reused within an index lifetime; persisted as the files table
/// primary key.
pub type FileId = u64;

pub type BookmarkId = u64;
