use std::path::PathBuf;

use nixnav_protocol::SearchMode;

use crate::bookmarks::{Bookmark, BookmarkRegistry};

/// Limit applied when a request does not carry one.
pub const DEFAULT_LIMIT: usize = 500;

/// A fully parsed search: roots to search under (empty means the whole
/// index), which record kinds to return, the substring needle, an
/// optional extension filter and the result cap.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub roots: Vec<PathBuf>,
    pub mode: SearchMode,
    pub needle: String,
    pub extension: Option<String>,
    pub limit: usize,
}

/// Outcome of raw-query parsing: a bookmark the query narrowed itself
/// to, an extension filter, and the remaining search string.
#[derive(Debug)]
pub struct ParsedQuery<'r> {
    pub bookmark: Option<&'r Bookmark>,
    pub extension: Option<String>,
    pub needle: String,
}

/// Splits the user-facing query syntax:
///
/// 1. `NAME:REST` narrows to the bookmark called NAME (registered names
///    only; anything else keeps the `:` as part of the needle).
/// 2. `*.EXT TOKENS` (glob then whitespace) sets the extension filter.
/// 3. What remains is the case-insensitive substring to match; empty
///    means "enumerate under the filters".
pub fn parse_query<'r>(raw: &str, registry: &'r BookmarkRegistry) -> ParsedQuery<'r> {
    let mut bookmark = None;
    let mut remainder = raw.trim();

    if let Some((prefix, rest)) = remainder.split_once(':') {
        if let Some(b) = registry.by_name(prefix.trim()) {
            bookmark = Some(b);
            remainder = rest.trim();
        }
    }

    let mut extension = None;
    if let Some(stripped) = remainder.strip_prefix("*.") {
        if let Some(ws) = stripped.find(char::is_whitespace) {
            let ext = &stripped[..ws];
            if !ext.is_empty() {
                extension = Some(ext.to_ascii_lowercase());
                remainder = stripped[ws..].trim();
            }
        }
    }

    ParsedQuery {
        bookmark,
        extension,
        needle: remainder.to_owned(),
    }
}

/// Ordering class of a basename against the needle: exact match first,
/// then prefix, then plain substring.
pub(crate) fn match_rank(name: &str, needle_lower: &str) -> u8 {
    if needle_lower.is_empty() {
        return 2;
    }
    let name_lower = name.to_lowercase();
    if name_lower == needle_lower {
        0
    } else if name_lower.starts_with(needle_lower) {
        1
    } else {
        2
    }
}

/// Case-insensitive substring match with an ASCII fast path.
///
/// `needle_lower` must already be lowercased.
pub(crate) fn contains_lowercase(haystack: &str, needle_lower: &str) -> bool {
    if needle_lower.is_empty() {
        return true;
    }

    if haystack.is_ascii() && needle_lower.is_ascii() {
        let h = haystack.as_bytes();
        let n = needle_lower.as_bytes();

        if n.len() > h.len() {
            return false;
        }

        'outer: for start in 0..=(h.len() - n.len()) {
            for (i, &nb) in n.iter().enumerate() {
                if h[start + i].to_ascii_lowercase() != nb {
                    continue 'outer;
                }
            }
            return true;
        }
        false
    } else {
        haystack.to_lowercase().contains(needle_lower)
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
