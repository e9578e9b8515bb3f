use super::*;
use crate::BookmarkRegistry;
use std::path::Path;

fn registry() -> BookmarkRegistry {
    let mut reg = BookmarkRegistry::new();
    reg.add("home", Path::new("/tmp/h"), false).expect("add home");
    reg.add("work", Path::new("/tmp/w"), false).expect("add work");
    reg
}

#[test]
fn plain_query_has_no_filters() {
    let reg = registry();
    let q = parse_query("readme", &reg);

    assert!(q.bookmark.is_none());
    assert!(q.extension.is_none());
    assert_eq!(q.needle, "readme");
}

#[test]
fn bookmark_prefix_narrows_and_is_stripped() {
    let reg = registry();
    let q = parse_query("home:notes", &reg);

    assert_eq!(q.bookmark.expect("bookmark").name, "home");
    assert_eq!(q.needle, "notes");
}

#[test]
fn unknown_prefix_keeps_the_colon_in_the_needle() {
    let reg = registry();
    let q = parse_query("c:autoexec", &reg);

    assert!(q.bookmark.is_none());
    assert_eq!(q.needle, "c:autoexec");
}

#[test]
fn extension_glob_sets_the_filter() {
    let reg = registry();
    let q = parse_query("*.py a", &reg);

    assert_eq!(q.extension.as_deref(), Some("py"));
    assert_eq!(q.needle, "a");
}

#[test]
fn extension_glob_without_trailing_tokens_is_a_literal_needle() {
    let reg = registry();
    let q = parse_query("*.py", &reg);

    assert!(q.extension.is_none());
    assert_eq!(q.needle, "*.py");
}

#[test]
fn bookmark_and_extension_compose() {
    let reg = registry();
    let q = parse_query("work:*.RS main", &reg);

    assert_eq!(q.bookmark.expect("bookmark").name, "work");
    assert_eq!(q.extension.as_deref(), Some("rs"), "filter is lowercased");
    assert_eq!(q.needle, "main");
}

#[test]
fn extension_glob_then_empty_needle_enumerates() {
    let reg = registry();
    let q = parse_query("*.md ", &reg);

    assert_eq!(q.extension.as_deref(), Some("md"));
    assert_eq!(q.needle, "");
}

#[test]
fn match_rank_orders_exact_prefix_substring() {
    assert_eq!(match_rank("readme", "readme"), 0);
    assert_eq!(match_rank("ReadMe", "readme"), 0, "rank is case-folded");
    assert_eq!(match_rank("readme.md", "readme"), 1);
    assert_eq!(match_rank("old_readme.md", "readme"), 2);
    assert_eq!(match_rank("anything", ""), 2);
}

#[test]
fn contains_lowercase_handles_ascii_and_unicode() {
    assert!(contains_lowercase("ReadMe.TXT", "readme"));
    assert!(contains_lowercase("ReadMe.TXT", "me.txt"));
    assert!(!contains_lowercase("read_me.md", "dme"));
    assert!(contains_lowercase("anything", ""));
    assert!(contains_lowercase("Профиль.txt", "профиль"));
    assert!(!contains_lowercase("short", "much longer needle"));
}
