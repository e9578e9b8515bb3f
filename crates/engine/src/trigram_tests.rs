use super::*;
use std::path::Path;

fn assert_sorted(tris: &[Trigram]) {
    for w in tris.windows(2) {
        assert!(w[0] < w[1], "trigrams not sorted/deduped: {:?}", w);
    }
}

#[test]
fn ascii_fold_lowercases_ascii_letters_and_preserves_others() {
    for (upper, lower) in ('A'..='Z').zip('a'..='z') {
        assert_eq!(ascii_fold(upper as u8), lower as u8);
        assert_eq!(ascii_fold(lower as u8), lower as u8);
    }

    assert_eq!(ascii_fold(b'0'), b'0');
    assert_eq!(ascii_fold(b'_'), b'_');
    // Non-ASCII byte must be unchanged
    assert_eq!(ascii_fold(0xFF), 0xFF);
}

#[test]
fn trigram_from_bytes_and_to_bytes_roundtrip() {
    let cases = &[
        (b'a', b'b', b'c'),
        (0u8, 0u8, 0u8),
        (255u8, 1u8, 2u8),
        (b'X', b'Y', b'Z'),
    ];

    for &(b0, b1, b2) in cases {
        let tri = Trigram::from_bytes(b0, b1, b2);
        assert_eq!(tri.to_bytes(), [b0, b1, b2]);
    }
}

#[test]
fn trigrams_for_str_sliding_windows_with_case_folding() {
    let tris = trigrams_for_str("AbCd");

    let expected = vec![
        Trigram::from_bytes(b'a', b'b', b'c'),
        Trigram::from_bytes(b'b', b'c', b'd'),
    ];

    assert_sorted(&tris);
    assert_eq!(tris, expected);
}

#[test]
fn trigrams_for_str_deduplicates() {
    // "AAAA" folds to "aaaa": two identical windows
    let tris = trigrams_for_str("AAAA");

    assert_eq!(tris.len(), 1);
    assert_eq!(tris[0], Trigram::from_bytes(b'a', b'a', b'a'));
}

#[test]
fn short_inputs_produce_no_trigrams() {
    assert!(trigrams_for_str("").is_empty());
    assert!(trigrams_for_str("a").is_empty());
    assert!(trigrams_for_str("ab").is_empty());
}

#[test]
fn non_ascii_bytes_pass_through() {
    // "中Ab": 3 bytes of UTF-8 plus two ASCII letters
    let s = "中Ab";
    let norm = normalize(s.as_bytes());
    assert_eq!(norm.len(), s.len());

    let tris = trigrams_for_str(s);
    assert_eq!(tris.len(), 3);

    let mut expected: Vec<Trigram> = norm
        .windows(3)
        .map(|w| Trigram::from_bytes(w[0], w[1], w[2]))
        .collect();
    expected.sort_unstable();
    expected.dedup();

    assert_eq!(tris, expected);
}

#[test]
fn basename_trigrams_ignore_directory_components() {
    let from_path = basename_trigrams(Path::new("/Very/Deep/Tree/ReadMe.md"));
    let from_name = trigrams_for_str("readme.md");

    assert_eq!(
        from_path, from_name,
        "directory components must not contribute trigrams"
    );
}

#[test]
fn basename_trigrams_of_root_is_empty() {
    assert!(basename_trigrams(Path::new("/")).is_empty());
}

#[test]
fn query_and_index_side_agree() {
    // The verification predicate relies on both sides extracting the
    // exact same windows.
    for name in ["notes.md", "ReadMe.TXT", "a", "профиль.txt"] {
        let path = format!("/tmp/h/{name}");
        assert_eq!(
            basename_trigrams(Path::new(&path)),
            trigrams_for_str(name),
            "index/query divergence for {name:?}"
        );
    }
}
