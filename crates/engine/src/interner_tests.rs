use super::*;

#[test]
fn intern_allocates_monotonically_and_is_idempotent() {
    let mut interner = PathInterner::new();

    let (a, created_a) = interner.intern(Path::new("/r/a.txt"));
    let (b, created_b) = interner.intern(Path::new("/r/b.txt"));
    let (a2, created_a2) = interner.intern(Path::new("/r/a.txt"));

    assert!(created_a && created_b);
    assert!(!created_a2);
    assert_eq!(a, a2);
    assert!(b > a, "ids must be monotonically assigned");
}

#[test]
fn resolve_and_lookup_are_mutual_inverses() {
    let mut interner = PathInterner::new();
    let (id, _) = interner.intern(Path::new("/r/sub/c.txt"));

    assert_eq!(interner.resolve(id), Some(Path::new("/r/sub/c.txt")));
    assert_eq!(interner.lookup(Path::new("/r/sub/c.txt")), Some(id));
}

#[test]
fn forget_removes_both_directions_and_is_idempotent() {
    let mut interner = PathInterner::new();
    let (id, _) = interner.intern(Path::new("/r/a.txt"));

    interner.forget(id);
    assert_eq!(interner.resolve(id), None);
    assert_eq!(interner.lookup(Path::new("/r/a.txt")), None);
    assert!(interner.is_empty());

    // Second forget must be a no-op.
    interner.forget(id);
}

#[test]
fn forgotten_ids_are_never_reused() {
    let mut interner = PathInterner::new();
    let (a, _) = interner.intern(Path::new("/r/a.txt"));
    interner.forget(a);

    let (b, _) = interner.intern(Path::new("/r/b.txt"));
    assert!(b > a, "id {a} must not be reused after forget");
}

#[test]
fn intern_with_id_bumps_the_watermark() {
    let mut interner = PathInterner::new();
    interner.intern_with_id(Path::new("/r/a.txt"), 41);

    let (next, created) = interner.intern(Path::new("/r/b.txt"));
    assert!(created);
    assert_eq!(next, 42, "fresh ids must start above persisted ones");
}

#[test]
fn ids_under_returns_the_prefix_subtree_only() {
    let mut interner = PathInterner::new();
    let (dir, _) = interner.intern(Path::new("/r/sub"));
    let (inner, _) = interner.intern(Path::new("/r/sub/c.txt"));
    let (_other, _) = interner.intern(Path::new("/r/subs.txt"));
    let (_sibling, _) = interner.intern(Path::new("/r/a.txt"));

    let mut under = interner.ids_under(Path::new("/r/sub"));
    under.sort_unstable();
    assert_eq!(
        under,
        vec![dir, inner],
        "/r/subs.txt shares a string prefix but not a path prefix"
    );
}

#[test]
fn rekey_preserves_the_id() {
    let mut interner = PathInterner::new();
    let (id, _) = interner.intern(Path::new("/r/foo.txt"));

    assert!(interner.rekey(id, Path::new("/r/bar.txt")));
    assert_eq!(interner.lookup(Path::new("/r/foo.txt")), None);
    assert_eq!(interner.lookup(Path::new("/r/bar.txt")), Some(id));
    assert_eq!(interner.resolve(id), Some(Path::new("/r/bar.txt")));

    assert!(!interner.rekey(9999, Path::new("/r/x")));
}
