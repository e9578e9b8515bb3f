use super::*;

use crossbeam::channel;
use std::fs::{create_dir, create_dir_all, write};

fn collect(root: &Path) -> (usize, Vec<ScanEntry>) {
    let ctx = ScanContext::default();
    let (tx, rx) = channel::unbounded::<Vec<ScanEntry>>();

    let count = walk(root, &ctx, &tx);
    drop(tx);

    let mut entries = Vec::new();
    while let Ok(batch) = rx.try_recv() {
        entries.extend(batch);
    }
    (count, entries)
}

fn rel_paths(root: &Path, entries: &[ScanEntry]) -> Vec<PathBuf> {
    let mut rels: Vec<PathBuf> = entries
        .iter()
        .map(|e| e.path.strip_prefix(root).unwrap().to_path_buf())
        .collect();
    rels.sort();
    rels
}

#[test]
fn walk_emits_files_and_directories_recursively() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let root = tmp.path();

    // root/
    //   a.txt
    //   sub/
    //     c.txt
    write(root.join("a.txt"), b"a").expect("write a.txt");
    create_dir(root.join("sub")).expect("create sub");
    write(root.join("sub").join("c.txt"), b"c").expect("write c.txt");

    let (count, entries) = collect(root);

    assert_eq!(count, 3);
    assert_eq!(
        rel_paths(root, &entries),
        vec![
            PathBuf::from("a.txt"),
            PathBuf::from("sub"),
            PathBuf::from("sub/c.txt"),
        ]
    );

    let sub = entries.iter().find(|e| e.path.ends_with("sub")).unwrap();
    assert!(sub.is_dir);
    assert_eq!(sub.size, 0);

    let a = entries.iter().find(|e| e.path.ends_with("a.txt")).unwrap();
    assert!(!a.is_dir);
    assert_eq!(a.size, 1);
    assert!(a.mtime > 0);
}

#[test]
fn walk_prunes_excluded_components_without_recursing() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let root = tmp.path();

    write(root.join("a.txt"), b"a").expect("write a.txt");
    create_dir_all(root.join(".git").join("objects")).expect("create .git");
    for i in 0..20 {
        write(root.join(".git").join("objects").join(format!("o{i}")), b"x").expect("write obj");
    }
    create_dir(root.join("node_modules")).expect("create node_modules");
    write(root.join("node_modules").join("pkg.json"), b"{}").expect("write pkg");

    let (count, entries) = collect(root);

    assert_eq!(count, 1, "only a.txt survives the exclusions");
    assert_eq!(rel_paths(root, &entries), vec![PathBuf::from("a.txt")]);
}

#[test]
fn walk_prunes_dot_trash_glob() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let root = tmp.path();

    create_dir(root.join(".Trash-1000")).expect("create trash");
    write(root.join(".Trash-1000").join("old.txt"), b"x").expect("write old");
    write(root.join("keep.txt"), b"k").expect("write keep");

    let (count, entries) = collect(root);

    assert_eq!(count, 1);
    assert_eq!(rel_paths(root, &entries), vec![PathBuf::from("keep.txt")]);
}

#[cfg(unix)]
#[test]
fn walk_terminates_on_symlink_cycles() {
    use std::os::unix::fs::symlink;

    let tmp = tempfile::tempdir().expect("create temp dir");
    let root = tmp.path();

    create_dir(root.join("sub")).expect("create sub");
    write(root.join("sub").join("c.txt"), b"c").expect("write c.txt");
    // sub/loop points back at the scan root.
    symlink(root, root.join("sub").join("loop")).expect("create cycle");

    let (count, entries) = collect(root);

    // sub, sub/c.txt and the loop entry itself; the cycle is entered at
    // most once thanks to the inode set.
    assert!(count >= 3, "walk must terminate, saw {count} entries");
    assert!(
        entries
            .iter()
            .any(|e| e.path == root.join("sub").join("loop") && e.is_dir)
    );
}

#[test]
fn walk_on_missing_root_emits_nothing() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let missing = tmp.path().join("nope");

    let (count, entries) = collect(&missing);
    assert_eq!(count, 0);
    assert!(entries.is_empty());
}
