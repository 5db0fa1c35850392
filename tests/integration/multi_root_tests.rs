use super::support::{content, run, write};
use tempfile::tempdir;

#[test]
fn test_duplicates_across_roots() {
    let one = tempdir().unwrap();
    let two = tempdir().unwrap();
    write(one.path(), "photo.jpg", &content(1, 10_000));
    write(two.path(), "copy/photo.jpg", &content(1, 10_000));
    write(two.path(), "other.jpg", &content(2, 10_000));

    let summary = run(&[one.path(), two.path()], 4096, true);

    assert_eq!(summary.stats.files_seen, 3);
    assert_eq!(summary.files_reclaimed(), 1);
}

#[test]
fn test_nested_root_is_walked_once() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("sub");
    write(dir.path(), "a.bin", &content(3, 10_000));
    write(&sub, "b.bin", &content(3, 10_000));
    write(&sub, "c.bin", &content(4, 10_000));

    let nested = run(&[dir.path(), &sub], 4096, true);
    let single = run(&[dir.path()], 4096, true);

    assert_eq!(nested.stats.files_seen, 3);
    assert_eq!(nested.stats.entries_skipped, 2);
    assert_eq!(nested.files_reclaimed(), single.files_reclaimed());
    assert_eq!(nested.files_reclaimed(), 1);
}

#[test]
fn test_same_root_twice() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.bin", &content(5, 10_000));
    write(dir.path(), "b.bin", &content(6, 10_000));

    // a path must never be paired with itself
    let summary = run(&[dir.path(), dir.path()], 4096, true);
    assert_eq!(summary.stats.files_seen, 2);
    assert_eq!(summary.files_reclaimed(), 0);
}
