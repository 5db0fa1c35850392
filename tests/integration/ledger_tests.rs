use super::support::{content, run_with_ledger, write};
use dupreclaim::ledger::ReclaimLedger;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_second_run_reclaims_nothing() {
    let dir = tempdir().unwrap();
    let state = tempdir().unwrap();
    let ledger = state.path().join("ledger.sqlite3");
    let root = dir.path().canonicalize().unwrap();
    for name in ["a.bin", "b.bin", "c.bin"] {
        write(&root, name, &content(1, 8192));
    }

    let first = run_with_ledger(&root, 4096, &ledger);
    assert_eq!(first.files_reclaimed(), 2);
    assert_eq!(first.stats.already_reclaimed, 0);

    let second = run_with_ledger(&root, 4096, &ledger);
    assert_eq!(second.stats.duplicates_found, 2);
    assert_eq!(second.files_reclaimed(), 0);
    assert_eq!(second.stats.already_reclaimed, 2);

    assert_eq!(ReclaimLedger::open(&ledger).unwrap().len().unwrap(), 3);
}

#[test]
fn test_changed_file_is_reclaimed_again() {
    let dir = tempdir().unwrap();
    let state = tempdir().unwrap();
    let ledger = state.path().join("ledger.sqlite3");
    let root = dir.path().canonicalize().unwrap();
    write(&root, "a.bin", &content(2, 8192));
    let b = write(&root, "b.bin", &content(2, 8192));

    assert_eq!(run_with_ledger(&root, 4096, &ledger).files_reclaimed(), 1);

    // rewrite b with the same bytes: new inode and mtime, so not settled
    fs::remove_file(&b).unwrap();
    write(&root, "b.bin", &content(2, 8192));

    let again = run_with_ledger(&root, 4096, &ledger);
    assert_eq!(again.files_reclaimed(), 1);
    assert_eq!(again.stats.already_reclaimed, 0);
}

#[test]
fn test_new_copy_still_reclaimed_after_settled_pair() {
    let dir = tempdir().unwrap();
    let state = tempdir().unwrap();
    let ledger = state.path().join("ledger.sqlite3");
    let root = dir.path().canonicalize().unwrap();
    write(&root, "a.bin", &content(3, 8192));
    write(&root, "b.bin", &content(3, 8192));
    assert_eq!(run_with_ledger(&root, 4096, &ledger).files_reclaimed(), 1);

    write(&root, "c.bin", &content(3, 8192));
    let again = run_with_ledger(&root, 4096, &ledger);
    assert_eq!(again.stats.already_reclaimed, 1);
    assert_eq!(again.files_reclaimed(), 1);
}
