use super::support::{content, run, run_observed, write, MIB};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_two_identical_one_different() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let data = content(1, 2 * MIB);
    // same size and prefix as the pair, so only the full digest tells it apart
    let mut last_byte_differs = data.clone();
    *last_byte_differs.last_mut().unwrap() ^= 0xff;
    let a = write(&root, "a.bin", &data);
    let b = write(&root, "b.bin", &data);
    let c = write(&root, "c.bin", &last_byte_differs);

    let (summary, pairs) = run_observed(&root, MIB as u64, false);

    assert_eq!(summary.stats.files_seen, 3);
    assert_eq!(summary.stats.files_hashed, 3);
    assert_eq!(summary.stats.duplicates_found, 1);
    assert_eq!(summary.files_reclaimed(), 1);
    assert_eq!(summary.bytes_reclaimed(), 2 * MIB as u64);
    assert_eq!(pairs, vec![(b.clone(), a.clone())]);

    assert_eq!(fs::read(&b).unwrap(), data);
    assert_eq!(fs::read(&c).unwrap(), last_byte_differs);
}

#[test]
fn test_group_pairs_with_single_representative() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let data = content(7, 8192);
    let first = write(&root, "1.bin", &data);
    for name in ["2.bin", "3.bin", "4.bin"] {
        write(&root, name, &data);
    }

    let (summary, pairs) = run_observed(&root, 4096, true);

    assert_eq!(summary.stats.duplicates_found, 3);
    assert_eq!(summary.files_reclaimed(), 3);
    assert_eq!(pairs.len(), 3);
    assert!(pairs.iter().all(|(_, partner)| partner == &first));
    assert!(pairs.iter().all(|(dup, _)| dup != &first));
}

#[test]
fn test_same_prefix_different_tail() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let mut x = content(3, 16 * 1024);
    write(&root, "x.bin", &x);
    *x.last_mut().unwrap() ^= 0xff;
    write(&root, "y.bin", &x);

    let summary = run(&[&root], 4096, false);

    assert_eq!(summary.stats.files_hashed, 2);
    assert_eq!(summary.stats.duplicates_found, 0);
    assert_eq!(summary.files_reclaimed(), 0);
}

#[test]
fn test_unique_sizes_are_never_hashed() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root, "a.bin", &content(1, 5000));
    write(&root, "b.bin", &content(1, 6000));
    write(&root, "sub/c.bin", &content(1, 7000));

    let summary = run(&[&root], 4096, false);

    assert_eq!(summary.stats.files_seen, 3);
    assert_eq!(summary.stats.files_hashed, 0);
}

#[test]
fn test_dry_run_matches_real_run() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    for i in 0..3u8 {
        for copy in 0..=i {
            write(&root, &format!("g{i}/f{copy}.bin"), &content(i, 10_000));
        }
    }
    let before: Vec<_> = walk_mtimes(&root);

    let dry = run(&[&root], 4096, true);
    assert_eq!(walk_mtimes(&root), before);

    let real = run(&[&root], 4096, false);
    assert!(dry.dry_run);
    assert!(!real.dry_run);
    assert_eq!(dry.files_reclaimed(), real.files_reclaimed());
    assert_eq!(dry.bytes_reclaimed(), real.bytes_reclaimed());
    assert_eq!(real.files_reclaimed(), 3);
}

#[test]
fn test_summary_wording() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root, "a.bin", &content(1, 4096));
    write(&root, "b.bin", &content(1, 4096));

    let text = run(&[&root], 4096, true).to_string();
    assert!(text.contains("found 1 duplicates"));
    assert!(text.contains("Would reclaim 1 files"));
}

fn walk_mtimes(root: &std::path::Path) -> Vec<(std::path::PathBuf, std::time::SystemTime)> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let entry = entry.unwrap();
            let meta = entry.metadata().unwrap();
            if meta.is_dir() {
                stack.push(entry.path());
            } else {
                out.push((entry.path(), meta.modified().unwrap()));
            }
        }
    }
    out.sort();
    out
}
