use super::support::{config, content, write};
use dupreclaim::actions::{ClonePolicy, ReclaimConfig, Reclaimer, Verifier, TEMP_SUFFIX};
use dupreclaim::duplicates::{Pipeline, PipelineError};
use std::fs;
use tempfile::tempdir;

fn leftover_temps(dir: &std::path::Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(TEMP_SUFFIX))
        .count()
}

#[test]
fn test_reclaim_leaves_no_temp_files() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    for name in ["a.bin", "b.bin", "c.bin"] {
        write(&root, name, &content(9, 20_000));
    }

    let reclaimer =
        Reclaimer::new(ReclaimConfig::default().with_policy(ClonePolicy::ReflinkOrCopy));
    let summary = Pipeline::new(config(4096), reclaimer)
        .run(&[root.clone()])
        .unwrap();

    assert_eq!(summary.files_reclaimed(), 2);
    assert_eq!(leftover_temps(&root), 0);
    for name in ["a.bin", "b.bin", "c.bin"] {
        assert_eq!(fs::read(root.join(name)).unwrap(), content(9, 20_000));
    }
}

#[test]
fn test_reflink_only_never_fails_the_run() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root, "a.bin", &content(4, 8192));
    let b = write(&root, "b.bin", &content(4, 8192));

    let reclaimer = Reclaimer::new(ReclaimConfig::default());
    let summary = Pipeline::new(config(4096), reclaimer)
        .run(&[root.clone()])
        .unwrap();

    // either the filesystem clones, or the pair is dropped untouched
    assert_eq!(
        summary.stats.files_reclaimed + summary.stats.files_dropped,
        1
    );
    assert_eq!(fs::read(&b).unwrap(), content(4, 8192));
    assert_eq!(leftover_temps(&root), 0);
}

#[cfg(unix)]
#[test]
fn test_reclaimed_file_takes_partner_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let a = write(&root, "a.bin", &content(5, 8192));
    let b = write(&root, "b.bin", &content(5, 8192));
    fs::set_permissions(&a, fs::Permissions::from_mode(0o600)).unwrap();
    fs::set_permissions(&b, fs::Permissions::from_mode(0o644)).unwrap();

    let reclaimer =
        Reclaimer::new(ReclaimConfig::default().with_policy(ClonePolicy::ReflinkOrCopy));
    let summary = Pipeline::new(config(4096), reclaimer)
        .run(&[root.clone()])
        .unwrap();

    assert_eq!(summary.files_reclaimed(), 1);
    assert_eq!(fs::metadata(&b).unwrap().permissions().mode() & 0o777, 0o600);
    assert_eq!(
        fs::metadata(&b).unwrap().modified().unwrap(),
        fs::metadata(&a).unwrap().modified().unwrap()
    );
}

#[cfg(unix)]
#[test]
fn test_integrity_mismatch_stops_the_run() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    for name in ["a.bin", "b.bin", "c.bin", "d.bin"] {
        write(&root, name, &content(6, 8192));
    }

    // echo prints the path, so the two "checksums" never agree
    let reclaimer = Reclaimer::new(
        ReclaimConfig::default()
            .with_policy(ClonePolicy::ReflinkOrCopy)
            .with_verifier(Verifier::new("echo")),
    );
    let pipeline = Pipeline::new(config(4096), reclaimer);
    let result = pipeline.run(&[root.clone()]);

    assert!(matches!(result, Err(PipelineError::Integrity(_))));
    assert_eq!(pipeline.stats().snapshot().files_reclaimed, 0);
    assert_eq!(leftover_temps(&root), 0);
}

#[test]
fn test_verification_with_sha512sum() {
    if !dupreclaim::actions::command_available("sha512sum") {
        eprintln!("sha512sum not available, skipping");
        return;
    }
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root, "a.bin", &content(8, 8192));
    write(&root, "b.bin", &content(8, 8192));

    let reclaimer = Reclaimer::new(
        ReclaimConfig::default()
            .with_policy(ClonePolicy::ReflinkOrCopy)
            .with_verifier(Verifier::default()),
    );
    let summary = Pipeline::new(config(4096), reclaimer)
        .run(&[root])
        .unwrap();
    assert_eq!(summary.files_reclaimed(), 1);
}
