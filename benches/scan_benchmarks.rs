use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dupreclaim::actions::{ReclaimConfig, Reclaimer};
use dupreclaim::duplicates::{Admission, GroupIndex, Pipeline, PipelineConfig, Promotion};
use dupreclaim::scanner::{Hasher, Walker, WalkerConfig};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

// Two subdirectories per level, `files_per_dir` files of 8 KiB in each
fn setup_test_dir(depth: usize, files_per_dir: usize) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    create_dir_recursive(temp_dir.path().to_path_buf(), depth, files_per_dir);
    temp_dir
}

fn create_dir_recursive(path: PathBuf, depth: usize, files_per_dir: usize) {
    if depth == 0 {
        return;
    }
    fs::create_dir_all(&path).expect("Failed to create dir");

    for i in 0..files_per_dir {
        // every third file shares content with its neighbours
        let data = vec![(i / 3) as u8; 8192];
        fs::write(path.join(format!("file_{i}.bin")), data).expect("Failed to write file");
    }

    if depth > 1 {
        for i in 0..2 {
            create_dir_recursive(path.join(format!("dir_{i}")), depth - 1, files_per_dir);
        }
    }
}

fn bench_walker(c: &mut Criterion) {
    let temp_dir = setup_test_dir(4, 10);
    let config = WalkerConfig::default();

    c.bench_function("walker_150_files", |b| {
        b.iter(|| {
            let walker = Walker::new(temp_dir.path(), config.clone());
            let files: Vec<_> = walker.walk().unwrap().collect();
            black_box(files);
        })
    });
}

fn bench_hasher(c: &mut Criterion) {
    let mut group = c.benchmark_group("hasher");
    let hasher = Hasher::new();

    for size_kb in [4, 1024, 10240] {
        let data = vec![b'a'; size_kb * 1024];
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("bench_file.dat");
        fs::write(&file_path, &data).expect("Failed to write bench file");
        let size = data.len() as u64;

        group.bench_with_input(format!("partial_{size_kb}KB"), &file_path, |b, path| {
            b.iter(|| black_box(hasher.partial_hash(path).unwrap()));
        });
        group.bench_with_input(format!("sha512_{size_kb}KB"), &file_path, |b, path| {
            b.iter(|| black_box(hasher.full_hash(path, size).unwrap()));
        });
    }
    group.finish();
}

fn bench_group_index(c: &mut Criterion) {
    c.bench_function("group_index_100k_admits", |b| {
        b.iter(|| {
            let mut index: GroupIndex<u64, dupreclaim::duplicates::FileCandidate> =
                GroupIndex::new(Promotion::ForwardNewOnly);
            let mut forwarded = 0usize;
            for i in 0..100_000u64 {
                let candidate =
                    dupreclaim::duplicates::FileCandidate::new(PathBuf::from("/bench"), i % 5_000);
                if let Admission::Forward(items) = index.admit(i % 5_000, candidate) {
                    forwarded += items.len();
                }
            }
            black_box(forwarded);
        })
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let temp_dir = setup_test_dir(3, 10);
    let roots = vec![temp_dir.path().to_path_buf()];

    c.bench_function("pipeline_dry_run_70_files", |b| {
        b.iter(|| {
            let config = PipelineConfig::default().with_min_size(4096);
            let reclaimer = Reclaimer::new(ReclaimConfig::default().with_dry_run(true));
            let summary = Pipeline::new(config, reclaimer).run(&roots).unwrap();
            black_box(summary);
        })
    });
}

criterion_group!(
    benches,
    bench_walker,
    bench_hasher,
    bench_group_index,
    bench_pipeline
);
criterion_main!(benches);
