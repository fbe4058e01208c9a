//! Throughput benchmarks for the allocate/write/commit/delete/get hot paths
//! and for data-area compaction under fragmentation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dynatable::{Storage, Table};
use tempfile::tempdir;

fn open_storage(max_records: u64, initial_data_area_size: u64) -> (tempfile::TempDir, Storage<[u8; 0]>) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bench.db");
    let table: Table<[u8; 0]> = Table::open(&path, max_records, initial_data_area_size, 30).unwrap();
    (dir, Storage::new(table))
}

fn create_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_record");
    for size in [16usize, 256, 4096] {
        let payload = vec![0xABu8; size];
        group.bench_with_input(BenchmarkId::new("size", size), &size, |b, _| {
            let (_dir, mut storage) = open_storage(1 << 16, 1 << 24);
            b.iter(|| {
                black_box(storage.create_record(&payload));
            });
        });
    }
    group.finish();
}

fn get_record_with_validation(c: &mut Criterion) {
    let (_dir, mut storage) = open_storage(1024, 1 << 20);
    let payload = vec![0x11u8; 256];
    let index = storage.create_record(&payload);

    c.bench_function("get_record_with_validation", |b| {
        b.iter(|| black_box(storage.get_record(index)));
    });
}

fn delete_and_recreate_churn(c: &mut Criterion) {
    c.bench_function("delete_and_recreate_churn", |b| {
        let (_dir, mut storage) = open_storage(256, 1 << 16);
        let payload = vec![0x22u8; 128];
        let index = storage.create_record(&payload);
        b.iter(|| {
            storage.delete_record(index);
            black_box(storage.create_record(&payload));
        });
    });
}

fn compaction_under_fragmentation(c: &mut Criterion) {
    c.bench_function("compaction_under_fragmentation", |b| {
        b.iter_batched(
            || {
                let (dir, mut storage) = open_storage(512, 1 << 16);
                let payload = vec![0x33u8; 64];
                let indices: Vec<u64> = (0..400).map(|_| storage.create_record(&payload)).collect();
                for (i, index) in indices.iter().enumerate() {
                    if i % 2 == 0 {
                        storage.delete_record(*index);
                    }
                }
                (dir, storage)
            },
            |(_dir, mut storage)| {
                // Larger than any single surviving gap; forces try_compact_data
                // to actually walk and slide the live ranges.
                black_box(storage.create_record(&vec![0x44u8; 2048]));
            },
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    create_record,
    get_record_with_validation,
    delete_and_recreate_churn,
    compaction_under_fragmentation
);
criterion_main!(benches);
