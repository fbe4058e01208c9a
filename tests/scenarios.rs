//! Concrete end-to-end scenarios exercising persistence, slot reuse, growth, and
//! compaction across the `Table`/`Storage` surface against a real backing file.

use dynatable::{HeaderBlob, Storage, Table};
use tempfile::tempdir;

#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct Meta {
    val: u32,
    _padding: u32,
}

fn open_table<H: HeaderBlob>(
    path: &std::path::Path,
    max_records: u64,
    initial_data_area_size: u64,
) -> Table<H> {
    Table::open(path, max_records, initial_data_area_size, 30).unwrap()
}

#[test]
fn fresh_create_and_reopen_preserves_user_header_and_empty_count() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fresh.db");

    {
        let mut table: Table<Meta> = open_table(&path, 32, 4096);
        table.header_data().val = 42;
    }

    let mut table: Table<Meta> = open_table(&path, 32, 4096);
    assert_eq!(table.count_records(), 0);
    assert_eq!(table.header_data().val, 42);
}

#[test]
fn mixed_size_records_persist_in_insertion_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mixed.db");

    let record_a = b"persistent_first:100:10,20,30".to_vec();
    let record_b = b"persistent_second:200:40,50,60,70".to_vec();

    {
        let table: Table<Meta> = open_table(&path, 16, 4096);
        let mut storage = Storage::new(table);
        let a = storage.create_record(&record_a);
        let b = storage.create_record(&record_b);
        assert_ne!(a, dynatable::INVALID);
        assert_ne!(b, dynatable::INVALID);
    }

    let table: Table<Meta> = open_table(&path, 16, 4096);
    let storage = Storage::new(table);
    let records: Vec<Vec<u8>> = storage.iterate().map(|(_, bytes)| bytes.to_vec()).collect();
    assert_eq!(records, vec![record_a, record_b]);
}

#[test]
fn slot_reuse_at_capacity() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("capacity.db");
    let mut table: Table<[u8; 0]> = open_table(&path, 4, 4096);

    let indices: Vec<u64> = (0..4)
        .map(|i| {
            let index = table.alloc_record(8);
            assert_ne!(index, dynatable::INVALID);
            assert!(table.write_record_data(index, &[i as u8; 8]));
            assert!(table.commit_record(index));
            index
        })
        .collect();

    assert_eq!(table.alloc_record(8), dynatable::INVALID);

    assert!(table.delete_record(indices[1]));
    assert_eq!(table.alloc_record(8), indices[1]);
}

#[test]
fn data_area_growth_accommodates_more_bytes_than_the_initial_area() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("growth.db");
    let table: Table<[u8; 0]> = open_table(&path, 10, 256);
    let mut storage = Storage::new(table);

    let payload = vec![0xABu8; 40];
    let mut stored = Vec::new();
    for _ in 0..20 {
        let index = storage.create_record(&payload);
        if index != dynatable::INVALID {
            stored.push(index);
        }
    }

    assert!(
        stored.len() >= 6,
        "expected at least 6 records stored, got {}",
        stored.len()
    );
    for index in stored {
        assert_eq!(storage.get_record(index), payload.as_slice());
    }
}

#[test]
fn compaction_reclaims_fragmented_space_for_a_larger_allocation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("compaction.db");
    let table: Table<[u8; 0]> = open_table(&path, 20, 512);
    let mut storage = Storage::new(table);

    let small = vec![0x11u8; 20];
    let indices: Vec<u64> = (0..10).map(|_| storage.create_record(&small)).collect();
    assert!(indices.iter().all(|&i| i != dynatable::INVALID));

    for (i, &index) in indices.iter().enumerate() {
        if i % 2 == 0 {
            assert!(storage.delete_record(index));
        }
    }

    // Bigger than any single surviving gap (20 bytes) but well inside the
    // reclaimable total (5 deletions * 20 bytes = 100).
    let large = vec![0x22u8; 90];
    let big_index = storage.create_record(&large);
    assert_ne!(big_index, dynatable::INVALID);
    assert_eq!(storage.get_record(big_index), large.as_slice());

    for (i, &index) in indices.iter().enumerate() {
        if i % 2 != 0 {
            assert_eq!(storage.get_record(index), small.as_slice());
        }
    }
}
