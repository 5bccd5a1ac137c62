//! Integration tests for the record heap: slotted pages, tombstones,
//! compaction, and scans.

use std::sync::Arc;

use minisql::buffer::BufferPoolManager;
use minisql::common::{MiniError, Result, RowId};
use minisql::heap::TableHeap;
use minisql::storage::disk::DiskManager;
use minisql::storage::page::{HEAP_HEADER_SIZE, SLOT_SIZE};

use tempfile::NamedTempFile;

fn setup(pool_size: usize) -> (TableHeap, Arc<BufferPoolManager>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let disk = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(pool_size, disk));
    (
        TableHeap::create(Arc::clone(&bpm)).unwrap(),
        bpm,
        temp_file,
    )
}

/// Fill a page to one byte short of capacity, tombstone the first tuple,
/// then insert a tuple that only fits after compaction. Surviving RowIds
/// must still resolve to their rows.
#[test]
fn test_compaction_under_fragmentation() {
    let (heap, _bpm, _temp) = setup(8);
    let page_size = 4096usize;
    let usable = page_size - HEAP_HEADER_SIZE;

    // Four 1000-byte tuples then a filler sized to leave exactly one byte.
    let mut rids = Vec::new();
    for i in 0..4u8 {
        rids.push(heap.insert(&vec![i + 1; 1000]).unwrap());
    }
    let used = 4 * (1000 + SLOT_SIZE);
    let filler_len = usable - used - SLOT_SIZE - 1;
    let filler_rid = heap.insert(&vec![0xEE; filler_len]).unwrap();
    let first_page = rids[0].page_id;
    assert_eq!(filler_rid.page_id, first_page);

    // Tombstone the first tuple: 1000 fragmented bytes, 1 contiguous.
    heap.delete(rids[0]).unwrap();

    // A 900-byte tuple fits the first page only after compaction.
    let rid = heap.insert(&vec![0x99; 900]).unwrap();
    assert_eq!(rid.page_id, first_page);
    assert_eq!(heap.get(rid).unwrap(), vec![0x99; 900]);

    // Untouched slots resolve to their original rows at their old RowIds.
    for (i, rid) in rids.iter().enumerate().skip(1) {
        assert_eq!(heap.get(*rid).unwrap(), vec![i as u8 + 1; 1000]);
    }
    assert_eq!(heap.get(filler_rid).unwrap(), vec![0xEE; filler_len]);
    assert!(matches!(heap.get(rids[0]), Err(MiniError::NotFound)));
}

#[test]
fn test_row_ids_stable_across_unrelated_churn() {
    let (heap, _bpm, _temp) = setup(8);

    let keeper = heap.insert(b"keeper row").unwrap();
    let mut victims = Vec::new();
    for i in 0..200i32 {
        victims.push(heap.insert(&i.to_le_bytes()).unwrap());
    }
    for rid in victims {
        heap.delete(rid).unwrap();
    }
    for i in 0..200i32 {
        heap.insert(&(i + 1000).to_le_bytes()).unwrap();
    }

    assert_eq!(heap.get(keeper).unwrap(), b"keeper row");
}

#[test]
fn test_scan_is_restartable() {
    let (heap, _bpm, _temp) = setup(8);

    for i in 0..50i32 {
        heap.insert(&i.to_le_bytes()).unwrap();
    }

    let first: Vec<(RowId, Vec<u8>)> = heap.iter().collect::<Result<_>>().unwrap();
    let second: Vec<(RowId, Vec<u8>)> = heap.iter().collect::<Result<_>>().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 50);
}

#[test]
fn test_abandoned_scan_leaves_no_pins() {
    let (heap, bpm, _temp) = setup(8);

    for _ in 0..40 {
        heap.insert(&vec![1u8; 500]).unwrap();
    }

    let mut iter = heap.iter();
    // Pull a few rows and walk away mid-scan.
    for _ in 0..5 {
        iter.next_row().unwrap();
    }
    drop(iter);

    let stats = bpm.stats();
    assert_eq!(stats.free_frames + stats.evictable_frames, stats.pool_size);
}

#[test]
fn test_update_relocation_across_pages() {
    let (heap, _bpm, _temp) = setup(8);

    // Nearly fill the first page, then grow a row beyond what it can hold.
    let small = heap.insert(b"small").unwrap();
    heap.insert(&vec![7u8; 3900]).unwrap();

    let big = vec![8u8; 2000];
    let new_rid = heap.update(small, &big).unwrap();
    assert_ne!(new_rid.page_id, small.page_id);
    assert_eq!(heap.get(new_rid).unwrap(), big);
    assert!(matches!(heap.get(small), Err(MiniError::NotFound)));
}

#[test]
fn test_heap_survives_reopen() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();
    let first_page;
    let mut rids = Vec::new();

    {
        let disk = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(8, disk));
        let heap = TableHeap::create(Arc::clone(&bpm)).unwrap();
        first_page = heap.first_page_id();
        for i in 0..100i32 {
            rids.push(heap.insert(&i.to_le_bytes()).unwrap());
        }
        bpm.flush_all().unwrap();
    }

    {
        let disk = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(8, disk));
        let heap = TableHeap::open(bpm, first_page);
        assert_eq!(heap.count().unwrap(), 100);
        for (i, rid) in rids.iter().enumerate() {
            assert_eq!(heap.get(*rid).unwrap(), (i as i32).to_le_bytes());
        }
    }
}
