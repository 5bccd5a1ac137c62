//! Integration tests for the buffer pool: pin pressure, eviction, and
//! write-back.

use std::sync::Arc;

use minisql::buffer::BufferPoolManager;
use minisql::common::{MiniError, PageId};
use minisql::storage::disk::DiskManager;

use tempfile::NamedTempFile;

fn setup(pool_size: usize) -> (Arc<BufferPoolManager>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let disk = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    (Arc::new(BufferPoolManager::new(pool_size, disk)), temp_file)
}

/// A pool of 4 frames serves any number of pages when each fetch is
/// balanced by an unpin; with all pins held, the frame after the last one
/// fails with OutOfFrames.
#[test]
fn test_pin_pressure_on_small_pool() {
    let (bpm, _temp) = setup(4);

    let pages: Vec<PageId> = (0..11).map(|_| bpm.new_page().unwrap()).collect();

    // Sequential fetch with unpin after each: never runs out.
    for &page_id in &pages {
        let guard = bpm.fetch_read(page_id).unwrap();
        assert_eq!(guard.page_id(), page_id);
    }

    // Holding every pin: the fifth fetch has no frame left.
    let mut guards = Vec::new();
    for (i, &page_id) in pages.iter().enumerate() {
        match bpm.fetch_read(page_id) {
            Ok(guard) => guards.push(guard),
            Err(MiniError::OutOfFrames) => {
                assert_eq!(i, 4, "pool of 4 must fail on the fifth pinned fetch");
                return;
            }
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    panic!("fetch with all pins held never hit OutOfFrames");
}

#[test]
fn test_working_set_larger_than_pool() {
    let (bpm, _temp) = setup(4);

    let pages: Vec<PageId> = (0..32).map(|_| bpm.new_page().unwrap()).collect();
    for (i, &page_id) in pages.iter().enumerate() {
        let mut guard = bpm.fetch_write(page_id).unwrap();
        guard.data_mut()[8] = i as u8;
    }

    // Everything is re-readable after eviction churn.
    for (i, &page_id) in pages.iter().enumerate() {
        let guard = bpm.fetch_read(page_id).unwrap();
        assert_eq!(guard.data()[8], i as u8);
    }
}

#[test]
fn test_pins_balance_after_operations() {
    let (bpm, _temp) = setup(8);

    let pages: Vec<PageId> = (0..6).map(|_| bpm.new_page().unwrap()).collect();
    for &page_id in &pages {
        let mut guard = bpm.fetch_write(page_id).unwrap();
        guard.data_mut()[9] = 1;
    }

    // Outside any guard scope every resident frame is unpinned, i.e. free
    // or evictable.
    for &page_id in &pages {
        assert_eq!(bpm.pin_count(page_id), Some(0));
    }
    let stats = bpm.stats();
    assert_eq!(stats.free_frames + stats.evictable_frames, stats.pool_size);
}

#[test]
fn test_delete_page_only_when_unpinned() {
    let (bpm, _temp) = setup(4);
    let page_id = bpm.new_page().unwrap();

    {
        let _guard = bpm.fetch_read(page_id).unwrap();
        assert!(bpm.delete_page(page_id).is_err());
    }
    bpm.delete_page(page_id).unwrap();

    // The id is free again and the frame is reusable.
    assert!(bpm
        .disk_manager()
        .is_page_free(&bpm, page_id)
        .unwrap());
}

#[test]
fn test_flush_all_persists_everything() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();
    let mut pages = Vec::new();

    {
        let disk = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(8, disk);
        for i in 0..16u8 {
            let page_id = bpm.new_page().unwrap();
            let mut guard = bpm.fetch_write(page_id).unwrap();
            guard.data_mut()[100] = i;
            drop(guard);
            pages.push(page_id);
        }
        bpm.flush_all().unwrap();
    }

    {
        let disk = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(8, disk);
        for (i, &page_id) in pages.iter().enumerate() {
            let guard = bpm.fetch_read(page_id).unwrap();
            assert_eq!(guard.data()[100], i as u8);
        }
    }
}

#[test]
fn test_unpinned_guard_drop_is_exact() {
    let (bpm, _temp) = setup(4);
    let page_id = bpm.new_page().unwrap();

    let g1 = bpm.fetch_read(page_id).unwrap();
    let g2 = bpm.fetch_read(page_id).unwrap();
    assert_eq!(bpm.pin_count(page_id), Some(2));

    drop(g1);
    assert_eq!(bpm.pin_count(page_id), Some(1));
    drop(g2);
    assert_eq!(bpm.pin_count(page_id), Some(0));

    // A further explicit unpin is the programmer error the pool reports.
    assert!(matches!(
        bpm.unpin_page(page_id, false),
        Err(MiniError::DoubleUnpin(_))
    ));
}
