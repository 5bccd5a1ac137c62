use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::buffer::BufferPoolManager;
use crate::common::{MiniError, PageId, Result, PAGE_SIZE};

use super::bitmap_page::{BitmapPage, BitmapPageRef, PAGES_PER_EXTENT};
use super::meta_page::{MetaPage, MetaPageRef};

/// In-memory mirror of the mutable meta page fields. Written back to
/// physical page 0 on flush and on drop.
struct MetaState {
    catalog_root: Option<PageId>,
    extent_count: u32,
    /// First extent that may have free space; extents below it are full.
    free_hint: u32,
    dirty: bool,
}

/// DiskManager owns the single database file. It translates logical page IDs
/// to physical offsets through the extent layout (one bitmap page followed by
/// the data pages it covers), performs direct page I/O, and allocates and
/// frees pages by flipping bitmap bits.
///
/// Bitmap maintenance goes through the buffer pool above so bitmap pages get
/// the same caching, dirty tracking, and flush path as every other page; the
/// raw `read_page`/`write_page` calls are reserved for the pool itself (miss,
/// eviction, explicit flush).
pub struct DiskManager {
    file: Mutex<File>,
    db_path: PathBuf,
    meta: Mutex<MetaState>,
    num_reads: AtomicU32,
    num_writes: AtomicU32,
}

impl DiskManager {
    /// Opens the database file at `db_path`, creating and initializing it if
    /// it does not exist. An existing file has its meta page validated.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&db_path)?;

        let file_len = file.metadata()?.len();

        let dm = Self {
            file: Mutex::new(file),
            db_path,
            meta: Mutex::new(MetaState {
                catalog_root: None,
                extent_count: 0,
                free_hint: 0,
                dirty: false,
            }),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        };

        if file_len < PAGE_SIZE as u64 {
            // Fresh file: lay down the meta page.
            let mut data = [0u8; PAGE_SIZE];
            MetaPage::new(&mut data).init();
            dm.write_physical(0, &data)?;
        } else {
            let mut data = [0u8; PAGE_SIZE];
            dm.read_physical(0, &mut data)?;
            let meta_ref = MetaPageRef::new(&data);
            meta_ref.validate()?;

            let mut meta = dm.meta.lock();
            meta.catalog_root = meta_ref.catalog_root();
            meta.extent_count = meta_ref.extent_count();
            meta.free_hint = meta_ref.free_hint();
        }

        Ok(dm)
    }

    /// Byte offset of a page in the file. Extent `e` puts its bitmap at
    /// physical page `1 + e*(B+1)` and data page `o` right after it.
    fn physical_offset(&self, page_id: PageId) -> u64 {
        let b = PAGES_PER_EXTENT as u64;
        let physical = if page_id.is_bitmap() {
            let e = page_id.extent_index() as u64;
            1 + e * (b + 1)
        } else {
            let l = page_id.as_u32() as u64;
            let e = l / b;
            let o = l % b;
            1 + e * (b + 1) + 1 + o
        };
        physical * PAGE_SIZE as u64
    }

    fn read_physical(&self, offset: u64, data: &mut [u8]) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        let bytes_read = file.read(data)?;
        // A short read inside the file means a sparse region: zero-fill.
        data[bytes_read..].fill(0);
        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_physical(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Reads a page from disk into the provided buffer. Reading a page whose
    /// offset lies entirely beyond the end of file is a programmer error and
    /// surfaces as `InvalidPage` rather than silently zero-filling.
    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "buffer must be PAGE_SIZE bytes");

        let offset = self.physical_offset(page_id);
        let file_len = self.file.lock().metadata()?.len();
        if offset >= file_len {
            return Err(MiniError::InvalidPage(page_id));
        }
        self.read_physical(offset, data)
    }

    /// Writes a page to disk from the provided buffer. Writing past the
    /// current end of file extends it.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "buffer must be PAGE_SIZE bytes");
        self.write_physical(self.physical_offset(page_id), data)
    }

    /// Allocates a new logical page: first clear bit across the bitmap pages
    /// in extent order, growing a new extent when all are full. The touched
    /// bitmap page is dirtied through `pool`, never written directly.
    pub fn allocate_page(&self, pool: &BufferPoolManager) -> Result<PageId> {
        let (extent_count, hint) = {
            let meta = self.meta.lock();
            (meta.extent_count, meta.free_hint)
        };

        for e in hint..extent_count {
            let mut guard = pool.fetch_write(PageId::bitmap(e))?;
            let mut bitmap = BitmapPage::new(guard.data_mut());
            if let Some(offset) = bitmap.first_clear() {
                bitmap.set(offset);
                let now_full = bitmap.free_count() == 0;
                drop(guard);

                let mut meta = self.meta.lock();
                if now_full && meta.free_hint == e {
                    meta.free_hint = e + 1;
                }
                meta.dirty = true;
                return Ok(PageId::new(e * PAGES_PER_EXTENT + offset));
            }
            // Extent is full; remember that so later scans skip it.
            drop(guard);
            let mut meta = self.meta.lock();
            if meta.free_hint == e {
                meta.free_hint = e + 1;
            }
        }

        // Every known extent is full: grow the file by one extent.
        let e = {
            let mut meta = self.meta.lock();
            let e = meta.extent_count;
            meta.extent_count += 1;
            meta.free_hint = e;
            meta.dirty = true;
            e
        };

        let init_result = (|| -> Result<()> {
            let mut guard = pool.init_page(PageId::bitmap(e))?;
            let mut bitmap = BitmapPage::new(guard.data_mut());
            bitmap.init(e);
            bitmap.set(0);
            Ok(())
        })();

        if let Err(err) = init_result {
            let mut meta = self.meta.lock();
            meta.extent_count = e;
            return Err(err);
        }

        Ok(PageId::new(e * PAGES_PER_EXTENT))
    }

    /// Clears the allocation bit for `page_id`. Freeing an unallocated page
    /// is a programmer error.
    pub fn deallocate_page(&self, pool: &BufferPoolManager, page_id: PageId) -> Result<()> {
        if page_id.is_bitmap() {
            return Err(MiniError::InvalidPage(page_id));
        }
        let e = page_id.as_u32() / PAGES_PER_EXTENT;
        let o = page_id.as_u32() % PAGES_PER_EXTENT;

        if e >= self.meta.lock().extent_count {
            return Err(MiniError::InvalidPage(page_id));
        }

        let mut guard = pool.fetch_write(PageId::bitmap(e))?;
        let mut bitmap = BitmapPage::new(guard.data_mut());
        if !bitmap.clear(o) {
            return Err(MiniError::InvalidPage(page_id));
        }
        drop(guard);

        let mut meta = self.meta.lock();
        if e < meta.free_hint {
            meta.free_hint = e;
        }
        meta.dirty = true;
        Ok(())
    }

    /// Whether `page_id` is unallocated. Pages past the last extent are free.
    pub fn is_page_free(&self, pool: &BufferPoolManager, page_id: PageId) -> Result<bool> {
        if page_id.is_bitmap() {
            return Err(MiniError::InvalidPage(page_id));
        }
        let e = page_id.as_u32() / PAGES_PER_EXTENT;
        let o = page_id.as_u32() % PAGES_PER_EXTENT;

        if e >= self.meta.lock().extent_count {
            return Ok(true);
        }

        let guard = pool.fetch_read(PageId::bitmap(e))?;
        let bitmap = BitmapPageRef::new(guard.data());
        Ok(!bitmap.is_set(o))
    }

    pub fn catalog_root(&self) -> Option<PageId> {
        self.meta.lock().catalog_root
    }

    pub fn set_catalog_root(&self, root: Option<PageId>) {
        let mut meta = self.meta.lock();
        if meta.catalog_root != root {
            meta.catalog_root = root;
            meta.dirty = true;
        }
    }

    /// Writes the meta page back if any of its fields changed.
    pub fn flush_meta(&self) -> Result<()> {
        let mut meta = self.meta.lock();
        if !meta.dirty {
            return Ok(());
        }
        let mut data = [0u8; PAGE_SIZE];
        {
            let mut page = MetaPage::new(&mut data);
            page.init();
            page.set_catalog_root(meta.catalog_root);
            page.set_extent_count(meta.extent_count);
            page.set_free_hint(meta.free_hint);
        }
        self.write_physical(0, &data)?;
        meta.dirty = false;
        Ok(())
    }

    pub fn extent_count(&self) -> u32 {
        self.meta.lock().extent_count
    }

    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Syncs file contents and metadata to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let _ = self.flush_meta();
        let _ = self.file.get_mut().sync_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn create_dm(path: &Path) -> (Arc<DiskManager>, Arc<BufferPoolManager>) {
        let dm = Arc::new(DiskManager::new(path).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(8, Arc::clone(&dm)));
        (dm, bpm)
    }

    #[test]
    fn test_disk_manager_creates_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let dm = DiskManager::new(&db_path).unwrap();
        assert!(db_path.exists());
        assert_eq!(dm.extent_count(), 0);
        assert_eq!(dm.catalog_root(), None);
    }

    #[test]
    fn test_disk_manager_rejects_garbage_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("garbage.db");
        std::fs::write(&db_path, vec![0xABu8; PAGE_SIZE]).unwrap();

        assert!(matches!(
            DiskManager::new(&db_path),
            Err(MiniError::Corruption(_))
        ));
    }

    #[test]
    fn test_allocate_sets_bitmap_bit() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (dm, bpm) = create_dm(&temp_dir.path().join("alloc.db"));

        let p0 = dm.allocate_page(&bpm).unwrap();
        let p1 = dm.allocate_page(&bpm).unwrap();
        assert_eq!(p0, PageId::new(0));
        assert_eq!(p1, PageId::new(1));
        assert_eq!(dm.extent_count(), 1);

        assert!(!dm.is_page_free(&bpm, p0).unwrap());
        assert!(!dm.is_page_free(&bpm, p1).unwrap());
        assert!(dm.is_page_free(&bpm, PageId::new(2)).unwrap());
    }

    #[test]
    fn test_deallocate_then_reallocate_first_fit() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (dm, bpm) = create_dm(&temp_dir.path().join("dealloc.db"));

        for _ in 0..4 {
            dm.allocate_page(&bpm).unwrap();
        }
        dm.deallocate_page(&bpm, PageId::new(1)).unwrap();
        assert!(dm.is_page_free(&bpm, PageId::new(1)).unwrap());

        // First-fit hands the freed slot back before extending.
        let reused = dm.allocate_page(&bpm).unwrap();
        assert_eq!(reused, PageId::new(1));
    }

    #[test]
    fn test_double_free_is_invalid() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (dm, bpm) = create_dm(&temp_dir.path().join("dfree.db"));

        let p = dm.allocate_page(&bpm).unwrap();
        dm.deallocate_page(&bpm, p).unwrap();
        assert!(matches!(
            dm.deallocate_page(&bpm, p),
            Err(MiniError::InvalidPage(_))
        ));
    }

    #[test]
    fn test_read_unallocated_page_is_invalid() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (dm, _bpm) = create_dm(&temp_dir.path().join("inv.db"));

        let mut buf = [0u8; PAGE_SIZE];
        assert!(matches!(
            dm.read_page(PageId::new(999), &mut buf),
            Err(MiniError::InvalidPage(_))
        ));
    }

    #[test]
    fn test_page_read_write_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (dm, bpm) = create_dm(&temp_dir.path().join("rw.db"));

        let p = dm.allocate_page(&bpm).unwrap();
        let mut data = [0u8; PAGE_SIZE];
        data[0] = 42;
        data[PAGE_SIZE - 1] = 128;
        dm.write_page(p, &data).unwrap();

        let mut readback = [0u8; PAGE_SIZE];
        dm.read_page(p, &mut readback).unwrap();
        assert_eq!(readback[0], 42);
        assert_eq!(readback[PAGE_SIZE - 1], 128);
    }

    #[test]
    fn test_meta_persists_across_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("persist.db");

        {
            let (dm, bpm) = create_dm(&db_path);
            dm.allocate_page(&bpm).unwrap();
            dm.set_catalog_root(Some(PageId::new(0)));
            bpm.flush_all().unwrap();
        }

        {
            let (dm, bpm) = create_dm(&db_path);
            assert_eq!(dm.extent_count(), 1);
            assert_eq!(dm.catalog_root(), Some(PageId::new(0)));
            assert!(!dm.is_page_free(&bpm, PageId::new(0)).unwrap());
            assert!(dm.is_page_free(&bpm, PageId::new(1)).unwrap());
        }
    }
}
