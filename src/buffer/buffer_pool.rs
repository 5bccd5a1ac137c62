use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{
    FrameId, MiniError, PageId, Result, INVALID_PAGE_ID, PAGE_SIZE,
};
use crate::storage::disk::DiskManager;

use super::{Frame, LruReplacer, ReadPageGuard, WritePageGuard};

/// Point-in-time counters for the pool.
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub pool_size: usize,
    pub free_frames: usize,
    pub evictable_frames: usize,
    pub hits: u64,
    pub misses: u64,
    pub disk_reads: u32,
    pub disk_writes: u32,
}

/// Pool state shared with the release callbacks inside page guards.
struct PoolState {
    frames: Vec<Arc<Frame>>,
    page_table: Mutex<HashMap<PageId, FrameId>>,
    free_list: Mutex<Vec<FrameId>>,
    replacer: LruReplacer,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PoolState {
    /// Balances one pin: applied when a guard drops or `unpin_page` is
    /// called. Returns false if the pin count was already zero.
    fn release(&self, page_id: PageId, dirty: bool) -> bool {
        let page_table = self.page_table.lock();
        let Some(&frame_id) = page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];
        if dirty {
            frame.set_dirty(true);
        }
        match frame.unpin() {
            Some(0) => {
                self.replacer.unpin(frame_id);
                true
            }
            Some(_) => true,
            None => false,
        }
    }
}

/// BufferPoolManager caches pages by logical ID in a fixed array of frames.
/// It tracks pin counts and dirty bits, evicts with the LRU policy, and is
/// the only component that issues page I/O against the disk manager.
pub struct BufferPoolManager {
    pool_size: usize,
    state: Arc<PoolState>,
    disk: Arc<DiskManager>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = Vec::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(Frame::new(frame_id)));
            free_list.push(frame_id);
        }
        // Pop order matches frame order.
        free_list.reverse();

        Self {
            pool_size,
            state: Arc::new(PoolState {
                frames,
                page_table: Mutex::new(HashMap::new()),
                free_list: Mutex::new(free_list),
                replacer: LruReplacer::new(pool_size),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
            disk,
        }
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk
    }

    /// Fetches a page for read access; pins it for the guard's lifetime.
    pub fn fetch_read(&self, page_id: PageId) -> Result<ReadPageGuard> {
        let frame_id = self.pin_page(page_id, true)?;
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        let state = Arc::clone(&self.state);

        let guard = unsafe {
            ReadPageGuard::new(
                page_id,
                frame,
                Box::new(move |pid, dirty| {
                    let balanced = state.release(pid, dirty);
                    debug_assert!(balanced, "guard release found pin count zero");
                }),
            )
        };
        Ok(guard)
    }

    /// Fetches a page for write access; pins it for the guard's lifetime.
    pub fn fetch_write(&self, page_id: PageId) -> Result<WritePageGuard> {
        let frame_id = self.pin_page(page_id, true)?;
        self.write_guard_for(page_id, frame_id)
    }

    /// Pins a frame for `page_id` without reading from disk: the frame comes
    /// up zeroed. Used for pages whose first contents are about to be
    /// written (fresh data pages, fresh bitmap pages).
    pub(crate) fn init_page(&self, page_id: PageId) -> Result<WritePageGuard> {
        let frame_id = self.pin_page(page_id, false)?;
        self.write_guard_for(page_id, frame_id)
    }

    fn write_guard_for(&self, page_id: PageId, frame_id: FrameId) -> Result<WritePageGuard> {
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        let state = Arc::clone(&self.state);

        let guard = unsafe {
            WritePageGuard::new(
                page_id,
                frame,
                Box::new(move |pid, dirty| {
                    let balanced = state.release(pid, dirty);
                    debug_assert!(balanced, "guard release found pin count zero");
                }),
            )
        };
        Ok(guard)
    }

    /// Explicit unpin for callers that bypass guards. A pin count that would
    /// go negative is a programmer error.
    pub fn unpin_page(&self, page_id: PageId, dirty: bool) -> Result<()> {
        if self.state.release(page_id, dirty) {
            Ok(())
        } else {
            Err(MiniError::DoubleUnpin(page_id))
        }
    }

    /// Allocates a fresh page on disk, zeroes a frame for it, and stamps the
    /// header page ID. The new page is handed back unpinned and dirty; the
    /// caller re-fetches it when needed.
    pub fn new_page(&self) -> Result<PageId> {
        let page_id = self.disk.allocate_page(self)?;

        match self.pin_page(page_id, false) {
            Ok(frame_id) => {
                let frame = &self.state.frames[frame_id.as_usize()];
                {
                    let mut data = frame.data.write();
                    data[0..4].copy_from_slice(&page_id.as_u32().to_le_bytes());
                }
                frame.set_dirty(true);
                frame.unpin();
                self.state.replacer.unpin(frame_id);
                Ok(page_id)
            }
            Err(err) => {
                // Roll the allocation back so the error does not leak an id.
                let _ = self.disk.deallocate_page(self, page_id);
                Err(err)
            }
        }
    }

    /// Drops a page from the pool and deallocates it on disk. The caller
    /// must have released every pin. Never flushes the page bytes.
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        let frame_id = {
            let mut page_table = self.state.page_table.lock();
            match page_table.get(&page_id) {
                Some(&frame_id) => {
                    let frame = &self.state.frames[frame_id.as_usize()];
                    if frame.pin_count() > 0 {
                        return Err(MiniError::InvariantViolation(format!(
                            "delete of pinned page {page_id}"
                        )));
                    }
                    page_table.remove(&page_id);
                    Some(frame_id)
                }
                None => None,
            }
        };

        if let Some(frame_id) = frame_id {
            self.state.replacer.pin(frame_id);
            self.state.frames[frame_id.as_usize()].reset();
            self.state.free_list.lock().push(frame_id);
        }

        self.disk.deallocate_page(self, page_id)
    }

    /// Writes a page back if resident. Returns whether it was resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let frame_id = {
            let page_table = self.state.page_table.lock();
            page_table.get(&page_id).copied()
        };
        let Some(frame_id) = frame_id else {
            return Ok(false);
        };

        let frame = &self.state.frames[frame_id.as_usize()];
        let mut data = [0u8; PAGE_SIZE];
        frame.copy_to(&mut data);
        self.disk.write_page(page_id, &data)?;
        frame.set_dirty(false);
        Ok(true)
    }

    /// Writes every dirty resident page, the meta page, and syncs the file.
    pub fn flush_all(&self) -> Result<()> {
        let entries: Vec<(PageId, FrameId)> = {
            let page_table = self.state.page_table.lock();
            page_table.iter().map(|(&p, &f)| (p, f)).collect()
        };

        for (page_id, frame_id) in entries {
            let frame = &self.state.frames[frame_id.as_usize()];
            if frame.is_dirty() {
                let mut data = [0u8; PAGE_SIZE];
                frame.copy_to(&mut data);
                self.disk.write_page(page_id, &data)?;
                frame.set_dirty(false);
            }
        }

        self.disk.flush_meta()?;
        self.disk.sync()
    }

    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let page_table = self.state.page_table.lock();
        page_table
            .get(&page_id)
            .map(|&frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.free_list.lock().len()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            pool_size: self.pool_size,
            free_frames: self.free_frame_count(),
            evictable_frames: self.state.replacer.len(),
            hits: self.state.hits.load(Ordering::Relaxed),
            misses: self.state.misses.load(Ordering::Relaxed),
            disk_reads: self.disk.num_reads(),
            disk_writes: self.disk.num_writes(),
        }
    }

    /// Makes `page_id` resident and pinned, reading it from disk unless the
    /// frame is being initialized for first use.
    fn pin_page(&self, page_id: PageId, read_from_disk: bool) -> Result<FrameId> {
        if page_id == INVALID_PAGE_ID {
            return Err(MiniError::InvalidPage(page_id));
        }

        {
            let page_table = self.state.page_table.lock();
            if let Some(&frame_id) = page_table.get(&page_id) {
                let frame = &self.state.frames[frame_id.as_usize()];
                frame.pin();
                self.state.replacer.pin(frame_id);
                self.state.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(frame_id);
            }
        }
        self.state.misses.fetch_add(1, Ordering::Relaxed);

        let frame_id = self.acquire_frame()?;
        let frame = &self.state.frames[frame_id.as_usize()];

        if read_from_disk {
            let mut data = [0u8; PAGE_SIZE];
            if let Err(err) = self.disk.read_page(page_id, &mut data) {
                self.state.free_list.lock().push(frame_id);
                return Err(err);
            }
            frame.copy_from(&data);
        }

        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();
        self.state.page_table.lock().insert(page_id, frame_id);
        Ok(frame_id)
    }

    /// Hands out a frame from the free list, or evicts the LRU victim,
    /// writing it back first when dirty.
    fn acquire_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.state.free_list.lock().pop() {
            return Ok(frame_id);
        }

        let Some(frame_id) = self.state.replacer.victim() else {
            return Err(MiniError::OutOfFrames);
        };

        let frame = &self.state.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            if let Err(err) = self.disk.write_page(old_page_id, &data) {
                // Write-back failed: the victim stays resident and evictable.
                self.state.replacer.unpin(frame_id);
                return Err(err);
            }
        }

        self.state.page_table.lock().remove(&old_page_id);
        frame.reset();
        Ok(frame_id)
    }
}
