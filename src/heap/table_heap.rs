use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::BufferPoolManager;
use crate::common::{MiniError, PageId, Result, RowId};
use crate::storage::page::{HeapPage, HeapPageRef, MAX_TUPLE_SIZE};

use super::TableIter;

/// A table's record heap: a doubly linked chain of slotted pages.
///
/// Insertion is first-fit starting from the next-fit cached page and walking
/// the chain forward; a page with enough fragmented-but-not-contiguous space
/// is compacted in place. When no page fits, a fresh page is spliced at the
/// tail. Rows are addressed by `RowId` and stay addressable until deleted.
pub struct TableHeap {
    bpm: Arc<BufferPoolManager>,
    first_page_id: PageId,
    /// Last page an insert landed on; the next insert starts here.
    next_fit: Mutex<PageId>,
}

impl TableHeap {
    /// Creates an empty heap with one fresh page as the chain head.
    pub fn create(bpm: Arc<BufferPoolManager>) -> Result<Self> {
        let first_page_id = bpm.new_page()?;
        {
            let mut guard = bpm.fetch_write(first_page_id)?;
            let mut page = HeapPage::new(guard.data_mut());
            page.init(first_page_id);
        }
        Ok(Self {
            bpm,
            first_page_id,
            next_fit: Mutex::new(first_page_id),
        })
    }

    /// Opens an existing heap rooted at `first_page_id`.
    pub fn open(bpm: Arc<BufferPoolManager>, first_page_id: PageId) -> Self {
        Self {
            bpm,
            first_page_id,
            next_fit: Mutex::new(first_page_id),
        }
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    pub fn insert(&self, tuple: &[u8]) -> Result<RowId> {
        if tuple.len() > MAX_TUPLE_SIZE {
            return Err(MiniError::SchemaViolation(format!(
                "row of {} bytes exceeds the page capacity of {MAX_TUPLE_SIZE}",
                tuple.len()
            )));
        }

        let mut page_id = *self.next_fit.lock();
        let tail = loop {
            let mut guard = self.bpm.fetch_write(page_id)?;

            let (fits, fits_fragmented, next) = {
                let view = HeapPageRef::new(guard.data());
                (
                    view.can_insert(tuple.len()),
                    view.can_insert_after_compaction(tuple.len()),
                    view.next_page(),
                )
            };

            if fits || fits_fragmented {
                let mut page = HeapPage::new(guard.data_mut());
                if !fits {
                    page.compact();
                }
                let slot = page.insert(tuple)?;
                drop(guard);
                *self.next_fit.lock() = page_id;
                return Ok(RowId::new(page_id, slot));
            }

            match next {
                Some(next_id) => {
                    drop(guard);
                    page_id = next_id;
                }
                None => break page_id,
            }
        };

        // No page in the chain fits: splice a fresh one at the tail.
        let new_page_id = self.bpm.new_page()?;
        let slot = {
            let mut guard = self.bpm.fetch_write(new_page_id)?;
            let mut page = HeapPage::new(guard.data_mut());
            page.init(new_page_id);
            page.set_prev_page(Some(tail));
            page.insert(tuple)?
        };
        {
            let mut guard = self.bpm.fetch_write(tail)?;
            let mut page = HeapPage::new(guard.data_mut());
            page.set_next_page(Some(new_page_id));
        }

        *self.next_fit.lock() = new_page_id;
        Ok(RowId::new(new_page_id, slot))
    }

    pub fn get(&self, row_id: RowId) -> Result<Vec<u8>> {
        let guard = self.bpm.fetch_read(row_id.page_id)?;
        let view = HeapPageRef::new(guard.data());
        Ok(view.get(row_id.slot)?.to_vec())
    }

    /// Updates a row, overwriting in place when the new bytes fit the slot
    /// and relocating otherwise. Returns the row's current `RowId`; the
    /// caller refreshes index entries when it changed.
    pub fn update(&self, row_id: RowId, tuple: &[u8]) -> Result<RowId> {
        {
            let mut guard = self.bpm.fetch_write(row_id.page_id)?;

            let current_len = {
                let view = HeapPageRef::new(guard.data());
                let entry = view.slot(row_id.slot).ok_or(MiniError::NotFound)?;
                if entry.is_tombstone() {
                    return Err(MiniError::NotFound);
                }
                entry.length as usize
            };

            let mut page = HeapPage::new(guard.data_mut());
            if tuple.len() <= current_len {
                page.update_in_place(row_id.slot, tuple)?;
                return Ok(row_id);
            }
            page.delete(row_id.slot)?;
        }
        self.insert(tuple)
    }

    pub fn delete(&self, row_id: RowId) -> Result<()> {
        let mut guard = self.bpm.fetch_write(row_id.page_id)?;
        let mut page = HeapPage::new(guard.data_mut());
        page.delete(row_id.slot)
    }

    /// Forward iterator over live rows in page-chain, then slot, order.
    pub fn iter(&self) -> TableIter {
        TableIter::new(Arc::clone(&self.bpm), self.first_page_id)
    }

    /// Number of live rows; walks the whole chain.
    pub fn count(&self) -> Result<u64> {
        let mut count = 0u64;
        let mut page_id = Some(self.first_page_id);
        while let Some(pid) = page_id {
            let guard = self.bpm.fetch_read(pid)?;
            let view = HeapPageRef::new(guard.data());
            count += view.tuple_count() as u64;
            page_id = view.next_page();
        }
        Ok(count)
    }

    /// Frees every page of the chain. The heap is unusable afterwards.
    pub fn free_all(self) -> Result<()> {
        let mut pages = Vec::new();
        let mut page_id = Some(self.first_page_id);
        while let Some(pid) = page_id {
            let guard = self.bpm.fetch_read(pid)?;
            let view = HeapPageRef::new(guard.data());
            page_id = view.next_page();
            drop(guard);
            pages.push(pid);
        }
        for pid in pages {
            self.bpm.delete_page(pid)?;
        }
        Ok(())
    }
}
