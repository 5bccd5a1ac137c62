use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, Result, RowId, SlotId};
use crate::storage::page::HeapPageRef;

/// Forward scan over a table heap.
///
/// Each `next` call pins exactly one page and unpins it before returning, so
/// abandoning the iterator never leaves a pin behind. The heap must not be
/// mutated while an iteration is in progress.
pub struct TableIter {
    bpm: Arc<BufferPoolManager>,
    current_page: Option<PageId>,
    next_slot: u32,
}

impl TableIter {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, first_page_id: PageId) -> Self {
        Self {
            bpm,
            current_page: Some(first_page_id),
            next_slot: 0,
        }
    }

    pub fn next_row(&mut self) -> Result<Option<(RowId, Vec<u8>)>> {
        while let Some(page_id) = self.current_page {
            let guard = self.bpm.fetch_read(page_id)?;
            let view = HeapPageRef::new(guard.data());
            let slot_count = view.slot_count() as u32;

            while self.next_slot < slot_count {
                let slot = SlotId::new(self.next_slot);
                self.next_slot += 1;
                if let Ok(bytes) = view.get(slot) {
                    return Ok(Some((RowId::new(page_id, slot), bytes.to_vec())));
                }
            }

            self.current_page = view.next_page();
            self.next_slot = 0;
        }
        Ok(None)
    }
}

impl Iterator for TableIter {
    type Item = Result<(RowId, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_row() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
