use std::cmp::Ordering;
use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, Result, RowId};

use super::btree_page::BTreeNodeRef;
use super::KeyCodec;

/// Caller-pulled range scan over the leaf chain.
///
/// Every pull pins exactly one leaf and unpins it before returning, so an
/// abandoned iterator leaves no pin behind. The scan ends when the upper
/// bound is passed or the chain runs out.
pub struct BTreeRangeIter {
    bpm: Arc<BufferPoolManager>,
    codec: KeyCodec,
    current_page: Option<PageId>,
    current_index: usize,
    hi: Option<Vec<u8>>,
    hi_inclusive: bool,
    done: bool,
}

impl BTreeRangeIter {
    pub(crate) fn new(
        bpm: Arc<BufferPoolManager>,
        codec: KeyCodec,
        start_page: PageId,
        start_index: usize,
        hi: Option<Vec<u8>>,
        hi_inclusive: bool,
    ) -> Self {
        Self {
            bpm,
            codec,
            current_page: Some(start_page),
            current_index: start_index,
            hi,
            hi_inclusive,
            done: false,
        }
    }

    pub fn next_entry(&mut self) -> Result<Option<(Vec<u8>, RowId)>> {
        if self.done {
            return Ok(None);
        }

        while let Some(page_id) = self.current_page {
            let next_page = {
                let guard = self.bpm.fetch_read(page_id)?;
                let node = BTreeNodeRef::new(guard.data(), self.codec.key_size());

                if self.current_index < node.key_count() {
                    let key = node.leaf_key(self.current_index);

                    if let Some(hi) = &self.hi {
                        let cmp = self.codec.compare(key, hi);
                        if cmp == Ordering::Greater
                            || (cmp == Ordering::Equal && !self.hi_inclusive)
                        {
                            self.done = true;
                            return Ok(None);
                        }
                    }

                    let entry = (key.to_vec(), node.leaf_row_id(self.current_index));
                    self.current_index += 1;
                    return Ok(Some(entry));
                }

                node.next_leaf()
            };

            self.current_page = next_page;
            self.current_index = 0;
        }

        self.done = true;
        Ok(None)
    }
}

impl Iterator for BTreeRangeIter {
    type Item = Result<(Vec<u8>, RowId)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
