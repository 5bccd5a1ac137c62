use crate::common::{
    Lsn, MiniError, PageId, Result, SlotId, INVALID_LSN, INVALID_PAGE_ID, PAGE_SIZE,
};

/// Heap page layout:
///
/// +--------------------+
/// | Header (24 bytes)  |  id, lsn, prev, next, free-space offset,
/// +--------------------+  slot count, tuple count
/// | Slot directory     |  4 bytes per slot, grows downward
/// +--------------------+
/// | Free space         |
/// +--------------------+
/// | Tuple data         |  grows upward from the page end
/// +--------------------+
///
/// A slot entry is (offset u16, length u16); length 0 marks a tombstone.
/// Tombstones keep their slot index forever so stale RowIds stay dead.
const PAGE_ID_OFFSET: usize = 0;
const LSN_OFFSET: usize = 4;
const PREV_PAGE_OFFSET: usize = 8;
const NEXT_PAGE_OFFSET: usize = 12;
const FREE_SPACE_OFFSET: usize = 16;
const SLOT_COUNT_OFFSET: usize = 18;
const TUPLE_COUNT_OFFSET: usize = 20;

pub const HEAP_HEADER_SIZE: usize = 24;
pub const SLOT_SIZE: usize = 4;

/// Largest row the heap can store: one tuple filling an otherwise empty page.
pub const MAX_TUPLE_SIZE: usize = PAGE_SIZE - HEAP_HEADER_SIZE - SLOT_SIZE;

#[derive(Debug, Clone, Copy)]
pub struct SlotEntry {
    pub offset: u16,
    pub length: u16,
}

impl SlotEntry {
    pub fn is_tombstone(&self) -> bool {
        self.length == 0
    }
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(data[offset..offset + 2].try_into().unwrap())
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

fn read_page_link(data: &[u8], offset: usize) -> Option<PageId> {
    let raw = read_u32(data, offset);
    if raw == INVALID_PAGE_ID.as_u32() {
        None
    } else {
        Some(PageId::new(raw))
    }
}

fn slot_at(data: &[u8], slot: SlotId, slot_count: u16) -> Option<SlotEntry> {
    if slot.as_u32() >= slot_count as u32 {
        return None;
    }
    let base = HEAP_HEADER_SIZE + slot.as_u32() as usize * SLOT_SIZE;
    Some(SlotEntry {
        offset: read_u16(data, base),
        length: read_u16(data, base + 2),
    })
}

fn tuple_bytes<'d>(data: &'d [u8], slot: SlotId, slot_count: u16) -> Result<&'d [u8]> {
    let entry = slot_at(data, slot, slot_count).ok_or(MiniError::NotFound)?;
    if entry.is_tombstone() {
        return Err(MiniError::NotFound);
    }
    let start = entry.offset as usize;
    let end = start + entry.length as usize;
    if start < HEAP_HEADER_SIZE + slot_count as usize * SLOT_SIZE || end > PAGE_SIZE {
        return Err(MiniError::Corruption(format!(
            "slot {} points at [{start}, {end}) outside the tuple area",
            slot.as_u32()
        )));
    }
    Ok(&data[start..end])
}

/// Mutable view over a heap page.
pub struct HeapPage<'a> {
    data: &'a mut [u8],
}

impl<'a> HeapPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn init(&mut self, page_id: PageId) {
        self.data.fill(0);
        self.data[PAGE_ID_OFFSET..PAGE_ID_OFFSET + 4]
            .copy_from_slice(&page_id.as_u32().to_le_bytes());
        self.set_lsn(INVALID_LSN);
        self.set_prev_page(None);
        self.set_next_page(None);
        self.set_free_space_offset(PAGE_SIZE as u16);
        self.set_slot_count(0);
        self.set_tuple_count(0);
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(read_u32(self.data, PAGE_ID_OFFSET))
    }

    pub fn lsn(&self) -> Lsn {
        read_u32(self.data, LSN_OFFSET)
    }

    pub fn set_lsn(&mut self, lsn: Lsn) {
        self.data[LSN_OFFSET..LSN_OFFSET + 4].copy_from_slice(&lsn.to_le_bytes());
    }

    pub fn prev_page(&self) -> Option<PageId> {
        read_page_link(self.data, PREV_PAGE_OFFSET)
    }

    pub fn set_prev_page(&mut self, page_id: Option<PageId>) {
        let raw = page_id.unwrap_or(INVALID_PAGE_ID).as_u32();
        self.data[PREV_PAGE_OFFSET..PREV_PAGE_OFFSET + 4].copy_from_slice(&raw.to_le_bytes());
    }

    pub fn next_page(&self) -> Option<PageId> {
        read_page_link(self.data, NEXT_PAGE_OFFSET)
    }

    pub fn set_next_page(&mut self, page_id: Option<PageId>) {
        let raw = page_id.unwrap_or(INVALID_PAGE_ID).as_u32();
        self.data[NEXT_PAGE_OFFSET..NEXT_PAGE_OFFSET + 4].copy_from_slice(&raw.to_le_bytes());
    }

    pub fn free_space_offset(&self) -> u16 {
        read_u16(self.data, FREE_SPACE_OFFSET)
    }

    fn set_free_space_offset(&mut self, offset: u16) {
        self.data[FREE_SPACE_OFFSET..FREE_SPACE_OFFSET + 2]
            .copy_from_slice(&offset.to_le_bytes());
    }

    pub fn slot_count(&self) -> u16 {
        read_u16(self.data, SLOT_COUNT_OFFSET)
    }

    fn set_slot_count(&mut self, count: u16) {
        self.data[SLOT_COUNT_OFFSET..SLOT_COUNT_OFFSET + 2]
            .copy_from_slice(&count.to_le_bytes());
    }

    pub fn tuple_count(&self) -> u16 {
        read_u16(self.data, TUPLE_COUNT_OFFSET)
    }

    fn set_tuple_count(&mut self, count: u16) {
        self.data[TUPLE_COUNT_OFFSET..TUPLE_COUNT_OFFSET + 2]
            .copy_from_slice(&count.to_le_bytes());
    }

    pub fn slot(&self, slot: SlotId) -> Option<SlotEntry> {
        slot_at(self.data, slot, self.slot_count())
    }

    fn set_slot(&mut self, slot: SlotId, entry: SlotEntry) {
        let base = HEAP_HEADER_SIZE + slot.as_u32() as usize * SLOT_SIZE;
        self.data[base..base + 2].copy_from_slice(&entry.offset.to_le_bytes());
        self.data[base + 2..base + 4].copy_from_slice(&entry.length.to_le_bytes());
    }

    /// Contiguous bytes between the slot directory and the tuple area.
    pub fn contiguous_free_space(&self) -> usize {
        let dir_end = HEAP_HEADER_SIZE + self.slot_count() as usize * SLOT_SIZE;
        (self.free_space_offset() as usize).saturating_sub(dir_end)
    }

    /// Total reclaimable bytes: page size minus header, directory, and live
    /// tuple bytes. Exceeds the contiguous count when tombstones fragment
    /// the tuple area.
    pub fn total_free_space(&self) -> usize {
        let slot_count = self.slot_count();
        let mut live: usize = 0;
        for i in 0..slot_count {
            if let Some(entry) = slot_at(self.data, SlotId::new(i as u32), slot_count) {
                live += entry.length as usize;
            }
        }
        PAGE_SIZE - HEAP_HEADER_SIZE - slot_count as usize * SLOT_SIZE - live
    }

    pub fn can_insert(&self, tuple_len: usize) -> bool {
        self.contiguous_free_space() >= tuple_len + SLOT_SIZE
    }

    pub fn can_insert_after_compaction(&self, tuple_len: usize) -> bool {
        self.total_free_space() >= tuple_len + SLOT_SIZE
    }

    /// Appends a tuple into a fresh slot. The caller checks `can_insert`
    /// (compacting first if needed); failing here is a logic error.
    pub fn insert(&mut self, tuple: &[u8]) -> Result<SlotId> {
        if !self.can_insert(tuple.len()) {
            return Err(MiniError::InvariantViolation(format!(
                "insert of {} bytes into page {} with {} contiguous free",
                tuple.len(),
                self.page_id(),
                self.contiguous_free_space()
            )));
        }

        let slot_count = self.slot_count();
        let slot = SlotId::new(slot_count as u32);
        let offset = self.free_space_offset() - tuple.len() as u16;

        self.data[offset as usize..offset as usize + tuple.len()].copy_from_slice(tuple);
        self.set_slot_count(slot_count + 1);
        self.set_slot(
            slot,
            SlotEntry {
                offset,
                length: tuple.len() as u16,
            },
        );
        self.set_free_space_offset(offset);
        self.set_tuple_count(self.tuple_count() + 1);
        Ok(slot)
    }

    pub fn get(&self, slot: SlotId) -> Result<&[u8]> {
        tuple_bytes(self.data, slot, self.slot_count())
    }

    /// Overwrites a tuple in place. The new bytes must not exceed the slot's
    /// current length; a shrink leaves a fragment reclaimed by compaction.
    pub fn update_in_place(&mut self, slot: SlotId, tuple: &[u8]) -> Result<()> {
        let entry = self.slot(slot).ok_or(MiniError::NotFound)?;
        if entry.is_tombstone() {
            return Err(MiniError::NotFound);
        }
        if tuple.len() > entry.length as usize {
            return Err(MiniError::InvariantViolation(format!(
                "in-place update of {} bytes into a {}-byte slot",
                tuple.len(),
                entry.length
            )));
        }
        let start = entry.offset as usize;
        self.data[start..start + tuple.len()].copy_from_slice(tuple);
        if tuple.len() < entry.length as usize {
            self.set_slot(
                slot,
                SlotEntry {
                    offset: entry.offset,
                    length: tuple.len() as u16,
                },
            );
        }
        Ok(())
    }

    /// Tombstones a slot. The slot index stays allocated; only compaction
    /// moves bytes, and it never renumbers slots.
    pub fn delete(&mut self, slot: SlotId) -> Result<()> {
        let entry = self.slot(slot).ok_or(MiniError::NotFound)?;
        if entry.is_tombstone() {
            return Err(MiniError::NotFound);
        }
        self.set_slot(
            slot,
            SlotEntry {
                offset: 0,
                length: 0,
            },
        );
        self.set_tuple_count(self.tuple_count() - 1);
        Ok(())
    }

    /// Rewrites the tuple area to squeeze out fragments. Live slots keep
    /// their indices; only their offsets change.
    pub fn compact(&mut self) {
        let slot_count = self.slot_count();
        let mut live: Vec<(SlotId, Vec<u8>)> = Vec::new();
        for i in 0..slot_count {
            let slot = SlotId::new(i as u32);
            if let Ok(bytes) = self.get(slot) {
                live.push((slot, bytes.to_vec()));
            }
        }

        let mut offset = PAGE_SIZE as u16;
        for (slot, bytes) in live {
            offset -= bytes.len() as u16;
            self.data[offset as usize..offset as usize + bytes.len()].copy_from_slice(&bytes);
            self.set_slot(
                slot,
                SlotEntry {
                    offset,
                    length: bytes.len() as u16,
                },
            );
        }
        self.set_free_space_offset(offset);
    }
}

/// Read-only view over a heap page.
pub struct HeapPageRef<'a> {
    data: &'a [u8],
}

impl<'a> HeapPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(read_u32(self.data, PAGE_ID_OFFSET))
    }

    pub fn prev_page(&self) -> Option<PageId> {
        read_page_link(self.data, PREV_PAGE_OFFSET)
    }

    pub fn next_page(&self) -> Option<PageId> {
        read_page_link(self.data, NEXT_PAGE_OFFSET)
    }

    pub fn slot_count(&self) -> u16 {
        read_u16(self.data, SLOT_COUNT_OFFSET)
    }

    pub fn tuple_count(&self) -> u16 {
        read_u16(self.data, TUPLE_COUNT_OFFSET)
    }

    pub fn slot(&self, slot: SlotId) -> Option<SlotEntry> {
        slot_at(self.data, slot, self.slot_count())
    }

    pub fn get(&self, slot: SlotId) -> Result<&[u8]> {
        tuple_bytes(self.data, slot, self.slot_count())
    }

    pub fn contiguous_free_space(&self) -> usize {
        let dir_end = HEAP_HEADER_SIZE + self.slot_count() as usize * SLOT_SIZE;
        (read_u16(self.data, FREE_SPACE_OFFSET) as usize).saturating_sub(dir_end)
    }

    pub fn total_free_space(&self) -> usize {
        let slot_count = self.slot_count();
        let mut live: usize = 0;
        for i in 0..slot_count {
            if let Some(entry) = slot_at(self.data, SlotId::new(i as u32), slot_count) {
                live += entry.length as usize;
            }
        }
        PAGE_SIZE - HEAP_HEADER_SIZE - slot_count as usize * SLOT_SIZE - live
    }

    pub fn can_insert(&self, tuple_len: usize) -> bool {
        self.contiguous_free_space() >= tuple_len + SLOT_SIZE
    }

    pub fn can_insert_after_compaction(&self, tuple_len: usize) -> bool {
        self.total_free_space() >= tuple_len + SLOT_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_page(data: &mut [u8; PAGE_SIZE]) -> HeapPage<'_> {
        let mut page = HeapPage::new(data);
        page.init(PageId::new(1));
        page
    }

    #[test]
    fn test_init_layout() {
        let mut data = [0u8; PAGE_SIZE];
        let page = fresh_page(&mut data);

        assert_eq!(page.page_id(), PageId::new(1));
        assert_eq!(page.slot_count(), 0);
        assert_eq!(page.tuple_count(), 0);
        assert_eq!(page.free_space_offset(), PAGE_SIZE as u16);
        assert_eq!(page.prev_page(), None);
        assert_eq!(page.next_page(), None);
        assert_eq!(
            page.contiguous_free_space(),
            PAGE_SIZE - HEAP_HEADER_SIZE
        );
    }

    #[test]
    fn test_insert_get() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = fresh_page(&mut data);

        let s0 = page.insert(b"alpha").unwrap();
        let s1 = page.insert(b"beta").unwrap();

        assert_eq!(s0, SlotId::new(0));
        assert_eq!(s1, SlotId::new(1));
        assert_eq!(page.tuple_count(), 2);
        assert_eq!(page.get(s0).unwrap(), b"alpha");
        assert_eq!(page.get(s1).unwrap(), b"beta");
    }

    #[test]
    fn test_delete_keeps_slot_index() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = fresh_page(&mut data);

        let s0 = page.insert(b"alpha").unwrap();
        page.delete(s0).unwrap();

        assert_eq!(page.tuple_count(), 0);
        assert_eq!(page.slot_count(), 1);
        assert!(matches!(page.get(s0), Err(MiniError::NotFound)));
        // double delete is NotFound
        assert!(matches!(page.delete(s0), Err(MiniError::NotFound)));

        // The tombstoned index is not handed out again.
        let s1 = page.insert(b"beta").unwrap();
        assert_eq!(s1, SlotId::new(1));
    }

    #[test]
    fn test_update_in_place() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = fresh_page(&mut data);

        let s0 = page.insert(b"hello").unwrap();
        page.update_in_place(s0, b"hi").unwrap();
        assert_eq!(page.get(s0).unwrap(), b"hi");

        assert!(page.update_in_place(s0, b"much longer now").is_err());
    }

    #[test]
    fn test_free_space_accounting() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = fresh_page(&mut data);

        let s0 = page.insert(&[7u8; 100]).unwrap();
        page.insert(&[8u8; 100]).unwrap();

        let contiguous = page.contiguous_free_space();
        assert_eq!(contiguous, PAGE_SIZE - HEAP_HEADER_SIZE - 2 * SLOT_SIZE - 200);
        assert_eq!(page.total_free_space(), contiguous);

        // A tombstone frees bytes totally but not contiguously.
        page.delete(s0).unwrap();
        assert_eq!(page.contiguous_free_space(), contiguous);
        assert_eq!(page.total_free_space(), contiguous + 100);
    }

    #[test]
    fn test_compaction_relocates_live_tuples() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = fresh_page(&mut data);

        let s0 = page.insert(&[1u8; 1000]).unwrap();
        let s1 = page.insert(&[2u8; 1000]).unwrap();
        let s2 = page.insert(&[3u8; 1000]).unwrap();
        page.delete(s1).unwrap();

        let big = vec![9u8; page.contiguous_free_space() + 500];
        assert!(!page.can_insert(big.len()));
        assert!(page.can_insert_after_compaction(big.len()));

        page.compact();
        let s3 = page.insert(&big).unwrap();

        // Surviving slots keep their numbers and contents.
        assert_eq!(page.get(s0).unwrap(), &[1u8; 1000][..]);
        assert_eq!(page.get(s2).unwrap(), &[3u8; 1000][..]);
        assert_eq!(page.get(s3).unwrap(), &big[..]);
        assert!(matches!(page.get(s1), Err(MiniError::NotFound)));
    }

    #[test]
    fn test_fill_page_to_capacity() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = fresh_page(&mut data);

        let tuple = [0u8; 500];
        let mut count = 0;
        while page.can_insert(tuple.len()) {
            page.insert(&tuple).unwrap();
            count += 1;
        }
        assert!(count > 0);
        assert!(page.insert(&tuple).is_err());
        assert_eq!(page.tuple_count() as usize, count);
    }

    #[test]
    fn test_readonly_view() {
        let mut data = [0u8; PAGE_SIZE];
        {
            let mut page = fresh_page(&mut data);
            page.insert(b"persisted").unwrap();
            page.set_next_page(Some(PageId::new(9)));
        }

        let view = HeapPageRef::new(&data);
        assert_eq!(view.page_id(), PageId::new(1));
        assert_eq!(view.next_page(), Some(PageId::new(9)));
        assert_eq!(view.tuple_count(), 1);
        assert_eq!(view.get(SlotId::new(0)).unwrap(), b"persisted");
    }
}
