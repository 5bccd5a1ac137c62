use crate::common::{Lsn, PageId, INVALID_LSN, PAGE_SIZE};

const PAGE_ID_OFFSET: usize = 0;
const LSN_OFFSET: usize = 4;
const FREE_COUNT_OFFSET: usize = 8;
const BITS_OFFSET: usize = 16;

/// Bitmap header size in bytes.
pub const BITMAP_HEADER: usize = BITS_OFFSET;

/// Number of data pages one bitmap page manages: one bit per page over the
/// non-header remainder.
pub const PAGES_PER_EXTENT: u32 = 8 * (PAGE_SIZE - BITMAP_HEADER) as u32;

/// View over an extent bitmap page. Bit set means the page is allocated.
///
/// The header caches the number of clear bits so the allocation scan can
/// skip full extents without touching the bit array.
pub struct BitmapPage<'a> {
    data: &'a mut [u8],
}

impl<'a> BitmapPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    /// Initializes a fresh bitmap page for the given extent: all bits clear.
    pub fn init(&mut self, extent: u32) {
        self.data.fill(0);
        let id = PageId::bitmap(extent);
        self.data[PAGE_ID_OFFSET..PAGE_ID_OFFSET + 4].copy_from_slice(&id.as_u32().to_le_bytes());
        self.data[LSN_OFFSET..LSN_OFFSET + 4].copy_from_slice(&INVALID_LSN.to_le_bytes());
        self.set_free_count(PAGES_PER_EXTENT);
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(u32::from_le_bytes(
            self.data[PAGE_ID_OFFSET..PAGE_ID_OFFSET + 4].try_into().unwrap(),
        ))
    }

    pub fn lsn(&self) -> Lsn {
        u32::from_le_bytes(self.data[LSN_OFFSET..LSN_OFFSET + 4].try_into().unwrap())
    }

    pub fn free_count(&self) -> u32 {
        u32::from_le_bytes(
            self.data[FREE_COUNT_OFFSET..FREE_COUNT_OFFSET + 4]
                .try_into()
                .unwrap(),
        )
    }

    fn set_free_count(&mut self, count: u32) {
        self.data[FREE_COUNT_OFFSET..FREE_COUNT_OFFSET + 4].copy_from_slice(&count.to_le_bytes());
    }

    pub fn is_set(&self, offset: u32) -> bool {
        debug_assert!(offset < PAGES_PER_EXTENT);
        let byte = BITS_OFFSET + (offset / 8) as usize;
        let bit = offset % 8;
        self.data[byte] & (1 << bit) != 0
    }

    /// Sets the bit for `offset`. Returns false if it was already set.
    pub fn set(&mut self, offset: u32) -> bool {
        debug_assert!(offset < PAGES_PER_EXTENT);
        let byte = BITS_OFFSET + (offset / 8) as usize;
        let bit = offset % 8;
        if self.data[byte] & (1 << bit) != 0 {
            return false;
        }
        self.data[byte] |= 1 << bit;
        self.set_free_count(self.free_count() - 1);
        true
    }

    /// Clears the bit for `offset`. Returns false if it was already clear.
    pub fn clear(&mut self, offset: u32) -> bool {
        debug_assert!(offset < PAGES_PER_EXTENT);
        let byte = BITS_OFFSET + (offset / 8) as usize;
        let bit = offset % 8;
        if self.data[byte] & (1 << bit) == 0 {
            return false;
        }
        self.data[byte] &= !(1 << bit);
        self.set_free_count(self.free_count() + 1);
        true
    }

    /// First clear bit, scanning bytes then bits from the front.
    pub fn first_clear(&self) -> Option<u32> {
        if self.free_count() == 0 {
            return None;
        }
        for (i, &byte) in self.data[BITS_OFFSET..].iter().enumerate() {
            if byte != 0xFF {
                let bit = byte.trailing_ones();
                return Some((i as u32) * 8 + bit);
            }
        }
        None
    }
}

/// Read-only view of a bitmap page.
pub struct BitmapPageRef<'a> {
    data: &'a [u8],
}

impl<'a> BitmapPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn free_count(&self) -> u32 {
        u32::from_le_bytes(
            self.data[FREE_COUNT_OFFSET..FREE_COUNT_OFFSET + 4]
                .try_into()
                .unwrap(),
        )
    }

    pub fn is_set(&self, offset: u32) -> bool {
        debug_assert!(offset < PAGES_PER_EXTENT);
        let byte = BITS_OFFSET + (offset / 8) as usize;
        let bit = offset % 8;
        self.data[byte] & (1 << bit) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_set_clear() {
        let mut data = [0u8; PAGE_SIZE];
        let mut bm = BitmapPage::new(&mut data);
        bm.init(0);

        assert_eq!(bm.free_count(), PAGES_PER_EXTENT);
        assert!(!bm.is_set(10));

        assert!(bm.set(10));
        assert!(bm.is_set(10));
        assert_eq!(bm.free_count(), PAGES_PER_EXTENT - 1);

        // setting twice is a no-op
        assert!(!bm.set(10));
        assert_eq!(bm.free_count(), PAGES_PER_EXTENT - 1);

        assert!(bm.clear(10));
        assert!(!bm.is_set(10));
        assert_eq!(bm.free_count(), PAGES_PER_EXTENT);
        assert!(!bm.clear(10));
    }

    #[test]
    fn test_bitmap_first_clear_scans_in_order() {
        let mut data = [0u8; PAGE_SIZE];
        let mut bm = BitmapPage::new(&mut data);
        bm.init(0);

        assert_eq!(bm.first_clear(), Some(0));
        for i in 0..12 {
            bm.set(i);
        }
        assert_eq!(bm.first_clear(), Some(12));

        bm.clear(5);
        assert_eq!(bm.first_clear(), Some(5));
    }

    #[test]
    fn test_bitmap_full() {
        let mut data = [0u8; PAGE_SIZE];
        let mut bm = BitmapPage::new(&mut data);
        bm.init(0);

        for i in 0..PAGES_PER_EXTENT {
            assert!(bm.set(i));
        }
        assert_eq!(bm.free_count(), 0);
        assert_eq!(bm.first_clear(), None);
    }
}
