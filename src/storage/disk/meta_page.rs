use crate::common::{MiniError, PageId, Result, INVALID_PAGE_ID, PAGE_SIZE};

/// File magic, "MNSQ".
pub const META_MAGIC: u32 = 0x4D4E5351;
pub const META_VERSION: u16 = 1;

/// Physical page number of the first bitmap page, fixed by the file layout.
pub const FIRST_BITMAP_PHYSICAL: u32 = 1;

const MAGIC_OFFSET: usize = 0;
const VERSION_OFFSET: usize = 4;
const PAGE_SIZE_OFFSET: usize = 6;
const CATALOG_ROOT_OFFSET: usize = 8;
const FIRST_BITMAP_OFFSET: usize = 12;
const EXTENT_COUNT_OFFSET: usize = 16;
const FREE_HINT_OFFSET: usize = 20;

/// View over the meta page at physical offset 0.
///
/// The meta page is the file header: magic, version, page size, the catalog
/// root pointer, and the extent bookkeeping the allocator resumes from on
/// reopen.
pub struct MetaPage<'a> {
    data: &'a mut [u8],
}

impl<'a> MetaPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    /// Initializes a fresh meta page for an empty database file.
    pub fn init(&mut self) {
        self.data.fill(0);
        self.data[MAGIC_OFFSET..MAGIC_OFFSET + 4].copy_from_slice(&META_MAGIC.to_le_bytes());
        self.data[VERSION_OFFSET..VERSION_OFFSET + 2].copy_from_slice(&META_VERSION.to_le_bytes());
        self.data[PAGE_SIZE_OFFSET..PAGE_SIZE_OFFSET + 2]
            .copy_from_slice(&(PAGE_SIZE as u16).to_le_bytes());
        self.set_catalog_root(None);
        self.data[FIRST_BITMAP_OFFSET..FIRST_BITMAP_OFFSET + 4]
            .copy_from_slice(&FIRST_BITMAP_PHYSICAL.to_le_bytes());
        self.set_extent_count(0);
        self.set_free_hint(0);
    }

    pub fn set_catalog_root(&mut self, root: Option<PageId>) {
        let raw = root.unwrap_or(INVALID_PAGE_ID).as_u32();
        self.data[CATALOG_ROOT_OFFSET..CATALOG_ROOT_OFFSET + 4]
            .copy_from_slice(&raw.to_le_bytes());
    }

    pub fn set_extent_count(&mut self, count: u32) {
        self.data[EXTENT_COUNT_OFFSET..EXTENT_COUNT_OFFSET + 4]
            .copy_from_slice(&count.to_le_bytes());
    }

    pub fn set_free_hint(&mut self, extent: u32) {
        self.data[FREE_HINT_OFFSET..FREE_HINT_OFFSET + 4].copy_from_slice(&extent.to_le_bytes());
    }
}

/// Read-only view of the meta page.
pub struct MetaPageRef<'a> {
    data: &'a [u8],
}

impl<'a> MetaPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    /// Validates magic, version, and page size.
    pub fn validate(&self) -> Result<()> {
        let magic = u32::from_le_bytes(self.data[MAGIC_OFFSET..MAGIC_OFFSET + 4].try_into().unwrap());
        if magic != META_MAGIC {
            return Err(MiniError::Corruption(format!(
                "bad file magic {magic:#010x}"
            )));
        }
        let version =
            u16::from_le_bytes(self.data[VERSION_OFFSET..VERSION_OFFSET + 2].try_into().unwrap());
        if version != META_VERSION {
            return Err(MiniError::Corruption(format!(
                "unsupported file version {version}"
            )));
        }
        let page_size =
            u16::from_le_bytes(self.data[PAGE_SIZE_OFFSET..PAGE_SIZE_OFFSET + 2].try_into().unwrap());
        if page_size as usize != PAGE_SIZE {
            return Err(MiniError::Corruption(format!(
                "file page size {page_size} does not match engine page size {PAGE_SIZE}"
            )));
        }
        Ok(())
    }

    pub fn catalog_root(&self) -> Option<PageId> {
        let raw = u32::from_le_bytes(
            self.data[CATALOG_ROOT_OFFSET..CATALOG_ROOT_OFFSET + 4]
                .try_into()
                .unwrap(),
        );
        if raw == INVALID_PAGE_ID.as_u32() {
            None
        } else {
            Some(PageId::new(raw))
        }
    }

    pub fn extent_count(&self) -> u32 {
        u32::from_le_bytes(
            self.data[EXTENT_COUNT_OFFSET..EXTENT_COUNT_OFFSET + 4]
                .try_into()
                .unwrap(),
        )
    }

    pub fn free_hint(&self) -> u32 {
        u32::from_le_bytes(self.data[FREE_HINT_OFFSET..FREE_HINT_OFFSET + 4].try_into().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_page_init_and_validate() {
        let mut data = [0u8; PAGE_SIZE];
        {
            let mut meta = MetaPage::new(&mut data);
            meta.init();
            meta.set_catalog_root(Some(PageId::new(7)));
            meta.set_extent_count(2);
            meta.set_free_hint(1);
        }

        let meta = MetaPageRef::new(&data);
        meta.validate().unwrap();
        assert_eq!(meta.catalog_root(), Some(PageId::new(7)));
        assert_eq!(meta.extent_count(), 2);
        assert_eq!(meta.free_hint(), 1);
    }

    #[test]
    fn test_meta_page_bad_magic() {
        let data = [0u8; PAGE_SIZE];
        let meta = MetaPageRef::new(&data);
        assert!(matches!(meta.validate(), Err(MiniError::Corruption(_))));
    }
}
