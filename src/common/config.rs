use super::types::{FrameId, PageId};

/// Size of a page in bytes (4 KB)
pub const PAGE_SIZE: usize = 4096;

/// Invalid page ID constant
pub const INVALID_PAGE_ID: PageId = PageId(u32::MAX);

/// Invalid frame ID constant
pub const INVALID_FRAME_ID: FrameId = FrameId(u32::MAX);

/// Default buffer pool size (number of frames)
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Maximum number of columns in a schema
pub const MAX_COLUMNS: usize = 32;

/// Maximum length of a column or table name in bytes
pub const MAX_NAME_LEN: usize = 64;
