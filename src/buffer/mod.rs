mod buffer_pool;
mod frame;
mod lru_replacer;
mod page_guard;

pub use buffer_pool::{BufferPoolManager, PoolStats};
pub use frame::Frame;
pub use lru_replacer::LruReplacer;
pub use page_guard::{ReadPageGuard, WritePageGuard};
