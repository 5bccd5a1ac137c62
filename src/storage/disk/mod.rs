mod bitmap_page;
mod disk_manager;
mod meta_page;

pub use bitmap_page::{BitmapPage, BitmapPageRef, BITMAP_HEADER, PAGES_PER_EXTENT};
pub use disk_manager::DiskManager;
pub use meta_page::{MetaPage, MetaPageRef, META_MAGIC, META_VERSION};
