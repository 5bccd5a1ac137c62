pub mod btree_index;
pub mod btree_iterator;
pub mod btree_page;
mod key;

pub use btree_index::BTreeIndex;
pub use btree_iterator::BTreeRangeIter;
pub use btree_page::{BTreeNode, BTreeNodeRef};
pub use key::KeyCodec;
