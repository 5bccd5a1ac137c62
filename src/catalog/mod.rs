mod catalog;

pub use catalog::{index_key_of_row, Catalog, IndexInfo, TableInfo};
