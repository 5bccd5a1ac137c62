//! MiniSQL - a single-user disk-oriented relational storage engine
//!
//! The crate implements the storage and indexing core of a small SQL
//! database: data lives in one paged file and a buffer pool caches pages in
//! memory with a pinning discipline and LRU eviction.
//!
//! # Architecture
//!
//! Four layers, each depending only on the one below:
//!
//! - **Disk Manager** (`storage::disk`): owns the database file, maps dense
//!   logical page IDs to physical offsets through bitmap extents, and
//!   allocates/frees pages.
//! - **Buffer Pool** (`buffer`): a fixed array of frames caching pages by
//!   logical ID, with pin counts, dirty bits, an LRU replacer, and RAII
//!   page guards.
//! - **Record Heap** (`heap`): a doubly linked chain of slotted pages per
//!   table, with stable `RowId`s and a forward scan iterator.
//! - **B+Tree Index** (`index`): a disk-resident tree keyed by typed column
//!   values, with chained leaves for range scans and full split, borrow,
//!   and merge maintenance.
//!
//! On top sit the `catalog` (table/index metadata, persisted in catalog
//! pages) and the `engine` handle the executor talks to.
//!
//! # Example
//!
//! ```rust,no_run
//! use minisql::engine::Engine;
//! use minisql::row::{DataType, Schema, Value};
//!
//! let engine = Engine::open("demo.db").unwrap();
//! engine
//!     .create_table(
//!         "t",
//!         Schema::builder()
//!             .primary_key_column("id", DataType::Int)
//!             .column("v", DataType::Char(8))
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let table = engine.table("t").unwrap();
//! let rid = table
//!     .insert(vec![Value::Int(1), Value::Char("hello".into())])
//!     .unwrap();
//! assert_eq!(table.get(rid).unwrap().value(0), Some(&Value::Int(1)));
//!
//! engine.close().unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod engine;
pub mod heap;
pub mod index;
pub mod row;
pub mod storage;

// Re-export the identifiers everything else is written in terms of.
pub use common::{MiniError, PageId, Result, RowId, SlotId};
