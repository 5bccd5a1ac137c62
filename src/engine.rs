use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::buffer::{BufferPoolManager, PoolStats};
use crate::catalog::{index_key_of_row, Catalog, IndexInfo};
use crate::common::{MiniError, Result, RowId, DEFAULT_POOL_SIZE};
use crate::heap::{TableHeap, TableIter};
use crate::index::{BTreeIndex, BTreeRangeIter, KeyCodec};
use crate::row::{Row, Schema, Value};
use crate::storage::disk::DiskManager;

/// The engine handle: one per database file, explicit open/close lifecycle.
///
/// The engine wires the disk manager, buffer pool, and catalog together and
/// exposes table and index handles to the executor. It is the only layer
/// that logs. An I/O error flips it into a degraded read-only state where
/// mutations are refused until the database is reopened.
pub struct Engine {
    bpm: Arc<BufferPoolManager>,
    catalog: Mutex<Catalog>,
    degraded: AtomicBool,
}

impl Engine {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_pool_size(path, DEFAULT_POOL_SIZE)
    }

    pub fn open_with_pool_size<P: AsRef<Path>>(path: P, pool_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let disk = Arc::new(DiskManager::new(path)?);
        let bpm = Arc::new(BufferPoolManager::new(pool_size, disk));
        let catalog = Catalog::load(Arc::clone(&bpm))?;
        info!(path = %path.display(), pool_size, "database opened");
        Ok(Self {
            bpm,
            catalog: Mutex::new(catalog),
            degraded: AtomicBool::new(false),
        })
    }

    /// Flushes everything and consumes the handle.
    pub fn close(self) -> Result<()> {
        self.flush()?;
        info!("database closed");
        Ok(())
    }

    /// Persists the catalog and every dirty page, then syncs the file.
    pub fn flush(&self) -> Result<()> {
        self.track((|| {
            self.catalog.lock().save()?;
            self.bpm.flush_all()
        })())
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.bpm.stats()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    pub fn create_table(&self, name: &str, schema: Schema) -> Result<()> {
        self.guard_write()?;
        self.track((|| {
            let mut catalog = self.catalog.lock();
            catalog.create_table(name, schema)?;
            catalog.save()
        })())
    }

    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.guard_write()?;
        self.track((|| {
            let mut catalog = self.catalog.lock();
            catalog.drop_table(name)?;
            catalog.save()
        })())
    }

    pub fn create_index(
        &self,
        name: &str,
        table_name: &str,
        columns: &[&str],
        unique: bool,
    ) -> Result<()> {
        self.guard_write()?;
        self.track((|| {
            let mut catalog = self.catalog.lock();
            catalog.create_index(name, table_name, columns, unique)?;
            catalog.save()
        })())
    }

    pub fn drop_index(&self, name: &str) -> Result<()> {
        self.guard_write()?;
        self.track((|| {
            let mut catalog = self.catalog.lock();
            catalog.drop_index(name)?;
            catalog.save()
        })())
    }

    pub fn table_names(&self) -> Vec<String> {
        let catalog = self.catalog.lock();
        let mut names: Vec<String> = catalog.tables().map(|t| t.name.clone()).collect();
        names.sort();
        names
    }

    /// Handle for row operations on one table.
    pub fn table(&self, name: &str) -> Result<TableHandle<'_>> {
        let catalog = self.catalog.lock();
        let info = catalog
            .table(name)
            .ok_or_else(|| MiniError::TableNotFound(name.to_string()))?;
        Ok(TableHandle {
            engine: self,
            table_id: info.id,
            schema: Arc::clone(&info.schema),
        })
    }

    /// Handle for lookups and scans on one index.
    pub fn index(&self, name: &str) -> Result<IndexHandle<'_>> {
        let catalog = self.catalog.lock();
        let info = catalog
            .index(name)
            .cloned()
            .ok_or_else(|| MiniError::IndexNotFound(name.to_string()))?;
        let schema = Arc::clone(
            &catalog
                .table_by_id(info.table_id)
                .ok_or_else(|| MiniError::TableNotFound(info.table_id.to_string()))?
                .schema,
        );
        let codec = info.codec(&schema);
        Ok(IndexHandle {
            engine: self,
            name: info.name,
            codec,
        })
    }

    fn guard_write(&self) -> Result<()> {
        if self.is_degraded() {
            return Err(MiniError::ReadOnly);
        }
        Ok(())
    }

    /// Records I/O failures: the engine degrades to read-only until reopened.
    fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(MiniError::Io(err)) = &result {
            self.degraded.store(true, Ordering::Release);
            warn!(error = %err, "I/O failure; engine is read-only until reopened");
        }
        result
    }
}

/// Per-table operations, keeping the heap and every index in agreement.
pub struct TableHandle<'a> {
    engine: &'a Engine,
    table_id: u32,
    schema: Arc<Schema>,
}

impl<'a> TableHandle<'a> {
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn row_count(&self) -> u64 {
        self.engine
            .catalog
            .lock()
            .table_by_id(self.table_id)
            .map(|t| t.row_count as u64)
            .unwrap_or(0)
    }

    fn heap(&self) -> Result<TableHeap> {
        let catalog = self.engine.catalog.lock();
        let info = catalog
            .table_by_id(self.table_id)
            .ok_or_else(|| MiniError::TableNotFound(self.table_id.to_string()))?;
        Ok(TableHeap::open(
            Arc::clone(&self.engine.bpm),
            info.heap_head,
        ))
    }

    fn index_infos(&self) -> Vec<IndexInfo> {
        let catalog = self.engine.catalog.lock();
        catalog
            .indexes_for_table(self.table_id)
            .into_iter()
            .cloned()
            .collect()
    }

    fn open_tree(&self, info: &IndexInfo) -> BTreeIndex {
        BTreeIndex::open(
            Arc::clone(&self.engine.bpm),
            info.codec(&self.schema),
            info.root_page_id,
            info.unique,
        )
    }

    /// Inserts a row. Unique indexes are probed before anything mutates, so
    /// a duplicate leaves heap and indexes untouched; a failure mid-way
    /// undoes the partial work.
    pub fn insert(&self, values: Vec<Value>) -> Result<RowId> {
        self.engine.guard_write()?;
        self.engine.track(self.insert_inner(values))
    }

    fn insert_inner(&self, values: Vec<Value>) -> Result<RowId> {
        let row = Row::new(Arc::clone(&self.schema), values)?;
        let bytes = row.to_bytes()?;
        let infos = self.index_infos();

        for info in infos.iter().filter(|i| i.unique) {
            let codec = info.codec(&self.schema);
            let key = index_key_of_row(info, &codec, &row)?;
            if self.open_tree(info).lookup(&key)?.is_some() {
                return Err(MiniError::DuplicateKey);
            }
        }

        let heap = self.heap()?;
        let row_id = heap.insert(&bytes)?;

        let mut inserted: Vec<(usize, Vec<u8>)> = Vec::new();
        for (i, info) in infos.iter().enumerate() {
            let codec = info.codec(&self.schema);
            let key = index_key_of_row(info, &codec, &row)?;
            let mut tree = self.open_tree(info);
            match tree.insert(&key, row_id) {
                Ok(()) => {
                    self.engine
                        .catalog
                        .lock()
                        .set_index_root(&info.name, tree.root_page_id());
                    inserted.push((i, key));
                }
                Err(err) => {
                    for (j, key) in inserted {
                        let info = &infos[j];
                        let mut tree = self.open_tree_current(&info.name, info);
                        let _ = tree.remove_entry(&key, row_id);
                        self.engine
                            .catalog
                            .lock()
                            .set_index_root(&info.name, tree.root_page_id());
                    }
                    let _ = heap.delete(row_id);
                    return Err(err);
                }
            }
        }

        self.engine.catalog.lock().add_row_count(self.table_id, 1);
        Ok(row_id)
    }

    /// Re-opens a tree with the catalog's current root for the index.
    fn open_tree_current(&self, name: &str, fallback: &IndexInfo) -> BTreeIndex {
        let root = self
            .engine
            .catalog
            .lock()
            .index(name)
            .map(|i| i.root_page_id)
            .unwrap_or(fallback.root_page_id);
        BTreeIndex::open(
            Arc::clone(&self.engine.bpm),
            fallback.codec(&self.schema),
            root,
            fallback.unique,
        )
    }

    pub fn get(&self, row_id: RowId) -> Result<Row> {
        let heap = self.heap()?;
        let bytes = heap.get(row_id)?;
        Row::from_bytes(Arc::clone(&self.schema), &bytes)
    }

    /// Deletes a row, dropping its entry from every index first.
    pub fn delete(&self, row_id: RowId) -> Result<()> {
        self.engine.guard_write()?;
        self.engine.track(self.delete_inner(row_id))
    }

    fn delete_inner(&self, row_id: RowId) -> Result<()> {
        let heap = self.heap()?;
        let bytes = heap.get(row_id)?;
        let row = Row::from_bytes(Arc::clone(&self.schema), &bytes)?;

        for info in self.index_infos() {
            let codec = info.codec(&self.schema);
            let key = index_key_of_row(&info, &codec, &row)?;
            let mut tree = self.open_tree(&info);
            tree.remove_entry(&key, row_id)?;
            self.engine
                .catalog
                .lock()
                .set_index_root(&info.name, tree.root_page_id());
        }

        heap.delete(row_id)?;
        self.engine.catalog.lock().add_row_count(self.table_id, -1);
        Ok(())
    }

    /// Updates a row in place or relocating, swapping index entries whose
    /// key or RowId changed. New unique keys are probed up front so a
    /// duplicate leaves everything untouched.
    pub fn update(&self, row_id: RowId, values: Vec<Value>) -> Result<RowId> {
        self.engine.guard_write()?;
        self.engine.track(self.update_inner(row_id, values))
    }

    fn update_inner(&self, row_id: RowId, values: Vec<Value>) -> Result<RowId> {
        let heap = self.heap()?;
        let old_bytes = heap.get(row_id)?;
        let old_row = Row::from_bytes(Arc::clone(&self.schema), &old_bytes)?;
        let new_row = Row::new(Arc::clone(&self.schema), values)?;
        let new_bytes = new_row.to_bytes()?;
        let infos = self.index_infos();

        let mut keys = Vec::with_capacity(infos.len());
        for info in &infos {
            let codec = info.codec(&self.schema);
            let old_key = index_key_of_row(info, &codec, &old_row)?;
            let new_key = index_key_of_row(info, &codec, &new_row)?;
            if info.unique
                && old_key != new_key
                && self.open_tree(info).lookup(&new_key)?.is_some()
            {
                return Err(MiniError::DuplicateKey);
            }
            keys.push((old_key, new_key));
        }

        let new_row_id = heap.update(row_id, &new_bytes)?;

        for (info, (old_key, new_key)) in infos.iter().zip(keys) {
            if old_key == new_key && new_row_id == row_id {
                continue;
            }
            let mut tree = self.open_tree_current(&info.name, info);
            tree.remove_entry(&old_key, row_id)?;
            tree.insert(&new_key, new_row_id)?;
            self.engine
                .catalog
                .lock()
                .set_index_root(&info.name, tree.root_page_id());
        }

        Ok(new_row_id)
    }

    /// Forward scan yielding decoded rows.
    pub fn scan(&self) -> Result<RowScan> {
        let heap = self.heap()?;
        Ok(RowScan {
            iter: heap.iter(),
            schema: Arc::clone(&self.schema),
        })
    }
}

/// Iterator adapter decoding heap bytes into rows.
pub struct RowScan {
    iter: TableIter,
    schema: Arc<Schema>,
}

impl Iterator for RowScan {
    type Item = Result<(RowId, Row)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.iter.next_row() {
            Ok(Some((row_id, bytes))) => {
                Some(Row::from_bytes(Arc::clone(&self.schema), &bytes).map(|row| (row_id, row)))
            }
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// Read-side operations on one index.
pub struct IndexHandle<'a> {
    engine: &'a Engine,
    name: String,
    codec: KeyCodec,
}

impl<'a> IndexHandle<'a> {
    fn open_tree(&self) -> Result<BTreeIndex> {
        let catalog = self.engine.catalog.lock();
        let info = catalog
            .index(&self.name)
            .ok_or_else(|| MiniError::IndexNotFound(self.name.clone()))?;
        Ok(BTreeIndex::open(
            Arc::clone(&self.engine.bpm),
            self.codec.clone(),
            info.root_page_id,
            info.unique,
        ))
    }

    /// Point lookup by key column values.
    pub fn lookup(&self, key_values: &[Value]) -> Result<Option<RowId>> {
        let key = self.codec.encode(key_values)?;
        self.open_tree()?.lookup(&key)
    }

    /// Range scan between optional value bounds.
    pub fn range(
        &self,
        lo: Option<&[Value]>,
        lo_inclusive: bool,
        hi: Option<&[Value]>,
        hi_inclusive: bool,
    ) -> Result<BTreeRangeIter> {
        let lo_key = lo.map(|v| self.codec.encode(v)).transpose()?;
        let hi_key = hi.map(|v| self.codec.encode(v)).transpose()?;
        self.open_tree()?.range(
            lo_key.as_deref(),
            lo_inclusive,
            hi_key.as_deref(),
            hi_inclusive,
        )
    }
}
