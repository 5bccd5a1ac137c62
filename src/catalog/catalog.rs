use std::collections::HashMap;
use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{MiniError, PageId, Result, INVALID_PAGE_ID, MAX_NAME_LEN, PAGE_SIZE};
use crate::heap::TableHeap;
use crate::index::{BTreeIndex, KeyCodec};
use crate::row::{Column, DataType, Row, Schema};

/// Magic prefix of every catalog table entry.
const TABLE_ENTRY_MAGIC: u32 = 0x02020202;

/// Catalog chain page: page id (4), lsn (4), next (4), payload length (2),
/// then payload bytes.
const CHAIN_NEXT_OFFSET: usize = 8;
const CHAIN_LEN_OFFSET: usize = 12;
const CHAIN_PAYLOAD_OFFSET: usize = 14;
const CHAIN_CAPACITY: usize = PAGE_SIZE - CHAIN_PAYLOAD_OFFSET;

/// One table known to the catalog.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub id: u32,
    pub name: String,
    pub schema: Arc<Schema>,
    pub heap_head: PageId,
    pub row_count: u32,
}

/// One index known to the catalog.
#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub name: String,
    pub table_id: u32,
    pub key_columns: Vec<usize>,
    pub root_page_id: PageId,
    pub unique: bool,
}

impl IndexInfo {
    /// Codec over the index's key column types.
    pub fn codec(&self, schema: &Schema) -> KeyCodec {
        let types = self
            .key_columns
            .iter()
            .map(|&i| *schema.column(i).expect("key ordinal in range").data_type())
            .collect();
        KeyCodec::new(types)
    }
}

/// The catalog manager: owns table and index metadata and persists it in a
/// chain of catalog pages rooted at the meta page's catalog root pointer.
pub struct Catalog {
    bpm: Arc<BufferPoolManager>,
    tables: HashMap<u32, TableInfo>,
    table_names: HashMap<String, u32>,
    indexes: HashMap<String, IndexInfo>,
    next_table_id: u32,
    dirty: bool,
}

impl Catalog {
    /// Loads the catalog from disk, or starts empty on a fresh file.
    pub fn load(bpm: Arc<BufferPoolManager>) -> Result<Self> {
        let mut catalog = Self {
            bpm,
            tables: HashMap::new(),
            table_names: HashMap::new(),
            indexes: HashMap::new(),
            next_table_id: 1,
            dirty: false,
        };

        if let Some(root) = catalog.bpm.disk_manager().catalog_root() {
            let payload = catalog.read_chain(root)?;
            catalog.parse(&payload)?;
        }
        Ok(catalog)
    }

    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.table_names.get(name).and_then(|id| self.tables.get(id))
    }

    pub fn table_by_id(&self, id: u32) -> Option<&TableInfo> {
        self.tables.get(&id)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableInfo> {
        self.tables.values()
    }

    pub fn index(&self, name: &str) -> Option<&IndexInfo> {
        self.indexes.get(name)
    }

    pub fn indexes(&self) -> impl Iterator<Item = &IndexInfo> {
        self.indexes.values()
    }

    pub fn indexes_for_table(&self, table_id: u32) -> Vec<&IndexInfo> {
        let mut found: Vec<&IndexInfo> = self
            .indexes
            .values()
            .filter(|idx| idx.table_id == table_id)
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Creates a table and auto-creates one unique index per primary-key or
    /// unique column.
    pub fn create_table(&mut self, name: &str, schema: Schema) -> Result<u32> {
        if name.is_empty() || name.as_bytes().len() > MAX_NAME_LEN {
            return Err(MiniError::SchemaViolation(format!(
                "table name '{name}' is empty or longer than {MAX_NAME_LEN} bytes"
            )));
        }
        if self.table_names.contains_key(name) {
            return Err(MiniError::TableExists(name.to_string()));
        }
        schema.validate()?;

        let heap = TableHeap::create(Arc::clone(&self.bpm))?;
        let table_id = self.next_table_id;
        self.next_table_id += 1;

        let schema = Arc::new(schema);
        let info = TableInfo {
            id: table_id,
            name: name.to_string(),
            schema: Arc::clone(&schema),
            heap_head: heap.first_page_id(),
            row_count: 0,
        };
        self.tables.insert(table_id, info);
        self.table_names.insert(name.to_string(), table_id);
        self.dirty = true;

        // Uniqueness constraints get their enforcing indexes up front.
        let auto: Vec<(String, usize)> = schema
            .columns()
            .filter(|c| c.is_unique())
            .map(|c| {
                let index_name = if c.is_primary_key() {
                    format!("{name}_pkey")
                } else {
                    format!("{name}_{}_key", c.name())
                };
                (index_name, c.ordinal())
            })
            .collect();
        for (index_name, ordinal) in auto {
            if let Err(err) = self.create_empty_index(&index_name, table_id, vec![ordinal], true) {
                let _ = self.drop_table(name);
                return Err(err);
            }
        }

        Ok(table_id)
    }

    /// Drops a table together with its heap chain and every index on it.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        let table_id = *self
            .table_names
            .get(name)
            .ok_or_else(|| MiniError::TableNotFound(name.to_string()))?;

        let index_names: Vec<String> = self
            .indexes
            .values()
            .filter(|idx| idx.table_id == table_id)
            .map(|idx| idx.name.clone())
            .collect();
        for index_name in index_names {
            self.drop_index(&index_name)?;
        }

        let info = self.tables.remove(&table_id).expect("table id resolved");
        self.table_names.remove(name);
        let heap = TableHeap::open(Arc::clone(&self.bpm), info.heap_head);
        heap.free_all()?;
        self.dirty = true;
        Ok(())
    }

    /// Creates an index over existing table columns and back-fills it from a
    /// full heap scan. A duplicate in a unique index aborts the creation.
    pub fn create_index(
        &mut self,
        name: &str,
        table_name: &str,
        columns: &[&str],
        unique: bool,
    ) -> Result<()> {
        if columns.is_empty() {
            return Err(MiniError::SchemaViolation(
                "index needs at least one key column".to_string(),
            ));
        }
        let table = self
            .table(table_name)
            .ok_or_else(|| MiniError::TableNotFound(table_name.to_string()))?;
        let table_id = table.id;
        let schema = Arc::clone(&table.schema);
        let heap_head = table.heap_head;

        let mut ordinals = Vec::with_capacity(columns.len());
        for column in columns {
            let ordinal = schema.column_index(column).ok_or_else(|| {
                MiniError::SchemaViolation(format!(
                    "table '{table_name}' has no column '{column}'"
                ))
            })?;
            ordinals.push(ordinal);
        }

        self.create_empty_index(name, table_id, ordinals.clone(), unique)?;

        // Back-fill from the heap.
        let info = self.indexes.get(name).expect("index just created").clone();
        let codec = info.codec(&schema);
        let mut tree = BTreeIndex::open(
            Arc::clone(&self.bpm),
            codec.clone(),
            info.root_page_id,
            unique,
        );

        let heap = TableHeap::open(Arc::clone(&self.bpm), heap_head);
        let mut backfill = || -> Result<()> {
            for item in heap.iter() {
                let (row_id, bytes) = item?;
                let row = Row::from_bytes(Arc::clone(&schema), &bytes)?;
                let key_values: Vec<_> = ordinals
                    .iter()
                    .map(|&i| row.values()[i].clone())
                    .collect();
                let key = codec.encode(&key_values)?;
                tree.insert(&key, row_id)?;
            }
            Ok(())
        };

        if let Err(err) = backfill() {
            let _ = tree.destroy();
            self.indexes.remove(name);
            return Err(err);
        }

        self.set_index_root(name, tree.root_page_id());
        Ok(())
    }

    fn create_empty_index(
        &mut self,
        name: &str,
        table_id: u32,
        key_columns: Vec<usize>,
        unique: bool,
    ) -> Result<()> {
        if name.is_empty() || name.as_bytes().len() > MAX_NAME_LEN {
            return Err(MiniError::SchemaViolation(format!(
                "index name '{name}' is empty or longer than {MAX_NAME_LEN} bytes"
            )));
        }
        if self.indexes.contains_key(name) {
            return Err(MiniError::IndexExists(name.to_string()));
        }
        let schema = Arc::clone(
            &self
                .tables
                .get(&table_id)
                .ok_or_else(|| MiniError::TableNotFound(table_id.to_string()))?
                .schema,
        );

        let types: Vec<DataType> = key_columns
            .iter()
            .map(|&i| {
                schema
                    .column(i)
                    .map(|c| *c.data_type())
                    .ok_or_else(|| {
                        MiniError::SchemaViolation(format!("key ordinal {i} out of range"))
                    })
            })
            .collect::<Result<_>>()?;

        let tree = BTreeIndex::create(Arc::clone(&self.bpm), KeyCodec::new(types), unique)?;
        self.indexes.insert(
            name.to_string(),
            IndexInfo {
                name: name.to_string(),
                table_id,
                key_columns,
                root_page_id: tree.root_page_id(),
                unique,
            },
        );
        self.dirty = true;
        Ok(())
    }

    /// Drops an index and frees its pages.
    pub fn drop_index(&mut self, name: &str) -> Result<()> {
        let info = self
            .indexes
            .get(name)
            .cloned()
            .ok_or_else(|| MiniError::IndexNotFound(name.to_string()))?;
        let schema = Arc::clone(
            &self
                .tables
                .get(&info.table_id)
                .expect("index references a live table")
                .schema,
        );

        let tree = BTreeIndex::open(
            Arc::clone(&self.bpm),
            info.codec(&schema),
            info.root_page_id,
            info.unique,
        );
        tree.destroy()?;
        self.indexes.remove(name);
        self.dirty = true;
        Ok(())
    }

    /// Records a root change after an index mutation split or collapsed the
    /// root.
    pub fn set_index_root(&mut self, name: &str, root: PageId) {
        if let Some(info) = self.indexes.get_mut(name) {
            if info.root_page_id != root {
                info.root_page_id = root;
                self.dirty = true;
            }
        }
    }

    /// Adjusts a table's cached row count.
    pub fn add_row_count(&mut self, table_id: u32, delta: i64) {
        if let Some(info) = self.tables.get_mut(&table_id) {
            info.row_count = (info.row_count as i64 + delta).max(0) as u32;
            self.dirty = true;
        }
    }

    /// Serializes and writes the catalog back to its page chain, growing or
    /// shrinking the chain as needed.
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let payload = self.serialize();

        let mut existing = Vec::new();
        if let Some(root) = self.bpm.disk_manager().catalog_root() {
            let mut current = Some(root);
            while let Some(page_id) = current {
                let guard = self.bpm.fetch_read(page_id)?;
                current = chain_next(guard.data());
                drop(guard);
                existing.push(page_id);
            }
        }

        if payload.is_empty() {
            for page_id in existing {
                self.bpm.delete_page(page_id)?;
            }
            self.bpm.disk_manager().set_catalog_root(None);
            self.dirty = false;
            return Ok(());
        }

        let needed = (payload.len() + CHAIN_CAPACITY - 1) / CHAIN_CAPACITY;
        while existing.len() < needed {
            existing.push(self.bpm.new_page()?);
        }
        while existing.len() > needed {
            let extra = existing.pop().expect("chain longer than needed");
            self.bpm.delete_page(extra)?;
        }

        for (i, chunk) in payload.chunks(CHAIN_CAPACITY).enumerate() {
            let page_id = existing[i];
            let next = existing.get(i + 1).copied();
            let mut guard = self.bpm.fetch_write(page_id)?;
            let data = guard.data_mut();
            data.fill(0);
            data[0..4].copy_from_slice(&page_id.as_u32().to_le_bytes());
            data[CHAIN_NEXT_OFFSET..CHAIN_NEXT_OFFSET + 4]
                .copy_from_slice(&next.unwrap_or(INVALID_PAGE_ID).as_u32().to_le_bytes());
            data[CHAIN_LEN_OFFSET..CHAIN_LEN_OFFSET + 2]
                .copy_from_slice(&(chunk.len() as u16).to_le_bytes());
            data[CHAIN_PAYLOAD_OFFSET..CHAIN_PAYLOAD_OFFSET + chunk.len()]
                .copy_from_slice(chunk);
        }

        self.bpm.disk_manager().set_catalog_root(Some(existing[0]));
        self.dirty = false;
        Ok(())
    }

    fn read_chain(&self, root: PageId) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        let mut current = Some(root);
        while let Some(page_id) = current {
            let guard = self.bpm.fetch_read(page_id)?;
            let data = guard.data();
            let len = u16::from_le_bytes(
                data[CHAIN_LEN_OFFSET..CHAIN_LEN_OFFSET + 2].try_into().unwrap(),
            ) as usize;
            if len > CHAIN_CAPACITY {
                return Err(MiniError::Corruption(format!(
                    "catalog page {page_id} claims {len} payload bytes"
                )));
            }
            payload.extend_from_slice(&data[CHAIN_PAYLOAD_OFFSET..CHAIN_PAYLOAD_OFFSET + len]);
            current = chain_next(data);
        }
        Ok(payload)
    }

    fn serialize(&self) -> Vec<u8> {
        let mut table_ids: Vec<u32> = self.tables.keys().copied().collect();
        table_ids.sort_unstable();

        let mut out = Vec::new();
        for table_id in table_ids {
            let info = &self.tables[&table_id];
            out.extend(TABLE_ENTRY_MAGIC.to_le_bytes());
            out.extend(info.id.to_le_bytes());
            write_name(&mut out, &info.name);

            out.push(info.schema.column_count() as u8);
            for column in info.schema.columns() {
                write_name(&mut out, column.name());
                out.push(column.data_type().type_code());
                out.push(column.data_type().length_byte());
                out.push(column.flags_byte());
            }

            out.extend(info.heap_head.as_u32().to_le_bytes());
            out.extend(info.row_count.to_le_bytes());

            let indexes = self.indexes_for_table(info.id);
            out.extend((indexes.len() as u32).to_le_bytes());
            for index in indexes {
                write_name(&mut out, &index.name);
                out.push(index.key_columns.len() as u8);
                for &ordinal in &index.key_columns {
                    out.push(ordinal as u8);
                }
                out.extend(index.root_page_id.as_u32().to_le_bytes());
                out.push(index.unique as u8);
            }
        }
        out
    }

    fn parse(&mut self, payload: &[u8]) -> Result<()> {
        let mut reader = Reader::new(payload);
        let mut max_table_id = 0;

        while reader.remaining() > 0 {
            let magic = reader.u32()?;
            if magic != TABLE_ENTRY_MAGIC {
                return Err(MiniError::Corruption(format!(
                    "bad catalog entry magic {magic:#010x}"
                )));
            }
            let table_id = reader.u32()?;
            let table_name = reader.name()?;

            let column_count = reader.u8()? as usize;
            let mut columns = Vec::with_capacity(column_count);
            for _ in 0..column_count {
                let column_name = reader.name()?;
                let type_code = reader.u8()?;
                let length = reader.u8()?;
                let flags = reader.u8()?;
                let data_type = DataType::from_catalog(type_code, length)?;
                columns.push(Column::from_catalog(column_name, data_type, flags));
            }
            let schema = Arc::new(Schema::new(columns));
            schema.validate()?;

            let heap_head = PageId::new(reader.u32()?);
            let row_count = reader.u32()?;

            let index_count = reader.u32()? as usize;
            for _ in 0..index_count {
                let index_name = reader.name()?;
                let key_count = reader.u8()? as usize;
                let mut key_columns = Vec::with_capacity(key_count);
                for _ in 0..key_count {
                    let ordinal = reader.u8()? as usize;
                    if ordinal >= schema.column_count() {
                        return Err(MiniError::Corruption(format!(
                            "index '{index_name}' references column {ordinal} of {}-column table",
                            schema.column_count()
                        )));
                    }
                    key_columns.push(ordinal);
                }
                let root_page_id = PageId::new(reader.u32()?);
                let unique = reader.u8()? != 0;
                self.indexes.insert(
                    index_name.clone(),
                    IndexInfo {
                        name: index_name,
                        table_id,
                        key_columns,
                        root_page_id,
                        unique,
                    },
                );
            }

            max_table_id = max_table_id.max(table_id);
            self.table_names.insert(table_name.clone(), table_id);
            self.tables.insert(
                table_id,
                TableInfo {
                    id: table_id,
                    name: table_name,
                    schema,
                    heap_head,
                    row_count,
                },
            );
        }

        self.next_table_id = max_table_id + 1;
        Ok(())
    }
}

fn chain_next(data: &[u8]) -> Option<PageId> {
    let raw = u32::from_le_bytes(
        data[CHAIN_NEXT_OFFSET..CHAIN_NEXT_OFFSET + 4].try_into().unwrap(),
    );
    if raw == INVALID_PAGE_ID.as_u32() {
        None
    } else {
        Some(PageId::new(raw))
    }
}

fn write_name(out: &mut Vec<u8>, name: &str) {
    let bytes = name.as_bytes();
    out.extend((bytes.len() as u16).to_le_bytes());
    out.extend(bytes);
}

/// Cursor over serialized catalog bytes; truncation is corruption.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(MiniError::Corruption(
                "catalog entry truncated".to_string(),
            ));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn name(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Key bytes of `row` under index `info`.
pub fn index_key_of_row(info: &IndexInfo, codec: &KeyCodec, row: &Row) -> Result<Vec<u8>> {
    let values: Vec<_> = info
        .key_columns
        .iter()
        .map(|&i| row.values()[i].clone())
        .collect();
    codec.encode(&values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::DiskManager;
    use tempfile::NamedTempFile;

    fn create_catalog(pool_size: usize) -> (Catalog, Arc<BufferPoolManager>, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let disk = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(pool_size, disk));
        (Catalog::load(Arc::clone(&bpm)).unwrap(), bpm, temp_file)
    }

    fn sample_schema() -> Schema {
        Schema::builder()
            .primary_key_column("id", DataType::Int)
            .column("v", DataType::Char(8))
            .nullable_column("score", DataType::Float)
            .build()
    }

    #[test]
    fn test_create_table_auto_creates_pk_index() {
        let (mut catalog, _bpm, _temp) = create_catalog(16);

        let table_id = catalog.create_table("t", sample_schema()).unwrap();
        assert!(catalog.table("t").is_some());

        let indexes = catalog.indexes_for_table(table_id);
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].name, "t_pkey");
        assert!(indexes[0].unique);
        assert_eq!(indexes[0].key_columns, vec![0]);
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let (mut catalog, _bpm, _temp) = create_catalog(16);
        catalog.create_table("t", sample_schema()).unwrap();
        assert!(matches!(
            catalog.create_table("t", sample_schema()),
            Err(MiniError::TableExists(_))
        ));
    }

    #[test]
    fn test_drop_table_frees_heap_and_indexes() {
        let (mut catalog, bpm, _temp) = create_catalog(16);
        let table_id = catalog.create_table("t", sample_schema()).unwrap();
        let heap_head = catalog.table("t").unwrap().heap_head;
        let index_root = catalog.indexes_for_table(table_id)[0].root_page_id;

        catalog.drop_table("t").unwrap();

        assert!(catalog.table("t").is_none());
        assert!(catalog.indexes_for_table(table_id).is_empty());
        let disk = bpm.disk_manager();
        assert!(disk.is_page_free(&bpm, heap_head).unwrap());
        assert!(disk.is_page_free(&bpm, index_root).unwrap());
    }

    #[test]
    fn test_catalog_roundtrip_across_reopen() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        {
            let disk = Arc::new(DiskManager::new(&path).unwrap());
            let bpm = Arc::new(BufferPoolManager::new(16, disk));
            let mut catalog = Catalog::load(Arc::clone(&bpm)).unwrap();
            catalog.create_table("users", sample_schema()).unwrap();
            catalog
                .create_table(
                    "events",
                    Schema::builder()
                        .column("kind", DataType::Char(16))
                        .unique_column("seq", DataType::Int)
                        .build(),
                )
                .unwrap();
            catalog.add_row_count(1, 42);
            catalog.save().unwrap();
            bpm.flush_all().unwrap();
        }

        {
            let disk = Arc::new(DiskManager::new(&path).unwrap());
            let bpm = Arc::new(BufferPoolManager::new(16, disk));
            let catalog = Catalog::load(bpm).unwrap();

            let users = catalog.table("users").unwrap();
            assert_eq!(users.row_count, 42);
            assert_eq!(users.schema.column_count(), 3);
            assert!(users.schema.primary_key().is_some());

            let events = catalog.table("events").unwrap();
            assert_eq!(events.schema.column(0).unwrap().name(), "kind");
            assert!(events.schema.column(1).unwrap().is_unique());

            assert!(catalog.index("users_pkey").is_some());
            assert!(catalog.index("events_seq_key").is_some());
        }
    }

    #[test]
    fn test_create_index_backfills_existing_rows() {
        let (mut catalog, bpm, _temp) = create_catalog(16);
        catalog.create_table("t", sample_schema()).unwrap();

        let info = catalog.table("t").unwrap();
        let schema = Arc::clone(&info.schema);
        let heap = TableHeap::open(Arc::clone(&bpm), info.heap_head);
        for i in 0..50 {
            let row = Row::new(
                Arc::clone(&schema),
                vec![
                    crate::row::Value::Int(i),
                    crate::row::Value::Char(format!("v{i}")),
                    crate::row::Value::Float(i as f32),
                ],
            )
            .unwrap();
            heap.insert(&row.to_bytes().unwrap()).unwrap();
        }

        catalog.create_index("t_v_idx", "t", &["v"], false).unwrap();
        let info = catalog.index("t_v_idx").unwrap().clone();
        let codec = info.codec(&schema);
        let tree = BTreeIndex::open(bpm, codec.clone(), info.root_page_id, false);

        let key = codec
            .encode(&[crate::row::Value::Char("v7".into())])
            .unwrap();
        assert!(tree.lookup(&key).unwrap().is_some());
    }

    #[test]
    fn test_unique_index_backfill_fails_on_duplicates() {
        let (mut catalog, bpm, _temp) = create_catalog(16);
        catalog
            .create_table(
                "t",
                Schema::builder()
                    .column("a", DataType::Int)
                    .column("b", DataType::Int)
                    .build(),
            )
            .unwrap();

        let info = catalog.table("t").unwrap();
        let schema = Arc::clone(&info.schema);
        let heap = TableHeap::open(Arc::clone(&bpm), info.heap_head);
        for i in [1, 2, 2, 3] {
            let row = Row::new(
                Arc::clone(&schema),
                vec![crate::row::Value::Int(i), crate::row::Value::Int(0)],
            )
            .unwrap();
            heap.insert(&row.to_bytes().unwrap()).unwrap();
        }

        assert!(matches!(
            catalog.create_index("t_a_key", "t", &["a"], true),
            Err(MiniError::DuplicateKey)
        ));
        assert!(catalog.index("t_a_key").is_none());
    }

    #[test]
    fn test_index_on_missing_column_rejected() {
        let (mut catalog, _bpm, _temp) = create_catalog(16);
        catalog.create_table("t", sample_schema()).unwrap();
        assert!(matches!(
            catalog.create_index("bad", "t", &["nope"], false),
            Err(MiniError::SchemaViolation(_))
        ));
    }
}
