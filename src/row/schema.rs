use std::collections::HashMap;
use std::sync::Arc;

use crate::common::{MiniError, Result, MAX_COLUMNS, MAX_NAME_LEN};

use super::DataType;

/// A single column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: DataType,
    nullable: bool,
    unique: bool,
    primary_key: bool,
    ordinal: usize,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
            unique: false,
            primary_key: false,
            ordinal: 0,
        }
    }

    pub fn with_unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Marks the column as the primary key, which is implicitly unique and
    /// not nullable.
    pub fn with_primary_key(mut self) -> Self {
        self.primary_key = true;
        self.unique = true;
        self.nullable = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Flags byte stored in the catalog: bit 0 nullable, bit 1 unique,
    /// bit 2 primary key.
    pub fn flags_byte(&self) -> u8 {
        (self.nullable as u8) | (self.unique as u8) << 1 | (self.primary_key as u8) << 2
    }

    pub fn from_catalog(name: String, data_type: DataType, flags: u8) -> Self {
        Self {
            name,
            data_type,
            nullable: flags & 0b001 != 0,
            unique: flags & 0b010 != 0,
            primary_key: flags & 0b100 != 0,
            ordinal: 0,
        }
    }
}

/// Ordered column list of a table.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,
    name_to_index: HashMap<String, usize>,
    null_bitmap_size: usize,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        let mut columns = columns;
        let mut name_to_index = HashMap::new();
        for (i, col) in columns.iter_mut().enumerate() {
            col.ordinal = i;
            name_to_index.insert(col.name.clone(), i);
        }
        let null_bitmap_size = (columns.len() + 7) / 8;
        Self {
            columns,
            name_to_index,
            null_bitmap_size,
        }
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Checks the structural constraints a table schema must satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(MiniError::SchemaViolation("schema has no columns".into()));
        }
        if self.columns.len() > MAX_COLUMNS {
            return Err(MiniError::SchemaViolation(format!(
                "{} columns exceeds the maximum of {MAX_COLUMNS}",
                self.columns.len()
            )));
        }
        if self.name_to_index.len() != self.columns.len() {
            return Err(MiniError::SchemaViolation(
                "duplicate column names".to_string(),
            ));
        }

        let mut pk_count = 0;
        for col in &self.columns {
            if col.name.is_empty() || col.name.as_bytes().len() > MAX_NAME_LEN {
                return Err(MiniError::SchemaViolation(format!(
                    "column name '{}' is empty or longer than {MAX_NAME_LEN} bytes",
                    col.name
                )));
            }
            if let DataType::Char(0) = col.data_type {
                return Err(MiniError::SchemaViolation(format!(
                    "column '{}' has CHAR length zero",
                    col.name
                )));
            }
            if col.primary_key {
                pk_count += 1;
                if col.nullable {
                    return Err(MiniError::SchemaViolation(format!(
                        "primary key column '{}' cannot be nullable",
                        col.name
                    )));
                }
            }
        }
        if pk_count > 1 {
            return Err(MiniError::SchemaViolation(
                "more than one primary key column".to_string(),
            ));
        }
        Ok(())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.name_to_index
            .get(name)
            .and_then(|&i| self.columns.get(i))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_primary_key())
    }

    pub fn null_bitmap_size(&self) -> usize {
        self.null_bitmap_size
    }

    /// Largest on-disk row size: bitmap plus every field present.
    pub fn max_row_size(&self) -> usize {
        self.null_bitmap_size
            + self
                .columns
                .iter()
                .map(|c| c.data_type.fixed_size())
                .sum::<usize>()
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for Schema {}

/// Fluent schema construction.
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type, false));
        self
    }

    pub fn nullable_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type, true));
        self
    }

    pub fn unique_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns
            .push(Column::new(name, data_type, false).with_unique());
        self
    }

    pub fn primary_key_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns
            .push(Column::new(name, data_type, false).with_primary_key());
        self
    }

    pub fn build(self) -> Schema {
        Schema::new(self.columns)
    }

    pub fn build_arc(self) -> Arc<Schema> {
        Arc::new(self.build())
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_schema() -> Schema {
        Schema::builder()
            .primary_key_column("id", DataType::Int)
            .column("v", DataType::Char(8))
            .nullable_column("score", DataType::Float)
            .build()
    }

    #[test]
    fn test_schema_lookup() {
        let schema = test_schema();
        assert_eq!(schema.column_count(), 3);
        assert_eq!(schema.column_index("v"), Some(1));
        assert_eq!(schema.column_by_name("score").unwrap().ordinal(), 2);
        assert_eq!(schema.column_index("missing"), None);
    }

    #[test]
    fn test_primary_key_implies_unique_not_null() {
        let schema = test_schema();
        let pk = schema.primary_key().unwrap();
        assert_eq!(pk.name(), "id");
        assert!(pk.is_unique());
        assert!(!pk.is_nullable());
        schema.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let schema = Schema::builder()
            .column("a", DataType::Int)
            .column("a", DataType::Int)
            .build();
        assert!(matches!(
            schema.validate(),
            Err(MiniError::SchemaViolation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_two_primary_keys() {
        let schema = Schema::builder()
            .primary_key_column("a", DataType::Int)
            .primary_key_column("b", DataType::Int)
            .build();
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_too_many_columns() {
        let mut builder = Schema::builder();
        for i in 0..=MAX_COLUMNS {
            builder = builder.column(format!("c{i}"), DataType::Int);
        }
        assert!(builder.build().validate().is_err());
    }

    #[test]
    fn test_flags_byte_roundtrip() {
        let col = Column::new("u", DataType::Int, false).with_unique();
        let back = Column::from_catalog("u".into(), DataType::Int, col.flags_byte());
        assert!(back.is_unique());
        assert!(!back.is_nullable());
        assert!(!back.is_primary_key());
    }

    #[test]
    fn test_row_size_bounds() {
        let schema = test_schema();
        // 1 bitmap byte + 4 + 8 + 4
        assert_eq!(schema.max_row_size(), 17);
        assert_eq!(schema.null_bitmap_size(), 1);
    }
}
