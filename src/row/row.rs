use std::sync::Arc;

use crate::common::{MiniError, Result};

use super::{Schema, Value};

/// One table row: an ordered list of values matching the schema.
///
/// On-disk form is a null bitmap (one bit per column, 1 = NULL) followed by
/// each non-null field in declared order. Null fields occupy no bytes beyond
/// their bitmap bit.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Row {
    /// Builds a row after checking arity, types, and nullability against the
    /// schema.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.column_count() {
            return Err(MiniError::SchemaViolation(format!(
                "{} values for {} columns",
                values.len(),
                schema.column_count()
            )));
        }
        for (value, col) in values.iter().zip(schema.columns()) {
            if value.is_null() {
                if !col.is_nullable() {
                    return Err(MiniError::SchemaViolation(format!(
                        "null in non-null column '{}'",
                        col.name()
                    )));
                }
                continue;
            }
            if !value.matches_type(col.data_type()) {
                return Err(MiniError::SchemaViolation(format!(
                    "value {} does not fit column '{}' of type {}",
                    value,
                    col.name(),
                    col.data_type()
                )));
            }
        }
        Ok(Self { schema, values })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        self.schema
            .column_index(name)
            .and_then(|i| self.values.get(i))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; self.schema.null_bitmap_size()];

        for (i, value) in self.values.iter().enumerate() {
            if value.is_null() {
                bytes[i / 8] |= 1 << (i % 8);
            }
        }
        for (value, col) in self.values.iter().zip(self.schema.columns()) {
            if !value.is_null() {
                bytes.extend(value.serialize(col.data_type())?);
            }
        }
        Ok(bytes)
    }

    pub fn from_bytes(schema: Arc<Schema>, data: &[u8]) -> Result<Self> {
        let bitmap_size = schema.null_bitmap_size();
        if data.len() < bitmap_size {
            return Err(MiniError::Corruption(
                "row shorter than its null bitmap".to_string(),
            ));
        }
        let bitmap = &data[..bitmap_size];
        let mut offset = bitmap_size;
        let mut values = Vec::with_capacity(schema.column_count());

        for (i, col) in schema.columns().enumerate() {
            if bitmap[i / 8] & (1 << (i % 8)) != 0 {
                values.push(Value::Null);
            } else {
                let (value, used) = Value::deserialize(&data[offset..], col.data_type())?;
                offset += used;
                values.push(value);
            }
        }

        Ok(Self { schema, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::DataType;

    fn test_schema() -> Arc<Schema> {
        Schema::builder()
            .primary_key_column("id", DataType::Int)
            .column("v", DataType::Char(8))
            .nullable_column("score", DataType::Float)
            .build_arc()
    }

    #[test]
    fn test_row_roundtrip() {
        let schema = test_schema();
        let row = Row::new(
            schema.clone(),
            vec![Value::Int(7), Value::Char("abc".into()), Value::Float(1.5)],
        )
        .unwrap();

        let bytes = row.to_bytes().unwrap();
        // 1 bitmap byte + 4 + 8 + 4
        assert_eq!(bytes.len(), 17);
        let back = Row::from_bytes(schema, &bytes).unwrap();
        assert_eq!(row, back);
    }

    #[test]
    fn test_null_field_is_omitted() {
        let schema = test_schema();
        let row = Row::new(
            schema.clone(),
            vec![Value::Int(7), Value::Char("abc".into()), Value::Null],
        )
        .unwrap();

        let bytes = row.to_bytes().unwrap();
        assert_eq!(bytes.len(), 13);

        let back = Row::from_bytes(schema, &bytes).unwrap();
        assert!(back.value(2).unwrap().is_null());
        assert_eq!(back.value(0), Some(&Value::Int(7)));
    }

    #[test]
    fn test_null_in_non_null_column_rejected() {
        let schema = test_schema();
        let result = Row::new(
            schema,
            vec![Value::Null, Value::Char("abc".into()), Value::Null],
        );
        assert!(matches!(result, Err(MiniError::SchemaViolation(_))));
    }

    #[test]
    fn test_arity_mismatch_rejected() {
        let schema = test_schema();
        assert!(Row::new(schema, vec![Value::Int(1)]).is_err());
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let schema = test_schema();
        let result = Row::new(
            schema,
            vec![
                Value::Float(1.0),
                Value::Char("abc".into()),
                Value::Null,
            ],
        );
        assert!(matches!(result, Err(MiniError::SchemaViolation(_))));
    }

    #[test]
    fn test_value_by_name() {
        let schema = test_schema();
        let row = Row::new(
            schema,
            vec![Value::Int(7), Value::Char("abc".into()), Value::Null],
        )
        .unwrap();
        assert_eq!(row.value_by_name("id"), Some(&Value::Int(7)));
        assert_eq!(row.value_by_name("missing"), None);
    }
}
