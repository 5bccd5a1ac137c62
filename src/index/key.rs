use std::cmp::Ordering;

use crate::common::{MiniError, Result};
use crate::row::{DataType, Value};

/// Fixed-width composite key codec for one index.
///
/// A key is the concatenation of per-field encodings: one presence byte
/// (0 = NULL, 1 = present) followed by the field's fixed-width bytes, zeroed
/// when NULL. The presence byte makes NULLs sort first under the
/// field-by-field comparison below; raw bytes are otherwise compared by
/// their field type, not memcmp.
#[derive(Debug, Clone)]
pub struct KeyCodec {
    types: Vec<DataType>,
    key_size: usize,
}

impl KeyCodec {
    pub fn new(types: Vec<DataType>) -> Self {
        let key_size = types.iter().map(|t| 1 + t.fixed_size()).sum();
        Self { types, key_size }
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn field_types(&self) -> &[DataType] {
        &self.types
    }

    /// Encodes the key-column values of one row.
    pub fn encode(&self, values: &[Value]) -> Result<Vec<u8>> {
        if values.len() != self.types.len() {
            return Err(MiniError::SchemaViolation(format!(
                "{} key values for {} key columns",
                values.len(),
                self.types.len()
            )));
        }
        let mut out = Vec::with_capacity(self.key_size);
        for (value, data_type) in values.iter().zip(&self.types) {
            if value.is_null() {
                out.push(0);
                out.extend(std::iter::repeat(0).take(data_type.fixed_size()));
            } else {
                if !value.matches_type(data_type) {
                    return Err(MiniError::SchemaViolation(format!(
                        "key value {value} does not fit type {data_type}"
                    )));
                }
                out.push(1);
                out.extend(value.serialize(data_type)?);
            }
        }
        Ok(out)
    }

    /// Field-by-field comparison of two encoded keys.
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        debug_assert_eq!(a.len(), self.key_size);
        debug_assert_eq!(b.len(), self.key_size);

        let mut offset = 0;
        for data_type in &self.types {
            let width = data_type.fixed_size();
            let (a_present, b_present) = (a[offset], b[offset]);
            match a_present.cmp(&b_present) {
                Ordering::Equal => {}
                other => return other,
            }

            if a_present != 0 {
                let a_field = &a[offset + 1..offset + 1 + width];
                let b_field = &b[offset + 1..offset + 1 + width];
                let ord = match data_type {
                    DataType::Int => {
                        let av = i32::from_le_bytes(a_field.try_into().unwrap());
                        let bv = i32::from_le_bytes(b_field.try_into().unwrap());
                        av.cmp(&bv)
                    }
                    DataType::Float => {
                        let av = f32::from_le_bytes(a_field.try_into().unwrap());
                        let bv = f32::from_le_bytes(b_field.try_into().unwrap());
                        av.total_cmp(&bv)
                    }
                    DataType::Char(_) => a_field.cmp(b_field),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            offset += 1 + width;
        }
        Ordering::Equal
    }

    /// Decodes a key back into values; used by scans that surface keys.
    pub fn decode(&self, key: &[u8]) -> Result<Vec<Value>> {
        if key.len() != self.key_size {
            return Err(MiniError::Corruption(format!(
                "key of {} bytes where {} expected",
                key.len(),
                self.key_size
            )));
        }
        let mut values = Vec::with_capacity(self.types.len());
        let mut offset = 0;
        for data_type in &self.types {
            let width = data_type.fixed_size();
            if key[offset] == 0 {
                values.push(Value::Null);
            } else {
                let (value, _) = Value::deserialize(&key[offset + 1..], data_type)?;
                values.push(value);
            }
            offset += 1 + width;
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_key_ordering() {
        let codec = KeyCodec::new(vec![DataType::Int]);
        assert_eq!(codec.key_size(), 5);

        let a = codec.encode(&[Value::Int(-5)]).unwrap();
        let b = codec.encode(&[Value::Int(3)]).unwrap();
        let c = codec.encode(&[Value::Int(3)]).unwrap();

        assert_eq!(codec.compare(&a, &b), Ordering::Less);
        assert_eq!(codec.compare(&b, &a), Ordering::Greater);
        assert_eq!(codec.compare(&b, &c), Ordering::Equal);
    }

    #[test]
    fn test_null_sorts_first() {
        let codec = KeyCodec::new(vec![DataType::Int]);
        let null_key = codec.encode(&[Value::Null]).unwrap();
        let min_key = codec.encode(&[Value::Int(i32::MIN)]).unwrap();

        assert_eq!(codec.compare(&null_key, &min_key), Ordering::Less);
        assert_eq!(codec.compare(&null_key, &null_key), Ordering::Equal);
    }

    #[test]
    fn test_char_key_unsigned_byte_order() {
        let codec = KeyCodec::new(vec![DataType::Char(4)]);
        let a = codec.encode(&[Value::Char("ab".into())]).unwrap();
        let b = codec.encode(&[Value::Char("b".into())]).unwrap();
        assert_eq!(codec.compare(&a, &b), Ordering::Less);

        // NUL padding keeps prefixes ahead of longer strings.
        let short = codec.encode(&[Value::Char("ab".into())]).unwrap();
        let long = codec.encode(&[Value::Char("abc".into())]).unwrap();
        assert_eq!(codec.compare(&short, &long), Ordering::Less);
    }

    #[test]
    fn test_composite_key_field_by_field() {
        let codec = KeyCodec::new(vec![DataType::Int, DataType::Char(4)]);
        let a = codec.encode(&[Value::Int(1), Value::Char("zz".into())]).unwrap();
        let b = codec.encode(&[Value::Int(2), Value::Char("aa".into())]).unwrap();
        let c = codec.encode(&[Value::Int(2), Value::Char("ab".into())]).unwrap();

        assert_eq!(codec.compare(&a, &b), Ordering::Less);
        assert_eq!(codec.compare(&b, &c), Ordering::Less);
    }

    #[test]
    fn test_decode_roundtrip() {
        let codec = KeyCodec::new(vec![DataType::Int, DataType::Char(8)]);
        let values = vec![Value::Int(42), Value::Char("hello".into())];
        let key = codec.encode(&values).unwrap();
        assert_eq!(codec.decode(&key).unwrap(), values);

        let with_null = vec![Value::Null, Value::Char("x".into())];
        let key = codec.encode(&with_null).unwrap();
        assert_eq!(codec.decode(&key).unwrap(), with_null);
    }

    #[test]
    fn test_encode_rejects_mismatches() {
        let codec = KeyCodec::new(vec![DataType::Int]);
        assert!(codec.encode(&[Value::Float(1.0)]).is_err());
        assert!(codec.encode(&[]).is_err());
    }

    #[test]
    fn test_float_total_order_handles_nan() {
        let codec = KeyCodec::new(vec![DataType::Float]);
        let nan = codec.encode(&[Value::Float(f32::NAN)]).unwrap();
        let one = codec.encode(&[Value::Float(1.0)]).unwrap();
        // NaN lands at a fixed position rather than breaking the order.
        assert_eq!(codec.compare(&nan, &nan), Ordering::Equal);
        assert_ne!(codec.compare(&nan, &one), Ordering::Equal);
    }
}
