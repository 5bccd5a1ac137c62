mod data_type;
mod row;
mod schema;
mod value;

pub use data_type::DataType;
pub use row::Row;
pub use schema::{Column, Schema, SchemaBuilder};
pub use value::Value;
