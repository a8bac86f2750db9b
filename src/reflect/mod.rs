//! Schema reflection: introspect the live database into table metadata.

mod pg;
mod types;

pub use pg::{reflect_schema, reflect_schema_in};
pub use types::{ColumnSchema, ColumnType, ForeignKey, PkPolicy, TableSchema};
