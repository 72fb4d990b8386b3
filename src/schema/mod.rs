pub mod inspect;
pub mod types;

pub use inspect::{inspect_table, SchemaInspector};
pub use types::ColumnSchema;
