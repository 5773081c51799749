//! Shared data models.

pub mod table;

// Re-export commonly used types
pub use table::{FilterSet, Record, TableCatalog, TableName};
