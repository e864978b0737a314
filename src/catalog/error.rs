//! Schema error types

use thiserror::Error;

/// Errors raised while building or querying a schema
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// A column with the same table qualifier and name already exists
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    /// An unqualified name matches more than one column
    #[error("ambiguous column name: {0}")]
    AmbiguousColumn(String),

    /// Renaming the table would make two columns indistinguishable
    #[error("renaming to {table} makes column {column} ambiguous")]
    AmbiguousRename { table: String, column: String },
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
