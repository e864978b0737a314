//! Storage error types

use thiserror::Error;

use super::traits::FilePointer;

/// Storage operation errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Standard IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No tuple file with this name
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// A tuple file with this name already exists
    #[error("table already exists: {0}")]
    TableExists(String),

    /// Locator does not address a live tuple
    #[error("invalid file pointer {pointer} in {file}")]
    InvalidFilePointer { file: String, pointer: FilePointer },

    /// Tuple width does not match the file's schema
    #[error("tuple has {got} values, {file} expects {expected}")]
    ArityMismatch {
        file: String,
        expected: usize,
        got: usize,
    },

    /// Invalid table definition
    #[error("invalid table definition: {0}")]
    Schema(#[from] crate::catalog::SchemaError),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
