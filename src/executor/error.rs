//! Executor error types

use std::fmt;

use crate::catalog::{DataType, SchemaError};
use crate::sql::JoinType;
use crate::storage::StorageError;

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Executor errors
#[derive(Debug)]
pub enum ExecutorError {
    /// Storage layer error
    Storage(StorageError),

    /// Schema construction or lookup error
    Schema(SchemaError),

    /// Type mismatch during evaluation
    TypeMismatch {
        expected: DataType,
        got: DataType,
        context: String,
    },

    /// Invalid operation (e.g., division by zero)
    InvalidOperation(String),

    /// Column reference resolves to nothing
    ColumnNotFound(String),

    /// Column reference resolves to more than one bound column
    AmbiguousColumn(String),

    /// Column index out of bounds
    ColumnIndexOutOfBounds { index: usize, row_len: usize },

    /// Plan is malformed (bad group-by, wrong aggregate arity, ...)
    InvalidPlan(String),

    /// Join kind that the nested-loop operator does not evaluate
    UnsupportedJoin(JoinType),

    /// Node used before `prepare()`
    NotPrepared(String),

    /// Mark/reset called on a node that cannot mark
    MarkingUnsupported(String),

    /// Mark called before any tuple was produced
    NoCurrentTuple(String),

    /// Reset called without a prior mark
    NoMark(String),

    /// Output error from a tuple sink
    Io(std::io::Error),

    /// Internal executor error
    Internal(String),
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::Storage(e) => write!(f, "storage error: {}", e),
            ExecutorError::Schema(e) => write!(f, "schema error: {}", e),
            ExecutorError::TypeMismatch {
                expected,
                got,
                context,
            } => {
                write!(
                    f,
                    "type mismatch: expected {}, got {} in {}",
                    expected, got, context
                )
            }
            ExecutorError::InvalidOperation(msg) => write!(f, "invalid operation: {}", msg),
            ExecutorError::ColumnNotFound(name) => write!(f, "column not found: {}", name),
            ExecutorError::AmbiguousColumn(name) => write!(f, "ambiguous column: {}", name),
            ExecutorError::ColumnIndexOutOfBounds { index, row_len } => {
                write!(
                    f,
                    "column index {} out of bounds (tuple has {} columns)",
                    index, row_len
                )
            }
            ExecutorError::InvalidPlan(msg) => write!(f, "invalid plan: {}", msg),
            ExecutorError::UnsupportedJoin(join_type) => {
                write!(f, "unsupported join type: {}", join_type)
            }
            ExecutorError::NotPrepared(node) => write!(f, "node not prepared: {}", node),
            ExecutorError::MarkingUnsupported(node) => {
                write!(f, "marking not supported by {}", node)
            }
            ExecutorError::NoCurrentTuple(node) => {
                write!(f, "cannot mark {}: no tuple produced yet", node)
            }
            ExecutorError::NoMark(node) => write!(f, "cannot reset {}: no mark set", node),
            ExecutorError::Io(e) => write!(f, "output error: {}", e),
            ExecutorError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutorError::Storage(e) => Some(e),
            ExecutorError::Schema(e) => Some(e),
            ExecutorError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for ExecutorError {
    fn from(e: StorageError) -> Self {
        ExecutorError::Storage(e)
    }
}

impl From<SchemaError> for ExecutorError {
    fn from(e: SchemaError) -> Self {
        ExecutorError::Schema(e)
    }
}

impl From<std::io::Error> for ExecutorError {
    fn from(e: std::io::Error) -> Self {
        ExecutorError::Io(e)
    }
}
