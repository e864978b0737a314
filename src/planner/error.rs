//! Planner error types

use std::fmt;

use crate::executor::ExecutorError;
use crate::storage::StorageError;

/// Planner error
#[derive(Debug)]
pub enum PlannerError {
    /// Invalid plan structure
    InvalidPlan(String),
    /// Unsupported operation
    UnsupportedOperation(String),
    /// GROUP BY on something other than a column reference
    InvalidGroupBy(String),
    /// Aggregate called with the wrong number of arguments
    AggregateArity { name: String, got: usize },
    /// Subquery result with the wrong number of rows or columns
    SubqueryShape(String),
    /// More FROM-clause leaves than the join search allows
    TooManyLeaves { leaves: usize, max: usize },
    /// Invalid planner configuration
    Config(String),
    /// Error preparing a candidate plan
    Executor(ExecutorError),
    /// Error opening a table
    Storage(StorageError),
    /// Internal error
    Internal(String),
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::InvalidPlan(msg) => write!(f, "Invalid plan: {}", msg),
            PlannerError::UnsupportedOperation(msg) => write!(f, "Unsupported operation: {}", msg),
            PlannerError::InvalidGroupBy(expr) => {
                write!(f, "GROUP BY expression must be a column reference: {}", expr)
            }
            PlannerError::AggregateArity { name, got } => {
                write!(f, "Aggregate {} takes one argument, got {}", name, got)
            }
            PlannerError::SubqueryShape(msg) => write!(f, "Invalid subquery result: {}", msg),
            PlannerError::TooManyLeaves { leaves, max } => {
                write!(f, "Too many join leaves: {} (max {})", leaves, max)
            }
            PlannerError::Config(msg) => write!(f, "Invalid planner config: {}", msg),
            PlannerError::Executor(e) => write!(f, "{}", e),
            PlannerError::Storage(e) => write!(f, "{}", e),
            PlannerError::Internal(msg) => write!(f, "Internal planner error: {}", msg),
        }
    }
}

impl std::error::Error for PlannerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlannerError::Executor(e) => Some(e),
            PlannerError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ExecutorError> for PlannerError {
    fn from(e: ExecutorError) -> Self {
        PlannerError::Executor(e)
    }
}

impl From<StorageError> for PlannerError {
    fn from(e: StorageError) -> Self {
        PlannerError::Storage(e)
    }
}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
