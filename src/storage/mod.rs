//! Storage collaborator
//!
//! The executor only touches storage through the narrow [`TupleFile`]
//! interface: sequential cursors, fetch-by-locator, and a statistics
//! snapshot. [`MemoryStorage`] is a paged in-memory implementation.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::{MemoryStorage, MemoryTupleFile};
pub use traits::{FilePointer, FileTuple, TableProvider, TupleFile};
