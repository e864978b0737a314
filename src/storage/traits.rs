//! Tuple file trait definitions

use std::fmt;
use std::sync::Arc;

use crate::catalog::{Schema, TableStats};
use crate::executor::Tuple;
use crate::storage::error::StorageResult;

/// Opaque locator of one tuple inside a tuple file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilePointer {
    pub page: u32,
    pub slot: u16,
}

impl FilePointer {
    pub fn new(page: u32, slot: u16) -> Self {
        Self { page, slot }
    }
}

impl fmt::Display for FilePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page, self.slot)
    }
}

/// A tuple read from a file, together with its locator
#[derive(Debug, Clone, PartialEq)]
pub struct FileTuple {
    pub pointer: FilePointer,
    pub tuple: Tuple,
}

/// Abstract tuple file interface
///
/// A sequentially and randomly accessible collection of tuples (a table or
/// an index). Cursor methods return owned tuples; the locator is what a scan
/// remembers to restore a position.
pub trait TupleFile: Send + Sync + fmt::Debug {
    /// File name; two scans over the same name read the same data
    fn name(&self) -> &str;

    /// Schema of every tuple in the file
    fn schema(&self) -> Schema;

    /// Read-only statistics snapshot
    fn stats(&self) -> StorageResult<TableStats>;

    /// First live tuple, or `None` for an empty file
    fn first_tuple(&self) -> StorageResult<Option<FileTuple>>;

    /// Live tuple following `after`, or `None` at end of file
    fn next_tuple(&self, after: FilePointer) -> StorageResult<Option<FileTuple>>;

    /// Tuple stored at `pointer`
    ///
    /// Fails with `InvalidFilePointer` if the slot is empty.
    fn tuple_at(&self, pointer: FilePointer) -> StorageResult<FileTuple>;

    /// Store a tuple, returning its locator
    fn insert_tuple(&self, tuple: Tuple) -> StorageResult<FilePointer>;

    /// Replace the tuple at `pointer`
    fn update_tuple(&self, pointer: FilePointer, tuple: Tuple) -> StorageResult<()>;

    /// Remove the tuple at `pointer`
    fn delete_tuple(&self, pointer: FilePointer) -> StorageResult<()>;

    /// Recompute the statistics snapshot
    fn analyze(&self) -> StorageResult<TableStats>;
}

/// Opens tuple files by name
pub trait TableProvider: Send + Sync {
    fn open_table(&self, name: &str) -> StorageResult<Arc<dyn TupleFile>>;
}
