//! In-memory paged tuple files
//!
//! Tuples live in fixed-capacity pages of slots so that locators behave like
//! on-disk ones: deleting a tuple leaves an empty slot, and cursors skip it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::{ColumnStatsCollector, Schema, TableDef, TableStats};
use crate::executor::{Datum, Tuple};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::traits::{FilePointer, FileTuple, TableProvider, TupleFile};

/// Default number of tuple slots per page
pub const DEFAULT_TUPLES_PER_PAGE: usize = 64;

type Page = Vec<Option<Tuple>>;

/// A tuple file held entirely in memory
#[derive(Debug)]
pub struct MemoryTupleFile {
    name: String,
    schema: Schema,
    tuples_per_page: usize,
    pages: RwLock<Vec<Page>>,
    stats: RwLock<TableStats>,
}

impl MemoryTupleFile {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self::with_page_capacity(name, schema, DEFAULT_TUPLES_PER_PAGE)
    }

    pub fn with_page_capacity(name: impl Into<String>, schema: Schema, tuples_per_page: usize) -> Self {
        let stats = TableStats::unknown(schema.len());
        Self {
            name: name.into(),
            schema,
            tuples_per_page: tuples_per_page.clamp(1, u16::MAX as usize),
            pages: RwLock::new(Vec::new()),
            stats: RwLock::new(stats),
        }
    }

    /// Number of live tuples
    pub fn len(&self) -> usize {
        self.pages
            .read()
            .iter()
            .map(|p| p.iter().filter(|s| s.is_some()).count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn invalid(&self, pointer: FilePointer) -> StorageError {
        StorageError::InvalidFilePointer {
            file: self.name.clone(),
            pointer,
        }
    }

    fn check_arity(&self, tuple: &Tuple) -> StorageResult<()> {
        if tuple.len() != self.schema.len() {
            return Err(StorageError::ArityMismatch {
                file: self.name.clone(),
                expected: self.schema.len(),
                got: tuple.len(),
            });
        }
        Ok(())
    }

    /// First live slot at or after (page, slot)
    fn scan_from(&self, mut page: usize, mut slot: usize) -> Option<FileTuple> {
        let pages = self.pages.read();
        while page < pages.len() {
            while slot < pages[page].len() {
                if let Some(tuple) = &pages[page][slot] {
                    return Some(FileTuple {
                        pointer: FilePointer::new(page as u32, slot as u16),
                        tuple: tuple.clone(),
                    });
                }
                slot += 1;
            }
            page += 1;
            slot = 0;
        }
        None
    }
}

fn datum_size(datum: &Datum) -> usize {
    match datum {
        Datum::Null => 0,
        Datum::Bool(_) => 1,
        Datum::Int(_) | Datum::Float(_) | Datum::Timestamp(_) => 8,
        Datum::String(s) => s.len() + 2,
        Datum::Bytes(b) => b.len() + 2,
    }
}

impl TupleFile for MemoryTupleFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Schema {
        self.schema.clone()
    }

    fn stats(&self) -> StorageResult<TableStats> {
        Ok(self.stats.read().clone())
    }

    fn first_tuple(&self) -> StorageResult<Option<FileTuple>> {
        Ok(self.scan_from(0, 0))
    }

    fn next_tuple(&self, after: FilePointer) -> StorageResult<Option<FileTuple>> {
        Ok(self.scan_from(after.page as usize, after.slot as usize + 1))
    }

    fn tuple_at(&self, pointer: FilePointer) -> StorageResult<FileTuple> {
        let pages = self.pages.read();
        pages
            .get(pointer.page as usize)
            .and_then(|p| p.get(pointer.slot as usize))
            .and_then(|s| s.clone())
            .map(|tuple| FileTuple { pointer, tuple })
            .ok_or_else(|| self.invalid(pointer))
    }

    fn insert_tuple(&self, tuple: Tuple) -> StorageResult<FilePointer> {
        self.check_arity(&tuple)?;
        let mut pages = self.pages.write();
        let needs_page = pages
            .last()
            .is_none_or(|p| p.len() >= self.tuples_per_page);
        if needs_page {
            pages.push(Vec::with_capacity(self.tuples_per_page));
        }
        let page = pages.len() - 1;
        pages[page].push(Some(tuple));
        Ok(FilePointer::new(page as u32, (pages[page].len() - 1) as u16))
    }

    fn update_tuple(&self, pointer: FilePointer, tuple: Tuple) -> StorageResult<()> {
        self.check_arity(&tuple)?;
        let mut pages = self.pages.write();
        match pages
            .get_mut(pointer.page as usize)
            .and_then(|p| p.get_mut(pointer.slot as usize))
        {
            Some(slot) if slot.is_some() => {
                *slot = Some(tuple);
                Ok(())
            }
            _ => Err(self.invalid(pointer)),
        }
    }

    fn delete_tuple(&self, pointer: FilePointer) -> StorageResult<()> {
        let mut pages = self.pages.write();
        match pages
            .get_mut(pointer.page as usize)
            .and_then(|p| p.get_mut(pointer.slot as usize))
        {
            Some(slot) if slot.is_some() => {
                *slot = None;
                Ok(())
            }
            _ => Err(self.invalid(pointer)),
        }
    }

    fn analyze(&self) -> StorageResult<TableStats> {
        let mut collectors: Vec<ColumnStatsCollector> =
            (0..self.schema.len()).map(|_| ColumnStatsCollector::new()).collect();
        let mut num_tuples = 0u64;
        let mut total_size = 0usize;

        let data_pages = {
            let pages = self.pages.read();
            for tuple in pages.iter().flatten().flatten() {
                num_tuples += 1;
                for (collector, value) in collectors.iter_mut().zip(tuple.iter()) {
                    collector.add_value(value);
                    total_size += datum_size(value);
                }
            }
            pages.len() as u64
        };

        let stats = TableStats {
            data_pages,
            num_tuples,
            avg_tuple_size: if num_tuples == 0 {
                0.0
            } else {
                total_size as f32 / num_tuples as f32
            },
            column_stats: collectors.into_iter().map(|c| c.finish()).collect(),
        };

        tracing::debug!(table = %self.name, tuples = num_tuples, pages = data_pages, "analyzed tuple file");
        *self.stats.write() = stats.clone();
        Ok(stats)
    }
}

/// Registry of in-memory tuple files
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<HashMap<String, Arc<MemoryTupleFile>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table
    pub fn create_table(&self, def: &TableDef) -> StorageResult<Arc<MemoryTupleFile>> {
        let mut tables = self.tables.write();
        if tables.contains_key(&def.name) {
            return Err(StorageError::TableExists(def.name.clone()));
        }
        let file = Arc::new(MemoryTupleFile::new(def.name.clone(), def.schema()?));
        tables.insert(def.name.clone(), file.clone());
        Ok(file)
    }

    /// Create a table, fill it, and compute its statistics
    pub fn load_table(
        &self,
        def: &TableDef,
        rows: impl IntoIterator<Item = Tuple>,
    ) -> StorageResult<Arc<MemoryTupleFile>> {
        let file = self.create_table(def)?;
        for row in rows {
            file.insert_tuple(row)?;
        }
        file.analyze()?;
        Ok(file)
    }

    pub fn drop_table(&self, name: &str) -> StorageResult<()> {
        self.tables
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }

    pub fn table(&self, name: &str) -> Option<Arc<MemoryTupleFile>> {
        self.tables.read().get(name).cloned()
    }
}

impl TableProvider for MemoryStorage {
    fn open_table(&self, name: &str) -> StorageResult<Arc<dyn TupleFile>> {
        let file = self
            .table(name)
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))?;
        Ok(file as Arc<dyn TupleFile>)
    }
}
