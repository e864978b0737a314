//! FileScan executor
//!
//! Walks a tuple file with its cursor, returning tuples that pass an
//! optional residual predicate.

use std::fmt;
use std::sync::Arc;

use crate::planner::{CostEstimator, SelectivityEstimator};
use crate::sql::Expr;
use crate::storage::{FilePointer, TupleFile};

use super::env::Environment;
use super::error::{ExecutorError, ExecutorResult};
use super::filter::{check_predicate, conjoin};
use super::node::{Inputs, Prepared};
use super::tuple::Tuple;
use super::{Executor, MarkingSupport};

/// Sequential scan over one tuple file
#[derive(Debug)]
pub struct FileScan {
    file: Arc<dyn TupleFile>,
    predicate: Option<Expr>,
    /// Position of the tuple last read from the file
    current: Option<FilePointer>,
    marked: Option<FilePointer>,
    /// Next read returns the marked tuple
    jump_to_mark: bool,
    done: bool,
}

impl FileScan {
    pub fn new(file: Arc<dyn TupleFile>, predicate: Option<Expr>) -> Self {
        FileScan {
            file,
            predicate,
            current: None,
            marked: None,
            jump_to_mark: false,
            done: false,
        }
    }

    pub fn file(&self) -> &Arc<dyn TupleFile> {
        &self.file
    }

    pub fn predicate(&self) -> Option<&Expr> {
        self.predicate.as_ref()
    }

    /// AND another conjunct into the residual predicate
    pub fn add_predicate(&mut self, predicate: Expr) {
        self.predicate = Some(conjoin(self.predicate.take(), predicate));
    }

    pub fn equivalent(&self, other: &FileScan) -> bool {
        self.file.name() == other.file.name() && self.predicate == other.predicate
    }

    fn read_next(&mut self) -> ExecutorResult<Option<Tuple>> {
        let next = if self.jump_to_mark {
            self.jump_to_mark = false;
            let pointer = self
                .marked
                .ok_or_else(|| ExecutorError::NoMark(self.to_string()))?;
            Some(self.file.tuple_at(pointer)?)
        } else {
            match self.current {
                None => self.file.first_tuple()?,
                Some(pointer) => self.file.next_tuple(pointer)?,
            }
        };

        Ok(next.map(|file_tuple| {
            self.current = Some(file_tuple.pointer);
            file_tuple.tuple
        }))
    }
}

impl fmt::Display for FileScan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileScan: {}", self.file.name())?;
        if let Some(p) = &self.predicate {
            write!(f, " filter={}", p)?;
        }
        Ok(())
    }
}

impl Executor for FileScan {
    fn prepare(&mut self, _inputs: &Inputs<'_>) -> ExecutorResult<Prepared> {
        let schema = self.file.schema();
        check_predicate(self.predicate.as_ref(), &schema)?;
        let table_stats = self.file.stats()?;
        let selectivity = SelectivityEstimator::estimate(
            self.predicate.as_ref(),
            &schema,
            &table_stats.column_stats,
        );
        let cost = CostEstimator::file_scan(&table_stats, selectivity);
        Ok(Prepared {
            schema,
            cost,
            stats: table_stats.column_stats,
        })
    }

    fn initialize(&mut self, _inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        self.current = None;
        self.marked = None;
        self.jump_to_mark = false;
        self.done = false;
        Ok(())
    }

    fn next(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<Option<Tuple>> {
        if self.done {
            return Ok(None);
        }
        let this = inputs.this()?;

        while let Some(tuple) = self.read_next()? {
            if let Some(predicate) = &self.predicate {
                let env = Environment::new(&this.schema, &tuple);
                if !predicate.evaluate_predicate(&env)? {
                    continue;
                }
            }
            return Ok(Some(tuple));
        }

        self.done = true;
        Ok(None)
    }

    fn clean_up(&mut self, _inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        self.current = None;
        self.marked = None;
        self.jump_to_mark = false;
        Ok(())
    }

    fn supports_marking(&self, _children: MarkingSupport) -> bool {
        true
    }

    fn mark_current_position(&mut self, _inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        if self.jump_to_mark {
            // Reset but not yet re-read: the mark already points here
            return Ok(());
        }
        let pointer = self
            .current
            .ok_or_else(|| ExecutorError::NoCurrentTuple(self.to_string()))?;
        tracing::debug!(table = self.file.name(), %pointer, "scan mark");
        self.marked = Some(pointer);
        Ok(())
    }

    fn reset_to_last_mark(&mut self, _inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        let pointer = self
            .marked
            .ok_or_else(|| ExecutorError::NoMark(self.to_string()))?;
        tracing::debug!(table = self.file.name(), %pointer, "scan reset to mark");
        self.jump_to_mark = true;
        self.done = false;
        Ok(())
    }

    fn duplicate(&self) -> Self {
        FileScan::new(Arc::clone(&self.file), self.predicate.clone())
    }
}
