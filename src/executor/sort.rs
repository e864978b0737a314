//! Sort executor
//!
//! Implements ORDER BY by collecting all tuples, sorting them, then
//! emitting. The sort is stable: tuples with equal keys keep their input
//! order.

use std::cmp::Ordering;
use std::fmt;

use crate::planner::CostEstimator;
use crate::sql::OrderByExpr;

use super::datum::Datum;
use super::env::Environment;
use super::error::{ExecutorError, ExecutorResult};
use super::node::{Inputs, Prepared};
use super::tuple::Tuple;
use super::{Executor, MarkingSupport};

/// Sort executor
#[derive(Debug)]
pub struct Sort {
    /// Order by expressions with ascending flag
    keys: Vec<OrderByExpr>,
    /// Collected and sorted tuples
    tuples: Vec<Tuple>,
    /// Whether the input has been consumed
    loaded: bool,
    /// Current position in sorted tuples
    position: usize,
    marked: Option<usize>,
}

impl Sort {
    pub fn new(keys: Vec<OrderByExpr>) -> Self {
        Sort {
            keys,
            tuples: Vec::new(),
            loaded: false,
            position: 0,
            marked: None,
        }
    }

    pub fn keys(&self) -> &[OrderByExpr] {
        &self.keys
    }

    pub fn equivalent(&self, other: &Sort) -> bool {
        self.keys == other.keys
    }

    fn load(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        // Sort keys are evaluated up front since sort_by cannot fail
        let mut keyed: Vec<(Vec<Datum>, Tuple)> = Vec::new();
        while let Some(tuple) = inputs.next_left()? {
            let schema = &inputs.left()?.schema;
            let env = Environment::new(schema, &tuple);
            let mut key = Vec::with_capacity(self.keys.len());
            for order in &self.keys {
                key.push(order.expr.evaluate(&env)?);
            }
            keyed.push((key, tuple));
        }

        let keys = &self.keys;
        keyed.sort_by(|(a, _), (b, _)| {
            for (i, (key_a, key_b)) in a.iter().zip(b.iter()).enumerate() {
                let ascending = keys.get(i).map(|k| k.ascending).unwrap_or(true);
                let cmp = key_a.cmp(key_b);
                let cmp = if ascending { cmp } else { cmp.reverse() };
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            Ordering::Equal
        });

        self.tuples = keyed.into_iter().map(|(_, tuple)| tuple).collect();
        self.position = 0;
        self.loaded = true;
        Ok(())
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self
            .keys
            .iter()
            .map(|k| format!("{} {}", k.expr, if k.ascending { "ASC" } else { "DESC" }))
            .collect();
        write!(f, "Sort: [{}]", keys.join(", "))
    }
}

impl Executor for Sort {
    fn prepare(&mut self, inputs: &Inputs<'_>) -> ExecutorResult<Prepared> {
        let child = inputs.left()?;
        // Keys must resolve against the input
        for key in &self.keys {
            key.expr.column_info(&child.schema)?;
        }
        Ok(Prepared {
            schema: child.schema.clone(),
            cost: CostEstimator::sort(&child.cost),
            stats: child.stats.clone(),
        })
    }

    fn initialize(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        self.tuples.clear();
        self.loaded = false;
        self.position = 0;
        self.marked = None;
        inputs.initialize_left()
    }

    fn next(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<Option<Tuple>> {
        if !self.loaded {
            self.load(inputs)?;
        }
        match self.tuples.get(self.position) {
            Some(tuple) => {
                self.position += 1;
                Ok(Some(tuple.clone()))
            }
            None => Ok(None),
        }
    }

    fn clean_up(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        self.tuples.clear();
        self.loaded = false;
        self.position = 0;
        self.marked = None;
        inputs.clean_up_children()
    }

    fn supports_marking(&self, _children: MarkingSupport) -> bool {
        true
    }

    fn mark_current_position(&mut self, _inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        if self.position == 0 {
            return Err(ExecutorError::NoCurrentTuple(self.to_string()));
        }
        self.marked = Some(self.position - 1);
        Ok(())
    }

    fn reset_to_last_mark(&mut self, _inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        let marked = self
            .marked
            .ok_or_else(|| ExecutorError::NoMark(self.to_string()))?;
        self.position = marked;
        Ok(())
    }

    fn duplicate(&self) -> Self {
        Sort::new(self.keys.clone())
    }
}
