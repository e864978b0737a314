//! Filter executor
//!
//! Filters tuples based on a predicate expression.

use std::fmt;

use crate::catalog::Schema;
use crate::planner::{CostEstimator, SelectivityEstimator};
use crate::sql::{collect_conjuncts, make_predicate, Expr};

use super::env::Environment;
use super::error::{ExecutorError, ExecutorResult};
use super::node::{Inputs, Prepared};
use super::tuple::Tuple;
use super::{Executor, MarkingSupport};

/// Fail with `ColumnNotFound` unless every column in `predicate` resolves
/// against `schema`
pub(crate) fn check_predicate(predicate: Option<&Expr>, schema: &Schema) -> ExecutorResult<()> {
    if let Some(predicate) = predicate {
        for symbol in predicate.symbols() {
            if !symbol.is_wildcard() && schema.column_index(&symbol)?.is_none() {
                return Err(ExecutorError::ColumnNotFound(symbol.to_string()));
            }
        }
    }
    Ok(())
}

/// AND `extra` into an optional predicate, flattening nested conjunctions
pub(crate) fn conjoin(existing: Option<Expr>, extra: Expr) -> Expr {
    let mut conjuncts = Vec::new();
    if let Some(p) = &existing {
        collect_conjuncts(p, &mut conjuncts);
    }
    collect_conjuncts(&extra, &mut conjuncts);
    make_predicate(conjuncts).unwrap_or(extra)
}

/// Filter executor
#[derive(Debug)]
pub struct Filter {
    /// Absent predicate passes everything
    predicate: Option<Expr>,
    done: bool,
}

impl Filter {
    pub fn new(predicate: Option<Expr>) -> Self {
        Filter {
            predicate,
            done: false,
        }
    }

    pub fn predicate(&self) -> Option<&Expr> {
        self.predicate.as_ref()
    }

    pub fn add_predicate(&mut self, predicate: Expr) {
        self.predicate = Some(conjoin(self.predicate.take(), predicate));
    }

    pub fn equivalent(&self, other: &Filter) -> bool {
        self.predicate == other.predicate
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.predicate {
            Some(p) => write!(f, "Filter: {}", p),
            None => write!(f, "Filter: true"),
        }
    }
}

impl Executor for Filter {
    fn prepare(&mut self, inputs: &Inputs<'_>) -> ExecutorResult<Prepared> {
        let child = inputs.left()?;
        check_predicate(self.predicate.as_ref(), &child.schema)?;
        let selectivity =
            SelectivityEstimator::estimate(self.predicate.as_ref(), &child.schema, &child.stats);
        Ok(Prepared {
            schema: child.schema.clone(),
            cost: CostEstimator::filter(&child.cost, selectivity),
            stats: child.stats.clone(),
        })
    }

    fn initialize(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        self.done = false;
        inputs.initialize_left()
    }

    fn next(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<Option<Tuple>> {
        if self.done {
            return Ok(None);
        }
        let this = inputs.this()?;
        loop {
            match inputs.next_left()? {
                Some(tuple) => {
                    let passes = match &self.predicate {
                        Some(p) => p.evaluate_predicate(&Environment::new(&this.schema, &tuple))?,
                        None => true,
                    };
                    if passes {
                        return Ok(Some(tuple));
                    }
                }
                None => {
                    self.done = true;
                    return Ok(None);
                }
            }
        }
    }

    fn supports_marking(&self, children: MarkingSupport) -> bool {
        children.left
    }

    fn mark_current_position(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        inputs.mark_left()
    }

    fn reset_to_last_mark(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        inputs.reset_left()?;
        self.done = false;
        Ok(())
    }

    fn duplicate(&self) -> Self {
        Filter::new(self.predicate.clone())
    }
}
