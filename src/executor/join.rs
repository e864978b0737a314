//! Join executor
//!
//! Theta-join evaluated by nested loops: for every left tuple the whole
//! right input is scanned, and every pair passing the join predicate is
//! emitted. The right input is rewound between left tuples either by
//! mark/reset or by initializing it again.

use std::fmt;

use crate::catalog::Schema;
use crate::planner::{CostEstimator, RewindStrategy, SelectivityEstimator};
use crate::sql::{Expr, JoinType};

use super::env::Environment;
use super::error::{ExecutorError, ExecutorResult};
use super::filter::check_predicate;
use super::node::{Inputs, Prepared};
use super::tuple::Tuple;
use super::Executor;

/// Nested loop join executor
#[derive(Debug)]
pub struct NestedLoopJoin {
    join_type: JoinType,
    /// Optional join condition; absent means every pair matches
    predicate: Option<Expr>,
    /// Output is right-then-left; see [`PlanTree::swap`](super::PlanTree::swap)
    swapped: bool,
    rewind: RewindStrategy,
    /// Current left tuple
    left_tuple: Option<Tuple>,
    /// Whether the current left tuple matched any right tuple
    matched: bool,
    /// Whether the right input was marked during this execution
    right_marked: bool,
    /// Whether the right input produced anything in this pass
    right_seen: bool,
    done: bool,
}

impl NestedLoopJoin {
    pub fn new(join_type: JoinType, predicate: Option<Expr>) -> Self {
        NestedLoopJoin {
            join_type,
            predicate,
            swapped: false,
            rewind: RewindStrategy::Mark,
            left_tuple: None,
            matched: false,
            right_marked: false,
            right_seen: false,
            done: false,
        }
    }

    #[must_use]
    pub fn with_rewind(mut self, rewind: RewindStrategy) -> Self {
        self.rewind = rewind;
        self
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub fn predicate(&self) -> Option<&Expr> {
        self.predicate.as_ref()
    }

    pub fn is_swapped(&self) -> bool {
        self.swapped
    }

    pub fn rewind(&self) -> RewindStrategy {
        self.rewind
    }

    pub(crate) fn toggle_swapped(&mut self) {
        self.swapped = !self.swapped;
    }

    pub fn equivalent(&self, other: &NestedLoopJoin) -> bool {
        self.join_type == other.join_type
            && self.predicate == other.predicate
            && self.swapped == other.swapped
            && self.rewind == other.rewind
    }

    /// Output tuple for a left/right pair, in schema order
    fn output(&self, left: &Tuple, right: &Tuple) -> Tuple {
        if self.swapped {
            right.concat(left)
        } else {
            left.concat(right)
        }
    }

    fn matches(&self, inputs: &Inputs<'_>, left: &Tuple, right: &Tuple) -> ExecutorResult<bool> {
        let Some(predicate) = &self.predicate else {
            return Ok(true);
        };
        let env = Environment::new(&inputs.left()?.schema, left).bind(&inputs.right()?.schema, right);
        predicate.evaluate_predicate(&env)
    }

    fn rewind_right(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        self.right_seen = false;
        if self.right_marked {
            inputs.reset_right()
        } else {
            inputs.initialize_right()
        }
    }
}

impl fmt::Display for NestedLoopJoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NestedLoopJoin: {}", self.join_type)?;
        if let Some(p) = &self.predicate {
            write!(f, " on {}", p)?;
        }
        if self.swapped {
            write!(f, " (swapped)")?;
        }
        Ok(())
    }
}

impl Executor for NestedLoopJoin {
    fn prepare(&mut self, inputs: &Inputs<'_>) -> ExecutorResult<Prepared> {
        match self.join_type {
            JoinType::Inner | JoinType::Cross | JoinType::LeftOuter => {}
            other => return Err(ExecutorError::UnsupportedJoin(other)),
        }

        let left = inputs.left()?;
        let right = inputs.right()?;
        let (first, second) = if self.swapped {
            (right, left)
        } else {
            (left, right)
        };
        let schema = Schema::concat(&first.schema, &second.schema)?;
        let stats: Vec<_> = first.stats.iter().chain(&second.stats).cloned().collect();

        check_predicate(self.predicate.as_ref(), &schema)?;

        let selectivity = SelectivityEstimator::estimate(self.predicate.as_ref(), &schema, &stats);
        let cost = CostEstimator::nested_loop(
            &left.cost,
            &right.cost,
            self.join_type,
            selectivity,
            self.rewind == RewindStrategy::Reinitialize,
        );
        Ok(Prepared {
            schema,
            cost,
            stats,
        })
    }

    fn initialize(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        self.left_tuple = None;
        self.matched = false;
        self.right_marked = false;
        self.right_seen = false;
        self.done = false;
        inputs.initialize_left()?;
        inputs.initialize_right()
    }

    fn next(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<Option<Tuple>> {
        if self.done {
            return Ok(None);
        }

        loop {
            if self.left_tuple.is_none() {
                match inputs.next_left()? {
                    Some(tuple) => {
                        self.left_tuple = Some(tuple);
                        self.matched = false;
                    }
                    None => {
                        self.done = true;
                        return Ok(None);
                    }
                }
            }
            let Some(left) = self.left_tuple.take() else {
                continue;
            };

            match inputs.next_right()? {
                Some(right) => {
                    if !self.right_seen && self.rewind == RewindStrategy::Mark && !self.right_marked
                    {
                        inputs.mark_right()?;
                        self.right_marked = true;
                    }
                    self.right_seen = true;

                    let passes = self.matches(inputs, &left, &right)?;
                    let out = passes.then(|| self.output(&left, &right));
                    self.left_tuple = Some(left);
                    if let Some(out) = out {
                        self.matched = true;
                        return Ok(Some(out));
                    }
                }
                None => {
                    // Right side exhausted for this left tuple
                    let right_was_empty = !self.right_seen;
                    let width = inputs.right()?.schema.len();
                    self.rewind_right(inputs)?;

                    if self.join_type == JoinType::LeftOuter && !self.matched {
                        let nulls = Tuple::nulls(width);
                        return Ok(Some(self.output(&left, &nulls)));
                    }
                    if right_was_empty {
                        // Nothing can ever match
                        self.done = true;
                        return Ok(None);
                    }
                }
            }
        }
    }

    fn clean_up(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        self.left_tuple = None;
        self.right_marked = false;
        inputs.clean_up_children()
    }

    fn requires_right_marking(&self) -> bool {
        self.rewind == RewindStrategy::Mark
    }

    fn duplicate(&self) -> Self {
        NestedLoopJoin {
            swapped: self.swapped,
            rewind: self.rewind,
            ..NestedLoopJoin::new(self.join_type, self.predicate.clone())
        }
    }
}
