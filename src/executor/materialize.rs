//! Materialize executor
//!
//! Buffers its input as it is pulled so that the stream can be marked and
//! replayed even when the input itself cannot mark.

use std::fmt;

use crate::planner::CostEstimator;

use super::error::{ExecutorError, ExecutorResult};
use super::node::{Inputs, Prepared};
use super::tuple::Tuple;
use super::{Executor, MarkingSupport};

#[derive(Debug, Default)]
pub struct Materialize {
    buffer: Vec<Tuple>,
    /// Index of the next tuple to return from `buffer`
    position: usize,
    child_done: bool,
    marked: Option<usize>,
}

impl Materialize {
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Display for Materialize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Materialize")
    }
}

impl Executor for Materialize {
    fn prepare(&mut self, inputs: &Inputs<'_>) -> ExecutorResult<Prepared> {
        let child = inputs.left()?;
        Ok(Prepared {
            schema: child.schema.clone(),
            cost: CostEstimator::materialize(&child.cost),
            stats: child.stats.clone(),
        })
    }

    fn initialize(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        self.buffer.clear();
        self.position = 0;
        self.child_done = false;
        self.marked = None;
        inputs.initialize_left()
    }

    fn next(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<Option<Tuple>> {
        if self.position < self.buffer.len() {
            self.position += 1;
            return Ok(Some(self.buffer[self.position - 1].clone()));
        }
        if self.child_done {
            return Ok(None);
        }
        match inputs.next_left()? {
            Some(tuple) => {
                self.buffer.push(tuple.clone());
                self.position += 1;
                Ok(Some(tuple))
            }
            None => {
                self.child_done = true;
                Ok(None)
            }
        }
    }

    fn clean_up(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        self.buffer.clear();
        self.position = 0;
        self.child_done = false;
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
        Materialize::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::executor::test_util::{int_table, ints, scan};
    use crate::executor::ExecutorError;
    use crate::tuple;

    #[test]
    fn test_materialize_replays_after_mark() {
        let file = int_table("t", &["v"], vec![tuple![1], tuple![2], tuple![3]]);
        let mut plan = scan(&file).limit_offset(0, 0).materialize();
        assert!(plan.supports_marking());
        plan.prepare().unwrap();
        plan.initialize().unwrap();

        assert!(matches!(
            plan.mark_current_position(),
            Err(ExecutorError::NoCurrentTuple(_))
        ));

        plan.next_tuple().unwrap();
        plan.mark_current_position().unwrap();
        let mut first = Vec::new();
        while let Some(t) = plan.next_tuple().unwrap() {
            first.push(t);
        }
        assert_eq!(ints(&first), vec![vec![2], vec![3]]);

        plan.reset_to_last_mark().unwrap();
        let mut replay = Vec::new();
        while let Some(t) = plan.next_tuple().unwrap() {
            replay.push(t);
        }
        assert_eq!(ints(&replay), vec![vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_materialize_cost() {
        let file = int_table("t", &["v"], vec![tuple![1], tuple![2]]);
        let mut plan = scan(&file).materialize();
        plan.prepare().unwrap();
        let cost = plan.cost().unwrap();
        assert_eq!(cost.cpu_cost, 4.0);
        assert_eq!(cost.num_tuples, 2.0);
    }
}
