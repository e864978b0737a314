//! Query executor - pull-based iterator model
//!
//! A query plan is a [`PlanTree`]: an arena of [`PlanNode`]s, each holding
//! one [`Operator`]. Every operator implements the [`Executor`] protocol:
//! `prepare()` once bottom-up to publish schema, cost and statistics,
//! `initialize()` to (re)start execution, `next()` until it returns
//! `None`, and `clean_up()` to release cursors.

pub mod aggregate;
pub mod datum;
pub mod env;
pub mod error;
pub mod eval;
pub mod filter;
pub mod join;
pub mod limit;
pub mod materialize;
pub mod node;
pub mod plan;
pub mod project;
pub mod rename;
pub mod scan;
pub mod sink;
pub mod sort;
pub mod tuple;

pub use aggregate::{AggregateCall, AggregateFunction, HashGroupAggregate};
pub use datum::Datum;
pub use env::Environment;
pub use error::{ExecutorError, ExecutorResult};
pub use filter::Filter;
pub use join::NestedLoopJoin;
pub use limit::LimitOffset;
pub use materialize::Materialize;
pub use node::{Inputs, NodeId, NodeKind, Operator, PlanNode, Prepared};
pub use plan::PlanTree;
pub use project::Project;
pub use rename::Rename;
pub use scan::FileScan;
pub use sink::{execute_plan, CollectingSink, EvalStats, TuplePrinter, TupleSink};
pub use sort::Sort;
pub use tuple::Tuple;

use std::fmt;

/// Marking capability of a node's children, passed to
/// [`Executor::supports_marking`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkingSupport {
    pub left: bool,
    pub right: bool,
}

/// Iterator protocol shared by every plan operator
///
/// States: constructed, prepared, initialized, streaming, exhausted.
/// Once `next()` returns `None` it keeps returning `None` until the next
/// `initialize()`.
pub trait Executor: fmt::Display {
    /// Compute this node's schema, cost and stats from its prepared
    /// children
    fn prepare(&mut self, inputs: &Inputs<'_>) -> ExecutorResult<Prepared>;

    /// Reset execution state, recursively for children
    fn initialize(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()>;

    /// Get the next tuple, or None if exhausted
    fn next(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<Option<Tuple>>;

    /// Release execution-scoped resources; the node can be initialized
    /// again afterwards
    fn clean_up(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        inputs.clean_up_children()
    }

    fn supports_marking(&self, _children: MarkingSupport) -> bool {
        false
    }

    fn requires_left_marking(&self) -> bool {
        false
    }

    fn requires_right_marking(&self) -> bool {
        false
    }

    /// Remember the position of the tuple last returned by `next()`
    fn mark_current_position(&mut self, _inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        Err(ExecutorError::MarkingUnsupported(self.to_string()))
    }

    /// Rewind so that the next `next()` returns the marked tuple again
    fn reset_to_last_mark(&mut self, _inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        Err(ExecutorError::MarkingUnsupported(self.to_string()))
    }

    /// Copy of this operator's configuration with fresh execution state
    fn duplicate(&self) -> Self
    where
        Self: Sized;
}
