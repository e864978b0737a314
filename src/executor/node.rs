//! Plan nodes and operator dispatch
//!
//! Every node of a [`PlanTree`](super::PlanTree) holds one [`Operator`],
//! the indices of its children, and the [`Prepared`] description that
//! `prepare()` publishes. Operators never own their children; they reach
//! them through an [`Inputs`] handle that borrows the part of the arena
//! below the node.

use std::fmt;

use crate::catalog::{ColumnStats, Schema};
use crate::planner::PlanCost;

use super::aggregate::HashGroupAggregate;
use super::error::{ExecutorError, ExecutorResult};
use super::filter::Filter;
use super::join::NestedLoopJoin;
use super::limit::LimitOffset;
use super::materialize::Materialize;
use super::project::Project;
use super::rename::Rename;
use super::scan::FileScan;
use super::sort::Sort;
use super::tuple::Tuple;
use super::{Executor, MarkingSupport};

/// Index of a node in its plan tree
pub type NodeId = usize;

/// Node kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    FileScan,
    Select,
    Project,
    Rename,
    ThetaJoin,
    GroupAggregate,
    Sort,
    LimitOffset,
    Materialize,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::FileScan => "FileScan",
            NodeKind::Select => "Select",
            NodeKind::Project => "Project",
            NodeKind::Rename => "Rename",
            NodeKind::ThetaJoin => "ThetaJoin",
            NodeKind::GroupAggregate => "GroupAggregate",
            NodeKind::Sort => "Sort",
            NodeKind::LimitOffset => "LimitOffset",
            NodeKind::Materialize => "Materialize",
        };
        write!(f, "{}", name)
    }
}

/// What `prepare()` computes for a node: output schema, cost and
/// per-column statistics. Immutable once published.
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub schema: Schema,
    pub cost: PlanCost,
    pub stats: Vec<ColumnStats>,
}

/// Closed set of plan operators
#[derive(Debug)]
pub enum Operator {
    FileScan(FileScan),
    Filter(Filter),
    Project(Project),
    Rename(Rename),
    NestedLoopJoin(NestedLoopJoin),
    HashGroupAggregate(HashGroupAggregate),
    Sort(Sort),
    LimitOffset(LimitOffset),
    Materialize(Materialize),
}

macro_rules! dispatch {
    ($self:expr, $op:ident => $body:expr) => {
        match $self {
            Operator::FileScan($op) => $body,
            Operator::Filter($op) => $body,
            Operator::Project($op) => $body,
            Operator::Rename($op) => $body,
            Operator::NestedLoopJoin($op) => $body,
            Operator::HashGroupAggregate($op) => $body,
            Operator::Sort($op) => $body,
            Operator::LimitOffset($op) => $body,
            Operator::Materialize($op) => $body,
        }
    };
}

impl Operator {
    pub fn kind(&self) -> NodeKind {
        match self {
            Operator::FileScan(_) => NodeKind::FileScan,
            Operator::Filter(_) => NodeKind::Select,
            Operator::Project(_) => NodeKind::Project,
            Operator::Rename(_) => NodeKind::Rename,
            Operator::NestedLoopJoin(_) => NodeKind::ThetaJoin,
            Operator::HashGroupAggregate(_) => NodeKind::GroupAggregate,
            Operator::Sort(_) => NodeKind::Sort,
            Operator::LimitOffset(_) => NodeKind::LimitOffset,
            Operator::Materialize(_) => NodeKind::Materialize,
        }
    }

    /// True if both operators are configured identically (execution
    /// state is ignored)
    pub fn equivalent(&self, other: &Operator) -> bool {
        match (self, other) {
            (Operator::FileScan(a), Operator::FileScan(b)) => a.equivalent(b),
            (Operator::Filter(a), Operator::Filter(b)) => a.equivalent(b),
            (Operator::Project(a), Operator::Project(b)) => a.equivalent(b),
            (Operator::Rename(a), Operator::Rename(b)) => a.equivalent(b),
            (Operator::NestedLoopJoin(a), Operator::NestedLoopJoin(b)) => a.equivalent(b),
            (Operator::HashGroupAggregate(a), Operator::HashGroupAggregate(b)) => {
                a.equivalent(b)
            }
            (Operator::Sort(a), Operator::Sort(b)) => a.equivalent(b),
            (Operator::LimitOffset(a), Operator::LimitOffset(b)) => a.equivalent(b),
            (Operator::Materialize(_), Operator::Materialize(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch!(self, op => fmt::Display::fmt(op, f))
    }
}

impl Executor for Operator {
    fn prepare(&mut self, inputs: &Inputs<'_>) -> ExecutorResult<Prepared> {
        dispatch!(self, op => op.prepare(inputs))
    }

    fn initialize(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        dispatch!(self, op => op.initialize(inputs))
    }

    fn next(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<Option<Tuple>> {
        dispatch!(self, op => op.next(inputs))
    }

    fn clean_up(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        dispatch!(self, op => op.clean_up(inputs))
    }

    fn supports_marking(&self, children: MarkingSupport) -> bool {
        dispatch!(self, op => op.supports_marking(children))
    }

    fn requires_left_marking(&self) -> bool {
        dispatch!(self, op => op.requires_left_marking())
    }

    fn requires_right_marking(&self) -> bool {
        dispatch!(self, op => op.requires_right_marking())
    }

    fn mark_current_position(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        dispatch!(self, op => op.mark_current_position(inputs))
    }

    fn reset_to_last_mark(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        dispatch!(self, op => op.reset_to_last_mark(inputs))
    }

    fn duplicate(&self) -> Self {
        dispatch!(self, op => Operator::from(op.duplicate()))
    }
}

macro_rules! impl_from_operator {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Operator {
                fn from(op: $variant) -> Self {
                    Operator::$variant(op)
                }
            }
        )*
    };
}

impl_from_operator!(
    FileScan,
    Filter,
    Project,
    Rename,
    NestedLoopJoin,
    HashGroupAggregate,
    Sort,
    LimitOffset,
    Materialize
);

/// One node of the plan arena
#[derive(Debug)]
pub struct PlanNode {
    pub(crate) operator: Operator,
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) prepared: Option<Prepared>,
}

impl PlanNode {
    pub(crate) fn new(operator: Operator, left: Option<NodeId>, right: Option<NodeId>) -> Self {
        Self {
            operator,
            left,
            right,
            parent: None,
            prepared: None,
        }
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn left(&self) -> Option<NodeId> {
        self.left
    }

    pub fn right(&self) -> Option<NodeId> {
        self.right
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn prepared(&self) -> Option<&Prepared> {
        self.prepared.as_ref()
    }

    pub(crate) fn children(&self) -> impl Iterator<Item = NodeId> {
        self.left.into_iter().chain(self.right)
    }
}

/// A node's view of its children during a protocol call.
///
/// Holds the arena slice strictly below the node (where all of its
/// descendants live) and the node's own prepared description, if any.
pub struct Inputs<'a> {
    nodes: &'a mut [PlanNode],
    left: Option<NodeId>,
    right: Option<NodeId>,
    this: Option<&'a Prepared>,
    kind: NodeKind,
}

impl<'a> Inputs<'a> {
    /// This node's prepared description
    pub fn this(&self) -> ExecutorResult<&'a Prepared> {
        self.this
            .ok_or_else(|| ExecutorError::NotPrepared(self.kind.to_string()))
    }

    pub fn has_left(&self) -> bool {
        self.left.is_some()
    }

    pub fn has_right(&self) -> bool {
        self.right.is_some()
    }

    fn left_id(&self) -> ExecutorResult<NodeId> {
        self.left
            .ok_or_else(|| ExecutorError::Internal(format!("{} has no left input", self.kind)))
    }

    fn right_id(&self) -> ExecutorResult<NodeId> {
        self.right
            .ok_or_else(|| ExecutorError::Internal(format!("{} has no right input", self.kind)))
    }

    fn props(&self, id: NodeId) -> ExecutorResult<&Prepared> {
        let node = &self.nodes[id];
        node.prepared
            .as_ref()
            .ok_or_else(|| ExecutorError::NotPrepared(node.operator.to_string()))
    }

    /// Prepared description of the left child
    pub fn left(&self) -> ExecutorResult<&Prepared> {
        self.props(self.left_id()?)
    }

    /// Prepared description of the right child
    pub fn right(&self) -> ExecutorResult<&Prepared> {
        self.props(self.right_id()?)
    }

    pub fn next_left(&mut self) -> ExecutorResult<Option<Tuple>> {
        let id = self.left_id()?;
        next_node(self.nodes, id)
    }

    pub fn next_right(&mut self) -> ExecutorResult<Option<Tuple>> {
        let id = self.right_id()?;
        next_node(self.nodes, id)
    }

    pub fn initialize_left(&mut self) -> ExecutorResult<()> {
        let id = self.left_id()?;
        initialize_node(self.nodes, id)
    }

    pub fn initialize_right(&mut self) -> ExecutorResult<()> {
        let id = self.right_id()?;
        initialize_node(self.nodes, id)
    }

    /// Initialize whichever children exist
    pub fn initialize_children(&mut self) -> ExecutorResult<()> {
        if self.has_left() {
            self.initialize_left()?;
        }
        if self.has_right() {
            self.initialize_right()?;
        }
        Ok(())
    }

    pub fn mark_left(&mut self) -> ExecutorResult<()> {
        let id = self.left_id()?;
        mark_node(self.nodes, id)
    }

    pub fn mark_right(&mut self) -> ExecutorResult<()> {
        let id = self.right_id()?;
        mark_node(self.nodes, id)
    }

    pub fn reset_left(&mut self) -> ExecutorResult<()> {
        let id = self.left_id()?;
        reset_node(self.nodes, id)
    }

    pub fn reset_right(&mut self) -> ExecutorResult<()> {
        let id = self.right_id()?;
        reset_node(self.nodes, id)
    }

    pub fn clean_up_children(&mut self) -> ExecutorResult<()> {
        if let Some(id) = self.left {
            clean_up_node(self.nodes, id)?;
        }
        if let Some(id) = self.right {
            clean_up_node(self.nodes, id)?;
        }
        Ok(())
    }
}

/// Run `f` on the operator at `id` with an [`Inputs`] over its children
fn with_node<R>(
    nodes: &mut [PlanNode],
    id: NodeId,
    f: impl FnOnce(&mut Operator, &mut Inputs<'_>) -> R,
) -> R {
    let (below, rest) = nodes.split_at_mut(id);
    let PlanNode {
        operator,
        left,
        right,
        prepared,
        ..
    } = &mut rest[0];
    let mut inputs = Inputs {
        nodes: below,
        left: *left,
        right: *right,
        this: prepared.as_ref(),
        kind: operator.kind(),
    };
    f(operator, &mut inputs)
}

/// Prepare `id` and every unprepared node below it, bottom-up
pub(crate) fn prepare_node(nodes: &mut [PlanNode], id: NodeId) -> ExecutorResult<()> {
    if nodes[id].prepared.is_some() {
        return Ok(());
    }
    let children: Vec<NodeId> = nodes[id].children().collect();
    for child in children {
        prepare_node(nodes, child)?;
    }
    let prepared = with_node(nodes, id, |op, inputs| op.prepare(inputs))?;
    nodes[id].prepared = Some(prepared);
    Ok(())
}

pub(crate) fn initialize_node(nodes: &mut [PlanNode], id: NodeId) -> ExecutorResult<()> {
    with_node(nodes, id, |op, inputs| op.initialize(inputs))
}

pub(crate) fn next_node(nodes: &mut [PlanNode], id: NodeId) -> ExecutorResult<Option<Tuple>> {
    with_node(nodes, id, |op, inputs| op.next(inputs))
}

pub(crate) fn mark_node(nodes: &mut [PlanNode], id: NodeId) -> ExecutorResult<()> {
    with_node(nodes, id, |op, inputs| op.mark_current_position(inputs))
}

pub(crate) fn reset_node(nodes: &mut [PlanNode], id: NodeId) -> ExecutorResult<()> {
    with_node(nodes, id, |op, inputs| op.reset_to_last_mark(inputs))
}

pub(crate) fn clean_up_node(nodes: &mut [PlanNode], id: NodeId) -> ExecutorResult<()> {
    with_node(nodes, id, |op, inputs| op.clean_up(inputs))
}

/// Whether the node at `id` can mark, given what its children can do
pub(crate) fn node_supports_marking(nodes: &[PlanNode], id: NodeId) -> bool {
    let node = &nodes[id];
    let children = MarkingSupport {
        left: node.left.is_some_and(|l| node_supports_marking(nodes, l)),
        right: node.right.is_some_and(|r| node_supports_marking(nodes, r)),
    };
    node.operator.supports_marking(children)
}
