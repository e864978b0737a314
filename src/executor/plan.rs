//! Plan trees
//!
//! A [`PlanTree`] stores all of its nodes in one vector. Children always
//! sit at lower indices than their parent and every subtree occupies a
//! contiguous index range ending at its root, so the root of the whole
//! tree is the last node. Copying a subtree is a range copy with index
//! translation; parent links are recomputed in a single pass afterwards.

use std::fmt;
use std::sync::Arc;

use crate::catalog::{ColumnStats, Schema};
use crate::planner::PlanCost;
use crate::sql::{Expr, JoinType, OrderByExpr, SelectValue};
use crate::storage::TupleFile;

use super::aggregate::{AggregateCall, HashGroupAggregate};
use super::error::{ExecutorError, ExecutorResult};
use super::filter::Filter;
use super::join::NestedLoopJoin;
use super::limit::LimitOffset;
use super::materialize::Materialize;
use super::node::{
    clean_up_node, initialize_node, mark_node, next_node, node_supports_marking, prepare_node,
    reset_node, NodeId, NodeKind, Operator, PlanNode, Prepared,
};
use super::project::Project;
use super::rename::Rename;
use super::scan::FileScan;
use super::sort::Sort;
use super::tuple::Tuple;
use super::Executor;

/// An executable query plan
#[derive(Debug)]
pub struct PlanTree {
    nodes: Vec<PlanNode>,
}

impl PlanTree {
    // ============ Assembly ============

    fn leaf(operator: Operator) -> Self {
        Self {
            nodes: vec![PlanNode::new(operator, None, None)],
        }
    }

    fn unary(child: PlanTree, operator: Operator) -> Self {
        let mut nodes = child.nodes;
        let child_root = nodes.len() - 1;
        nodes.push(PlanNode::new(operator, Some(child_root), None));
        let mut tree = Self { nodes };
        tree.link_parents();
        tree
    }

    fn binary(left: PlanTree, right: PlanTree, operator: Operator) -> Self {
        let mut nodes = left.nodes;
        let left_root = nodes.len() - 1;
        let offset = nodes.len();
        nodes.extend(right.nodes.into_iter().map(|mut node| {
            node.left = node.left.map(|i| i + offset);
            node.right = node.right.map(|i| i + offset);
            node
        }));
        let right_root = nodes.len() - 1;
        nodes.push(PlanNode::new(operator, Some(left_root), Some(right_root)));
        let mut tree = Self { nodes };
        tree.link_parents();
        tree
    }

    fn link_parents(&mut self) {
        for node in &mut self.nodes {
            node.parent = None;
        }
        for id in 0..self.nodes.len() {
            let children: Vec<NodeId> = self.nodes[id].children().collect();
            for child in children {
                self.nodes[child].parent = Some(id);
            }
        }
    }

    /// Scan of a tuple file with an optional residual predicate
    pub fn file_scan(file: Arc<dyn TupleFile>, predicate: Option<Expr>) -> Self {
        Self::leaf(FileScan::new(file, predicate).into())
    }

    /// Projection with no input, producing exactly one tuple
    pub fn leaf_project(values: Vec<SelectValue>) -> Self {
        Self::leaf(Project::leaf(values).into())
    }

    pub fn filter(self, predicate: Option<Expr>) -> Self {
        Self::unary(self, Filter::new(predicate).into())
    }

    pub fn project(self, values: Vec<SelectValue>) -> Self {
        Self::unary(self, Project::new(values).into())
    }

    pub fn rename(self, table: impl Into<String>) -> Self {
        Self::unary(self, Rename::new(table).into())
    }

    pub fn sort(self, keys: Vec<OrderByExpr>) -> Self {
        Self::unary(self, Sort::new(keys).into())
    }

    /// A zero limit means unbounded
    pub fn limit_offset(self, limit: u64, offset: u64) -> Self {
        Self::unary(self, LimitOffset::new(limit, offset).into())
    }

    pub fn materialize(self) -> Self {
        Self::unary(self, Materialize::new().into())
    }

    pub fn group_aggregate(
        self,
        group_by: Vec<Expr>,
        aggregates: Vec<(String, AggregateCall)>,
    ) -> Self {
        Self::unary(self, HashGroupAggregate::new(group_by, aggregates).into())
    }

    pub fn nested_loop_join(
        left: PlanTree,
        right: PlanTree,
        join_type: JoinType,
        predicate: Option<Expr>,
    ) -> Self {
        Self::join(left, right, NestedLoopJoin::new(join_type, predicate))
    }

    /// Join two plans with a configured join operator
    pub fn join(left: PlanTree, right: PlanTree, join: NestedLoopJoin) -> Self {
        Self::binary(left, right, join.into())
    }

    /// Apply a predicate to this plan's output.
    ///
    /// A root scan or filter absorbs the predicate into its own; any
    /// other root gets a new filter above it.
    pub fn with_predicate(mut self, predicate: Expr) -> Self {
        let root = self.root();
        let absorbs = matches!(
            self.nodes[root].operator,
            Operator::FileScan(_) | Operator::Filter(_)
        );
        if !absorbs {
            return self.filter(Some(predicate));
        }

        let node = &mut self.nodes[root];
        match &mut node.operator {
            Operator::FileScan(scan) => scan.add_predicate(predicate),
            Operator::Filter(filter) => filter.add_predicate(predicate),
            _ => {}
        }
        node.prepared = None;
        self
    }

    /// Exchange the operands of the join at `id`.
    ///
    /// The join's reported schema keeps its shape; only the evaluation
    /// order of its inputs changes. The join and its ancestors must be
    /// prepared again.
    pub fn swap(&mut self, id: NodeId) -> ExecutorResult<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| ExecutorError::Internal(format!("no plan node {}", id)))?;
        match &mut node.operator {
            Operator::NestedLoopJoin(join) => join.toggle_swapped(),
            other => {
                return Err(ExecutorError::InvalidPlan(format!("cannot swap {}", other)));
            }
        }
        std::mem::swap(&mut node.left, &mut node.right);
        self.invalidate(id);
        Ok(())
    }

    /// Wrap every child that must support marking, but cannot, in a
    /// materializing buffer
    pub fn ensure_marking(&mut self) {
        let mut id = 0;
        while id < self.nodes.len() {
            let node = &self.nodes[id];
            if let Some(left) = node.left {
                if node.operator.requires_left_marking()
                    && !node_supports_marking(&self.nodes, left)
                {
                    self.insert_above(left, Materialize::new().into());
                    continue;
                }
            }
            let node = &self.nodes[id];
            if let Some(right) = node.right {
                if node.operator.requires_right_marking()
                    && !node_supports_marking(&self.nodes, right)
                {
                    self.insert_above(right, Materialize::new().into());
                    continue;
                }
            }
            id += 1;
        }
    }

    /// Insert a unary node directly above `child`
    fn insert_above(&mut self, child: NodeId, operator: Operator) {
        let at = child + 1;
        let shift = |i: NodeId| if i >= at { i + 1 } else { i };
        let parent = self.nodes[child].parent.map(shift);
        for node in &mut self.nodes {
            node.left = node.left.map(shift);
            node.right = node.right.map(shift);
        }
        self.nodes
            .insert(at, PlanNode::new(operator, Some(child), None));
        if let Some(p) = parent {
            let node = &mut self.nodes[p];
            if node.left == Some(child) {
                node.left = Some(at);
            } else if node.right == Some(child) {
                node.right = Some(at);
            }
        }
        self.link_parents();
        self.invalidate(at);
    }

    /// Drop prepared state of `id` and all of its ancestors
    fn invalidate(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(i) = current {
            self.nodes[i].prepared = None;
            current = self.nodes[i].parent;
        }
    }

    // ============ Structure ============

    pub fn root(&self) -> NodeId {
        self.nodes.len() - 1
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&PlanNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    /// Kind of the root node
    pub fn kind(&self) -> NodeKind {
        self.nodes[self.root()].operator.kind()
    }

    /// First index of the subtree rooted at `id`
    fn subtree_start(&self, id: NodeId) -> NodeId {
        let mut start = id;
        loop {
            let node = &self.nodes[start];
            match node.children().min() {
                Some(child) => start = child,
                None => return start,
            }
        }
    }

    /// Independent copy of the subtree rooted at `id`. Operators get fresh
    /// execution state; prepared descriptions are kept.
    pub fn subtree(&self, id: NodeId) -> ExecutorResult<PlanTree> {
        if id >= self.nodes.len() {
            return Err(ExecutorError::Internal(format!("no plan node {}", id)));
        }
        let start = self.subtree_start(id);
        let nodes = self.nodes[start..=id]
            .iter()
            .map(|node| PlanNode {
                operator: node.operator.duplicate(),
                left: node.left.map(|i| i - start),
                right: node.right.map(|i| i - start),
                parent: None,
                prepared: node.prepared.clone(),
            })
            .collect();
        let mut tree = PlanTree { nodes };
        tree.link_parents();
        Ok(tree)
    }

    /// Independent copy of the whole tree
    pub fn duplicate(&self) -> PlanTree {
        let nodes = self
            .nodes
            .iter()
            .map(|node| PlanNode {
                operator: node.operator.duplicate(),
                left: node.left,
                right: node.right,
                parent: None,
                prepared: node.prepared.clone(),
            })
            .collect();
        let mut tree = PlanTree { nodes };
        tree.link_parents();
        tree
    }

    /// Structural equality: same operators configured the same way, in
    /// the same shape
    pub fn equivalent(&self, other: &PlanTree) -> bool {
        self.equivalent_at(self.root(), other, other.root())
    }

    fn equivalent_at(&self, a: NodeId, other: &PlanTree, b: NodeId) -> bool {
        let (na, nb) = (&self.nodes[a], &other.nodes[b]);
        let same_child = |x: Option<NodeId>, y: Option<NodeId>| match (x, y) {
            (None, None) => true,
            (Some(x), Some(y)) => self.equivalent_at(x, other, y),
            _ => false,
        };
        na.operator.equivalent(&nb.operator)
            && same_child(na.left, nb.left)
            && same_child(na.right, nb.right)
    }

    // ============ Execution ============

    /// Prepare every unprepared node, bottom-up
    pub fn prepare(&mut self) -> ExecutorResult<()> {
        let root = self.root();
        prepare_node(&mut self.nodes, root)
    }

    pub fn is_prepared(&self) -> bool {
        self.nodes.iter().all(|n| n.prepared.is_some())
    }

    /// Start (or restart) execution
    pub fn initialize(&mut self) -> ExecutorResult<()> {
        if let Some(node) = self.nodes.iter().find(|n| n.prepared.is_none()) {
            return Err(ExecutorError::NotPrepared(node.operator.to_string()));
        }
        let root = self.root();
        initialize_node(&mut self.nodes, root)
    }

    pub fn next_tuple(&mut self) -> ExecutorResult<Option<Tuple>> {
        let root = self.root();
        next_node(&mut self.nodes, root)
    }

    pub fn supports_marking(&self) -> bool {
        node_supports_marking(&self.nodes, self.root())
    }

    pub fn mark_current_position(&mut self) -> ExecutorResult<()> {
        let root = self.root();
        mark_node(&mut self.nodes, root)
    }

    pub fn reset_to_last_mark(&mut self) -> ExecutorResult<()> {
        let root = self.root();
        reset_node(&mut self.nodes, root)
    }

    pub fn clean_up(&mut self) -> ExecutorResult<()> {
        let root = self.root();
        clean_up_node(&mut self.nodes, root)
    }

    // ============ Prepared properties ============

    pub fn prepared(&self) -> Option<&Prepared> {
        self.nodes[self.root()].prepared.as_ref()
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.prepared().map(|p| &p.schema)
    }

    pub fn cost(&self) -> Option<&PlanCost> {
        self.prepared().map(|p| &p.cost)
    }

    pub fn stats(&self) -> Option<&[ColumnStats]> {
        self.prepared().map(|p| p.stats.as_slice())
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, indent: usize) -> fmt::Result {
        let node = &self.nodes[id];
        writeln!(f, "{}{}", "  ".repeat(indent), node.operator)?;
        for child in node.children() {
            self.fmt_node(f, child, indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for PlanTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, self.root(), 0)
    }
}
