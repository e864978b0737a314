//! Cost-based join planner
//!
//! Turns a query block into an executable [`PlanTree`]:
//!
//! 1. The FROM tree is flattened into join leaves (base tables, derived
//!    tables and outer joins) and the ON and WHERE predicates into
//!    conjuncts.
//! 2. Every leaf gets its own plan, with the conjuncts that only touch
//!    that leaf pushed down onto it.
//! 3. A dynamic-programming search over leaf sets builds left-deep
//!    nested-loop joins, keeping the cheapest plan for every set.
//! 4. Residual filter, grouping, HAVING, projection, sort and limit are
//!    stacked on top of the winning join.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::catalog::{ColumnName, Schema};
use crate::executor::{ExecutorError, NestedLoopJoin, PlanTree};
use crate::sql::{
    collect_conjuncts, find_exprs_using_schemas, make_predicate, Expr, FromClause, JoinCondition,
    JoinType, SelectClause, SelectValue,
};
use crate::storage::TableProvider;

use super::aggregates::{contains_aggregate, AggregateExtractor};
use super::config::PlannerConfig;
use super::error::{PlannerError, PlannerResult};
use super::leaf_set::LeafSet;
use super::subquery::SubqueryPlanner;

/// Produces an executable plan for a query block
pub trait Planner {
    fn make_plan(&self, query: &SelectClause) -> PlannerResult<PlanTree>;
}

/// Best plan found so far for one set of join leaves
#[derive(Debug)]
struct JoinComponent {
    plan: PlanTree,
    leaves: LeafSet,
    /// Positions of the conjuncts applied somewhere inside `plan`
    used: BTreeSet<usize>,
}

impl JoinComponent {
    fn cpu_cost(&self) -> f32 {
        self.plan.cost().map_or(f32::INFINITY, |c| c.cpu_cost)
    }

    fn duplicate(&self) -> JoinComponent {
        JoinComponent {
            plan: self.plan.duplicate(),
            leaves: self.leaves,
            used: self.used.clone(),
        }
    }
}

/// Join planner that picks the join order with the lowest estimated CPU
/// cost
pub struct CostBasedJoinPlanner<'a> {
    tables: &'a dyn TableProvider,
    config: PlannerConfig,
}

impl<'a> CostBasedJoinPlanner<'a> {
    pub fn new(tables: &'a dyn TableProvider) -> Self {
        Self::with_config(tables, PlannerConfig::default())
    }

    pub fn with_config(tables: &'a dyn TableProvider, config: PlannerConfig) -> Self {
        CostBasedJoinPlanner { tables, config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// `SELECT * FROM table [WHERE predicate]`
    pub fn make_simple_select(
        &self,
        table: &str,
        predicate: Option<Expr>,
    ) -> PlannerResult<PlanTree> {
        let query = SelectClause {
            from: Some(FromClause::table(table)),
            where_expr: predicate,
            ..SelectClause::select_all()
        };
        self.make_plan(&query)
    }

    // ============ Clause assembly ============

    fn plan_select(&self, query: &SelectClause) -> PlannerResult<PlanTree> {
        let query = &SubqueryPlanner::new(self).resolve_query(query)?;
        for expr in &query.group_by {
            if !matches!(expr, Expr::Column(name) if !name.is_wildcard()) {
                return Err(PlannerError::InvalidGroupBy(expr.to_string()));
            }
        }
        if let Some(where_expr) = &query.where_expr {
            if contains_aggregate(where_expr) {
                return Err(PlannerError::InvalidPlan(format!(
                    "aggregate in WHERE clause: {}",
                    where_expr
                )));
            }
        }

        let extracted =
            AggregateExtractor::extract(&query.values, query.having.as_ref(), &query.order_by)?;
        let grouping = !query.group_by.is_empty() || !extracted.aggregates.is_empty();

        let mut plan = match &query.from {
            Some(from) => {
                let mut conjuncts = Vec::new();
                if let Some(where_expr) = &query.where_expr {
                    collect_conjuncts(where_expr, &mut conjuncts);
                }
                let (plan, residual) = self.plan_from(from, conjuncts)?;
                match make_predicate(residual) {
                    Some(predicate) => Self::prepared(plan.filter(Some(predicate)))?,
                    None => plan,
                }
            }
            None => {
                if grouping {
                    return Err(PlannerError::UnsupportedOperation(
                        "aggregates require a FROM clause".to_string(),
                    ));
                }
                let plan = Self::prepared(PlanTree::leaf_project(extracted.values.clone()))?;
                match &query.where_expr {
                    Some(predicate) => Self::prepared(plan.filter(Some(predicate.clone())))?,
                    None => plan,
                }
            }
        };

        if grouping {
            plan = Self::prepared(
                plan.group_aggregate(query.group_by.clone(), extracted.aggregates.clone()),
            )?;
        }
        if let Some(having) = extracted.having {
            plan = Self::prepared(plan.filter(Some(having)))?;
        }
        if let Some(from) = &query.from {
            let values = expand_wildcards(extracted.values, from);
            plan = Self::prepared(plan.project(values))?;
        }
        if !extracted.order_by.is_empty() {
            plan = Self::prepared(plan.sort(extracted.order_by))?;
        }
        if query.limit > 0 || query.offset > 0 {
            plan = Self::prepared(plan.limit_offset(query.limit, query.offset))?;
        }
        Ok(plan)
    }

    fn prepared(mut plan: PlanTree) -> PlannerResult<PlanTree> {
        plan.prepare()?;
        Ok(plan)
    }

    // ============ Join search ============

    /// Plan a FROM tree, applying whichever of `conjuncts` it can.
    ///
    /// Returns the join plan and the conjuncts it did not apply.
    fn plan_from(
        &self,
        from: &FromClause,
        mut conjuncts: Vec<Expr>,
    ) -> PlannerResult<(PlanTree, Vec<Expr>)> {
        let mut leaves = Vec::new();
        collect_leaves(from, &mut leaves, &mut conjuncts);
        let max = self.config.max_join_leaves.min(LeafSet::CAPACITY);
        if leaves.len() > max {
            return Err(PlannerError::TooManyLeaves {
                leaves: leaves.len(),
                max,
            });
        }

        let mut leaf_plans = Vec::with_capacity(leaves.len());
        for leaf in &leaves {
            let mut plan = self.leaf_plan(leaf)?;
            plan.prepare()?;
            leaf_plans.push(plan);
        }
        let schemas = leaf_plans
            .iter()
            .map(plan_schema)
            .collect::<PlannerResult<Vec<_>>>()?;
        let schema_refs: Vec<&Schema> = schemas.iter().collect();
        for conjunct in &conjuncts {
            check_references(conjunct, &schema_refs)?;
        }

        let mut pushed = BTreeSet::new();
        let mut leaf_components = Vec::with_capacity(leaves.len());
        for (i, (plan, schema)) in leaf_plans.into_iter().zip(&schemas).enumerate() {
            let component = Self::leaf_component(i, plan, schema, &conjuncts, &mut pushed)?;
            leaf_components.push(component);
        }

        let mut table: BTreeMap<LeafSet, JoinComponent> = BTreeMap::new();
        for component in &leaf_components {
            table.insert(component.leaves, component.duplicate());
        }

        for round in 1..leaves.len() {
            let mut next: BTreeMap<LeafSet, JoinComponent> = BTreeMap::new();
            for component in table.values() {
                for (index, leaf) in leaf_components.iter().enumerate() {
                    if component.leaves.contains(index) {
                        continue;
                    }
                    let candidate = self.join_candidate(component, leaf, &conjuncts)?;
                    trace!(
                        leaves = %candidate.leaves,
                        cpu_cost = candidate.cpu_cost(),
                        plan = %candidate.plan,
                        "join candidate"
                    );
                    match next.entry(candidate.leaves) {
                        Entry::Vacant(slot) => {
                            slot.insert(candidate);
                        }
                        Entry::Occupied(mut slot) => {
                            // Ties keep the first candidate found
                            if candidate.cpu_cost() < slot.get().cpu_cost() {
                                slot.insert(candidate);
                            }
                        }
                    }
                }
            }
            debug!(round, entries = next.len(), "join search round");
            table = next;
        }

        if table.len() != 1 {
            return Err(PlannerError::Internal(format!(
                "join search ended with {} entries",
                table.len()
            )));
        }
        let Some((_, best)) = table.into_iter().next() else {
            return Err(PlannerError::Internal("join search produced no plan".to_string()));
        };

        if self.config.log_plans {
            info!(
                leaves = leaves.len(),
                cpu_cost = best.cpu_cost(),
                plan = %best.plan,
                "chosen join plan"
            );
        }

        let residual = conjuncts
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !best.used.contains(i))
            .map(|(_, c)| c)
            .collect();
        Ok((best.plan, residual))
    }

    /// Push the conjuncts that only need one leaf's columns onto its plan
    fn leaf_component(
        index: usize,
        mut plan: PlanTree,
        schema: &Schema,
        conjuncts: &[Expr],
        pushed: &mut BTreeSet<usize>,
    ) -> PlannerResult<JoinComponent> {
        let mut used = BTreeSet::new();
        for i in find_exprs_using_schemas(conjuncts, &[schema]) {
            if pushed.insert(i) {
                plan = plan.with_predicate(conjuncts[i].clone());
                used.insert(i);
            }
        }
        plan.prepare()?;

        debug!(
            leaf = index,
            pushed = used.len(),
            cost = %plan.cost().copied().unwrap_or_default(),
            "leaf plan"
        );
        Ok(JoinComponent {
            plan,
            leaves: LeafSet::single(index),
            used,
        })
    }

    fn leaf_plan(&self, leaf: &FromClause) -> PlannerResult<PlanTree> {
        match leaf {
            FromClause::BaseTable { table, alias } => {
                let file = self.tables.open_table(table)?;
                let plan = PlanTree::file_scan(Arc::clone(&file), None);
                Ok(match alias {
                    Some(alias) => plan.rename(alias.clone()),
                    None => plan,
                })
            }
            FromClause::Derived { query, alias } => {
                Ok(self.make_plan(query)?.rename(alias.clone()))
            }
            FromClause::Join {
                left,
                right,
                join_type,
                condition,
            } => {
                let left = self.plan_operand(left)?;
                let right = self.plan_operand(right)?;
                let predicate = match condition {
                    JoinCondition::On(expr) => Some(expr.clone()),
                    JoinCondition::None => None,
                };

                let mut plan = match join_type {
                    JoinType::LeftOuter => self.outer_join(left, right, predicate),
                    JoinType::RightOuter => {
                        let mut plan = self.outer_join(left, right, predicate);
                        let root = plan.root();
                        plan.swap(root)?;
                        plan
                    }
                    other => {
                        return Err(PlannerError::UnsupportedOperation(format!(
                            "{} JOIN",
                            other
                        )))
                    }
                };
                plan.ensure_marking();
                Ok(plan)
            }
        }
    }

    /// Plan one side of an outer join as a query of its own
    fn plan_operand(&self, from: &FromClause) -> PlannerResult<PlanTree> {
        let (plan, residual) = self.plan_from(from, Vec::new())?;
        match make_predicate(residual) {
            Some(predicate) => Self::prepared(plan.filter(Some(predicate))),
            None => Ok(plan),
        }
    }

    fn outer_join(&self, left: PlanTree, right: PlanTree, predicate: Option<Expr>) -> PlanTree {
        let join =
            NestedLoopJoin::new(JoinType::LeftOuter, predicate).with_rewind(self.config.join_rewind);
        PlanTree::join(left, right, join)
    }

    /// Join `left` with the single-leaf component `right`
    fn join_candidate(
        &self,
        left: &JoinComponent,
        right: &JoinComponent,
        conjuncts: &[Expr],
    ) -> PlannerResult<JoinComponent> {
        let left_schema = plan_schema(&left.plan)?;
        let right_schema = plan_schema(&right.plan)?;

        let mut used: BTreeSet<usize> = left.used.union(&right.used).copied().collect();
        let mut terms = Vec::new();
        for i in find_exprs_using_schemas(conjuncts, &[&left_schema, &right_schema]) {
            if used.insert(i) {
                terms.push(conjuncts[i].clone());
            }
        }
        let predicate = make_predicate(terms);
        let join_type = if predicate.is_some() {
            JoinType::Inner
        } else {
            JoinType::Cross
        };

        let join = NestedLoopJoin::new(join_type, predicate).with_rewind(self.config.join_rewind);
        let mut plan = PlanTree::join(left.plan.duplicate(), right.plan.duplicate(), join);
        plan.ensure_marking();
        plan.prepare()?;

        Ok(JoinComponent {
            plan,
            leaves: left.leaves.union(right.leaves),
            used,
        })
    }
}

impl Planner for CostBasedJoinPlanner<'_> {
    fn make_plan(&self, query: &SelectClause) -> PlannerResult<PlanTree> {
        self.plan_select(query)
    }
}

/// Flatten inner and cross joins into leaves, collecting their ON
/// conjuncts. Outer joins stay whole since their operands cannot move.
fn collect_leaves<'q>(
    from: &'q FromClause,
    leaves: &mut Vec<&'q FromClause>,
    conjuncts: &mut Vec<Expr>,
) {
    if from.is_join_leaf() {
        leaves.push(from);
        return;
    }
    if let FromClause::Join {
        left,
        right,
        condition,
        ..
    } = from
    {
        collect_leaves(left, leaves, conjuncts);
        collect_leaves(right, leaves, conjuncts);
        if let JoinCondition::On(expr) = condition {
            collect_conjuncts(expr, conjuncts);
        }
    }
}

/// Table names a FROM tree exposes, in FROM order
fn exposed_tables(from: &FromClause, out: &mut Vec<String>) {
    match from {
        FromClause::BaseTable { table, alias } => {
            out.push(alias.clone().unwrap_or_else(|| table.clone()))
        }
        FromClause::Derived { alias, .. } => out.push(alias.clone()),
        FromClause::Join { left, right, .. } => {
            exposed_tables(left, out);
            exposed_tables(right, out);
        }
    }
}

/// Spell out `*` as one `table.*` per FROM table so the output columns
/// follow FROM order whatever join order was chosen
fn expand_wildcards(values: Vec<SelectValue>, from: &FromClause) -> Vec<SelectValue> {
    if !matches!(from, FromClause::Join { .. }) {
        return values;
    }
    let mut tables = Vec::new();
    exposed_tables(from, &mut tables);

    let mut out = Vec::with_capacity(values.len());
    for value in values {
        match value {
            SelectValue::Wildcard(name) if !name.is_table_specified() => {
                out.extend(
                    tables
                        .iter()
                        .map(|t| SelectValue::Wildcard(ColumnName::table_wildcard(t.clone()))),
                );
            }
            other => out.push(other),
        }
    }
    out
}

/// Every column a conjunct names must belong to exactly one join leaf
fn check_references(conjunct: &Expr, schemas: &[&Schema]) -> PlannerResult<()> {
    for symbol in conjunct.symbols() {
        if symbol.is_wildcard() {
            continue;
        }
        let ambiguous = || ExecutorError::AmbiguousColumn(symbol.to_string());
        let mut owners = 0;
        for schema in schemas {
            match schema.column_index(&symbol) {
                Ok(Some(_)) => owners += 1,
                Ok(None) => {}
                Err(_) => return Err(ambiguous().into()),
            }
        }
        match owners {
            1 => {}
            0 => return Err(ExecutorError::ColumnNotFound(symbol.to_string()).into()),
            _ => return Err(ambiguous().into()),
        }
    }
    Ok(())
}

fn plan_schema(plan: &PlanTree) -> PlannerResult<Schema> {
    plan.schema()
        .cloned()
        .ok_or_else(|| PlannerError::Internal(format!("plan not prepared: {}", plan)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnDef, DataType, TableDef};
    use crate::executor::{Datum, NodeKind, Tuple};
    use crate::sql::{BinaryOp, OrderByExpr};
    use crate::storage::MemoryStorage;
    use crate::tuple;

    fn storage() -> MemoryStorage {
        let storage = MemoryStorage::new();
        let r = TableDef::new("r")
            .column(ColumnDef::new("a", DataType::Int))
            .column(ColumnDef::new("b", DataType::Text));
        storage
            .load_table(
                &r,
                vec![tuple![1, "x"], tuple![2, "y"], tuple![3, "z"]],
            )
            .unwrap();
        let s = TableDef::new("s")
            .column(ColumnDef::new("a", DataType::Int))
            .column(ColumnDef::new("c", DataType::Text));
        storage
            .load_table(&s, vec![tuple![1, "p"], tuple![2, "q"]])
            .unwrap();
        storage
    }

    fn run(plan: &mut PlanTree) -> Vec<Tuple> {
        plan.initialize().unwrap();
        let mut out = Vec::new();
        while let Some(t) = plan.next_tuple().unwrap() {
            out.push(t);
        }
        out
    }

    fn r_join_s() -> SelectClause {
        SelectClause {
            from: Some(FromClause::join(
                FromClause::table("r"),
                FromClause::table("s"),
                JoinType::Inner,
                Some(Expr::eq(Expr::qualified("r", "a"), Expr::qualified("s", "a"))),
            )),
            ..SelectClause::select_all()
        }
    }

    #[test]
    fn test_inner_join_rows() {
        let storage = storage();
        let planner = CostBasedJoinPlanner::new(&storage);
        let mut plan = planner.make_plan(&r_join_s()).unwrap();
        let mut rows = run(&mut plan);
        rows.sort_by(|x, y| x.values().cmp(y.values()));
        assert_eq!(
            rows,
            vec![tuple![1, "x", 1, "p"], tuple![2, "y", 2, "q"]]
        );
    }

    #[test]
    fn test_where_pushdown() {
        let storage = storage();
        let planner = CostBasedJoinPlanner::new(&storage);
        let mut query = r_join_s();
        query.where_expr = Some(Expr::binary(
            Expr::qualified("r", "b"),
            BinaryOp::Eq,
            Expr::literal("y"),
        ));
        let mut plan = planner.make_plan(&query).unwrap();

        let scan_r = plan
            .nodes()
            .iter()
            .find(|n| n.operator().to_string().starts_with("FileScan: r"))
            .unwrap();
        assert!(scan_r.operator().to_string().contains("filter="));
        assert_eq!(run(&mut plan), vec![tuple![2, "y", 2, "q"]]);
    }

    #[test]
    fn test_group_by_validation() {
        let storage = storage();
        let planner = CostBasedJoinPlanner::new(&storage);
        let query = SelectClause {
            values: vec![SelectValue::expr(Expr::count_star())],
            from: Some(FromClause::table("r")),
            group_by: vec![Expr::function("UPPER", vec![Expr::column("b")])],
            ..Default::default()
        };
        assert!(matches!(
            planner.make_plan(&query),
            Err(PlannerError::InvalidGroupBy(_))
        ));
    }

    #[test]
    fn test_no_from_clause() {
        let storage = storage();
        let planner = CostBasedJoinPlanner::new(&storage);
        let query = SelectClause {
            values: vec![SelectValue::aliased(
                Expr::binary(Expr::literal(1), BinaryOp::Add, Expr::literal(2)),
                "three",
            )],
            ..Default::default()
        };
        let mut plan = planner.make_plan(&query).unwrap();
        assert_eq!(plan.kind(), NodeKind::Project);
        assert_eq!(run(&mut plan), vec![Tuple::new(vec![Datum::Int(3)])]);

        let query = SelectClause {
            values: vec![SelectValue::expr(Expr::count_star())],
            ..Default::default()
        };
        assert!(matches!(
            planner.make_plan(&query),
            Err(PlannerError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_too_many_leaves() {
        let storage = storage();
        let config = PlannerConfig {
            max_join_leaves: 1,
            ..PlannerConfig::default()
        };
        let planner = CostBasedJoinPlanner::with_config(&storage, config);
        assert!(matches!(
            planner.make_plan(&r_join_s()),
            Err(PlannerError::TooManyLeaves { leaves: 2, max: 1 })
        ));
    }

    #[test]
    fn test_leaf_cap_ignores_larger_config() {
        let storage = storage();
        let config = PlannerConfig {
            max_join_leaves: 100,
            ..PlannerConfig::default()
        };
        let planner = CostBasedJoinPlanner::with_config(&storage, config);
        let from = (1..65).fold(FromClause::table("t0"), |from, i| {
            FromClause::join(from, FromClause::table(&format!("t{i}")), JoinType::Cross, None)
        });
        let query = SelectClause {
            from: Some(from),
            ..SelectClause::select_all()
        };
        assert!(matches!(
            planner.make_plan(&query),
            Err(PlannerError::TooManyLeaves { leaves: 65, max: 64 })
        ));
    }

    #[test]
    fn test_unqualified_column_shared_by_leaves() {
        let storage = storage();
        let planner = CostBasedJoinPlanner::new(&storage);
        let query = SelectClause {
            where_expr: Some(Expr::eq(Expr::column("a"), Expr::literal(1))),
            ..r_join_s()
        };
        assert!(matches!(
            planner.make_plan(&query),
            Err(PlannerError::Executor(ExecutorError::AmbiguousColumn(name))) if name == "a"
        ));

        let query = SelectClause {
            where_expr: Some(Expr::eq(Expr::column("nope"), Expr::literal(1))),
            ..r_join_s()
        };
        assert!(matches!(
            planner.make_plan(&query),
            Err(PlannerError::Executor(ExecutorError::ColumnNotFound(_)))
        ));

        // qualified and single-owner names still push down
        let query = SelectClause {
            where_expr: Some(Expr::eq(Expr::column("c"), Expr::literal("q"))),
            ..r_join_s()
        };
        let mut plan = planner.make_plan(&query).unwrap();
        assert_eq!(run(&mut plan), vec![tuple![2, "y", 2, "q"]]);
    }

    #[test]
    fn test_order_and_limit() {
        let storage = storage();
        let planner = CostBasedJoinPlanner::new(&storage);
        let query = SelectClause {
            values: vec![SelectValue::expr(Expr::column("a"))],
            from: Some(FromClause::table("r")),
            order_by: vec![OrderByExpr::desc(Expr::column("a"))],
            limit: 2,
            ..Default::default()
        };
        let mut plan = planner.make_plan(&query).unwrap();
        assert_eq!(plan.kind(), NodeKind::LimitOffset);
        assert_eq!(run(&mut plan), vec![tuple![3], tuple![2]]);
    }

    #[test]
    fn test_missing_table() {
        let storage = storage();
        let planner = CostBasedJoinPlanner::new(&storage);
        assert!(matches!(
            planner.make_simple_select("nope", None),
            Err(PlannerError::Storage(_))
        ));
    }
}
