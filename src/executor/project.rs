//! Project executor
//!
//! Projects (transforms) tuples by expanding wildcards and evaluating
//! select-list expressions.

use std::fmt;

use crate::catalog::{ColumnInfo, ColumnStats, Schema};
use crate::planner::{CostEstimator, PlanCost};
use crate::sql::{Expr, SelectValue};

use super::env::Environment;
use super::error::{ExecutorError, ExecutorResult};
use super::node::{Inputs, Prepared};
use super::tuple::Tuple;
use super::{Executor, MarkingSupport};

/// Unique-value estimate for a computed column when the input size is
/// unknown
pub const GUESS_NUM_UNIQUE_VALUES: u64 = 100;

/// How one select item produces its output values
#[derive(Debug, Clone)]
enum ProjectItem {
    /// Copy input columns (wildcard or plain column reference)
    Columns(Vec<usize>),
    /// Evaluate an expression
    Expr(Expr),
}

/// Project executor
#[derive(Debug)]
pub struct Project {
    values: Vec<SelectValue>,
    /// No input: evaluate once and stop
    leaf: bool,
    /// Resolved during prepare()
    items: Vec<ProjectItem>,
    /// Single unqualified `*`: forward input tuples as they are
    trivial: bool,
    done: bool,
}

impl Project {
    pub fn new(values: Vec<SelectValue>) -> Self {
        Project {
            values,
            leaf: false,
            items: Vec::new(),
            trivial: false,
            done: false,
        }
    }

    /// Projection with no input
    pub fn leaf(values: Vec<SelectValue>) -> Self {
        Project {
            leaf: true,
            ..Self::new(values)
        }
    }

    pub fn values(&self) -> &[SelectValue] {
        &self.values
    }

    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    pub fn is_trivial(&self) -> bool {
        !self.leaf
            && matches!(self.values.as_slice(),
                [SelectValue::Wildcard(name)] if !name.is_table_specified())
    }

    pub fn equivalent(&self, other: &Project) -> bool {
        self.leaf == other.leaf && self.values == other.values
    }

    fn output_column(info: ColumnInfo, alias: &Option<String>) -> ColumnInfo {
        match alias {
            Some(alias) => ColumnInfo::new(alias.clone(), None, info.data_type),
            None => info,
        }
    }

    fn guessed_stats(input: Option<&PlanCost>) -> ColumnStats {
        let unique = match input {
            Some(cost) if cost.num_tuples > 0.0 => cost.num_tuples.round() as u64,
            _ => GUESS_NUM_UNIQUE_VALUES,
        };
        ColumnStats::unknown().with_unique_values(unique)
    }

    fn prepare_leaf(&mut self) -> ExecutorResult<Prepared> {
        let empty = Schema::new();
        let mut schema = Schema::new();
        let mut stats = Vec::new();
        self.items.clear();

        for value in &self.values {
            let SelectValue::Expr { expr, alias } = value else {
                continue;
            };
            if matches!(expr, Expr::Column(_)) {
                continue;
            }
            let info = Self::output_column(expr.column_info(&empty)?, alias);
            schema.add_column(info)?;
            stats.push(Self::guessed_stats(None));
            self.items.push(ProjectItem::Expr(expr.clone()));
        }

        let tuple_size = schema.iter().map(|c| c.data_type.estimated_width()).sum();
        Ok(Prepared {
            schema,
            cost: CostEstimator::leaf_project(tuple_size),
            stats,
        })
    }

    fn project_tuple(&self, env: &Environment<'_>, input: &Tuple) -> ExecutorResult<Tuple> {
        let mut out = Tuple::empty();
        for item in &self.items {
            match item {
                ProjectItem::Columns(indices) => {
                    for &i in indices {
                        out.push(input.get(i)?.clone());
                    }
                }
                ProjectItem::Expr(expr) => out.push(expr.evaluate(env)?),
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "Project: [{}]", items.join(", "))
    }
}

impl Executor for Project {
    fn prepare(&mut self, inputs: &Inputs<'_>) -> ExecutorResult<Prepared> {
        if self.leaf {
            return self.prepare_leaf();
        }

        let child = inputs.left()?;
        self.trivial = self.is_trivial();
        if self.trivial {
            self.items = vec![ProjectItem::Columns((0..child.schema.len()).collect())];
            return Ok(Prepared {
                schema: child.schema.clone(),
                cost: CostEstimator::project(&child.cost, child.cost.tuple_size),
                stats: child.stats.clone(),
            });
        }

        let mut schema = Schema::new();
        let mut stats = Vec::new();
        let mut items = Vec::with_capacity(self.values.len());
        let child_stats = |i: usize| child.stats.get(i).cloned().unwrap_or_default();

        for value in &self.values {
            match value {
                SelectValue::Wildcard(name) => {
                    let columns = child.schema.find_columns(name)?;
                    if columns.is_empty() {
                        return Err(ExecutorError::ColumnNotFound(name.to_string()));
                    }
                    for (i, info) in &columns {
                        schema.add_column(info.clone())?;
                        stats.push(child_stats(*i));
                    }
                    items.push(ProjectItem::Columns(columns.into_keys().collect()));
                }
                SelectValue::Expr {
                    expr: Expr::Column(name),
                    alias,
                } if !name.is_wildcard() => {
                    let index = child
                        .schema
                        .column_index(name)?
                        .ok_or_else(|| ExecutorError::ColumnNotFound(name.to_string()))?;
                    let info = child
                        .schema
                        .column(index)
                        .cloned()
                        .ok_or_else(|| ExecutorError::ColumnNotFound(name.to_string()))?;
                    schema.add_column(Self::output_column(info, alias))?;
                    stats.push(child_stats(index));
                    items.push(ProjectItem::Columns(vec![index]));
                }
                SelectValue::Expr { expr, alias } => {
                    let info = expr.column_info(&child.schema)?;
                    schema.add_column(Self::output_column(info, alias))?;
                    stats.push(Self::guessed_stats(Some(&child.cost)));
                    items.push(ProjectItem::Expr(expr.clone()));
                }
            }
        }

        self.items = items;
        let tuple_size = schema.iter().map(|c| c.data_type.estimated_width()).sum();
        Ok(Prepared {
            schema,
            cost: CostEstimator::project(&child.cost, tuple_size),
            stats,
        })
    }

    fn initialize(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        self.done = false;
        if self.leaf {
            return Ok(());
        }
        inputs.initialize_left()
    }

    fn next(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<Option<Tuple>> {
        if self.done {
            return Ok(None);
        }

        if self.leaf {
            self.done = true;
            let empty = Tuple::empty();
            return self.project_tuple(&Environment::empty(), &empty).map(Some);
        }

        let Some(tuple) = inputs.next_left()? else {
            self.done = true;
            return Ok(None);
        };
        if self.trivial {
            return Ok(Some(tuple));
        }

        let child = inputs.left()?;
        let env = Environment::new(&child.schema, &tuple);
        self.project_tuple(&env, &tuple).map(Some)
    }

    fn supports_marking(&self, children: MarkingSupport) -> bool {
        !self.leaf && children.left
    }

    fn mark_current_position(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        if self.leaf {
            return Err(ExecutorError::MarkingUnsupported(self.to_string()));
        }
        inputs.mark_left()
    }

    fn reset_to_last_mark(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        if self.leaf {
            return Err(ExecutorError::MarkingUnsupported(self.to_string()));
        }
        inputs.reset_left()?;
        self.done = false;
        Ok(())
    }

    fn clean_up(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        if self.leaf {
            return Ok(());
        }
        inputs.clean_up_children()
    }

    fn duplicate(&self) -> Self {
        Project {
            values: self.values.clone(),
            leaf: self.leaf,
            items: self.items.clone(),
            trivial: self.trivial,
            done: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;
    use crate::executor::test_util::{collect, int_table, ints, scan};
    use crate::executor::{Datum, PlanTree};
    use crate::sql::{BinaryOp, ColumnName};
    use crate::tuple;

    fn table() -> std::sync::Arc<dyn crate::storage::TupleFile> {
        int_table("t", &["a", "b"], vec![tuple![1, 10], tuple![2, 20]])
    }

    #[test]
    fn test_project_expressions() {
        let values = vec![
            SelectValue::expr(Expr::column("a")),
            SelectValue::aliased(
                Expr::binary(Expr::column("a"), BinaryOp::Add, Expr::column("b")),
                "sum",
            ),
        ];
        let mut plan = scan(&table()).project(values);
        let rows = collect(&mut plan);
        assert_eq!(ints(&rows), vec![vec![1, 11], vec![2, 22]]);

        let schema = plan.schema().unwrap();
        assert_eq!(schema.column(0).unwrap().table.as_deref(), Some("t"));
        let sum = schema.column(1).unwrap();
        assert_eq!(sum.name, "sum");
        assert_eq!(sum.table, None);
        assert_eq!(sum.data_type, DataType::BigInt);

        let stats = plan.stats().unwrap();
        assert_eq!(stats[0].unique_values, Some(2));
        assert_eq!(stats[1].unique_values, Some(2));
    }

    #[test]
    fn test_trivial_project_is_identity() {
        let file = table();
        let mut direct = scan(&file);
        let mut projected = scan(&file).project(vec![SelectValue::wildcard()]);
        assert_eq!(collect(&mut direct), collect(&mut projected));
        assert_eq!(direct.schema(), projected.schema());
        assert_eq!(direct.stats(), projected.stats());
    }

    #[test]
    fn test_table_wildcard_expands_in_order() {
        let mut plan = scan(&table()).project(vec![
            SelectValue::expr(Expr::column("b")),
            SelectValue::Wildcard(ColumnName::table_wildcard("t")),
        ]);
        assert_eq!(ints(&collect(&mut plan)), vec![vec![10, 1, 10], vec![20, 2, 20]]);
    }

    #[test]
    fn test_unknown_wildcard_table() {
        let mut plan =
            scan(&table()).project(vec![SelectValue::Wildcard(ColumnName::table_wildcard("x"))]);
        assert!(matches!(
            plan.prepare(),
            Err(ExecutorError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_leaf_project_emits_once() {
        let mut plan = PlanTree::leaf_project(vec![
            SelectValue::wildcard(),
            SelectValue::aliased(
                Expr::binary(Expr::literal(1), BinaryOp::Add, Expr::literal(2)),
                "three",
            ),
            SelectValue::expr(Expr::column("ignored")),
        ]);
        let rows = collect(&mut plan);
        assert_eq!(rows, vec![Tuple::new(vec![Datum::Int(3)])]);
        assert!(plan.next_tuple().unwrap().is_none());
        assert_eq!(plan.schema().unwrap().len(), 1);
        assert_eq!(plan.cost().unwrap().num_tuples, 1.0);
        assert!(!plan.supports_marking());
        assert!(plan.mark_current_position().is_err());
    }
}
