//! Rename executor
//!
//! Requalifies every column of its input under a new table name, as for a
//! derived table or an aliased base table. Tuples pass through untouched.

use std::fmt;

use super::error::ExecutorResult;
use super::node::{Inputs, Prepared};
use super::tuple::Tuple;
use super::{Executor, MarkingSupport};

#[derive(Debug)]
pub struct Rename {
    table: String,
}

impl Rename {
    pub fn new(table: impl Into<String>) -> Self {
        Rename {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn equivalent(&self, other: &Rename) -> bool {
        self.table == other.table
    }
}

impl fmt::Display for Rename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rename: {}", self.table)
    }
}

impl Executor for Rename {
    fn prepare(&mut self, inputs: &Inputs<'_>) -> ExecutorResult<Prepared> {
        let child = inputs.left()?;
        Ok(Prepared {
            schema: child.schema.with_table_name(&self.table)?,
            cost: child.cost,
            stats: child.stats.clone(),
        })
    }

    fn initialize(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        inputs.initialize_left()
    }

    fn next(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<Option<Tuple>> {
        inputs.next_left()
    }

    fn supports_marking(&self, children: MarkingSupport) -> bool {
        children.left
    }

    fn mark_current_position(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        inputs.mark_left()
    }

    fn reset_to_last_mark(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        inputs.reset_left()
    }

    fn duplicate(&self) -> Self {
        Rename::new(self.table.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnName, SchemaError};
    use crate::executor::test_util::{collect, int_table, ints, scan};
    use crate::executor::ExecutorError;
    use crate::sql::{Expr, JoinType, SelectValue};
    use crate::executor::PlanTree;
    use crate::tuple;

    #[test]
    fn test_rename_requalifies() {
        let file = int_table("t", &["a", "b"], vec![tuple![1, 2]]);
        let mut plan = scan(&file).rename("x");
        assert_eq!(ints(&collect(&mut plan)), vec![vec![1, 2]]);
        let schema = plan.schema().unwrap();
        assert_eq!(schema.column_index(&ColumnName::qualified("x", "a")).unwrap(), Some(0));
        assert_eq!(schema.column_index(&ColumnName::qualified("t", "a")).unwrap(), None);
    }

    #[test]
    fn test_rename_self_join() {
        let file = int_table("t", &["a"], vec![tuple![1], tuple![2]]);
        let mut plan = PlanTree::nested_loop_join(
            scan(&file).rename("l"),
            scan(&file).rename("r"),
            JoinType::Inner,
            Some(Expr::eq(Expr::qualified("l", "a"), Expr::qualified("r", "a"))),
        )
        .project(vec![SelectValue::expr(Expr::qualified("r", "a"))]);
        assert_eq!(ints(&collect(&mut plan)), vec![vec![1], vec![2]]);
    }

    #[test]
    fn test_rename_ambiguous() {
        let l = int_table("l", &["a"], vec![]);
        let r = int_table("r", &["a"], vec![]);
        let mut plan =
            PlanTree::nested_loop_join(scan(&l), scan(&r), JoinType::Cross, None).rename("x");
        assert!(matches!(
            plan.prepare(),
            Err(ExecutorError::Schema(SchemaError::AmbiguousRename { .. }))
        ));
    }
}
