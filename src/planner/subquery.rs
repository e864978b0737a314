//! Uncorrelated subquery evaluation
//!
//! Scalar, `IN` and `EXISTS` subqueries are planned through the enclosing
//! [`Planner`], run once, and folded into literals before the outer block
//! is planned:
//!
//! - `(SELECT ...)` becomes the single value it produces
//! - `x IN (SELECT ...)` becomes `x IN (v1, v2, ...)`
//! - `EXISTS (SELECT ...)` becomes `TRUE` or `FALSE`
//!
//! A subquery naming a column of the enclosing block fails to plan, since
//! its own FROM clause cannot resolve the name.

use tracing::debug;

use crate::catalog::Schema;
use crate::executor::{execute_plan, CollectingSink, Datum};
use crate::sql::{Expr, FromClause, JoinCondition, SelectClause, SelectValue};

use super::error::{PlannerError, PlannerResult};
use super::join_planner::Planner;

/// Replaces the subqueries of a query block with their results
pub struct SubqueryPlanner<'p> {
    planner: &'p dyn Planner,
}

impl<'p> SubqueryPlanner<'p> {
    pub fn new(planner: &'p dyn Planner) -> Self {
        Self { planner }
    }

    /// Copy of `query` with the subqueries in its SELECT list, ON, WHERE
    /// and HAVING clauses resolved. Derived tables are left alone; they
    /// resolve their own subqueries when planned.
    pub fn resolve_query(&self, query: &SelectClause) -> PlannerResult<SelectClause> {
        if let Some(expr) = query.group_by.iter().find(|e| e.contains_subquery()) {
            return Err(PlannerError::InvalidPlan(format!(
                "subquery in GROUP BY: {}",
                expr
            )));
        }
        if let Some(order) = query.order_by.iter().find(|o| o.expr.contains_subquery()) {
            return Err(PlannerError::InvalidPlan(format!(
                "subquery in ORDER BY: {}",
                order.expr
            )));
        }

        let mut values = Vec::with_capacity(query.values.len());
        for value in &query.values {
            values.push(match value {
                SelectValue::Wildcard(_) => value.clone(),
                SelectValue::Expr { expr, alias } => {
                    let resolved = self.resolve(expr)?;
                    // Keep the SQL text as the output name
                    let alias = match alias {
                        Some(a) => Some(a.clone()),
                        None if resolved != *expr => Some(expr.to_string()),
                        None => None,
                    };
                    SelectValue::Expr {
                        expr: resolved,
                        alias,
                    }
                }
            });
        }

        Ok(SelectClause {
            values,
            from: query.from.as_ref().map(|f| self.resolve_from(f)).transpose()?,
            where_expr: query.where_expr.as_ref().map(|e| self.resolve(e)).transpose()?,
            having: query.having.as_ref().map(|e| self.resolve(e)).transpose()?,
            ..query.clone()
        })
    }

    /// Fold every subquery in `expr` into its result
    pub fn resolve(&self, expr: &Expr) -> PlannerResult<Expr> {
        expr.try_rewrite(&mut |e: &Expr| -> PlannerResult<Option<Expr>> {
            Ok(match e {
                Expr::Subquery(query) => Some(Expr::Literal(self.scalar(query)?)),
                Expr::InSubquery {
                    expr,
                    query,
                    negated,
                } => Some(Expr::InList {
                    expr: Box::new(self.resolve(expr)?),
                    list: self
                        .column_values(query, "IN")?
                        .into_iter()
                        .map(Expr::Literal)
                        .collect(),
                    negated: *negated,
                }),
                Expr::Exists(query) => Some(Expr::Literal(Datum::Bool(self.exists(query)?))),
                _ => None,
            })
        })
    }

    fn resolve_from(&self, from: &FromClause) -> PlannerResult<FromClause> {
        Ok(match from {
            FromClause::Join {
                left,
                right,
                join_type,
                condition,
            } => FromClause::Join {
                left: Box::new(self.resolve_from(left)?),
                right: Box::new(self.resolve_from(right)?),
                join_type: *join_type,
                condition: match condition {
                    JoinCondition::On(expr) => JoinCondition::On(self.resolve(expr)?),
                    JoinCondition::None => JoinCondition::None,
                },
            },
            other => other.clone(),
        })
    }

    /// The one value a scalar subquery produces
    fn scalar(&self, query: &SelectClause) -> PlannerResult<Datum> {
        let values = self.column_values(query, "scalar")?;
        match <[Datum; 1]>::try_from(values) {
            Ok([value]) => Ok(value),
            Err(values) => Err(PlannerError::SubqueryShape(format!(
                "scalar subquery must produce exactly one row (got {})",
                values.len()
            ))),
        }
    }

    /// Every value of a one-column subquery, in result order
    fn column_values(&self, query: &SelectClause, kind: &str) -> PlannerResult<Vec<Datum>> {
        let mut plan = self.planner.make_plan(query)?;
        let mut sink = CollectingSink::new();
        let stats = execute_plan(&mut plan, &mut sink)?;

        let width = sink.schema().map_or(0, Schema::len);
        if width != 1 {
            return Err(PlannerError::SubqueryShape(format!(
                "{} subquery must produce exactly one column (got {})",
                kind, width
            )));
        }
        debug!(kind, rows = stats.rows_produced, "subquery evaluated");
        Ok(sink
            .into_tuples()
            .into_iter()
            .filter_map(|t| t.into_values().into_iter().next())
            .collect())
    }

    /// Whether the subquery produces any row; stops at the first one
    fn exists(&self, query: &SelectClause) -> PlannerResult<bool> {
        let mut plan = self.planner.make_plan(query)?;
        let found = plan
            .initialize()
            .and_then(|()| plan.next_tuple())
            .map(|t| t.is_some());
        let cleaned = plan.clean_up();
        let found = found?;
        cleaned?;
        debug!(kind = "EXISTS", found, "subquery evaluated");
        Ok(found)
    }
}
