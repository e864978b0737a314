//! Aggregate extraction
//!
//! Pulls aggregate calls out of the SELECT list, HAVING and ORDER BY so a
//! single grouping node can compute them. Each call becomes a generated
//! column `#AGG<n>` and the expressions above the grouping node refer to
//! that column instead.

use crate::catalog::ColumnName;
use crate::executor::{AggregateCall, AggregateFunction};
use crate::sql::{Expr, OrderByExpr, SelectValue};

use super::error::{PlannerError, PlannerResult};

/// Prefix of generated aggregate column names
pub const AGGREGATE_COLUMN_PREFIX: &str = "#AGG";

/// Query clauses with aggregate calls replaced by column references
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedAggregates {
    pub values: Vec<SelectValue>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    /// Generated column name and the call computing it
    pub aggregates: Vec<(String, AggregateCall)>,
}

/// Collects and deduplicates aggregate calls
#[derive(Debug, Default)]
pub struct AggregateExtractor {
    calls: Vec<(String, AggregateCall)>,
}

impl AggregateExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite the clauses of one query block
    pub fn extract(
        values: &[SelectValue],
        having: Option<&Expr>,
        order_by: &[OrderByExpr],
    ) -> PlannerResult<ExtractedAggregates> {
        let mut extractor = AggregateExtractor::new();

        let mut new_values = Vec::with_capacity(values.len());
        for value in values {
            new_values.push(match value {
                SelectValue::Wildcard(_) => value.clone(),
                SelectValue::Expr { expr, alias } => {
                    let rewritten = extractor.rewrite(expr)?;
                    // Keep the SQL text as the output name of aggregate items
                    let alias = match alias {
                        Some(a) => Some(a.clone()),
                        None if rewritten != *expr => Some(expr.to_string()),
                        None => None,
                    };
                    SelectValue::Expr {
                        expr: rewritten,
                        alias,
                    }
                }
            });
        }

        let having = having.map(|h| extractor.rewrite(h)).transpose()?;

        let mut new_order_by = Vec::with_capacity(order_by.len());
        for order in order_by {
            let expr = match output_reference(values, &order.expr) {
                Some(reference) => reference,
                None => extractor.rewrite(&order.expr)?,
            };
            new_order_by.push(OrderByExpr {
                expr,
                ascending: order.ascending,
            });
        }

        Ok(ExtractedAggregates {
            values: new_values,
            having,
            order_by: new_order_by,
            aggregates: extractor.calls,
        })
    }

    /// Replace every aggregate call in `expr` with its generated column
    pub fn rewrite(&mut self, expr: &Expr) -> PlannerResult<Expr> {
        expr.try_rewrite::<PlannerError>(&mut |e| match e {
            Expr::Function {
                name,
                args,
                distinct,
            } => match AggregateFunction::from_name(name) {
                Some(function) => {
                    let call = Self::make_call(name, function, args, *distinct)?;
                    Ok(Some(self.column_for(call)))
                }
                None => Ok(None),
            },
            _ => Ok(None),
        })
    }

    pub fn aggregates(&self) -> &[(String, AggregateCall)] {
        &self.calls
    }

    fn make_call(
        name: &str,
        function: AggregateFunction,
        args: &[Expr],
        distinct: bool,
    ) -> PlannerResult<AggregateCall> {
        let arg = match args {
            [arg] => arg,
            _ => {
                return Err(PlannerError::AggregateArity {
                    name: name.to_uppercase(),
                    got: args.len(),
                })
            }
        };
        if contains_aggregate(arg) {
            return Err(PlannerError::InvalidPlan(format!(
                "aggregate calls cannot be nested: {}",
                arg
            )));
        }

        let call = match (function, arg) {
            (AggregateFunction::Count, Expr::Column(col)) if col.is_wildcard() => {
                AggregateCall::count_star()
            }
            (_, Expr::Column(col)) if col.is_wildcard() => {
                return Err(PlannerError::InvalidPlan(format!(
                    "{}({}) is not allowed",
                    name.to_uppercase(),
                    col
                )))
            }
            _ => AggregateCall::new(function, arg.clone()),
        };
        Ok(if distinct { call.distinct() } else { call })
    }

    fn column_for(&mut self, call: AggregateCall) -> Expr {
        let name = match self.calls.iter().find(|(_, c)| *c == call) {
            Some((name, _)) => name.clone(),
            None => {
                let name = format!("{}{}", AGGREGATE_COLUMN_PREFIX, self.calls.len());
                self.calls.push((name.clone(), call));
                name
            }
        };
        Expr::Column(ColumnName::column(name))
    }
}

/// Whether `expr` calls an aggregate function anywhere
pub fn contains_aggregate(expr: &Expr) -> bool {
    match expr {
        Expr::Function { name, .. } if AggregateFunction::is_aggregate_name(name) => true,
        _ => expr.children().into_iter().any(contains_aggregate),
    }
}

/// Column reference to the select item computing `expr`, if any.
///
/// Plain column references are left alone since they survive projection
/// under their own name.
fn output_reference(values: &[SelectValue], expr: &Expr) -> Option<Expr> {
    if matches!(expr, Expr::Column(_)) {
        return None;
    }
    values.iter().find_map(|value| match value {
        SelectValue::Expr { expr: e, alias } if e == expr => {
            let name = alias.clone().unwrap_or_else(|| e.to_string());
            Some(Expr::Column(ColumnName::column(name)))
        }
        _ => None,
    })
}
