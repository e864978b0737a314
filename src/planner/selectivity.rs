//! Predicate selectivity estimation
//!
//! Estimates the fraction of input tuples a predicate passes, using the
//! column statistics of the schema the predicate is evaluated against.

use crate::catalog::{ColumnStats, Schema};
use crate::executor::Datum;
use crate::sql::{BinaryOp, ColumnName, Expr, UnaryOp};

/// Selectivity estimator
pub struct SelectivityEstimator;

impl SelectivityEstimator {
    /// Used whenever statistics cannot say anything better
    pub const DEFAULT_SELECTIVITY: f32 = 0.25;

    /// Estimate the selectivity of an optional predicate; no predicate
    /// passes everything.
    pub fn estimate(expr: Option<&Expr>, schema: &Schema, stats: &[ColumnStats]) -> f32 {
        match expr {
            None => 1.0,
            Some(e) => Self::estimate_expr(e, schema, stats).clamp(0.0, 1.0),
        }
    }

    fn estimate_expr(expr: &Expr, schema: &Schema, stats: &[ColumnStats]) -> f32 {
        match expr {
            Expr::And(terms) => terms
                .iter()
                .map(|t| Self::estimate_expr(t, schema, stats))
                .product(),
            Expr::Or(terms) => {
                1.0 - terms
                    .iter()
                    .map(|t| 1.0 - Self::estimate_expr(t, schema, stats))
                    .product::<f32>()
            }
            Expr::UnaryOp {
                op: UnaryOp::Not,
                expr,
            } => 1.0 - Self::estimate_expr(expr, schema, stats),
            Expr::Literal(Datum::Bool(b)) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Expr::BinaryOp { left, op, right } if op.is_comparison() => {
                match (left.as_ref(), right.as_ref()) {
                    (Expr::Column(col), Expr::Literal(value)) => {
                        Self::compare_column_value(col, *op, value, schema, stats)
                    }
                    (Expr::Literal(value), Expr::Column(col)) => match op.flipped() {
                        Some(flipped) => {
                            Self::compare_column_value(col, flipped, value, schema, stats)
                        }
                        None => Self::DEFAULT_SELECTIVITY,
                    },
                    (Expr::Column(a), Expr::Column(b)) => {
                        Self::compare_columns(a, *op, b, schema, stats)
                    }
                    _ => Self::DEFAULT_SELECTIVITY,
                }
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let sel = match (expr.as_ref(), low.as_ref(), high.as_ref()) {
                    (Expr::Column(col), Expr::Literal(lo), Expr::Literal(hi)) => {
                        Self::column_stats(col, schema, stats)
                            .and_then(|cs| Self::range_fraction(cs, schema, col, lo, hi))
                            .unwrap_or(Self::DEFAULT_SELECTIVITY)
                    }
                    _ => Self::DEFAULT_SELECTIVITY,
                };
                if *negated {
                    1.0 - sel
                } else {
                    sel
                }
            }
            _ => Self::DEFAULT_SELECTIVITY,
        }
    }

    fn column_stats<'a>(
        col: &ColumnName,
        schema: &Schema,
        stats: &'a [ColumnStats],
    ) -> Option<&'a ColumnStats> {
        let index = schema.column_index(col).ok()??;
        stats.get(index)
    }

    fn supports_range(col: &ColumnName, schema: &Schema) -> bool {
        schema
            .column_index(col)
            .ok()
            .flatten()
            .and_then(|i| schema.column(i))
            .is_some_and(|c| c.data_type.supports_range_estimates())
    }

    /// `col <op> value`
    fn compare_column_value(
        col: &ColumnName,
        op: BinaryOp,
        value: &Datum,
        schema: &Schema,
        stats: &[ColumnStats],
    ) -> f32 {
        let Some(cs) = Self::column_stats(col, schema, stats) else {
            return Self::DEFAULT_SELECTIVITY;
        };

        match op {
            BinaryOp::Eq | BinaryOp::NotEq => {
                let eq = match cs.unique_values {
                    Some(0) => 0.0,
                    Some(n) => 1.0 / n as f32,
                    None => Self::DEFAULT_SELECTIVITY,
                };
                if op == BinaryOp::Eq {
                    eq
                } else {
                    1.0 - eq
                }
            }
            BinaryOp::Gt | BinaryOp::GtEq | BinaryOp::Lt | BinaryOp::LtEq => {
                if !Self::supports_range(col, schema) || !cs.has_different_min_max() {
                    return Self::DEFAULT_SELECTIVITY;
                }
                let (Some(min), Some(max), Some(v)) = (
                    cs.min_value.as_ref().and_then(Datum::as_float),
                    cs.max_value.as_ref().and_then(Datum::as_float),
                    value.as_float(),
                ) else {
                    return Self::DEFAULT_SELECTIVITY;
                };
                match op {
                    BinaryOp::Gt | BinaryOp::GtEq => compute_ratio(v, max, min, max),
                    _ => compute_ratio(min, v, min, max),
                }
            }
            _ => Self::DEFAULT_SELECTIVITY,
        }
    }

    /// `colA <op> colB`; only equality has a better-than-default estimate
    fn compare_columns(
        a: &ColumnName,
        op: BinaryOp,
        b: &ColumnName,
        schema: &Schema,
        stats: &[ColumnStats],
    ) -> f32 {
        if op != BinaryOp::Eq {
            return Self::DEFAULT_SELECTIVITY;
        }
        let unique = |c| Self::column_stats(c, schema, stats).and_then(|s| s.unique_values);
        match (unique(a), unique(b)) {
            (Some(ua), Some(ub)) => {
                let max = ua.max(ub);
                if max == 0 {
                    0.0
                } else {
                    1.0 / max as f32
                }
            }
            _ => Self::DEFAULT_SELECTIVITY,
        }
    }

    fn range_fraction(
        cs: &ColumnStats,
        schema: &Schema,
        col: &ColumnName,
        lo: &Datum,
        hi: &Datum,
    ) -> Option<f32> {
        if !Self::supports_range(col, schema) || !cs.has_different_min_max() {
            return None;
        }
        let min = cs.min_value.as_ref()?.as_float()?;
        let max = cs.max_value.as_ref()?.as_float()?;
        let lo = lo.as_float()?.max(min);
        let hi = hi.as_float()?.min(max);
        Some(compute_ratio(lo, hi, min, max))
    }
}

/// (high - low) / (max - min), clamped to [0, 1]
fn compute_ratio(low: f64, high: f64, min: f64, max: f64) -> f32 {
    if max <= min {
        return SelectivityEstimator::DEFAULT_SELECTIVITY;
    }
    (((high - low) / (max - min)) as f32).clamp(0.0, 1.0)
}
