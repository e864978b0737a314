//! Predicate helpers used when splitting and re-assembling WHERE/ON clauses

use crate::catalog::Schema;

use super::ast::Expr;

/// Split `expr` into its top-level conjuncts, appending them to `out`.
///
/// Nested ANDs are flattened; OR and every other shape stay a single
/// opaque conjunct. Duplicates are dropped.
pub fn collect_conjuncts(expr: &Expr, out: &mut Vec<Expr>) {
    match expr {
        Expr::And(terms) => {
            for term in terms {
                collect_conjuncts(term, out);
            }
        }
        other => {
            if !out.contains(other) {
                out.push(other.clone());
            }
        }
    }
}

/// Combine conjuncts back into one predicate (`None` when empty).
pub fn make_predicate(mut conjuncts: Vec<Expr>) -> Option<Expr> {
    match conjuncts.len() {
        0 => None,
        1 => conjuncts.pop(),
        _ => Some(Expr::And(conjuncts)),
    }
}

/// Whether every column `expr` references resolves to exactly one column
/// of `schemas` taken together.
pub fn is_evaluable_with(expr: &Expr, schemas: &[&Schema]) -> bool {
    expr.symbols().iter().all(|symbol| {
        if symbol.is_wildcard() {
            return true;
        }
        let mut matches = 0;
        for schema in schemas {
            match schema.column_index(symbol) {
                Ok(Some(_)) => matches += 1,
                Ok(None) => {}
                Err(_) => return false,
            }
        }
        matches == 1
    })
}

/// Positions of the expressions in `exprs` that can be evaluated against
/// the columns of `schemas`.
pub fn find_exprs_using_schemas(exprs: &[Expr], schemas: &[&Schema]) -> Vec<usize> {
    exprs
        .iter()
        .enumerate()
        .filter(|(_, e)| is_evaluable_with(e, schemas))
        .map(|(i, _)| i)
        .collect()
}
