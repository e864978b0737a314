//! Query-shape layer
//!
//! This module provides:
//! - the expression tree shared by the planner and the operators
//! - the parsed SELECT / FROM-clause shapes the planner consumes
//! - predicate helpers for conjunct splitting and schema checks

pub mod ast;
pub mod predicate;

pub use crate::catalog::ColumnName;
pub use ast::*;
pub use predicate::{collect_conjuncts, find_exprs_using_schemas, is_evaluable_with, make_predicate};
