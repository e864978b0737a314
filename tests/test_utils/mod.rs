//! Shared test utilities
//!
//! Note: clippy reports false-positive dead_code warnings because it can't
//! trace usage across test binaries. These utilities are used by multiple tests.

#![allow(dead_code)]

use std::sync::Arc;

use quarry::catalog::{ColumnDef, DataType, TableDef};
use quarry::executor::{PlanTree, Tuple};
use quarry::storage::{MemoryStorage, TupleFile};
use quarry::tuple;

/// Install a tracing subscriber once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("quarry=debug"))
        .with_test_writer()
        .try_init();
}

/// Load a table into `storage`
pub fn load(
    storage: &MemoryStorage,
    name: &str,
    columns: &[(&str, DataType)],
    rows: Vec<Tuple>,
) -> Arc<dyn TupleFile> {
    let mut def = TableDef::new(name);
    for (column, data_type) in columns {
        def = def.column(ColumnDef::new(*column, data_type.clone()));
    }
    storage.load_table(&def, rows).unwrap()
}

/// R(a, b) = (1,'x'), (2,'y'), (3,'z') and S(a, c) = (1,'p'), (2,'q')
pub fn r_and_s() -> MemoryStorage {
    let storage = MemoryStorage::new();
    load(
        &storage,
        "r",
        &[("a", DataType::Int), ("b", DataType::Text)],
        vec![tuple![1, "x"], tuple![2, "y"], tuple![3, "z"]],
    );
    load(
        &storage,
        "s",
        &[("a", DataType::Int), ("c", DataType::Text)],
        vec![tuple![1, "p"], tuple![2, "q"]],
    );
    storage
}

/// Table `name` with one integer column `v` holding `values`
pub fn int_column(storage: &MemoryStorage, name: &str, values: &[i64]) -> Arc<dyn TupleFile> {
    load(
        storage,
        name,
        &[("v", DataType::Int)],
        values.iter().map(|v| tuple![*v]).collect(),
    )
}

/// Prepare, initialize and drain a plan
pub fn drain(plan: &mut PlanTree) -> Vec<Tuple> {
    plan.prepare().unwrap();
    plan.initialize().unwrap();
    let mut out = Vec::new();
    while let Some(t) = plan.next_tuple().unwrap() {
        out.push(t);
    }
    out
}

/// Rows in a stable order for set comparisons
pub fn sorted(mut rows: Vec<Tuple>) -> Vec<Tuple> {
    rows.sort_by(|a, b| a.values().cmp(b.values()));
    rows
}

pub fn ints(tuples: &[Tuple]) -> Vec<Vec<i64>> {
    tuples
        .iter()
        .map(|t| t.iter().map(|d| d.as_int().unwrap_or(i64::MIN)).collect())
        .collect()
}
