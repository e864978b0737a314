//! Evaluation environments
//!
//! An [`Environment`] binds one or more schemas to the tuples currently
//! being evaluated. Operators build a fresh one for every evaluation; it
//! only borrows the schema and tuple, so nothing carries over between
//! tuples.

use crate::catalog::{ColumnName, Schema};

use super::datum::Datum;
use super::error::{ExecutorError, ExecutorResult};
use super::tuple::Tuple;

#[derive(Debug, Clone, Default)]
pub struct Environment<'a> {
    bindings: Vec<(&'a Schema, &'a Tuple)>,
}

impl<'a> Environment<'a> {
    /// Environment with nothing bound (leaf projections, constants)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Environment binding a single schema to a tuple
    pub fn new(schema: &'a Schema, tuple: &'a Tuple) -> Self {
        Self {
            bindings: vec![(schema, tuple)],
        }
    }

    /// Add another (schema, tuple) binding
    #[must_use]
    pub fn bind(mut self, schema: &'a Schema, tuple: &'a Tuple) -> Self {
        self.bindings.push((schema, tuple));
        self
    }

    /// Value of the column `name` refers to.
    ///
    /// Fails if the name resolves to nothing or to more than one column
    /// across all bindings.
    pub fn column_value(&self, name: &ColumnName) -> ExecutorResult<&'a Datum> {
        let mut found: Option<&'a Datum> = None;
        for &(schema, tuple) in &self.bindings {
            let index = schema
                .column_index(name)
                .map_err(|_| ExecutorError::AmbiguousColumn(name.to_string()))?;
            if let Some(index) = index {
                if found.is_some() {
                    return Err(ExecutorError::AmbiguousColumn(name.to_string()));
                }
                found = Some(tuple.get(index)?);
            }
        }
        found.ok_or_else(|| ExecutorError::ColumnNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnInfo, DataType};
    use crate::tuple;

    fn schema(table: &str, cols: &[&str]) -> Schema {
        Schema::from_columns(
            cols.iter()
                .map(|c| ColumnInfo::new(*c, Some(table.to_string()), DataType::Int)),
        )
        .unwrap()
    }

    #[test]
    fn test_env_single_binding() {
        let s = schema("r", &["a", "b"]);
        let t = tuple![1, 2];
        let env = Environment::new(&s, &t);
        assert_eq!(env.column_value(&ColumnName::column("b")).unwrap(), &Datum::Int(2));
        assert_eq!(
            env.column_value(&ColumnName::qualified("r", "a")).unwrap(),
            &Datum::Int(1)
        );
        assert!(matches!(
            env.column_value(&ColumnName::column("z")),
            Err(ExecutorError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_env_two_bindings() {
        let r = schema("r", &["a", "b"]);
        let s = schema("s", &["a", "c"]);
        let rt = tuple![1, 2];
        let st = tuple![3, 4];
        let env = Environment::new(&r, &rt).bind(&s, &st);

        assert_eq!(
            env.column_value(&ColumnName::qualified("s", "a")).unwrap(),
            &Datum::Int(3)
        );
        assert_eq!(env.column_value(&ColumnName::column("c")).unwrap(), &Datum::Int(4));
        assert!(matches!(
            env.column_value(&ColumnName::column("a")),
            Err(ExecutorError::AmbiguousColumn(_))
        ));
    }

    #[test]
    fn test_empty_env() {
        let env = Environment::empty();
        assert!(env.column_value(&ColumnName::column("a")).is_err());
    }
}
