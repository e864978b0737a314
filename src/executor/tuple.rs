//! Tuple type - a fixed-arity sequence of datums

use std::fmt;
use std::hash::{Hash, Hasher};

use super::datum::Datum;
use super::error::{ExecutorError, ExecutorResult};

/// A tuple of datums, accessed by position.
///
/// Tuples always own their values, so operators may hold on to one past
/// the next pull without copying it out of storage first.
#[derive(Debug, Clone, Default)]
pub struct Tuple {
    values: Vec<Datum>,
}

impl Tuple {
    /// Create a new tuple with the given values
    pub fn new(values: Vec<Datum>) -> Self {
        Tuple { values }
    }

    /// Create an empty tuple
    pub fn empty() -> Self {
        Tuple { values: vec![] }
    }

    /// A tuple of `width` NULLs (outer-join padding)
    pub fn nulls(width: usize) -> Self {
        Tuple {
            values: vec![Datum::Null; width],
        }
    }

    /// Number of values in this tuple
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a datum by position
    pub fn get(&self, index: usize) -> ExecutorResult<&Datum> {
        self.values
            .get(index)
            .ok_or(ExecutorError::ColumnIndexOutOfBounds {
                index,
                row_len: self.values.len(),
            })
    }

    /// Get a datum by position, returns None if out of bounds
    pub fn get_opt(&self, index: usize) -> Option<&Datum> {
        self.values.get(index)
    }

    /// Push a datum to the end of the tuple
    pub fn push(&mut self, value: Datum) {
        self.values.push(value);
    }

    /// Get all values as a slice
    pub fn values(&self) -> &[Datum] {
        &self.values
    }

    /// Take ownership of values
    pub fn into_values(self) -> Vec<Datum> {
        self.values
    }

    /// Concatenate two tuples (for joins)
    pub fn concat(&self, other: &Tuple) -> Tuple {
        let mut values = Vec::with_capacity(self.len() + other.len());
        values.extend_from_slice(&self.values);
        values.extend_from_slice(&other.values);
        Tuple { values }
    }

    /// Project specific positions
    pub fn project(&self, indices: &[usize]) -> ExecutorResult<Tuple> {
        let mut values = Vec::with_capacity(indices.len());
        for &idx in indices {
            values.push(self.get(idx)?.clone());
        }
        Ok(Tuple { values })
    }

    /// Create an iterator over the datums
    pub fn iter(&self) -> impl Iterator<Item = &Datum> {
        self.values.iter()
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl Eq for Tuple {}

impl Hash for Tuple {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for datum in &self.values {
            datum.hash(state);
        }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

impl From<Vec<Datum>> for Tuple {
    fn from(values: Vec<Datum>) -> Self {
        Tuple { values }
    }
}

impl IntoIterator for Tuple {
    type Item = Datum;
    type IntoIter = std::vec::IntoIter<Datum>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a Tuple {
    type Item = &'a Datum;
    type IntoIter = std::slice::Iter<'a, Datum>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// Build a tuple from a list of values convertible into datums.
#[macro_export]
macro_rules! tuple {
    ($($v:expr),* $(,)?) => {
        $crate::executor::Tuple::new(vec![$($crate::executor::Datum::from($v)),*])
    };
}
