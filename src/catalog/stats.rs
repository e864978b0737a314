//! Table and column statistics
//!
//! Every statistic is independently optional; `None` means "not computed"
//! and the cost model falls back to defaults.

use std::collections::HashSet;

use crate::executor::Datum;

/// Per-column statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnStats {
    /// Number of distinct non-NULL values
    pub unique_values: Option<u64>,
    /// Number of NULL values
    pub null_values: Option<u64>,
    /// Smallest non-NULL value
    pub min_value: Option<Datum>,
    /// Largest non-NULL value
    pub max_value: Option<Datum>,
}

impl ColumnStats {
    /// Statistics with every field unknown
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn with_unique_values(mut self, unique: u64) -> Self {
        self.unique_values = Some(unique);
        self
    }

    pub fn with_null_values(mut self, nulls: u64) -> Self {
        self.null_values = Some(nulls);
        self
    }

    pub fn with_min_max(mut self, min: Datum, max: Datum) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    /// True if both bounds are known and differ.
    pub fn has_different_min_max(&self) -> bool {
        match (&self.min_value, &self.max_value) {
            (Some(min), Some(max)) => min != max,
            _ => false,
        }
    }
}

/// Statistics snapshot of one tuple file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableStats {
    /// Number of data pages in the file
    pub data_pages: u64,
    /// Number of live tuples
    pub num_tuples: u64,
    /// Average tuple size in bytes
    pub avg_tuple_size: f32,
    /// One entry per column, in schema order
    pub column_stats: Vec<ColumnStats>,
}

impl TableStats {
    /// Stats for a file nobody has analyzed yet
    pub fn unknown(num_columns: usize) -> Self {
        Self {
            data_pages: 0,
            num_tuples: 0,
            avg_tuple_size: 0.0,
            column_stats: vec![ColumnStats::unknown(); num_columns],
        }
    }
}

/// Accumulates statistics for a single column while its values stream past.
#[derive(Debug, Default)]
pub struct ColumnStatsCollector {
    unique: HashSet<Datum>,
    nulls: u64,
    min: Option<Datum>,
    max: Option<Datum>,
}

impl ColumnStatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_value(&mut self, value: &Datum) {
        if value.is_null() {
            self.nulls += 1;
            return;
        }

        if !self.unique.contains(value) {
            self.unique.insert(value.clone());
        }
        if self.min.as_ref().is_none_or(|m| value < m) {
            self.min = Some(value.clone());
        }
        if self.max.as_ref().is_none_or(|m| value > m) {
            self.max = Some(value.clone());
        }
    }

    pub fn finish(self) -> ColumnStats {
        ColumnStats {
            unique_values: Some(self.unique.len() as u64),
            null_values: Some(self.nulls),
            min_value: self.min,
            max_value: self.max,
        }
    }
}
