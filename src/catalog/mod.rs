//! Catalog - Schema metadata (tables, columns, statistics)
//!
//! Describes the shape of relations flowing through a plan: column types,
//! ordered schemas, and the per-table / per-column statistics used by the
//! cost model.

pub mod error;
pub mod schema;
pub mod stats;

use std::fmt;

pub use error::{SchemaError, SchemaResult};
pub use schema::{ColumnInfo, ColumnName, Schema};
pub use stats::{ColumnStats, ColumnStatsCollector, TableStats};

/// SQL data types supported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean (true/false)
    Boolean,
    /// 8-bit signed integer
    TinyInt,
    /// 16-bit signed integer
    SmallInt,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    BigInt,
    /// 32-bit floating point
    Float,
    /// 64-bit floating point
    Double,
    /// Variable-length string with max length
    Varchar(u32),
    /// Unlimited text
    Text,
    /// Binary data
    Blob,
    /// Timestamp (date and time)
    Timestamp,
    /// Type of a bare NULL literal
    Null,
}

impl DataType {
    /// Check if this type is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::TinyInt
                | DataType::SmallInt
                | DataType::Int
                | DataType::BigInt
                | DataType::Float
                | DataType::Double
        )
    }

    /// Check if this type is an integer
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::TinyInt | DataType::SmallInt | DataType::Int | DataType::BigInt
        )
    }

    /// Check if this type is a string type
    pub fn is_string(&self) -> bool {
        matches!(self, DataType::Varchar(_) | DataType::Text)
    }

    /// Whether range comparisons on this type can be estimated from min/max.
    pub fn supports_range_estimates(&self) -> bool {
        self.is_numeric()
    }

    /// Rough on-disk width in bytes, used for tuple-size estimates.
    pub fn estimated_width(&self) -> f32 {
        match self {
            DataType::Boolean | DataType::TinyInt => 1.0,
            DataType::SmallInt => 2.0,
            DataType::Int | DataType::Float => 4.0,
            DataType::BigInt | DataType::Double | DataType::Timestamp => 8.0,
            DataType::Varchar(max) => (*max as f32 / 2.0).clamp(1.0, 64.0),
            DataType::Text | DataType::Blob => 32.0,
            DataType::Null => 0.0,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::TinyInt => write!(f, "TINYINT"),
            DataType::SmallInt => write!(f, "SMALLINT"),
            DataType::Int => write!(f, "INTEGER"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Varchar(n) => write!(f, "VARCHAR({})", n),
            DataType::Text => write!(f, "TEXT"),
            DataType::Blob => write!(f, "BLOB"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::Null => write!(f, "NULL"),
        }
    }
}

/// Column definition
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Data type
    pub data_type: DataType,
    /// Whether NULL values are allowed
    pub nullable: bool,
}

impl ColumnDef {
    /// Create a new column definition
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    /// Set nullable
    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Table definition
#[derive(Debug, Clone)]
pub struct TableDef {
    /// Table name
    pub name: String,
    /// Column definitions
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    /// Create a new table definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Add a column
    #[must_use]
    pub fn column(mut self, col: ColumnDef) -> Self {
        self.columns.push(col);
        self
    }

    /// Get column by name
    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Build the schema a scan of this table exposes: every column is
    /// qualified with the table name.
    pub fn schema(&self) -> SchemaResult<Schema> {
        let mut schema = Schema::new();
        for col in &self.columns {
            schema.add_column(ColumnInfo::new(
                col.name.clone(),
                Some(self.name.clone()),
                col.data_type.clone(),
            ))?;
        }
        Ok(schema)
    }
}
