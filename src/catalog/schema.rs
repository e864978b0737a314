//! Result schemas
//!
//! A [`Schema`] is the ordered list of columns a plan node produces. Columns
//! are identified by an optional table qualifier plus a name; no two columns
//! may share both.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::error::{SchemaError, SchemaResult};
use super::DataType;

/// A (possibly qualified, possibly wildcard) column reference.
///
/// `column == None` denotes a wildcard: `*` when `table` is also `None`,
/// `t.*` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnName {
    pub table: Option<String>,
    pub column: Option<String>,
}

impl ColumnName {
    pub fn new(table: Option<String>, column: Option<String>) -> Self {
        Self { table, column }
    }

    /// Unqualified column reference
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            table: None,
            column: Some(name.into()),
        }
    }

    /// Table-qualified column reference
    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: Some(name.into()),
        }
    }

    /// `*`
    pub fn wildcard() -> Self {
        Self {
            table: None,
            column: None,
        }
    }

    /// `table.*`
    pub fn table_wildcard(table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.column.is_none()
    }

    pub fn is_table_specified(&self) -> bool {
        self.table.is_some()
    }

    fn matches(&self, info: &ColumnInfo) -> bool {
        let table_ok = match &self.table {
            Some(t) => info.table.as_deref() == Some(t.as_str()),
            None => true,
        };
        let column_ok = match &self.column {
            Some(c) => info.name == *c,
            None => true,
        };
        table_ok && column_ok
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(t) = &self.table {
            write!(f, "{}.", t)?;
        }
        match &self.column {
            Some(c) => write!(f, "{}", c),
            None => write!(f, "*"),
        }
    }
}

/// Descriptor of one column in a schema
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Owning table (or alias), if any
    pub table: Option<String>,
    /// Column type
    pub data_type: DataType,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, table: Option<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            table,
            data_type,
        }
    }

    /// The reference that names exactly this column
    pub fn column_name(&self) -> ColumnName {
        ColumnName::new(self.table.clone(), Some(self.name.clone()))
    }

    fn same_identity(&self, other: &ColumnInfo) -> bool {
        self.name == other.name && self.table == other.table
    }
}

impl fmt::Display for ColumnInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(t) => write!(f, "{}.{}:{}", t, self.name, self.data_type),
            None => write!(f, "{}:{}", self.name, self.data_type),
        }
    }
}

/// Ordered sequence of column descriptors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    columns: Vec<ColumnInfo>,
}

impl Schema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from a list of columns, rejecting duplicates
    pub fn from_columns(columns: impl IntoIterator<Item = ColumnInfo>) -> SchemaResult<Self> {
        let mut schema = Self::new();
        for col in columns {
            schema.add_column(col)?;
        }
        Ok(schema)
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&ColumnInfo> {
        self.columns.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter()
    }

    /// Append a column, returning its position.
    pub fn add_column(&mut self, info: ColumnInfo) -> SchemaResult<usize> {
        if self.columns.iter().any(|c| c.same_identity(&info)) {
            return Err(SchemaError::DuplicateColumn(info.column_name().to_string()));
        }
        self.columns.push(info);
        Ok(self.columns.len() - 1)
    }

    /// Append every column of `other`.
    pub fn append(&mut self, other: &Schema) -> SchemaResult<()> {
        for col in &other.columns {
            self.add_column(col.clone())?;
        }
        Ok(())
    }

    /// Concatenate two schemas into a new one
    pub fn concat(left: &Schema, right: &Schema) -> SchemaResult<Schema> {
        let mut schema = left.clone();
        schema.append(right)?;
        Ok(schema)
    }

    /// Distinct table qualifiers appearing in this schema
    pub fn table_names(&self) -> BTreeSet<String> {
        self.columns.iter().filter_map(|c| c.table.clone()).collect()
    }

    /// Position of the column `name` refers to.
    ///
    /// Returns `Ok(None)` if nothing matches (or `name` is a wildcard) and
    /// an ambiguity error if an unqualified name matches several columns.
    pub fn column_index(&self, name: &ColumnName) -> SchemaResult<Option<usize>> {
        if name.is_wildcard() {
            return Ok(None);
        }

        let mut found = None;
        for (i, col) in self.columns.iter().enumerate() {
            if name.matches(col) {
                if found.is_some() {
                    return Err(SchemaError::AmbiguousColumn(name.to_string()));
                }
                found = Some(i);
            }
        }
        Ok(found)
    }

    /// Every column matched by `name`, keyed by position.
    ///
    /// Wildcards expand to all (or all of one table's) columns; a plain name
    /// yields at most one entry.
    pub fn find_columns(&self, name: &ColumnName) -> SchemaResult<BTreeMap<usize, ColumnInfo>> {
        let mut found = BTreeMap::new();
        if name.is_wildcard() {
            for (i, col) in self.columns.iter().enumerate() {
                if name.matches(col) {
                    found.insert(i, col.clone());
                }
            }
        } else if let Some(i) = self.column_index(name)? {
            found.insert(i, self.columns[i].clone());
        }
        Ok(found)
    }

    /// Copy of this schema with every column requalified to `table`.
    pub fn with_table_name(&self, table: &str) -> SchemaResult<Schema> {
        let mut renamed = Schema::new();
        for col in &self.columns {
            let info = ColumnInfo::new(col.name.clone(), Some(table.to_string()), col.data_type.clone());
            if renamed.columns.iter().any(|c| c.same_identity(&info)) {
                return Err(SchemaError::AmbiguousRename {
                    table: table.to_string(),
                    column: col.name.clone(),
                });
            }
            renamed.columns.push(info);
        }
        Ok(renamed)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", col)?;
        }
        write!(f, "]")
    }
}
