#![forbid(unsafe_code)]

use crate::error::{Result, TableError};
use crate::types::ColumnKind;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDescription {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnDescription {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

impl fmt::Display for ColumnDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.kind)
    }
}

/// Ordered list of uniquely named column descriptions.
///
/// Two schemas are equal when they hold the same descriptions in the same order. On the wire a
/// schema is the JSON array of its `{name, kind}` descriptions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<ColumnDescription>",
    into = "Vec<ColumnDescription>"
)]
pub struct Schema {
    columns: Vec<ColumnDescription>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDescription>) -> Result<Self> {
        let mut schema = Self::default();
        for column in columns {
            schema.append(column)?;
        }
        Ok(schema)
    }

    pub fn append(&mut self, column: ColumnDescription) -> Result<()> {
        if self.index.contains_key(&column.name) {
            return Err(TableError::DuplicateColumn(column.name));
        }
        self.index.insert(column.name.clone(), self.columns.len());
        self.columns.push(column);
        Ok(())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnDescription] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn description(&self, index: usize) -> Option<&ColumnDescription> {
        self.columns.get(index)
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))
    }

    pub fn description_by_name(&self, name: &str) -> Result<&ColumnDescription> {
        let idx = self.column_index(name)?;
        Ok(&self.columns[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Keep only the columns selected by `sub`, preserving their relative order.
    pub fn project(&self, sub: &SubSchema) -> Schema {
        let mut out = Schema::default();
        for column in self.columns.iter().filter(|c| sub.contains(&c.name)) {
            out.index.insert(column.name.clone(), out.columns.len());
            out.columns.push(column.clone());
        }
        out
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for Schema {}

impl TryFrom<Vec<ColumnDescription>> for Schema {
    type Error = TableError;

    fn try_from(columns: Vec<ColumnDescription>) -> Result<Self> {
        Self::new(columns)
    }
}

impl From<Schema> for Vec<ColumnDescription> {
    fn from(schema: Schema) -> Self {
        schema.columns
    }
}

/// A selection of columns by name, used to project tables.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SubSchema {
    #[default]
    Full,
    Columns(HashSet<String>),
}

impl SubSchema {
    pub fn columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Columns(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            Self::Full => true,
            Self::Columns(names) => names.contains(name),
        }
    }
}
