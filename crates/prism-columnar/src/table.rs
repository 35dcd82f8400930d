#![forbid(unsafe_code)]

use crate::column::{Column, ColumnBuilder};
use crate::error::{Result, TableError};
use crate::membership::{MembershipSet, RowOrder};
use crate::schema::{Schema, SubSchema};
use crate::types::Value;
use serde_json::json;
use std::fmt;
use std::sync::Arc;

/// Upper bound on rows rendered by [`Table::to_long_string`].
pub const MAX_DUMP_ROWS: usize = 100;

/// An immutable in-memory table: schema, shared column buffers, and a membership set.
///
/// Cloning a table is cheap; column data is reference counted. Operations that change the set
/// of rows return a new table.
#[derive(Clone, Debug)]
pub struct Table {
    schema: Arc<Schema>,
    columns: Vec<Arc<Column>>,
    members: MembershipSet,
}

impl Table {
    /// Fails if any column's description differs from the schema entry at its index, if the
    /// columns disagree on physical length, or if `members` refers past that length.
    pub fn new(
        schema: Schema,
        columns: Vec<Arc<Column>>,
        members: MembershipSet,
    ) -> Result<Self> {
        if schema.column_count() != columns.len() {
            return Err(TableError::ColumnCountMismatch {
                expected: schema.column_count(),
                actual: columns.len(),
            });
        }
        for (expected, column) in schema.columns().iter().zip(&columns) {
            if column.description() != expected {
                return Err(TableError::SchemaMismatch {
                    expected: expected.clone(),
                    actual: column.description().clone(),
                });
            }
        }
        let physical = physical_len(&columns)?;
        if let Some(physical) = physical {
            if members.max() > physical {
                return Err(TableError::RowOutOfBounds {
                    row: members.max() - 1,
                    size: physical,
                });
            }
        }
        Ok(Self {
            schema: Arc::new(schema),
            columns,
            members,
        })
    }

    /// Derive the schema from the columns themselves.
    pub fn from_columns(columns: Vec<Column>, members: MembershipSet) -> Result<Self> {
        let schema = Schema::new(columns.iter().map(|c| c.description().clone()).collect())?;
        Self::new(schema, columns.into_iter().map(Arc::new).collect(), members)
    }

    /// All physical rows of `columns` are members.
    pub fn with_all_rows(columns: Vec<Column>) -> Result<Self> {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        Self::from_columns(columns, MembershipSet::full(rows))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn members(&self) -> &MembershipSet {
        &self.members
    }

    /// Logical row count: the size of the membership set.
    pub fn row_count(&self) -> usize {
        self.members.size()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.schema.column_index(name)
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        let idx = self.schema.column_index(name)?;
        Ok(&self.columns[idx])
    }

    pub fn column_at(&self, index: usize) -> Option<&Column> {
        self.columns.get(index).map(|c| c.as_ref())
    }

    /// Project to the columns in `sub` and copy the rows listed by `order`, renumbered
    /// `0..order.size()`. The result always has a full membership set.
    pub fn compress_with(&self, sub: &SubSchema, order: &dyn RowOrder) -> Result<Table> {
        let physical = self.physical_rows();
        if let Some(row) = order.row_iter().find(|&row| row >= physical) {
            return Err(TableError::RowOutOfBounds {
                row,
                size: physical,
            });
        }
        Ok(self.compress_unchecked(sub, order))
    }

    pub fn compress_rows(&self, order: &dyn RowOrder) -> Result<Table> {
        self.compress_with(&SubSchema::Full, order)
    }

    /// Physically drop non-member rows.
    pub fn compress(&self) -> Table {
        self.compress_unchecked(&SubSchema::Full, &self.members)
    }

    /// A compacted table holding a uniform sample of `min(k, row_count)` member rows.
    pub fn sample(&self, k: usize, seed: u64) -> Table {
        let sample = self.members.sample(k, seed);
        self.compress_unchecked(&SubSchema::Full, &sample)
    }

    /// Restrict membership to rows satisfying `predicate`. Columns are shared, not copied.
    pub fn filter(&self, predicate: impl Fn(usize) -> bool) -> Table {
        Table {
            schema: self.schema.clone(),
            columns: self.columns.clone(),
            members: self.members.filter(predicate),
        }
    }

    /// Render up to [`MAX_DUMP_ROWS`] member rows, one per line.
    pub fn to_long_string(&self) -> String {
        let mut out = self.to_string();
        for row in self.members.iter().take(MAX_DUMP_ROWS) {
            out.push('\n');
            let cells: Vec<String> = self.columns.iter().map(|c| c.as_string(row)).collect();
            out.push_str(&cells.join(","));
        }
        out
    }

    /// `{"rowCount": n, "schema": [...]}` for lightweight summary exchange.
    pub fn summary_json(&self) -> serde_json::Value {
        json!({
            "rowCount": self.row_count(),
            "schema": self.schema.as_ref(),
        })
    }

    /// Cell value of a logical row (the `index`-th member).
    pub fn value(&self, logical_row: usize, column: &str) -> Result<Value> {
        let column = self.column(column)?;
        let row = self
            .members
            .iter()
            .nth(logical_row)
            .ok_or(TableError::RowOutOfBounds {
                row: logical_row,
                size: self.row_count(),
            })?;
        Ok(column.value(row))
    }

    fn physical_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(self.members.max())
    }

    fn compress_unchecked(&self, sub: &SubSchema, order: &dyn RowOrder) -> Table {
        let schema = self.schema.project(sub);
        let columns: Vec<Arc<Column>> = self
            .schema
            .columns()
            .iter()
            .zip(&self.columns)
            .filter(|(desc, _)| sub.contains(&desc.name))
            .map(|(_, column)| Arc::new(column.compress(order)))
            .collect();
        Table {
            schema: Arc::new(schema),
            columns,
            members: MembershipSet::full(order.size()),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Table, {} columns, {} rows",
            self.column_count(),
            self.row_count()
        )
    }
}

fn physical_len(columns: &[Arc<Column>]) -> Result<Option<usize>> {
    let Some(first) = columns.first() else {
        return Ok(None);
    };
    let expected = first.len();
    for column in columns {
        if column.len() != expected {
            return Err(TableError::ColumnLengthMismatch {
                column: column.name().to_string(),
                expected,
                actual: column.len(),
            });
        }
    }
    Ok(Some(expected))
}

/// Builds a [`Table`] row by row.
pub struct TableBuilder {
    schema: Schema,
    builders: Vec<ColumnBuilder>,
    rows: usize,
}

impl TableBuilder {
    pub fn new(schema: Schema) -> Self {
        let builders = schema
            .columns()
            .iter()
            .cloned()
            .map(|desc| ColumnBuilder::new(desc, 0))
            .collect();
        Self {
            schema,
            builders,
            rows: 0,
        }
    }

    pub fn append_row(&mut self, row: &[Value]) -> Result<()> {
        if row.len() != self.builders.len() {
            return Err(TableError::RowLengthMismatch {
                expected: self.builders.len(),
                actual: row.len(),
            });
        }
        // All columns must accept the row before any of them grows.
        for (builder, value) in self.builders.iter().zip(row) {
            builder.accepts(value)?;
        }
        for (builder, value) in self.builders.iter_mut().zip(row) {
            builder.push(value)?;
        }
        self.rows += 1;
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn finalize(self) -> Result<Table> {
        let columns = self
            .builders
            .into_iter()
            .map(|b| Arc::new(b.finish()))
            .collect();
        Table::new(self.schema, columns, MembershipSet::full(self.rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDescription;
    use crate::types::ColumnKind;
    use pretty_assertions::assert_eq;

    fn small_table() -> Table {
        Table::with_all_rows(vec![
            Column::integers("A", vec![10, 20, 30]),
            Column::strings("B", &["x", "y", "z"]),
        ])
        .unwrap()
    }

    #[test]
    fn construction_rejects_schema_mismatch() {
        let schema = Schema::new(vec![ColumnDescription::new("A", ColumnKind::Double)]).unwrap();
        let err = Table::new(
            schema,
            vec![Arc::new(Column::integers("A", vec![1]))],
            MembershipSet::full(1),
        )
        .unwrap_err();
        assert_eq!(
            err,
            TableError::SchemaMismatch {
                expected: ColumnDescription::new("A", ColumnKind::Double),
                actual: ColumnDescription::new("A", ColumnKind::Integer),
            }
        );
    }

    #[test]
    fn construction_rejects_membership_past_columns() {
        let err = Table::from_columns(
            vec![Column::integers("A", vec![1, 2])],
            MembershipSet::full(3),
        )
        .unwrap_err();
        assert_eq!(err, TableError::RowOutOfBounds { row: 2, size: 2 });
    }

    #[test]
    fn missing_column_lookup_fails() {
        let err = small_table().column("nope").unwrap_err();
        assert_eq!(err, TableError::ColumnNotFound("nope".to_string()));
    }

    #[test]
    fn filter_is_lazy_and_compress_materializes() {
        let table = small_table();
        let filtered = table.filter(|row| row != 1);
        assert_eq!(filtered.row_count(), 2);
        assert!(!filtered.members().is_full());
        assert!(Arc::ptr_eq(&filtered.columns[0], &table.columns[0]));

        let compressed = filtered.compress();
        assert!(compressed.members().is_full());
        assert_eq!(compressed.column("A").unwrap().value(1), Value::Integer(30));
    }

    #[test]
    fn long_string_is_capped() {
        let table = Table::with_all_rows(vec![Column::integers("n", (0..500).collect())]).unwrap();
        let dump = table.to_long_string();
        assert_eq!(dump.lines().count(), MAX_DUMP_ROWS + 1);
        assert!(dump.starts_with("Table, 1 columns, 500 rows"));
    }

    #[test]
    fn summary_json_shape() {
        assert_eq!(
            small_table().summary_json(),
            json!({
                "rowCount": 3,
                "schema": [
                    {"name": "A", "kind": "Integer"},
                    {"name": "B", "kind": "String"},
                ],
            })
        );
    }

    #[test]
    fn builder_rejects_short_rows() {
        let schema = Schema::new(vec![
            ColumnDescription::new("A", ColumnKind::Integer),
            ColumnDescription::new("B", ColumnKind::String),
        ])
        .unwrap();
        let mut builder = TableBuilder::new(schema);
        let err = builder.append_row(&[Value::Integer(1)]).unwrap_err();
        assert_eq!(err, TableError::RowLengthMismatch { expected: 2, actual: 1 });
    }

    #[test]
    fn rejected_row_leaves_the_builder_usable() {
        let schema = Schema::new(vec![
            ColumnDescription::new("A", ColumnKind::Integer),
            ColumnDescription::new("B", ColumnKind::String),
        ])
        .unwrap();
        let mut builder = TableBuilder::new(schema);
        let err = builder
            .append_row(&[Value::Integer(1), Value::Integer(2)])
            .unwrap_err();
        assert!(matches!(err, TableError::ValueKindMismatch { ref column, .. } if column == "B"));
        assert_eq!(builder.row_count(), 0);

        builder
            .append_row(&[Value::Integer(3), Value::String("x".into())])
            .unwrap();
        let table = builder.finalize().unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.column("A").unwrap().value(0), Value::Integer(3));
        assert_eq!(table.column("B").unwrap().as_string(0), "x");
    }
}
