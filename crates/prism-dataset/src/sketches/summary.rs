use super::source::AggregateSource;
use super::SUMMARY;
use crate::error::{Result, SketchError};
use crate::sketch::{OperationRequest, Sketch};
use prism_columnar::{Schema, Table};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Schema and row count of a dataset.
///
/// `schema == None` is the zero value and combines with anything.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    pub row_count: u64,
    pub schema: Option<Schema>,
}

impl TableSummary {
    pub fn new(schema: Schema, row_count: u64) -> Self {
        Self {
            row_count,
            schema: Some(schema),
        }
    }

    pub fn add(&self, other: &TableSummary) -> Result<TableSummary> {
        let schema = match (&self.schema, &other.schema) {
            (None, schema) | (schema, None) => schema.clone(),
            (Some(left), Some(right)) if left == right => Some(left.clone()),
            (Some(left), Some(right)) => {
                return Err(SketchError::Combine(format!(
                    "schemas differ: [{}] vs [{}]",
                    describe(left),
                    describe(right)
                )))
            }
        };
        Ok(TableSummary {
            row_count: self.row_count + other.row_count,
            schema,
        })
    }
}

fn describe(schema: &Schema) -> String {
    schema
        .columns()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Computes a [`TableSummary`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarySketch;

impl Sketch<Table> for SummarySketch {
    type Output = TableSummary;

    fn zero(&self) -> TableSummary {
        TableSummary::default()
    }

    fn add(&self, left: &TableSummary, right: &TableSummary) -> Result<TableSummary> {
        left.add(right)
    }

    fn create(&self, table: &Table) -> Result<TableSummary> {
        Ok(TableSummary::new(
            table.schema().clone(),
            table.row_count() as u64,
        ))
    }

    fn request(&self) -> Option<OperationRequest> {
        OperationRequest::new(SUMMARY, self).ok()
    }
}

impl Sketch<Arc<dyn AggregateSource>> for SummarySketch {
    type Output = TableSummary;

    fn zero(&self) -> TableSummary {
        TableSummary::default()
    }

    fn add(&self, left: &TableSummary, right: &TableSummary) -> Result<TableSummary> {
        left.add(right)
    }

    fn create(&self, source: &Arc<dyn AggregateSource>) -> Result<TableSummary> {
        Ok(TableSummary::new(source.schema()?, source.row_count()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use prism_columnar::{ColumnDescription, ColumnKind};
    use serde_json::json;

    fn schema(kind: ColumnKind) -> Schema {
        Schema::new(vec![ColumnDescription::new("a", kind)]).unwrap()
    }

    #[test]
    fn summaries_add_row_counts() {
        let s = schema(ColumnKind::Integer);
        let sum = TableSummary::new(s.clone(), 10)
            .add(&TableSummary::new(s.clone(), 5))
            .unwrap();
        assert_eq!(sum, TableSummary::new(s.clone(), 15));

        let with_zero = TableSummary::new(s.clone(), 10)
            .add(&TableSummary::default())
            .unwrap();
        assert_eq!(with_zero, TableSummary::new(s, 10));
    }

    #[test]
    fn mismatched_schemas_fail_both_ways() {
        let a = TableSummary::new(schema(ColumnKind::Integer), 1);
        let b = TableSummary::new(schema(ColumnKind::String), 1);
        assert!(matches!(a.add(&b), Err(SketchError::Combine(_))));
        assert!(matches!(b.add(&a), Err(SketchError::Combine(_))));
    }

    #[test]
    fn summary_document_shape() {
        assert_eq!(
            serde_json::to_value(TableSummary::default()).unwrap(),
            json!({"rowCount": 0, "schema": null})
        );
        assert_eq!(
            serde_json::to_value(TableSummary::new(schema(ColumnKind::Double), 3)).unwrap(),
            json!({"rowCount": 3, "schema": [{"name": "a", "kind": "Double"}]})
        );
    }
}
