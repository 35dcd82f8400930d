#![forbid(unsafe_code)]

use crate::bitmap::BitVec;
use crate::error::{Result, TableError};
use crate::membership::RowOrder;
use crate::schema::ColumnDescription;
use crate::types::{ColumnKind, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Physical storage of a column. Missing cells hold a placeholder and are tracked by the
/// column's validity mask.
#[derive(Clone, Debug)]
pub enum ColumnData {
    Integer(Vec<i64>),
    Double(Vec<f64>),
    Date(Vec<i64>),
    String(Vec<Arc<str>>),
    Category {
        dictionary: Arc<Vec<Arc<str>>>,
        codes: Vec<u32>,
    },
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            Self::Integer(v) | Self::Date(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::String(v) => v.len(),
            Self::Category { codes, .. } => codes.len(),
        }
    }

    fn gather(&self, rows: &[usize]) -> ColumnData {
        match self {
            Self::Integer(v) => Self::Integer(rows.iter().map(|&r| v[r]).collect()),
            Self::Double(v) => Self::Double(rows.iter().map(|&r| v[r]).collect()),
            Self::Date(v) => Self::Date(rows.iter().map(|&r| v[r]).collect()),
            Self::String(v) => Self::String(rows.iter().map(|&r| v[r].clone()).collect()),
            // The dictionary is shared with the source column; only codes are copied.
            Self::Category { dictionary, codes } => Self::Category {
                dictionary: dictionary.clone(),
                codes: rows.iter().map(|&r| codes[r]).collect(),
            },
        }
    }
}

/// An immutable column: a description plus values addressed by physical row index.
///
/// A column does not know which rows are logically present; that is the table's membership set.
#[derive(Clone, Debug)]
pub struct Column {
    description: ColumnDescription,
    data: ColumnData,
    /// `None` when every cell is present.
    validity: Option<BitVec>,
}

impl Column {
    pub fn new(
        description: ColumnDescription,
        data: ColumnData,
        validity: Option<BitVec>,
    ) -> Result<Self> {
        let data_kind = match &data {
            ColumnData::Integer(_) => ColumnKind::Integer,
            ColumnData::Double(_) => ColumnKind::Double,
            ColumnData::Date(_) => ColumnKind::Date,
            ColumnData::String(_) => ColumnKind::String,
            ColumnData::Category { .. } => ColumnKind::Category,
        };
        if data_kind != description.kind {
            return Err(TableError::ValueKindMismatch {
                column: description.name,
                kind: description.kind,
                value: format!("{data_kind} storage"),
            });
        }
        if let Some(validity) = &validity {
            if validity.len() != data.len() {
                return Err(TableError::ColumnLengthMismatch {
                    column: description.name,
                    expected: data.len(),
                    actual: validity.len(),
                });
            }
        }
        if let ColumnData::Category { dictionary, codes } = &data {
            if let Some(&code) = codes.iter().find(|&&c| c as usize >= dictionary.len()) {
                return Err(TableError::ValueKindMismatch {
                    column: description.name,
                    kind: ColumnKind::Category,
                    value: format!("code {code}"),
                });
            }
        }
        let validity = validity.filter(|v| !v.all_true());
        Ok(Self {
            description,
            data,
            validity,
        })
    }

    pub fn integers(name: impl Into<String>, values: Vec<i64>) -> Self {
        Self {
            description: ColumnDescription::new(name, ColumnKind::Integer),
            data: ColumnData::Integer(values),
            validity: None,
        }
    }

    pub fn doubles(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            description: ColumnDescription::new(name, ColumnKind::Double),
            data: ColumnData::Double(values),
            validity: None,
        }
    }

    pub fn strings<S: AsRef<str>>(name: impl Into<String>, values: &[S]) -> Self {
        Self {
            description: ColumnDescription::new(name, ColumnKind::String),
            data: ColumnData::String(values.iter().map(|s| Arc::from(s.as_ref())).collect()),
            validity: None,
        }
    }

    /// Build a column from cell values, checking each against `description.kind`.
    pub fn from_values(description: ColumnDescription, values: &[Value]) -> Result<Self> {
        let mut builder = ColumnBuilder::new(description, values.len());
        for value in values {
            builder.push(value)?;
        }
        Ok(builder.finish())
    }

    pub fn description(&self) -> &ColumnDescription {
        &self.description
    }

    pub fn name(&self) -> &str {
        &self.description.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.description.kind
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// Physical number of rows, regardless of membership.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_missing(&self, row: usize) -> bool {
        self.validity.as_ref().is_some_and(|v| !v.get(row))
    }

    pub fn value(&self, row: usize) -> Value {
        if self.is_missing(row) {
            return Value::Missing;
        }
        match &self.data {
            ColumnData::Integer(v) => Value::Integer(v[row]),
            ColumnData::Double(v) => Value::Double(v[row]),
            ColumnData::Date(v) => Value::Date(v[row]),
            ColumnData::String(v) => Value::String(v[row].clone()),
            ColumnData::Category { dictionary, codes } => {
                Value::String(dictionary[codes[row] as usize].clone())
            }
        }
    }

    /// Numeric value of a cell; `None` for missing cells and string columns.
    pub fn as_f64(&self, row: usize) -> Option<f64> {
        if self.is_missing(row) {
            return None;
        }
        match &self.data {
            ColumnData::Integer(v) | ColumnData::Date(v) => Some(v[row] as f64),
            ColumnData::Double(v) => Some(v[row]),
            ColumnData::String(_) | ColumnData::Category { .. } => None,
        }
    }

    pub fn as_string(&self, row: usize) -> String {
        self.value(row).to_string()
    }

    /// Copy the rows enumerated by `order` into a new column numbered `0..order.size()`.
    ///
    /// Callers must guarantee every row in `order` is below [`Column::len`].
    pub fn compress(&self, order: &dyn RowOrder) -> Column {
        let rows: Vec<usize> = order.row_iter().collect();
        let validity = self.validity.as_ref().map(|v| {
            let mut out = BitVec::with_capacity_bits(rows.len());
            for &row in &rows {
                out.push(v.get(row));
            }
            out
        });
        Column {
            description: self.description.clone(),
            data: self.data.gather(&rows),
            validity: validity.filter(|v| !v.all_true()),
        }
    }
}

/// Appends [`Value`]s to a column of a fixed kind.
pub struct ColumnBuilder {
    description: ColumnDescription,
    data: ColumnData,
    validity: BitVec,
    dict_map: HashMap<Arc<str>, u32>,
    dictionary: Vec<Arc<str>>,
}

impl ColumnBuilder {
    pub fn new(description: ColumnDescription, capacity: usize) -> Self {
        let data = match description.kind {
            ColumnKind::Integer => ColumnData::Integer(Vec::with_capacity(capacity)),
            ColumnKind::Double => ColumnData::Double(Vec::with_capacity(capacity)),
            ColumnKind::Date => ColumnData::Date(Vec::with_capacity(capacity)),
            ColumnKind::String => ColumnData::String(Vec::with_capacity(capacity)),
            ColumnKind::Category => ColumnData::Category {
                dictionary: Arc::new(Vec::new()),
                codes: Vec::with_capacity(capacity),
            },
        };
        Self {
            description,
            data,
            validity: BitVec::with_capacity_bits(capacity),
            dict_map: HashMap::new(),
            dictionary: Vec::new(),
        }
    }

    /// Checks that `value` can be appended without changing the builder.
    pub fn accepts(&self, value: &Value) -> Result<()> {
        let ok = matches!(
            (&self.data, value),
            (_, Value::Missing)
                | (ColumnData::Integer(_), Value::Integer(_))
                | (ColumnData::Double(_), Value::Double(_) | Value::Integer(_))
                | (ColumnData::Date(_), Value::Date(_))
                | (ColumnData::String(_), Value::String(_))
                | (ColumnData::Category { .. }, Value::String(_))
        );
        if ok {
            Ok(())
        } else {
            Err(TableError::ValueKindMismatch {
                column: self.description.name.clone(),
                kind: self.description.kind,
                value: format!("{value:?}"),
            })
        }
    }

    pub fn push(&mut self, value: &Value) -> Result<()> {
        let present = !value.is_missing();
        match (&mut self.data, value) {
            (ColumnData::Integer(v), Value::Integer(x)) => v.push(*x),
            (ColumnData::Integer(v), Value::Missing) => v.push(0),
            (ColumnData::Double(v), Value::Double(x)) => v.push(*x),
            (ColumnData::Double(v), Value::Integer(x)) => v.push(*x as f64),
            (ColumnData::Double(v), Value::Missing) => v.push(0.0),
            (ColumnData::Date(v), Value::Date(x)) => v.push(*x),
            (ColumnData::Date(v), Value::Missing) => v.push(0),
            (ColumnData::String(v), Value::String(s)) => v.push(s.clone()),
            (ColumnData::String(v), Value::Missing) => v.push(Arc::from("")),
            (ColumnData::Category { codes, .. }, Value::String(s)) => {
                let code = match self.dict_map.get(s) {
                    Some(&code) => code,
                    None => {
                        let code = self.dictionary.len() as u32;
                        self.dictionary.push(s.clone());
                        self.dict_map.insert(s.clone(), code);
                        code
                    }
                };
                codes.push(code);
            }
            (ColumnData::Category { codes, .. }, Value::Missing) => codes.push(0),
            (_, other) => {
                return Err(TableError::ValueKindMismatch {
                    column: self.description.name.clone(),
                    kind: self.description.kind,
                    value: format!("{other:?}"),
                });
            }
        }
        self.validity.push(present);
        Ok(())
    }

    pub fn finish(self) -> Column {
        let data = match self.data {
            ColumnData::Category { codes, .. } => {
                let mut dictionary = self.dictionary;
                // Missing cells hold code 0; make sure it resolves.
                if dictionary.is_empty() && !codes.is_empty() {
                    dictionary.push(Arc::from(""));
                }
                ColumnData::Category {
                    dictionary: Arc::new(dictionary),
                    codes,
                }
            }
            other => other,
        };
        let validity = if self.validity.all_true() {
            None
        } else {
            Some(self.validity)
        };
        Column {
            description: self.description,
            data,
            validity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builder_tracks_missing_cells() {
        let column = Column::from_values(
            ColumnDescription::new("x", ColumnKind::Double),
            &[Value::Double(1.5), Value::Missing, Value::Integer(3)],
        )
        .unwrap();
        assert_eq!(column.len(), 3);
        assert_eq!(column.value(1), Value::Missing);
        assert_eq!(column.as_f64(2), Some(3.0));
        assert_eq!(column.as_string(1), "");
    }

    #[test]
    fn builder_rejects_wrong_kind() {
        let err = Column::from_values(
            ColumnDescription::new("n", ColumnKind::Integer),
            &[Value::from("oops")],
        )
        .unwrap_err();
        assert!(matches!(err, TableError::ValueKindMismatch { .. }));
    }

    #[test]
    fn category_compress_shares_dictionary() {
        let column = Column::from_values(
            ColumnDescription::new("c", ColumnKind::Category),
            &[Value::from("a"), Value::from("b"), Value::from("a")],
        )
        .unwrap();
        let compressed = column.compress(&vec![2usize, 1]);
        assert_eq!(compressed.value(0), Value::from("a"));
        assert_eq!(compressed.value(1), Value::from("b"));

        match (column.data(), compressed.data()) {
            (
                ColumnData::Category { dictionary: a, .. },
                ColumnData::Category { dictionary: b, .. },
            ) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected category storage"),
        }
    }

    #[test]
    fn new_rejects_storage_of_the_wrong_kind() {
        let err = Column::new(
            ColumnDescription::new("x", ColumnKind::Double),
            ColumnData::Integer(vec![1]),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, TableError::ValueKindMismatch { .. }));
    }
}
