use prism_columnar::{
    Column, ColumnDescription, ColumnKind, MembershipSet, Schema, SubSchema, Table, TableBuilder,
    TableError, Value,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn abc_table() -> Table {
    let schema = Schema::new(vec![
        ColumnDescription::new("A", ColumnKind::Integer),
        ColumnDescription::new("B", ColumnKind::String),
    ])
    .unwrap();
    let mut builder = TableBuilder::new(schema);
    builder.append_row(&[Value::Integer(0), Value::from("zero")]).unwrap();
    builder.append_row(&[Value::Integer(1), Value::from("one")]).unwrap();
    builder.append_row(&[Value::Integer(2), Value::from("two")]).unwrap();
    builder.finalize().unwrap()
}

fn rows_of(table: &Table) -> Vec<Vec<Value>> {
    table
        .members()
        .iter()
        .map(|row| {
            (0..table.column_count())
                .map(|c| table.column_at(c).unwrap().value(row))
                .collect()
        })
        .collect()
}

#[test]
fn compress_reorders_and_renumbers_rows() {
    let table = abc_table();
    assert!(table.members().is_full());

    let compressed = table.compress_rows(&vec![2usize, 0]).unwrap();
    assert_eq!(compressed.row_count(), 2);
    assert!(compressed.members().is_full());
    assert_eq!(
        rows_of(&compressed),
        vec![
            vec![Value::Integer(2), Value::from("two")],
            vec![Value::Integer(0), Value::from("zero")],
        ]
    );
}

#[test]
fn compress_projects_columns_in_schema_order() {
    let table = Table::with_all_rows(vec![
        Column::integers("a", vec![1, 2, 3]),
        Column::doubles("b", vec![0.5, 1.5, 2.5]),
        Column::strings("c", &["x", "y", "z"]),
    ])
    .unwrap();

    let projected = table
        .compress_with(&SubSchema::columns(["c", "a"]), &vec![1usize])
        .unwrap();
    let names: Vec<&str> = projected.schema().column_names().collect();
    assert_eq!(names, vec!["a", "c"]);
    assert_eq!(rows_of(&projected), vec![vec![Value::Integer(2), Value::from("y")]]);
}

#[test]
fn compress_rejects_rows_past_the_end() {
    let err = abc_table().compress_rows(&vec![0usize, 3]).unwrap_err();
    assert_eq!(err, TableError::RowOutOfBounds { row: 3, size: 3 });
}

#[test]
fn sample_caps_at_row_count() {
    let table = Table::with_all_rows(vec![Column::integers("n", (0..50).collect())]).unwrap();
    assert_eq!(table.sample(10, 3).row_count(), 10);
    assert_eq!(table.sample(500, 3).row_count(), 50);

    let filtered = table.filter(|row| row < 5);
    let sample = filtered.sample(100, 3);
    assert_eq!(sample.row_count(), 5);
    assert!(sample.members().is_full());
}

#[test]
fn missing_cells_survive_compression() {
    let schema = Schema::new(vec![ColumnDescription::new("x", ColumnKind::Double)]).unwrap();
    let mut builder = TableBuilder::new(schema);
    for value in [Value::Double(1.0), Value::Missing, Value::Double(3.0)] {
        builder.append_row(&[value]).unwrap();
    }
    let table = builder.finalize().unwrap();

    let compressed = table.compress_rows(&vec![1usize, 2]).unwrap();
    let column = compressed.column("x").unwrap();
    assert!(column.is_missing(0));
    assert_eq!(column.as_f64(1), Some(3.0));
}

proptest! {
    #[test]
    fn compress_against_own_membership_keeps_cells(
        values in prop::collection::vec(-1000i64..1000, 0..200),
        keep_mod in 1usize..5,
    ) {
        let n = values.len();
        let table = Table::from_columns(
            vec![Column::integers("v", values)],
            MembershipSet::full(n),
        )
        .unwrap()
        .filter(|row| row % keep_mod == 0);

        let compressed = table.compress();
        prop_assert_eq!(compressed.row_count(), table.row_count());
        prop_assert!(compressed.members().is_full());
        prop_assert_eq!(rows_of(&compressed), rows_of(&table));
    }
}
