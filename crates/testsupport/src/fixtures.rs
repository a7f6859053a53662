//! Common test fixtures and data generators.
//!
//! Provides reusable grid constructions, row-map builders, and
//! interchange shapes used across the engine test suites.

use columns::{ColumnDef, SpecialColumn};
use common::{GridOptions, RowMap, TableShape};
use grid::Grid;
use types::{CellType, Value};

/// A grid with the canonical three-column person schema
/// (`id: Int, name: Text, age: Int`).
pub fn grid_fixture() -> Grid {
    let grid = Grid::new(GridOptions::default()).expect("default options are valid");
    grid.columns()
        .add_column(ColumnDef::new("id", CellType::Int))
        .expect("schema setup");
    grid.columns()
        .add_column(ColumnDef::new("name", CellType::Text))
        .expect("schema setup");
    grid.columns()
        .add_column(ColumnDef::new("age", CellType::Int))
        .expect("schema setup");
    grid
}

/// A grid with the person schema plus a checkbox column driving
/// only-checked selections.
pub fn grid_fixture_with_checkbox() -> Grid {
    let grid = grid_fixture();
    grid.columns()
        .add_column(
            ColumnDef::new("selected", CellType::Bool)
                .with_special(SpecialColumn::Checkbox)
                .with_default(Value::Bool(false)),
        )
        .expect("schema setup");
    grid
}

/// Row for the person schema.
///
/// # Example
///
/// ```
/// use testsupport::prelude::*;
///
/// let cells = person_row(1, "Ada", 36);
/// assert_eq!(cells.len(), 3);
/// ```
pub fn person_row(id: i64, name: &str, age: i64) -> RowMap {
    let mut cells = RowMap::new();
    cells.insert("id".into(), Value::Int(id));
    cells.insert("name".into(), Value::Text(name.into()));
    cells.insert("age".into(), Value::Int(age));
    cells
}

/// Single-column row map.
pub fn cell(column: &str, value: Value) -> RowMap {
    let mut cells = RowMap::new();
    cells.insert(column.into(), value);
    cells
}

/// A `TableShape` for the person schema with generated rows
/// `(i, "person i", 20 + i % 50)`.
pub fn person_table(rows: i64) -> TableShape {
    TableShape {
        columns: vec!["id".into(), "name".into(), "age".into()],
        rows: (0..rows)
            .map(|i| {
                vec![
                    Value::Int(i),
                    Value::Text(format!("person {i}")),
                    Value::Int(20 + i % 50),
                ]
            })
            .collect(),
    }
}

/// A wide numeric table `Column_1..=Column_n` with `rows` rows, the
/// shape the bulk-validation scenarios use.
pub fn numeric_table(rows: i64, columns: usize) -> TableShape {
    TableShape {
        columns: (1..=columns).map(|c| format!("Column_{c}")).collect(),
        rows: (0..rows)
            .map(|i| (0..columns).map(|c| Value::Int(i * columns as i64 + c as i64)).collect())
            .collect(),
    }
}
