//! Custom assertion helpers for testing.
//!
//! Provides specialized assertion functions for common grid testing
//! patterns.

use common::{GridError, GridResult};
use grid::Grid;
use types::Value;

/// Assert the grid holds exactly `expected` rows.
pub fn assert_row_count(grid: &Grid, expected: usize) {
    let count = grid.rows().get_row_count().expect("row count");
    assert_eq!(count, expected, "expected {expected} rows, found {count}");
}

/// Assert one cell holds the expected value.
///
/// # Example
///
/// ```
/// use testsupport::prelude::*;
/// use types::Value;
///
/// let grid = grid_fixture();
/// grid.rows().add_row(person_row(7, "Ada", 36)).unwrap();
/// assert_cell(&grid, 0, "id", &Value::Int(7));
/// ```
pub fn assert_cell(grid: &Grid, row_index: usize, column: &str, expected: &Value) {
    let row = grid
        .rows()
        .get_row(row_index)
        .expect("get_row")
        .unwrap_or_else(|| panic!("row {row_index} does not exist"));
    let actual = row.value_or_null(column);
    assert_eq!(
        &actual, expected,
        "cell ({row_index}, {column}) mismatch: expected {expected:?}, got {actual:?}"
    );
}

/// Assert that an operation failed with an error whose display contains
/// `substring`.
pub fn assert_error_contains<T: std::fmt::Debug>(result: GridResult<T>, substring: &str) {
    match result {
        Ok(value) => panic!("expected an error containing '{substring}', got Ok({value:?})"),
        Err(err) => {
            let message = format!("{err}");
            assert!(
                message.contains(substring),
                "error '{message}' does not contain '{substring}'"
            );
        }
    }
}

/// Assert a result failed with the `NotFound` taxonomy entry.
pub fn assert_not_found<T: std::fmt::Debug>(result: GridResult<T>) {
    match result {
        Err(GridError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}

/// Assert the ordered values of one column across all rows.
pub fn assert_column_values(grid: &Grid, column: &str, expected: &[Value]) {
    let rows = grid.rows().get_all_rows().expect("get_all_rows");
    let actual: Vec<Value> = rows.iter().map(|r| r.value_or_null(column)).collect();
    assert_eq!(
        actual, expected,
        "column '{column}' values differ from the expected ordering"
    );
}
