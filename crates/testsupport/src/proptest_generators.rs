//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data for
//! property-based testing of core engine types.

use common::{RowMap, TableShape};
use proptest::prelude::*;
use types::Value;

/// Strategy for generating random `Value` instances.
///
/// Generates a mix of Int, Float, Text, Bool, and Null values.
pub fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        (-1.0e9f64..1.0e9).prop_map(Value::Float),
        "[a-z]{1,20}".prop_map(Value::Text),
        any::<bool>().prop_map(Value::Bool),
        Just(Value::Null),
    ]
}

/// Strategy for generating a row map over the given column names.
///
/// # Example
///
/// ```
/// use proptest::prelude::*;
/// use testsupport::proptest_generators::arb_row_map;
///
/// proptest! {
///     #[test]
///     fn rows_cover_every_column(row in arb_row_map(&["a", "b"])) {
///         assert_eq!(row.len(), 2);
///     }
/// }
/// ```
pub fn arb_row_map(columns: &[&str]) -> impl Strategy<Value = RowMap> {
    let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    prop::collection::vec(arb_value(), columns.len()).prop_map(move |values| {
        columns
            .iter()
            .cloned()
            .zip(values)
            .collect()
    })
}

/// Strategy for generating a rectangular `TableShape` with 1-6 columns
/// and up to `max_rows` rows.
pub fn arb_table_shape(max_rows: usize) -> impl Strategy<Value = TableShape> {
    (1usize..=6).prop_flat_map(move |width| {
        let columns: Vec<String> = (0..width).map(|c| format!("c{c}")).collect();
        prop::collection::vec(prop::collection::vec(arb_value(), width), 0..=max_rows)
            .prop_map(move |rows| TableShape {
                columns: columns.clone(),
                rows,
            })
    })
}
