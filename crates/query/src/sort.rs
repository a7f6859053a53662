//! Sort: stable, multi-key ordering of row snapshots.

use common::Row;
use rayon::prelude::*;
use std::cmp::Ordering;

/// Rows above this count sort on the worker pool.
const PARALLEL_SORT_THRESHOLD: usize = 50_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One ORDER BY entry: column plus direction. Later keys break ties in
/// declared order.
#[derive(Clone, Debug)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Compare two rows under the sort keys.
///
/// Nulls order last ascending and first descending; everything else
/// follows `Value::compare`.
pub fn compare_rows(a: &Row, b: &Row, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let val_a = a.value_or_null(&key.column);
        let val_b = b.value_or_null(&key.column);
        let ascending = key.direction == SortDirection::Asc;

        let ordering = match (val_a.is_null(), val_b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => {
                // Null goes last ascending, first descending
                if ascending { Ordering::Greater } else { Ordering::Less }
            }
            (false, true) => {
                if ascending { Ordering::Less } else { Ordering::Greater }
            }
            (false, false) => {
                let ordering = val_a.compare(&val_b);
                if ascending { ordering } else { ordering.reverse() }
            }
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
        // Equal under this key: fall through to the next one
    }

    Ordering::Equal
}

/// Sort a snapshot in place. Stable: rows with equal keys keep their
/// relative order. Large snapshots sort on the worker pool.
pub fn sort_rows(rows: &mut [Row], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    if rows.len() > PARALLEL_SORT_THRESHOLD {
        rows.par_sort_by(|a, b| compare_rows(a, b, keys));
    } else {
        rows.sort_by(|a, b| compare_rows(a, b, keys));
    }
}

/// Compute the permutation that sorts `rows`, without moving them:
/// `perm[target] = source`. Feed the result to the store's
/// `apply_order` to sort the live sequence atomically.
pub fn sort_permutation(rows: &[Row], keys: &[SortKey]) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..rows.len()).collect();
    if keys.is_empty() {
        return perm;
    }
    if rows.len() > PARALLEL_SORT_THRESHOLD {
        perm.par_sort_by(|&a, &b| compare_rows(&rows[a], &rows[b], keys));
    } else {
        perm.sort_by(|&a, &b| compare_rows(&rows[a], &rows[b], keys));
    }
    perm
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{RowId, RowMap};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use types::Value;

    fn row(pairs: &[(&str, Value)]) -> Row {
        let mut cells = RowMap::new();
        for (k, v) in pairs {
            cells.insert((*k).into(), v.clone());
        }
        Row::from_cells(RowId::allocate(), cells)
    }

    fn ints(rows: &[Row], column: &str) -> Vec<Value> {
        rows.iter().map(|r| r.value_or_null(column)).collect()
    }

    #[test]
    fn single_key_ascending() {
        let mut rows = vec![
            row(&[("n", Value::Int(3))]),
            row(&[("n", Value::Int(1))]),
            row(&[("n", Value::Int(2))]),
        ];
        sort_rows(&mut rows, &[SortKey::asc("n")]);
        assert_eq!(
            ints(&rows, "n"),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }

    #[test]
    fn nulls_go_last_ascending_first_descending() {
        let mut rows = vec![
            row(&[("n", Value::Null)]),
            row(&[("n", Value::Int(2))]),
            row(&[("n", Value::Int(1))]),
        ];
        sort_rows(&mut rows, &[SortKey::asc("n")]);
        assert_eq!(
            ints(&rows, "n"),
            vec![Value::Int(1), Value::Int(2), Value::Null]
        );

        sort_rows(&mut rows, &[SortKey::desc("n")]);
        assert_eq!(
            ints(&rows, "n"),
            vec![Value::Null, Value::Int(2), Value::Int(1)]
        );
    }

    #[test]
    fn secondary_keys_break_ties_in_declared_order() {
        let mut rows = vec![
            row(&[("dept", Value::Text("Sales".into())), ("salary", Value::Int(80))]),
            row(&[("dept", Value::Text("Eng".into())), ("salary", Value::Int(100))]),
            row(&[("dept", Value::Text("Sales".into())), ("salary", Value::Int(90))]),
            row(&[("dept", Value::Text("Eng".into())), ("salary", Value::Int(120))]),
        ];
        sort_rows(
            &mut rows,
            &[SortKey::asc("dept"), SortKey::desc("salary")],
        );
        assert_eq!(
            ints(&rows, "salary"),
            vec![Value::Int(120), Value::Int(100), Value::Int(90), Value::Int(80)]
        );
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let mut rows: Vec<Row> = (0..6)
            .map(|i| row(&[("k", Value::Int(i % 2)), ("seq", Value::Int(i))]))
            .collect();
        sort_rows(&mut rows, &[SortKey::asc("k")]);
        // Within each key group the original sequence order survives
        assert_eq!(
            ints(&rows, "seq"),
            vec![
                Value::Int(0),
                Value::Int(2),
                Value::Int(4),
                Value::Int(1),
                Value::Int(3),
                Value::Int(5)
            ]
        );
    }

    #[test]
    fn permutation_matches_in_place_sort() {
        let rows = vec![
            row(&[("n", Value::Int(3))]),
            row(&[("n", Value::Null)]),
            row(&[("n", Value::Int(1))]),
        ];
        let perm = sort_permutation(&rows, &[SortKey::asc("n")]);
        assert_eq!(perm, vec![2, 0, 1]);
    }

    proptest! {
        // Sorting an already-sorted snapshot changes nothing
        #[test]
        fn sort_is_idempotent(values in prop::collection::vec(any::<i64>(), 0..50)) {
            let mut rows: Vec<Row> = values
                .iter()
                .map(|v| row(&[("n", Value::Int(*v))]))
                .collect();
            let keys = [SortKey::asc("n")];
            sort_rows(&mut rows, &keys);
            let once: Vec<Value> = ints(&rows, "n");
            sort_rows(&mut rows, &keys);
            prop_assert_eq!(once, ints(&rows, "n"));
        }

        // The permutation is always a bijection over the input
        #[test]
        fn permutation_is_a_bijection(values in prop::collection::vec(any::<i64>(), 0..50)) {
            let rows: Vec<Row> = values
                .iter()
                .map(|v| row(&[("n", Value::Int(*v))]))
                .collect();
            let mut perm = sort_permutation(&rows, &[SortKey::desc("n")]);
            perm.sort_unstable();
            prop_assert_eq!(perm, (0..rows.len()).collect::<Vec<_>>());
        }
    }
}
