//! Integration tests for row identity and lifecycle bookkeeping.

use anyhow::Result;
use proptest::prelude::*;
use testsupport::prelude::*;
use types::Value;

#[test]
fn remove_then_read_shifts_every_survivor() -> Result<()> {
    let grid = grid_fixture();
    for i in 0..50 {
        grid.rows().add_row(person_row(i, "p", 20))?;
    }
    let removed = grid.rows().get_row_id_by_index(0)?;
    let survivors: Vec<_> = (1..50)
        .map(|i| grid.rows().get_row_id_by_index(i).unwrap())
        .collect();

    grid.rows().remove_row_at(0)?;

    assert_row_count(&grid, 49);
    assert_not_found(grid.rows().get_row_index_by_id(removed));
    for (old_index, id) in survivors.iter().enumerate().map(|(i, id)| (i + 1, id)) {
        assert_eq!(grid.rows().get_row_index_by_id(*id)?, old_index - 1);
    }
    Ok(())
}

#[test]
fn id_and_index_stay_bidirectional() -> Result<()> {
    let grid = grid_fixture();
    for i in 0..20 {
        grid.rows().add_row(person_row(i, "p", 20))?;
    }
    for i in 0..20 {
        let id = grid.rows().get_row_id_by_index(i)?;
        assert_eq!(grid.rows().get_row_index_by_id(id)?, i);
    }
    Ok(())
}

#[test]
fn duplicate_sits_after_its_source_with_a_new_id() -> Result<()> {
    let grid = grid_fixture();
    grid.rows().add_row(person_row(1, "Ada", 36))?;
    grid.rows().add_row(person_row(2, "Bob", 30))?;
    let source = grid.rows().get_row_id_by_index(0)?;

    let new_index = grid.rows().duplicate_row(0)?;
    assert_eq!(new_index, 1);
    assert_row_count(&grid, 3);

    let copy_id = grid.rows().get_row_id_by_index(1)?;
    assert_ne!(copy_id, source);
    assert_cell(&grid, 1, "name", &Value::Text("Ada".into()));
    assert_cell(&grid, 2, "name", &Value::Text("Bob".into()));
    Ok(())
}

#[test]
fn insert_shifts_the_tail() -> Result<()> {
    let grid = grid_fixture();
    grid.rows().add_row(person_row(1, "first", 1))?;
    grid.rows().add_row(person_row(3, "third", 3))?;

    grid.rows().insert_row(1, person_row(2, "second", 2))?;

    assert_column_values(
        &grid,
        "id",
        &[Value::Int(1), Value::Int(2), Value::Int(3)],
    );
    Ok(())
}

#[test]
fn update_by_id_survives_reordering() -> Result<()> {
    let grid = grid_fixture();
    grid.rows().add_row(person_row(2, "Bob", 30))?;
    grid.rows().add_row(person_row(1, "Ada", 36))?;
    let ada = grid.rows().get_row_id_by_index(1)?;

    grid.query().sort("id", query::SortDirection::Asc)?;
    // Ada moved to index 0; her id still addresses her
    grid.rows().update_row(ada, cell("age", Value::Int(37)))?;
    assert_cell(&grid, 0, "age", &Value::Int(37));
    Ok(())
}

#[test]
fn selection_never_outlives_removed_rows() -> Result<()> {
    use session::SelectionMode;

    let grid = grid_fixture();
    for i in 0..3 {
        grid.rows().add_row(person_row(i, "p", 20))?;
    }
    let first = grid.rows().get_row_id_by_index(0)?;
    let second = grid.rows().get_row_id_by_index(1)?;
    grid.session()
        .select_rows(vec![first, second], SelectionMode::Replace)?;
    grid.session()
        .select_cells(vec![(first, "name".into())], SelectionMode::Replace)?;

    grid.rows().remove_row(first)?;

    // The removed id is gone from both the store and the selection
    assert_not_found(grid.rows().get_row_index_by_id(first));
    let selected = grid.session().get_selected_row_ids()?;
    assert_eq!(selected, vec![second]);
    assert!(grid.session().get_selection()?.cells.is_empty());

    grid.rows().clear_all_rows()?;
    assert!(grid.session().get_selected_row_ids()?.is_empty());
    Ok(())
}

#[test]
fn clear_resets_and_streams_see_the_old_snapshot() -> Result<()> {
    let grid = grid_fixture();
    for i in 0..25 {
        grid.rows().add_row(person_row(i, "p", 20))?;
    }

    let stream = grid.rows().stream_rows(false, 10)?;
    grid.rows().clear_all_rows()?;
    assert_row_count(&grid, 0);

    // The stream was cut before the clear and still yields 25 rows
    let total: usize = stream.map(|batch| batch.len()).sum();
    assert_eq!(total, 25);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // Universal invariant: count equals added minus removed, surviving
    // ids keep resolving.
    #[test]
    fn facade_count_tracks_adds_and_removes(ops in prop::collection::vec(any::<bool>(), 1..40)) {
        let grid = grid_fixture();
        let mut live: Vec<common::RowId> = Vec::new();
        let mut added = 0usize;
        let mut removed = 0usize;

        for (step, add) in ops.into_iter().enumerate() {
            if add || live.is_empty() {
                grid.rows().add_row(person_row(step as i64, "p", 20)).unwrap();
                let index = grid.rows().get_row_count().unwrap() - 1;
                live.push(grid.rows().get_row_id_by_index(index).unwrap());
                added += 1;
            } else {
                let id = live.remove(step % live.len());
                grid.rows().remove_row(id).unwrap();
                removed += 1;
            }
        }

        prop_assert_eq!(grid.rows().get_row_count().unwrap(), added - removed);
        for id in live {
            prop_assert!(grid.rows().get_row_index_by_id(id).is_ok());
        }
    }
}
