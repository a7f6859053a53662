use super::*;
use columns::ColumnDef;
use common::Severity;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use types::CellType;

fn sample_state() -> GridState {
    let mut state = GridState::default();
    state
        .add_column(ColumnDef::new("id", CellType::Int))
        .unwrap();
    state
        .add_column(ColumnDef::new("name", CellType::Text))
        .unwrap();
    state
        .add_column(ColumnDef::new("age", CellType::Int))
        .unwrap();
    state
}

fn person(id: i64, name: &str, age: i64) -> RowMap {
    let mut cells = RowMap::new();
    cells.insert("id".into(), Value::Int(id));
    cells.insert("name".into(), Value::Text(name.into()));
    cells.insert("age".into(), Value::Int(age));
    cells
}

fn alert(rule_id: &str, severity: Severity) -> AlertRecord {
    AlertRecord {
        rule_id: rule_id.into(),
        rule_name: rule_id.into(),
        severity,
        message: format!("{rule_id} failed"),
        column: None,
        error_code: None,
    }
}

#[test]
fn add_and_get_round_trip() {
    let mut state = sample_state();
    let idx = state.add_row(person(1, "Ada", 36)).unwrap();

    assert_eq!(idx, 0);
    assert_eq!(state.store.row_count(), 1);

    let row = state.store.get(0).unwrap();
    assert_eq!(row.get("name"), Some(&Value::Text("Ada".into())));
    // Bidirectional id/index mapping
    let id = state.store.id_at(0).unwrap();
    assert_eq!(state.store.index_of(id), Some(0));
}

#[test]
fn missing_columns_backfill_with_defaults() {
    let mut state = sample_state();
    let mut cells = RowMap::new();
    cells.insert("id".into(), Value::Int(7));
    state.add_row(cells).unwrap();

    let row = state.store.get(0).unwrap();
    assert_eq!(row.get("name"), Some(&Value::Null));
    assert_eq!(row.get("age"), Some(&Value::Null));
}

#[test]
fn reserved_fields_are_rejected_strictly() {
    let mut state = sample_state();
    let mut cells = person(1, "Ada", 36);
    cells.insert("__rowId".into(), Value::Text("forged".into()));

    let err = state.add_row(cells).unwrap_err();
    assert!(matches!(err, GridError::InvalidInput(_)));
    assert_eq!(state.store.row_count(), 0);
}

#[test]
fn lenient_shaping_discards_reserved_and_unknown() {
    let mut state = sample_state();
    let mut cells = person(1, "Ada", 36);
    cells.insert("__rowId".into(), Value::Text("forged".into()));
    cells.insert("mystery".into(), Value::Int(5));

    let idx = state.add_row_lenient(cells).unwrap();
    let row = state.store.get(idx).unwrap();
    assert_eq!(row.get("__rowId"), None);
    assert_eq!(row.get("mystery"), None);
    assert_eq!(row.get("id"), Some(&Value::Int(1)));
}

#[test]
fn unknown_columns_fail_strict_shaping() {
    let mut state = sample_state();
    let mut cells = person(1, "Ada", 36);
    cells.insert("mystery".into(), Value::Int(5));

    let err = state.add_row(cells).unwrap_err();
    assert!(matches!(err, GridError::NotFound(_)));
}

#[test]
fn batch_add_is_all_or_nothing() {
    let mut state = sample_state();
    let mut bad = person(2, "Bob", 30);
    bad.insert("__validationAlerts".into(), Value::Text("x".into()));

    let err = state
        .add_rows_batch(vec![person(1, "Ada", 36), bad])
        .unwrap_err();
    assert!(matches!(err, GridError::InvalidInput(_)));
    // Nothing partially applied
    assert_eq!(state.store.row_count(), 0);

    let count = state
        .add_rows_batch(vec![person(1, "Ada", 36), person(2, "Bob", 30)])
        .unwrap();
    assert_eq!(count, 2);
    assert_eq!(state.store.row_count(), 2);
}

#[test]
fn remove_compacts_and_shifts_indexes() {
    let mut state = sample_state();
    for i in 0..50 {
        state.add_row(person(i, "p", 20)).unwrap();
    }
    let removed_id = state.store.id_at(0).unwrap();
    let shifted: Vec<RowId> = (1..50).map(|i| state.store.id_at(i).unwrap()).collect();

    state.remove_row_at(0).unwrap();

    assert_eq!(state.store.row_count(), 49);
    assert_eq!(state.store.index_of(removed_id), None);
    for (new_index, id) in shifted.iter().enumerate() {
        assert_eq!(state.store.index_of(*id), Some(new_index));
    }
}

#[test]
fn remove_by_unknown_id_reports_not_found() {
    let mut state = sample_state();
    state.add_row(person(1, "Ada", 36)).unwrap();
    let err = state.remove_row(RowId::allocate()).unwrap_err();
    assert!(matches!(err, GridError::NotFound(_)));
    assert_eq!(state.store.row_count(), 1);
}

#[test]
fn remove_many_skips_unknown_ids() {
    let mut state = sample_state();
    for i in 0..5 {
        state.add_row(person(i, "p", 20)).unwrap();
    }
    let keep = state.store.id_at(0).unwrap();
    let doomed = vec![
        state.store.id_at(1).unwrap(),
        state.store.id_at(3).unwrap(),
        RowId::allocate(),
    ];

    assert_eq!(state.remove_rows(&doomed), 2);
    assert_eq!(state.store.row_count(), 3);
    assert_eq!(state.store.index_of(keep), Some(0));
}

#[test]
fn update_preserves_identity_and_marks_alerts_stale() {
    let mut state = sample_state();
    state.add_row(person(1, "Ada", 36)).unwrap();
    let id = state.store.id_at(0).unwrap();
    state
        .store
        .replace_row_alerts(id, vec![alert("r1", Severity::Error)])
        .unwrap();

    let mut cells = RowMap::new();
    cells.insert("age".into(), Value::Int(37));
    state.update_row(id, cells).unwrap();

    let row = state.store.get(0).unwrap();
    assert_eq!(row.id, id);
    assert_eq!(row.get("age"), Some(&Value::Int(37)));
    // Untouched fields survive a partial update
    assert_eq!(row.get("name"), Some(&Value::Text("Ada".into())));
    assert!(state.store.alerts_stale(id));
}

#[test]
fn clear_bumps_generation() {
    let mut state = sample_state();
    state.add_row(person(1, "Ada", 36)).unwrap();
    let generation = state.store.generation();

    state.clear_all_rows();

    assert_eq!(state.store.row_count(), 0);
    assert!(state.store.generation() > generation);
}

#[test]
fn duplicate_row_gets_fresh_id_and_no_alerts() {
    let mut state = sample_state();
    state.add_row(person(1, "Ada", 36)).unwrap();
    let source_id = state.store.id_at(0).unwrap();
    state
        .store
        .replace_row_alerts(source_id, vec![alert("r1", Severity::Warning)])
        .unwrap();

    let new_index = state.duplicate_row(0).unwrap();

    assert_eq!(new_index, 1);
    let copy = state.store.get(1).unwrap();
    assert_ne!(copy.id, source_id);
    assert_eq!(copy.get("name"), Some(&Value::Text("Ada".into())));
    assert!(state.store.alerts_for(copy.id).is_empty());
}

#[test]
fn replace_all_preserves_matching_slots() {
    let mut state = sample_state();
    state.add_row(person(1, "Ada", 36)).unwrap();
    state.add_row(person(2, "Bob", 30)).unwrap();
    let first = state.store.id_at(0).unwrap();
    let second = state.store.id_at(1).unwrap();

    state
        .replace_all_rows(vec![
            person(10, "Ada2", 37),
            person(20, "Bob2", 31),
            person(30, "Eve", 28),
        ])
        .unwrap();

    assert_eq!(state.store.row_count(), 3);
    assert_eq!(state.store.id_at(0), Some(first));
    assert_eq!(state.store.id_at(1), Some(second));
    // The extra slot allocates a fresh id
    let third = state.store.id_at(2).unwrap();
    assert_ne!(third, first);
    assert_ne!(third, second);
}

#[test]
fn column_add_backfills_and_remove_drops_key() {
    let mut state = sample_state();
    state.add_row(person(1, "Ada", 36)).unwrap();

    state
        .add_column(ColumnDef::new("score", CellType::Float).with_default(Value::Float(0.0)))
        .unwrap();
    assert_eq!(
        state.store.get(0).unwrap().get("score"),
        Some(&Value::Float(0.0))
    );

    state.remove_column("score").unwrap();
    assert_eq!(state.store.get(0).unwrap().get("score"), None);
}

#[test]
fn visibility_hides_without_removing() {
    let mut state = sample_state();
    for i in 0..10 {
        state.add_row(person(i, "p", 20)).unwrap();
    }

    let visible = state.store.set_visibility(|row| {
        matches!(row.get("id"), Some(Value::Int(i)) if *i >= 5)
    });
    assert_eq!(visible, 5);
    assert_eq!(state.store.visible_row_count(), 5);
    assert_eq!(state.store.row_count(), 10);

    assert_eq!(state.store.clear_visibility(), 10);
    assert_eq!(state.store.visible_row_count(), 10);
}

#[test]
fn stream_rows_snapshots_at_creation() {
    let mut state = sample_state();
    for i in 0..25 {
        state.add_row(person(i, "p", 20)).unwrap();
    }

    let mut stream = RowBatches::new(&state, false, 10).unwrap();
    // Mutations after the stream is cut are not observed
    state.clear_all_rows();

    let mut total = 0;
    let mut batches = 0;
    while let Some(batch) = stream.next() {
        total += batch.len();
        batches += 1;
        assert!(batch.len() <= 10);
    }
    assert_eq!(total, 25);
    assert_eq!(batches, 3);
}

#[test]
fn stream_rejects_zero_batch_size() {
    let state = sample_state();
    assert!(matches!(
        RowBatches::new(&state, false, 0),
        Err(GridError::InvalidInput(_))
    ));
}

#[test]
fn apply_order_reorders_and_reindexes() {
    let mut state = sample_state();
    for i in 0..3 {
        state.add_row(person(i, "p", 20)).unwrap();
    }
    let ids: Vec<RowId> = (0..3).map(|i| state.store.id_at(i).unwrap()).collect();

    state.store.apply_order(&[2, 0, 1]).unwrap();

    assert_eq!(state.store.id_at(0), Some(ids[2]));
    assert_eq!(state.store.id_at(1), Some(ids[0]));
    assert_eq!(state.store.id_at(2), Some(ids[1]));
    for (pos, id) in [ids[2], ids[0], ids[1]].iter().enumerate() {
        assert_eq!(state.store.index_of(*id), Some(pos));
    }

    // Bad permutations are rejected wholesale
    assert!(state.store.apply_order(&[0, 0, 1]).is_err());
    assert!(state.store.apply_order(&[0, 1]).is_err());
}

#[test]
fn alert_merge_keeps_one_record_per_rule() {
    let mut state = sample_state();
    state.add_row(person(1, "Ada", 36)).unwrap();
    let id = state.store.id_at(0).unwrap();

    state
        .store
        .merge_row_alerts(
            id,
            &["r1".into(), "r2".into()],
            vec![alert("r1", Severity::Error), alert("r2", Severity::Warning)],
        )
        .unwrap();
    assert_eq!(state.store.alerts_for(id).len(), 2);
    assert!(state.store.row_has_errors(id));

    // Re-evaluating r1 as passing drops its record and keeps r2's
    state
        .store
        .merge_row_alerts(id, &["r1".into()], vec![])
        .unwrap();
    let remaining = state.store.alerts_for(id);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].rule_id, "r2");
    assert!(!state.store.row_has_errors(id));
}

#[test]
fn rule_alert_removal_spans_rows() {
    let mut state = sample_state();
    state.add_row(person(1, "Ada", 36)).unwrap();
    state.add_row(person(2, "Bob", 30)).unwrap();
    let a = state.store.id_at(0).unwrap();
    let b = state.store.id_at(1).unwrap();
    state
        .store
        .replace_row_alerts(a, vec![alert("r1", Severity::Error)])
        .unwrap();
    state
        .store
        .replace_row_alerts(b, vec![alert("r1", Severity::Error), alert("r2", Severity::Info)])
        .unwrap();

    state.store.remove_rule_alerts("r1");

    assert!(state.store.alerts_for(a).is_empty());
    assert_eq!(state.store.alerts_for(b).len(), 1);
}

#[test]
fn rendered_alerts_join_with_semicolons() {
    let mut state = sample_state();
    state.add_row(person(1, "Ada", 36)).unwrap();
    let id = state.store.id_at(0).unwrap();
    state
        .store
        .replace_row_alerts(
            id,
            vec![alert("r1", Severity::Error), alert("r2", Severity::Warning)],
        )
        .unwrap();

    let rendered = state.rendered_alerts();
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].0, id);
    assert_eq!(rendered[0].1, "Error: r1 failed; Warning: r2 failed");
}

proptest! {
    // Row count always equals added minus removed, and surviving ids
    // keep resolving.
    #[test]
    fn count_tracks_adds_and_removes(ops in prop::collection::vec(any::<bool>(), 1..60)) {
        let mut state = sample_state();
        let mut live: Vec<RowId> = Vec::new();
        let mut added = 0usize;
        let mut removed = 0usize;

        for (step, add) in ops.into_iter().enumerate() {
            if add || live.is_empty() {
                state.add_row(person(step as i64, "p", 20)).unwrap();
                live.push(state.store.id_at(state.store.row_count() - 1).unwrap());
                added += 1;
            } else {
                let id = live.remove(step % live.len());
                state.remove_row(id).unwrap();
                removed += 1;
            }
        }

        prop_assert_eq!(state.store.row_count(), added - removed);
        for id in &live {
            let idx = state.store.index_of(*id);
            prop_assert!(idx.is_some());
            prop_assert_eq!(state.store.id_at(idx.unwrap()), Some(*id));
        }
    }

    // get_row_index_by_id(get_row_id_by_index(i)) == i
    #[test]
    fn id_index_round_trip(count in 1usize..40) {
        let mut state = sample_state();
        for i in 0..count {
            state.add_row(person(i as i64, "p", 20)).unwrap();
        }
        for i in 0..count {
            let id = state.store.id_at(i).unwrap();
            prop_assert_eq!(state.store.index_of(id), Some(i));
        }
    }
}
