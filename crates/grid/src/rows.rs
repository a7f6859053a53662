//! Row operations.

use crate::Grid;
use common::{Feature, GridError, GridResult, RefreshKind, Row, RowId, RowMap};
use store::RowBatches;
use types::Value;

/// Row feature module. Id-keyed operations are canonical; index-keyed
/// variants resolve under the same lock acquisition but race against
/// concurrent mutators renumbering indexes.
pub struct RowsApi<'a> {
    pub(crate) grid: &'a Grid,
}

impl RowsApi<'_> {
    pub fn add_row(&self, cells: RowMap) -> GridResult<usize> {
        self.grid
            .execute_mut("add_row", Feature::Rows, RefreshKind::Rows, |grid, _| {
                let index = grid.shared().write().add_row(cells)?;
                Ok((index, 1))
            })
    }

    /// Append a batch as one logical transaction.
    pub fn add_rows_batch<I>(&self, batch: I) -> GridResult<usize>
    where
        I: IntoIterator<Item = RowMap>,
    {
        self.grid.execute_mut(
            "add_rows_batch",
            Feature::Rows,
            RefreshKind::Rows,
            |grid, _| {
                let count = grid.shared().write().add_rows_batch(batch)?;
                Ok((count, count))
            },
        )
    }

    pub fn insert_row(&self, index: usize, cells: RowMap) -> GridResult<()> {
        self.grid
            .execute_mut("insert_row", Feature::Rows, RefreshKind::Rows, |grid, _| {
                grid.shared().write().insert_row(index, cells)?;
                Ok(((), 1))
            })
    }

    /// Merge the provided fields into the row with this id.
    pub fn update_row(&self, id: RowId, cells: RowMap) -> GridResult<()> {
        self.grid
            .execute_mut("update_row", Feature::Rows, RefreshKind::Rows, |grid, _| {
                grid.shared().write().update_row(id, cells)?;
                Ok(((), 1))
            })
    }

    pub fn update_row_at(&self, index: usize, cells: RowMap) -> GridResult<()> {
        self.grid.execute_mut(
            "update_row_at",
            Feature::Rows,
            RefreshKind::Rows,
            |grid, _| {
                grid.shared().write().update_row_at(index, cells)?;
                Ok(((), 1))
            },
        )
    }

    pub fn remove_row(&self, id: RowId) -> GridResult<()> {
        self.grid
            .execute_mut("remove_row", Feature::Rows, RefreshKind::Rows, |grid, _| {
                let mut state = grid.shared().write();
                state.remove_row(id)?;
                grid.selection().lock().prune(&state);
                Ok(((), 1))
            })
    }

    pub fn remove_row_at(&self, index: usize) -> GridResult<()> {
        self.grid.execute_mut(
            "remove_row_at",
            Feature::Rows,
            RefreshKind::Rows,
            |grid, _| {
                let mut state = grid.shared().write();
                state.remove_row_at(index)?;
                grid.selection().lock().prune(&state);
                Ok(((), 1))
            },
        )
    }

    /// Remove many rows by id; unknown ids are skipped. Returns the
    /// number removed.
    pub fn remove_rows(&self, ids: &[RowId]) -> GridResult<usize> {
        self.grid
            .execute_mut("remove_rows", Feature::Rows, RefreshKind::Rows, |grid, _| {
                let mut state = grid.shared().write();
                let removed = state.remove_rows(ids);
                grid.selection().lock().prune(&state);
                Ok((removed, removed))
            })
    }

    pub fn clear_all_rows(&self) -> GridResult<()> {
        self.grid.execute_mut(
            "clear_all_rows",
            Feature::Rows,
            RefreshKind::Full,
            |grid, _| {
                let mut state = grid.shared().write();
                let count = state.store.row_count();
                state.clear_all_rows();
                grid.selection().lock().prune(&state);
                Ok(((), count))
            },
        )
    }

    pub fn duplicate_row(&self, index: usize) -> GridResult<usize> {
        self.grid.execute_mut(
            "duplicate_row",
            Feature::Rows,
            RefreshKind::Rows,
            |grid, _| {
                let new_index = grid.shared().write().duplicate_row(index)?;
                Ok((new_index, 1))
            },
        )
    }

    /// Replace the whole row set, preserving ids for matching slots.
    pub fn replace_all_rows<I>(&self, rows: I) -> GridResult<usize>
    where
        I: IntoIterator<Item = RowMap>,
    {
        self.grid.execute_mut(
            "replace_all_rows",
            Feature::Rows,
            RefreshKind::Full,
            |grid, _| {
                let mut state = grid.shared().write();
                let count = state.replace_all_rows(rows)?;
                grid.selection().lock().prune(&state);
                Ok((count, count))
            },
        )
    }

    /// Owned snapshot of one row, or `None` past the end.
    pub fn get_row(&self, index: usize) -> GridResult<Option<Row>> {
        self.grid.execute("get_row", Feature::Rows, |grid, _| {
            Ok(grid.shared().read().store.get(index).cloned())
        })
    }

    /// Owned snapshot of every row.
    pub fn get_all_rows(&self) -> GridResult<Vec<Row>> {
        self.grid.execute("get_all_rows", Feature::Rows, |grid, _| {
            Ok(grid.shared().read().store.snapshot(false))
        })
    }

    pub fn get_row_count(&self) -> GridResult<usize> {
        self.grid.execute("get_row_count", Feature::Rows, |grid, _| {
            Ok(grid.shared().read().store.row_count())
        })
    }

    pub fn get_visible_row_count(&self) -> GridResult<usize> {
        self.grid
            .execute("get_visible_row_count", Feature::Rows, |grid, _| {
                Ok(grid.shared().read().store.visible_row_count())
            })
    }

    pub fn get_row_id_by_index(&self, index: usize) -> GridResult<RowId> {
        self.grid
            .execute("get_row_id_by_index", Feature::Rows, |grid, _| {
                grid.shared().read().store.id_at(index).ok_or_else(|| {
                    GridError::NotFound(format!("row index {index} out of range"))
                })
            })
    }

    pub fn get_row_index_by_id(&self, id: RowId) -> GridResult<usize> {
        self.grid
            .execute("get_row_index_by_id", Feature::Rows, |grid, _| {
                grid.shared()
                    .read()
                    .store
                    .index_of(id)
                    .ok_or_else(|| GridError::NotFound(format!("unknown row id {id}")))
            })
    }

    /// Write one cell. Runs real-time validation for the changed column
    /// when enabled.
    pub fn update_cell(&self, index: usize, column: &str, value: Value) -> GridResult<()> {
        self.grid
            .execute_mut("update_cell", Feature::Rows, RefreshKind::Rows, |grid, _| {
                // Lock order: rules before store state
                let rules = grid.rules().read();
                let mut state = grid.shared().write();
                state.update_cell(index, column, value)?;
                let schedule = validation::ValidationSchedule::decide(
                    validation::ValidationTrigger::CellEdit,
                    1,
                    1,
                    false,
                );
                if grid.options().enable_real_time_validation
                    && schedule == validation::ScheduleDecision::RealTime
                {
                    let changed = [column.to_string()];
                    validation::revalidate_row(&mut state, &rules, index, Some(&changed))?;
                }
                Ok(((), 1))
            })
    }

    /// Stream owned batches cut from a point-in-time snapshot.
    pub fn stream_rows(&self, only_filtered: bool, batch_size: usize) -> GridResult<RowBatches> {
        self.grid.execute("stream_rows", Feature::Rows, |grid, _| {
            RowBatches::new(&grid.shared().read(), only_filtered, batch_size)
        })
    }
}
