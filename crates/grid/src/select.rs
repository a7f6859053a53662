//! Selection and edit-session dispatch.

use crate::Grid;
use common::{Feature, GridResult, RefreshKind, RowId};
use session::{CellRef, EditSession, Selection, SelectionMode};
use types::Value;

pub struct SessionApi<'a> {
    pub(crate) grid: &'a Grid,
}

impl SessionApi<'_> {
    // Selection

    pub fn select_cells(&self, cells: Vec<CellRef>, mode: SelectionMode) -> GridResult<()> {
        self.grid.execute_mut(
            "select_cells",
            Feature::Selection,
            RefreshKind::Selection,
            |grid, _| {
                grid.selection().lock().select_cells(cells, mode)?;
                Ok(((), 0))
            },
        )
    }

    pub fn select_rows(&self, rows: Vec<RowId>, mode: SelectionMode) -> GridResult<()> {
        self.grid.execute_mut(
            "select_rows",
            Feature::Selection,
            RefreshKind::Selection,
            |grid, _| {
                grid.selection().lock().select_rows(rows, mode)?;
                Ok(((), 0))
            },
        )
    }

    pub fn select_columns(&self, columns: Vec<String>, mode: SelectionMode) -> GridResult<()> {
        self.grid.execute_mut(
            "select_columns",
            Feature::Selection,
            RefreshKind::Selection,
            |grid, _| {
                grid.selection().lock().select_columns(columns, mode)?;
                Ok(((), 0))
            },
        )
    }

    /// Expand an inclusive (row index, column) rectangle to a cell set.
    pub fn select_range(
        &self,
        start: (usize, &str),
        end: (usize, &str),
        mode: SelectionMode,
    ) -> GridResult<()> {
        self.grid.execute_mut(
            "select_range",
            Feature::Selection,
            RefreshKind::Selection,
            |grid, _| {
                let state = grid.shared().read();
                grid.selection()
                    .lock()
                    .select_range(&state, start, end, mode)?;
                Ok(((), 0))
            },
        )
    }

    pub fn clear_selection(&self) -> GridResult<()> {
        self.grid.execute_mut(
            "clear_selection",
            Feature::Selection,
            RefreshKind::Selection,
            |grid, _| {
                grid.selection().lock().clear();
                Ok(((), 0))
            },
        )
    }

    /// Immutable snapshot of the current selection.
    pub fn get_selection(&self) -> GridResult<Selection> {
        self.grid.execute("get_selection", Feature::Selection, |grid, _| {
            Ok(grid.selection().lock().snapshot())
        })
    }

    pub fn get_selected_row_ids(&self) -> GridResult<Vec<RowId>> {
        self.grid
            .execute("get_selected_row_ids", Feature::Selection, |grid, _| {
                Ok(grid.selection().lock().selected_row_ids())
            })
    }

    pub fn get_selected_row_id(&self) -> GridResult<Option<RowId>> {
        self.grid
            .execute("get_selected_row_id", Feature::Selection, |grid, _| {
                Ok(grid.selection().lock().selected_row_id())
            })
    }

    // Edit session

    /// Start editing one cell; fails with `Conflict` while a session is
    /// active.
    pub fn begin_edit(&self, row_index: usize, column: &str) -> GridResult<EditSession> {
        self.grid.execute("begin_edit", Feature::Edit, |grid, _| {
            let state = grid.shared().read();
            grid.edit()
                .lock()
                .begin_edit(&state, row_index, column)
                .map(|session| session.clone())
        })
    }

    /// Write through the active session. Real-time validation runs for
    /// the edited column when enabled.
    pub fn update_cell(&self, value: Value) -> GridResult<()> {
        self.grid
            .execute_mut("edit_update_cell", Feature::Edit, RefreshKind::Rows, |grid, _| {
                // Lock order: rules before store state
                let rules = grid.rules().read();
                let mut state = grid.shared().write();
                let (index, column) = grid.edit().lock().update_cell(&mut state, value)?;
                let schedule = validation::ValidationSchedule::decide(
                    validation::ValidationTrigger::CellEdit,
                    1,
                    1,
                    false,
                );
                if grid.options().enable_real_time_validation
                    && schedule == validation::ScheduleDecision::RealTime
                {
                    let changed = [column];
                    validation::revalidate_row(&mut state, &rules, index, Some(&changed))?;
                }
                Ok(((), 1))
            })
    }

    /// Keep the edited value and end the session.
    pub fn commit_edit(&self) -> GridResult<EditSession> {
        self.grid
            .execute_mut("commit_edit", Feature::Edit, RefreshKind::Rows, |grid, _| {
                let session = grid.edit().lock().commit_edit()?;
                Ok((session, 1))
            })
    }

    /// Restore the original value and end the session.
    pub fn cancel_edit(&self) -> GridResult<EditSession> {
        self.grid
            .execute_mut("cancel_edit", Feature::Edit, RefreshKind::Rows, |grid, _| {
                let mut state = grid.shared().write();
                let session = grid.edit().lock().cancel_edit(&mut state)?;
                Ok((session, 1))
            })
    }
}
