//! Column schema operations.

use crate::Grid;
use columns::ColumnDef;
use common::{Feature, GridResult, RefreshKind};

pub struct ColumnsApi<'a> {
    pub(crate) grid: &'a Grid,
}

impl ColumnsApi<'_> {
    /// Add a column and back-fill every row with its default.
    pub fn add_column(&self, def: ColumnDef) -> GridResult<()> {
        self.grid.execute_mut(
            "add_column",
            Feature::Columns,
            RefreshKind::Schema,
            |grid, _| {
                let mut state = grid.shared().write();
                state.add_column(def)?;
                let affected = state.store.row_count();
                Ok(((), affected))
            },
        )
    }

    /// Remove a column and drop its key from every row.
    pub fn remove_column(&self, name: &str) -> GridResult<()> {
        self.grid.execute_mut(
            "remove_column",
            Feature::Columns,
            RefreshKind::Schema,
            |grid, _| {
                let mut state = grid.shared().write();
                state.remove_column(name)?;
                let affected = state.store.row_count();
                Ok(((), affected))
            },
        )
    }

    /// Replace a definition in place (remove+add semantics under one
    /// scope).
    pub fn update_column(&self, def: ColumnDef) -> GridResult<()> {
        self.grid.execute_mut(
            "update_column",
            Feature::Columns,
            RefreshKind::Schema,
            |grid, _| {
                grid.shared().write().update_column(def)?;
                Ok(((), 0))
            },
        )
    }

    pub fn get_column(&self, name: &str) -> GridResult<ColumnDef> {
        self.grid.execute("get_column", Feature::Columns, |grid, _| {
            grid.shared().read().registry.get(name).cloned()
        })
    }

    pub fn get_column_definitions(&self) -> GridResult<Vec<ColumnDef>> {
        self.grid
            .execute("get_column_definitions", Feature::Columns, |grid, _| {
                Ok(grid.shared().read().registry.definitions().to_vec())
            })
    }

    /// Reorder to a permutation of the current names.
    pub fn reorder_columns(&self, new_order: &[String]) -> GridResult<()> {
        self.grid.execute_mut(
            "reorder_columns",
            Feature::Columns,
            RefreshKind::Schema,
            |grid, _| {
                grid.shared().write().reorder_columns(new_order)?;
                Ok(((), 0))
            },
        )
    }

    /// Clamp to the configured width bounds; returns the applied width.
    pub fn resize_column(&self, index: usize, width: f64) -> GridResult<f64> {
        self.grid.execute_mut(
            "resize_column",
            Feature::Columns,
            RefreshKind::Schema,
            |grid, _| {
                let applied = grid.shared().write().registry.resize_column(index, width)?;
                Ok((applied, 0))
            },
        )
    }

    pub fn get_column_width(&self, index: usize) -> GridResult<f64> {
        self.grid
            .execute("get_column_width", Feature::Columns, |grid, _| {
                grid.shared().read().registry.column_width(index)
            })
    }
}
