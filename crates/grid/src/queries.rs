//! Sort/filter/search dispatch.

use crate::Grid;
use common::{Feature, GridResult, RefreshKind};
use query::{
    FilterClause, FilterOperator, SearchReport, SearchRequest, SearchScope, SortDirection,
    SortKey,
};
use types::Value;

pub struct QueryApi<'a> {
    pub(crate) grid: &'a Grid,
}

impl QueryApi<'_> {
    /// Sort the store by one column. Stable; ties keep their current
    /// relative order.
    pub fn sort(&self, column: &str, direction: SortDirection) -> GridResult<()> {
        self.multi_sort(vec![SortKey {
            column: column.to_string(),
            direction,
        }])
    }

    /// Sort by several keys; later keys break ties in declared order.
    pub fn multi_sort(&self, keys: Vec<SortKey>) -> GridResult<()> {
        self.grid
            .execute_mut("multi_sort", Feature::Sort, RefreshKind::Rows, |grid, _| {
                let mut state = grid.shared().write();
                for key in &keys {
                    // Fail on unknown columns before any mutation
                    state.registry.canonical_name(&key.column)?;
                }
                let snapshot = state.store.snapshot(false);
                let perm = query::sort_permutation(&snapshot, &keys);
                state.store.apply_order(&perm)?;
                let affected = snapshot.len();
                Ok(((), affected))
            })
    }

    /// Add a filter clause to the active conjunction; returns the
    /// now-visible row count.
    pub fn apply_filter(
        &self,
        column: &str,
        op: FilterOperator,
        operand: Value,
    ) -> GridResult<usize> {
        self.grid
            .execute_mut("apply_filter", Feature::Filter, RefreshKind::Filter, |grid, _| {
                let mut state = grid.shared().write();
                let visible = grid.filters().lock().apply_filter(
                    &mut state,
                    FilterClause::new(column, op, operand),
                )?;
                Ok((visible, visible))
            })
    }

    /// Drop every clause; returns the total row count.
    pub fn clear_filters(&self) -> GridResult<usize> {
        self.grid
            .execute_mut("clear_filters", Feature::Filter, RefreshKind::Filter, |grid, _| {
                let mut state = grid.shared().write();
                let total = grid.filters().lock().clear_filters(&mut state);
                Ok((total, total))
            })
    }

    /// Plain contains-text search over all data.
    pub fn search(&self, text: &str) -> GridResult<SearchReport> {
        self.advanced_search(SearchRequest::simple(text))
    }

    /// Search with full mode/scope/ranking control. The selected-data
    /// scope reads the current selection snapshot.
    pub fn advanced_search(&self, request: SearchRequest) -> GridResult<SearchReport> {
        self.grid.execute("search", Feature::Search, |grid, _| {
            let state = grid.shared().read();
            let selected = if request.scope == SearchScope::SelectedData {
                Some(grid.selection().lock().snapshot().rows)
            } else {
                None
            };
            query::search(&state, selected.as_ref(), &request)
        })
    }
}
