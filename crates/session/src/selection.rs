//! Set-semantics selection over cells, rows, and columns.

use common::{GridError, GridResult, RowId};
use std::collections::HashSet;
use store::GridState;

/// A selected cell, addressed by stable row identity.
pub type CellRef = (RowId, String);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionMode {
    #[default]
    Replace,
    Add,
    Remove,
    Toggle,
}

/// Immutable snapshot of the current selection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    pub cells: HashSet<CellRef>,
    pub rows: HashSet<RowId>,
    pub columns: HashSet<String>,
}

impl Selection {
    /// Total selected units across the three sets.
    pub fn len(&self) -> usize {
        self.cells.len() + self.rows.len() + self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owns the live selection and applies bounded set mutations.
#[derive(Debug)]
pub struct SelectionManager {
    current: Selection,
    max_size: usize,
}

impl SelectionManager {
    pub fn new(max_size: usize) -> Self {
        Self {
            current: Selection::default(),
            max_size,
        }
    }

    /// Owned snapshot; later mutations do not affect it.
    pub fn snapshot(&self) -> Selection {
        self.current.clone()
    }

    pub fn clear(&mut self) {
        self.current = Selection::default();
    }

    /// Selected row ids in no particular order.
    pub fn selected_row_ids(&self) -> Vec<RowId> {
        self.current.rows.iter().copied().collect()
    }

    /// Any single selected row id, if one exists.
    pub fn selected_row_id(&self) -> Option<RowId> {
        self.current.rows.iter().next().copied()
    }

    pub fn select_cells(&mut self, cells: Vec<CellRef>, mode: SelectionMode) -> GridResult<()> {
        let next = apply(&self.current.cells, cells, mode);
        self.commit(Selection {
            cells: next,
            ..self.current.clone()
        })
    }

    pub fn select_rows(&mut self, rows: Vec<RowId>, mode: SelectionMode) -> GridResult<()> {
        let next = apply(&self.current.rows, rows, mode);
        self.commit(Selection {
            rows: next,
            ..self.current.clone()
        })
    }

    pub fn select_columns(&mut self, columns: Vec<String>, mode: SelectionMode) -> GridResult<()> {
        let next = apply(&self.current.columns, columns, mode);
        self.commit(Selection {
            columns: next,
            ..self.current.clone()
        })
    }

    /// Expand an inclusive index/column rectangle into a cell set and
    /// apply it. Bounds are validated against the current store state.
    pub fn select_range(
        &mut self,
        state: &GridState,
        start: (usize, &str),
        end: (usize, &str),
        mode: SelectionMode,
    ) -> GridResult<()> {
        let names = state.registry.names();
        let col_pos = |name: &str| -> GridResult<usize> {
            let canonical = state.registry.canonical_name(name)?;
            names
                .iter()
                .position(|n| n == &canonical)
                .ok_or_else(|| GridError::NotFound(format!("unknown column '{name}'")))
        };
        let (row_lo, row_hi) = (start.0.min(end.0), start.0.max(end.0));
        let (col_a, col_b) = (col_pos(start.1)?, col_pos(end.1)?);
        let (col_lo, col_hi) = (col_a.min(col_b), col_a.max(col_b));

        if row_hi >= state.store.row_count() {
            return Err(GridError::NotFound(format!(
                "row index {row_hi} out of range (len {})",
                state.store.row_count()
            )));
        }

        let mut cells = Vec::with_capacity((row_hi - row_lo + 1) * (col_hi - col_lo + 1));
        for row_index in row_lo..=row_hi {
            let id = state.store.id_at(row_index).ok_or_else(|| {
                GridError::Internal(format!("row index {row_index} lost its id"))
            })?;
            for name in &names[col_lo..=col_hi] {
                cells.push((id, name.clone()));
            }
        }
        self.select_cells(cells, mode)
    }

    /// Drop selection entries that reference removed rows.
    pub fn prune(&mut self, state: &GridState) {
        self.current
            .rows
            .retain(|id| state.store.index_of(*id).is_some());
        self.current
            .cells
            .retain(|(id, _)| state.store.index_of(*id).is_some());
    }

    fn commit(&mut self, next: Selection) -> GridResult<()> {
        if next.len() > self.max_size {
            return Err(GridError::InvalidInput(format!(
                "selection of {} exceeds max_selection_size {}",
                next.len(),
                self.max_size
            )));
        }
        self.current = next;
        Ok(())
    }
}

fn apply<T: std::hash::Hash + Eq + Clone>(
    current: &HashSet<T>,
    items: Vec<T>,
    mode: SelectionMode,
) -> HashSet<T> {
    match mode {
        SelectionMode::Replace => items.into_iter().collect(),
        SelectionMode::Add => {
            let mut next = current.clone();
            next.extend(items);
            next
        }
        SelectionMode::Remove => {
            let mut next = current.clone();
            for item in items {
                next.remove(&item);
            }
            next
        }
        SelectionMode::Toggle => {
            let mut next = current.clone();
            for item in items {
                if !next.remove(&item) {
                    next.insert(item);
                }
            }
            next
        }
    }
}
