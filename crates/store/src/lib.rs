//! Row store: the single source of truth for rows.
//!
//! [`RowStore`] maintains the ordered row sequence, the `RowId -> index`
//! map, per-row filter visibility, the alert table, and the generation
//! tag bulk mutations bump. [`GridState`] couples the store with the
//! column registry so schema changes and row shaping stay coherent under
//! one lock; [`SharedGrid`] is the concurrency wrapper the facade and
//! the batch pipelines share.

#[cfg(test)]
mod tests;

use ahash::RandomState;
use columns::{ColumnDef, ColumnRegistry, SchemaChange, WidthBounds};
use common::{AlertRecord, GridError, GridResult, Row, RowId, RowMap, is_reserved_field};
use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;
use std::sync::Arc;
use types::Value;

type Map<K, V> = HashMap<K, V, RandomState>;

/// Stored alerts for one row. `stale` flips on any row mutation and
/// clears when the row is re-evaluated.
#[derive(Clone, Debug, Default)]
pub struct RowAlerts {
    pub records: Vec<AlertRecord>,
    pub stale: bool,
}

#[derive(Clone, Debug)]
struct StoredRow {
    row: Row,
    visible: bool,
}

/// Ordered, indexed rows with stable identities and filter state.
#[derive(Debug, Default)]
pub struct RowStore {
    rows: Vec<StoredRow>,
    id_index: Map<RowId, usize>,
    alerts: Map<RowId, RowAlerts>,
    generation: u64,
}

impl RowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn visible_row_count(&self) -> usize {
        self.rows.iter().filter(|r| r.visible).count()
    }

    /// Monotonic version tag bumped by bulk mutations; streamers use it
    /// to detect snapshot staleness.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn bump_generation(&mut self) {
        self.generation += 1;
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index).map(|r| &r.row)
    }

    pub fn get_by_id(&self, id: RowId) -> Option<&Row> {
        self.index_of(id).and_then(|idx| self.get(idx))
    }

    pub fn index_of(&self, id: RowId) -> Option<usize> {
        self.id_index.get(&id).copied()
    }

    pub fn id_at(&self, index: usize) -> Option<RowId> {
        self.rows.get(index).map(|r| r.row.id)
    }

    pub fn is_visible(&self, index: usize) -> bool {
        self.rows.get(index).map(|r| r.visible).unwrap_or(false)
    }

    /// Append a shaped row. The caller guarantees schema coherence.
    pub(crate) fn push(&mut self, row: Row) -> usize {
        let index = self.rows.len();
        self.id_index.insert(row.id, index);
        self.rows.push(StoredRow { row, visible: true });
        index
    }

    pub(crate) fn insert_at(&mut self, index: usize, row: Row) -> GridResult<()> {
        if index > self.rows.len() {
            return Err(GridError::NotFound(format!(
                "row index {index} out of range (len {})",
                self.rows.len()
            )));
        }
        self.rows.insert(index, StoredRow { row, visible: true });
        self.reindex_from(index);
        Ok(())
    }

    pub(crate) fn remove_at(&mut self, index: usize) -> GridResult<Row> {
        if index >= self.rows.len() {
            return Err(GridError::NotFound(format!(
                "row index {index} out of range (len {})",
                self.rows.len()
            )));
        }
        let removed = self.rows.remove(index);
        self.id_index.remove(&removed.row.id);
        self.alerts.remove(&removed.row.id);
        self.reindex_from(index);
        Ok(removed.row)
    }

    /// Remove many rows in one pass; unknown ids are skipped. Returns
    /// the number actually removed.
    pub(crate) fn remove_many(&mut self, ids: &[RowId]) -> usize {
        let doomed: HashSet<RowId, RandomState> = ids.iter().copied().collect();
        let before = self.rows.len();
        self.rows.retain(|r| !doomed.contains(&r.row.id));
        for id in &doomed {
            self.id_index.remove(id);
            self.alerts.remove(id);
        }
        self.rebuild_index();
        before - self.rows.len()
    }

    pub(crate) fn clear(&mut self) {
        self.rows.clear();
        self.id_index.clear();
        self.alerts.clear();
        self.bump_generation();
    }

    /// Mutate one row's cells in place. Marks that row's alerts stale.
    pub(crate) fn with_row_mut<F, T>(&mut self, index: usize, f: F) -> GridResult<T>
    where
        F: FnOnce(&mut Row) -> T,
    {
        let stored = self.rows.get_mut(index).ok_or_else(|| {
            GridError::NotFound(format!("row index {index} out of range"))
        })?;
        let out = f(&mut stored.row);
        let id = stored.row.id;
        if let Some(alerts) = self.alerts.get_mut(&id) {
            alerts.stale = true;
        }
        Ok(out)
    }

    /// Write a cell without touching alert freshness. Used by alert
    /// surfacing, which writes rendered alerts into a designated column
    /// and must not mark those very alerts stale.
    pub fn set_cell_untracked(
        &mut self,
        index: usize,
        column: &str,
        value: Value,
    ) -> GridResult<()> {
        let stored = self.rows.get_mut(index).ok_or_else(|| {
            GridError::NotFound(format!("row index {index} out of range"))
        })?;
        stored.row.set(column, value);
        Ok(())
    }

    fn reindex_from(&mut self, start: usize) {
        for idx in start..self.rows.len() {
            self.id_index.insert(self.rows[idx].row.id, idx);
        }
    }

    fn rebuild_index(&mut self) {
        self.id_index.clear();
        for (idx, stored) in self.rows.iter().enumerate() {
            self.id_index.insert(stored.row.id, idx);
        }
    }

    /// Recompute per-row visibility from a predicate; returns the
    /// now-visible count. Filters hide rows, they never remove them.
    pub fn set_visibility<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&Row) -> bool,
    {
        let mut visible = 0;
        for stored in &mut self.rows {
            stored.visible = predicate(&stored.row);
            if stored.visible {
                visible += 1;
            }
        }
        visible
    }

    /// Restore every row to visible; returns the total count.
    pub fn clear_visibility(&mut self) -> usize {
        for stored in &mut self.rows {
            stored.visible = true;
        }
        self.rows.len()
    }

    /// Owned, point-in-time copy of the rows. Does not alias the store.
    pub fn snapshot(&self, only_filtered: bool) -> Vec<Row> {
        self.rows
            .iter()
            .filter(|r| !only_filtered || r.visible)
            .map(|r| r.row.clone())
            .collect()
    }

    /// Apply a sort permutation: `perm[target] = source`. Rebuilds the
    /// id index; visibility travels with each row.
    pub fn apply_order(&mut self, perm: &[usize]) -> GridResult<()> {
        if perm.len() != self.rows.len() {
            return Err(GridError::Internal(format!(
                "order permutation length {} does not match row count {}",
                perm.len(),
                self.rows.len()
            )));
        }
        let mut seen = vec![false; perm.len()];
        for &src in perm {
            if src >= perm.len() || seen[src] {
                return Err(GridError::Internal(
                    "order permutation is not a bijection".into(),
                ));
            }
            seen[src] = true;
        }
        let mut reordered = Vec::with_capacity(self.rows.len());
        let mut old = std::mem::take(&mut self.rows);
        // Take by index without disturbing the remaining slots
        let mut slots: Vec<Option<StoredRow>> = old.drain(..).map(Some).collect();
        for &src in perm {
            reordered.push(slots[src].take().expect("permutation checked above"));
        }
        self.rows = reordered;
        self.rebuild_index();
        Ok(())
    }

    // Alert table

    /// Replace the full alert set for a row.
    pub fn replace_row_alerts(&mut self, id: RowId, records: Vec<AlertRecord>) -> GridResult<()> {
        if !self.id_index.contains_key(&id) {
            return Err(GridError::NotFound(format!("unknown row id {id}")));
        }
        if records.is_empty() {
            self.alerts.remove(&id);
        } else {
            self.alerts.insert(
                id,
                RowAlerts {
                    records,
                    stale: false,
                },
            );
        }
        Ok(())
    }

    /// Merge outcomes for specific rules into a row's alert set: at most
    /// one record per (row, rule), newest wins; rules in `evaluated`
    /// with no record drop their previous alert.
    pub fn merge_row_alerts(
        &mut self,
        id: RowId,
        evaluated: &[String],
        records: Vec<AlertRecord>,
    ) -> GridResult<()> {
        if !self.id_index.contains_key(&id) {
            return Err(GridError::NotFound(format!("unknown row id {id}")));
        }
        let entry = self.alerts.entry(id).or_default();
        entry
            .records
            .retain(|a| !evaluated.contains(&a.rule_id));
        entry.records.extend(records);
        entry.stale = false;
        if entry.records.is_empty() {
            self.alerts.remove(&id);
        }
        Ok(())
    }

    pub fn alerts_for(&self, id: RowId) -> &[AlertRecord] {
        self.alerts
            .get(&id)
            .map(|a| a.records.as_slice())
            .unwrap_or(&[])
    }

    pub fn alerts_stale(&self, id: RowId) -> bool {
        self.alerts.get(&id).map(|a| a.stale).unwrap_or(false)
    }

    pub fn mark_alerts_stale(&mut self, id: RowId) {
        if let Some(alerts) = self.alerts.get_mut(&id) {
            alerts.stale = true;
        }
    }

    pub fn row_has_errors(&self, id: RowId) -> bool {
        self.alerts_for(id)
            .iter()
            .any(|a| a.severity == common::Severity::Error)
    }

    /// Drop every alert produced by one rule (rule removed or replaced).
    pub fn remove_rule_alerts(&mut self, rule_id: &str) {
        let mut emptied = Vec::new();
        for (id, alerts) in self.alerts.iter_mut() {
            alerts.records.retain(|a| a.rule_id != rule_id);
            if alerts.records.is_empty() {
                emptied.push(*id);
            }
        }
        for id in emptied {
            self.alerts.remove(&id);
        }
    }

    pub fn clear_alerts(&mut self) {
        self.alerts.clear();
    }

    /// Ids of rows that currently hold any alert.
    pub fn rows_with_alerts(&self) -> Vec<RowId> {
        self.alerts.keys().copied().collect()
    }
}

/// How unknown incoming cell keys are treated when shaping a row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapePolicy {
    /// Unknown or reserved keys fail with `InvalidInput`.
    Strict,
    /// Reserved keys are discarded, unknown keys are dropped. Used by
    /// import, which resolves schema expansion before shaping.
    Lenient,
}

/// Row store plus column registry behind one lock domain.
#[derive(Debug, Default)]
pub struct GridState {
    pub store: RowStore,
    pub registry: ColumnRegistry,
}

/// The shared handle: single writer, many readers.
pub type SharedGrid = Arc<RwLock<GridState>>;

pub fn shared(state: GridState) -> SharedGrid {
    Arc::new(RwLock::new(state))
}

impl GridState {
    pub fn new(bounds: WidthBounds) -> Self {
        Self {
            store: RowStore::new(),
            registry: ColumnRegistry::new(bounds),
        }
    }

    /// Shape incoming cells to the schema: policy-checked keys, canonical
    /// column names, and defaults filled for every missing column.
    fn shape_cells(&self, cells: RowMap, policy: ShapePolicy) -> GridResult<RowMap> {
        let mut shaped = RowMap::with_capacity(self.registry.len());
        for (key, value) in cells {
            if is_reserved_field(&key) {
                match policy {
                    ShapePolicy::Strict => {
                        return Err(GridError::InvalidInput(format!(
                            "field '{key}' is reserved"
                        )));
                    }
                    ShapePolicy::Lenient => continue,
                }
            }
            match self.registry.canonical_name(&key) {
                Ok(name) => {
                    shaped.insert(name, value);
                }
                Err(_) if policy == ShapePolicy::Lenient => continue,
                Err(err) => return Err(err),
            }
        }
        for def in self.registry.definitions() {
            shaped
                .entry(def.name.clone())
                .or_insert_with(|| def.default_value.clone());
        }
        Ok(shaped)
    }

    fn shaped_row(&self, cells: RowMap, policy: ShapePolicy) -> GridResult<Row> {
        let shaped = self.shape_cells(cells, policy)?;
        Ok(Row::from_cells(RowId::allocate(), shaped))
    }

    // Row commands

    /// Append a row; returns its index.
    pub fn add_row(&mut self, cells: RowMap) -> GridResult<usize> {
        let row = self.shaped_row(cells, ShapePolicy::Strict)?;
        Ok(self.store.push(row))
    }

    /// Append a row from import data (reserved keys discarded).
    pub fn add_row_lenient(&mut self, cells: RowMap) -> GridResult<usize> {
        let row = self.shaped_row(cells, ShapePolicy::Lenient)?;
        Ok(self.store.push(row))
    }

    /// Append a batch as one logical transaction: every row is shaped
    /// and validated before the first one is appended.
    pub fn add_rows_batch<I>(&mut self, batch: I) -> GridResult<usize>
    where
        I: IntoIterator<Item = RowMap>,
    {
        let mut shaped = Vec::new();
        for cells in batch {
            shaped.push(self.shaped_row(cells, ShapePolicy::Strict)?);
        }
        let count = shaped.len();
        for row in shaped {
            self.store.push(row);
        }
        Ok(count)
    }

    pub fn insert_row(&mut self, index: usize, cells: RowMap) -> GridResult<()> {
        let row = self.shaped_row(cells, ShapePolicy::Strict)?;
        self.store.insert_at(index, row)
    }

    /// Merge the provided non-reserved fields into the row at `index`.
    pub fn update_row_at(&mut self, index: usize, cells: RowMap) -> GridResult<()> {
        let shaped = self.update_payload(cells)?;
        self.store.with_row_mut(index, |row| {
            for (key, value) in shaped {
                row.set(key, value);
            }
        })
    }

    pub fn update_row(&mut self, id: RowId, cells: RowMap) -> GridResult<()> {
        let index = self
            .store
            .index_of(id)
            .ok_or_else(|| GridError::NotFound(format!("unknown row id {id}")))?;
        self.update_row_at(index, cells)
    }

    /// Canonicalized update payload: reserved fields rejected, unknown
    /// columns rejected, keys mapped to canonical names.
    fn update_payload(&self, cells: RowMap) -> GridResult<Vec<(String, Value)>> {
        let mut shaped = Vec::with_capacity(cells.len());
        for (key, value) in cells {
            if is_reserved_field(&key) {
                return Err(GridError::InvalidInput(format!("field '{key}' is reserved")));
            }
            shaped.push((self.registry.canonical_name(&key)?, value));
        }
        Ok(shaped)
    }

    pub fn update_cell(&mut self, index: usize, column: &str, value: Value) -> GridResult<()> {
        if is_reserved_field(column) {
            return Err(GridError::InvalidInput(format!(
                "field '{column}' is reserved"
            )));
        }
        let name = self.registry.canonical_name(column)?;
        self.store.with_row_mut(index, |row| row.set(name, value))
    }

    pub fn remove_row_at(&mut self, index: usize) -> GridResult<()> {
        self.store.remove_at(index).map(|_| ())
    }

    pub fn remove_row(&mut self, id: RowId) -> GridResult<()> {
        let index = self
            .store
            .index_of(id)
            .ok_or_else(|| GridError::NotFound(format!("unknown row id {id}")))?;
        self.store.remove_at(index).map(|_| ())
    }

    pub fn remove_rows(&mut self, ids: &[RowId]) -> usize {
        self.store.remove_many(ids)
    }

    /// Atomic reset; allocates a new generation tag.
    pub fn clear_all_rows(&mut self) {
        self.store.clear();
    }

    /// Clone a row with a fresh id, inserted right after the source.
    /// Alerts are not copied.
    pub fn duplicate_row(&mut self, index: usize) -> GridResult<usize> {
        let source = self
            .store
            .get(index)
            .ok_or_else(|| GridError::NotFound(format!("row index {index} out of range")))?;
        let copy = Row::from_cells(RowId::allocate(), source.to_map());
        self.store.insert_at(index + 1, copy)?;
        Ok(index + 1)
    }

    /// Replace the whole row set, preserving the id of any row whose
    /// position still exists. Bumps the generation.
    pub fn replace_all_rows<I>(&mut self, rows: I) -> GridResult<usize>
    where
        I: IntoIterator<Item = RowMap>,
    {
        let previous_ids: Vec<RowId> = (0..self.store.row_count())
            .filter_map(|i| self.store.id_at(i))
            .collect();
        let mut shaped = Vec::new();
        for (slot, cells) in rows.into_iter().enumerate() {
            let payload = self.shape_cells(cells, ShapePolicy::Lenient)?;
            let id = previous_ids
                .get(slot)
                .copied()
                .unwrap_or_else(RowId::allocate);
            shaped.push(Row::from_cells(id, payload));
        }
        self.store.clear();
        let count = shaped.len();
        for row in shaped {
            self.store.push(row);
        }
        Ok(count)
    }

    // Column commands, propagated to every row

    pub fn add_column(&mut self, def: ColumnDef) -> GridResult<()> {
        let change = self.registry.add_column(def)?;
        self.apply_schema_change(&change);
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> GridResult<()> {
        let change = self.registry.remove_column(name)?;
        self.apply_schema_change(&change);
        Ok(())
    }

    pub fn update_column(&mut self, def: ColumnDef) -> GridResult<()> {
        let change = self.registry.update_column(def)?;
        self.apply_schema_change(&change);
        Ok(())
    }

    pub fn reorder_columns(&mut self, new_order: &[String]) -> GridResult<()> {
        // Rows key cells by name, so only the registry order changes.
        self.registry.reorder_columns(new_order).map(|_| ())
    }

    fn apply_schema_change(&mut self, change: &SchemaChange) {
        match change {
            SchemaChange::Added { name, default } => {
                for idx in 0..self.store.row_count() {
                    let default = default.clone();
                    let name = name.clone();
                    let _ = self.store.with_row_mut(idx, |row| {
                        if row.get(&name).is_none() {
                            row.set(name.clone(), default);
                        }
                    });
                }
                self.store.bump_generation();
            }
            SchemaChange::Removed { name } => {
                for idx in 0..self.store.row_count() {
                    let name = name.clone();
                    let _ = self.store.with_row_mut(idx, |row| {
                        row.remove_cell(&name);
                    });
                }
                self.store.bump_generation();
            }
            SchemaChange::Replaced { name, default } => {
                // Fill the new default anywhere the key is missing.
                for idx in 0..self.store.row_count() {
                    let default = default.clone();
                    let name = name.clone();
                    let _ = self.store.with_row_mut(idx, |row| {
                        if row.get(&name).is_none() {
                            row.set(name.clone(), default);
                        }
                    });
                }
            }
            SchemaChange::Reordered { .. } => {}
        }
    }

    /// Serialize each row's current alerts into its reserved alerts
    /// field representation, returned as (id, rendered) pairs.
    pub fn rendered_alerts(&self) -> Vec<(RowId, String)> {
        self.store
            .rows_with_alerts()
            .into_iter()
            .map(|id| {
                let rendered = self
                    .store
                    .alerts_for(id)
                    .iter()
                    .map(AlertRecord::render)
                    .collect::<Vec<_>>()
                    .join("; ");
                (id, rendered)
            })
            .collect()
    }
}

/// Lazy, finite, non-restartable sequence of owned row batches over a
/// point-in-time snapshot. The snapshot is taken when the stream is
/// created; later store mutations are never observed.
pub struct RowBatches {
    rows: std::vec::IntoIter<Row>,
    batch_size: usize,
    generation: u64,
}

impl RowBatches {
    pub fn new(state: &GridState, only_filtered: bool, batch_size: usize) -> GridResult<Self> {
        if batch_size == 0 {
            return Err(GridError::InvalidInput("batch_size must be positive".into()));
        }
        Ok(Self {
            rows: state.store.snapshot(only_filtered).into_iter(),
            batch_size,
            generation: state.store.generation(),
        })
    }

    /// Generation tag of the snapshot this stream was cut from.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Iterator for RowBatches {
    type Item = Vec<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<Row> = self.rows.by_ref().take(self.batch_size).collect();
        if batch.is_empty() { None } else { Some(batch) }
    }
}
