//! Single-slot cell edit lifecycle: Idle -> Active -> Idle.

use common::{GridError, GridResult, RowId};
use std::time::Instant;
use store::GridState;
use types::Value;
use uuid::Uuid;

/// One in-flight cell edit.
#[derive(Clone, Debug)]
pub struct EditSession {
    pub session_id: Uuid,
    pub row_id: RowId,
    pub column: String,
    pub original_value: Value,
    pub current_value: Value,
    pub started_at: Instant,
}

/// Holds at most one active session per grid instance.
#[derive(Debug, Default)]
pub struct EditManager {
    active: Option<EditSession>,
}

impl EditManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&EditSession> {
        self.active.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Start editing one cell. Fails with `Conflict` while another
    /// session is active.
    pub fn begin_edit(
        &mut self,
        state: &GridState,
        row_index: usize,
        column: &str,
    ) -> GridResult<&EditSession> {
        if let Some(active) = &self.active {
            return Err(GridError::Conflict(format!(
                "edit session {} already active on column '{}'",
                active.session_id, active.column
            )));
        }
        let canonical = state.registry.canonical_name(column)?;
        let row = state.store.get(row_index).ok_or_else(|| {
            GridError::NotFound(format!("row index {row_index} out of range"))
        })?;
        let original = row.value_or_null(&canonical);

        self.active = Some(EditSession {
            session_id: Uuid::new_v4(),
            row_id: row.id,
            column: canonical,
            original_value: original.clone(),
            current_value: original,
            started_at: Instant::now(),
        });
        Ok(self.active.as_ref().expect("just set"))
    }

    /// Write through to the store; the session tracks the last write.
    /// Returns the edited (row index, column) so the caller can trigger
    /// real-time validation.
    pub fn update_cell(
        &mut self,
        state: &mut GridState,
        value: Value,
    ) -> GridResult<(usize, String)> {
        let session = self
            .active
            .as_mut()
            .ok_or_else(|| GridError::Conflict("no active edit session".into()))?;
        let index = state
            .store
            .index_of(session.row_id)
            .ok_or_else(|| GridError::NotFound(format!("unknown row id {}", session.row_id)))?;
        state.update_cell(index, &session.column, value.clone())?;
        session.current_value = value;
        Ok((index, session.column.clone()))
    }

    /// Keep the store state and return to Idle.
    pub fn commit_edit(&mut self) -> GridResult<EditSession> {
        self.active
            .take()
            .ok_or_else(|| GridError::Conflict("no active edit session".into()))
    }

    /// Restore the original value and return to Idle. The restore is
    /// skipped when the row has been removed in the meantime.
    pub fn cancel_edit(&mut self, state: &mut GridState) -> GridResult<EditSession> {
        let session = self
            .active
            .take()
            .ok_or_else(|| GridError::Conflict("no active edit session".into()))?;
        if let Some(index) = state.store.index_of(session.row_id) {
            state.update_cell(index, &session.column, session.original_value.clone())?;
        }
        Ok(session)
    }
}
