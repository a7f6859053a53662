//! Advisory scheduling: pick a validation mode for a change.

/// What caused the change being validated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationTrigger {
    CellEdit,
    RowEdit,
    Paste,
    Import,
}

/// How the change should be validated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// Evaluate synchronously before returning to the caller.
    RealTime,
    /// Defer into the next batch pass and report once.
    Deferred,
}

/// Deterministic mode picker. The decision is advisory; callers may
/// override it.
#[derive(Clone, Copy, Debug, Default)]
pub struct ValidationSchedule;

impl ValidationSchedule {
    /// Largest change still validated synchronously.
    pub const REALTIME_MAX_ROWS: usize = 5;
    pub const REALTIME_MAX_COLUMNS: usize = 2;

    /// Bulk triggers and large or in-flight edits defer; small settled
    /// edits validate in real time.
    pub fn decide(
        trigger: ValidationTrigger,
        affected_rows: usize,
        affected_columns: usize,
        is_typing: bool,
    ) -> ScheduleDecision {
        match trigger {
            ValidationTrigger::Import | ValidationTrigger::Paste => ScheduleDecision::Deferred,
            ValidationTrigger::CellEdit | ValidationTrigger::RowEdit => {
                if is_typing
                    || affected_rows > Self::REALTIME_MAX_ROWS
                    || affected_columns > Self::REALTIME_MAX_COLUMNS
                {
                    ScheduleDecision::Deferred
                } else {
                    ScheduleDecision::RealTime
                }
            }
        }
    }
}
