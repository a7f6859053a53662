//! Validation subsystem: rule registry, row and batch evaluation, and
//! alert bookkeeping.
//!
//! Rules are first-class function values registered against the columns
//! they depend on. Row edits evaluate only the rules whose dependent
//! columns intersect the change; batch validation walks the store in
//! configurable batches, fanning out to worker threads past the
//! configured threshold. Evaluation failures become alert records in the
//! store's alert table; a crashing or overrunning rule never aborts a
//! batch.

mod batch;
mod evaluate;
mod rule;
mod schedule;

pub use batch::{
    BatchRequest, ValidationStatistics, are_all_non_empty_rows_valid, refresh_alerts_column,
    stored_alerts, validate_all,
};
pub use evaluate::{evaluate_row, revalidate_row, run_rule};
pub use rule::{
    Failure, GroupOperator, Rule, RuleContext, RuleGroup, RuleOutcome, RuleRegistry,
};
pub use schedule::{ScheduleDecision, ValidationSchedule, ValidationTrigger};
