//! Per-operation scopes: identity, cancellation, and outcome reporting.
//!
//! Every public facade operation runs inside an [`OperationScope`]. The
//! scope owns nothing the store owns; it carries the operation id, the
//! cooperative cancellation token, and a tracing span that records the
//! outcome when the scope ends.

use crate::{GridError, GridResult, OperationMode};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Periodic progress sink for long-running batch operations; receives
/// a completion fraction in `0.0..=1.0`.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Cooperative cancellation flag, checked at batch boundaries and other
/// suspension points. Cloning shares the flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Errors with `Cancelled` once the flag is set. Call this at the
    /// top of every batch loop.
    pub fn check(&self, operation: &str) -> GridResult<()> {
        if self.is_cancelled() {
            Err(GridError::Cancelled(format!("{operation} cancelled")))
        } else {
            Ok(())
        }
    }
}

/// Outcome recorded when a scope ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScopeOutcome {
    #[default]
    Success,
    Warning,
    Failure,
    Cancelled,
}

/// Context for one logical operation: id, start time, cancellation,
/// operation mode, and the tracing span the operation logs under.
#[derive(Debug)]
pub struct OperationScope {
    pub id: Uuid,
    pub name: &'static str,
    pub mode: OperationMode,
    started: Instant,
    cancel: CancelToken,
    outcome: ScopeOutcome,
    finished: bool,
}

impl OperationScope {
    pub fn new(name: &'static str, mode: OperationMode) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(operation = name, %id, "scope opened");
        Self {
            id,
            name,
            mode,
            started: Instant::now(),
            cancel: CancelToken::new(),
            outcome: ScopeOutcome::Success,
            finished: false,
        }
    }

    /// Share a caller-provided token instead of a fresh one, so the
    /// caller can cancel a long operation from another thread.
    pub fn with_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn check_cancelled(&self) -> GridResult<()> {
        self.cancel.check(self.name)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn set_outcome(&mut self, outcome: ScopeOutcome) {
        self.outcome = outcome;
    }

    /// Derive the outcome from a result, preserving an explicitly set
    /// Warning on success.
    pub fn record_result<T>(&mut self, result: &GridResult<T>) {
        match result {
            Ok(_) => {}
            Err(GridError::Cancelled(_)) => self.outcome = ScopeOutcome::Cancelled,
            Err(_) => self.outcome = ScopeOutcome::Failure,
        }
    }

    pub fn finish(mut self) {
        self.emit();
        self.finished = true;
    }

    fn emit(&self) {
        let elapsed_ms = self.elapsed().as_millis() as u64;
        match self.outcome {
            ScopeOutcome::Success => {
                tracing::debug!(operation = self.name, id = %self.id, elapsed_ms, "scope closed")
            }
            ScopeOutcome::Warning => {
                tracing::warn!(operation = self.name, id = %self.id, elapsed_ms, "scope closed with warning")
            }
            ScopeOutcome::Failure => {
                tracing::warn!(operation = self.name, id = %self.id, elapsed_ms, "scope failed")
            }
            ScopeOutcome::Cancelled => {
                tracing::info!(operation = self.name, id = %self.id, elapsed_ms, "scope cancelled")
            }
        }
    }
}

impl Drop for OperationScope {
    fn drop(&mut self) {
        if !self.finished {
            self.emit();
        }
    }
}
