//! Grid facade: thin dispatch over the engine subsystems.
//!
//! [`Grid`] owns the shared store/registry state, the rule registry,
//! the filter engine, and the selection/edit managers. Feature
//! sub-interfaces ([`RowsApi`], [`ColumnsApi`], [`IoApi`],
//! [`ValidationApi`], [`QueryApi`], [`SessionApi`]) borrow the facade;
//! every operation checks lifecycle and feature gates, runs inside a
//! fresh [`OperationScope`], and posts a UI refresh notification in
//! interactive mode.
//!
//! # Example
//!
//! ```
//! use grid::Grid;
//! use columns::ColumnDef;
//! use common::{GridOptions, RowMap};
//! use types::{CellType, Value};
//!
//! let grid = Grid::new(GridOptions::default()).unwrap();
//! grid.columns().add_column(ColumnDef::new("n", CellType::Int)).unwrap();
//!
//! let mut cells = RowMap::new();
//! cells.insert("n".into(), Value::Int(7));
//! grid.rows().add_row(cells).unwrap();
//! assert_eq!(grid.rows().get_row_count().unwrap(), 1);
//! ```

mod cols;
mod io;
mod queries;
mod rows;
mod select;
mod validate;

pub use cols::ColumnsApi;
pub use io::IoApi;
pub use queries::QueryApi;
pub use rows::RowsApi;
pub use select::SessionApi;
pub use validate::ValidationApi;

use common::scope::{OperationScope, ScopeOutcome};
use common::{
    Feature, GridError, GridOptions, GridResult, NoopNotifier, RefreshKind, UiNotifier,
};
use parking_lot::{Mutex, RwLock};
use query::FilterEngine;
use session::{EditManager, SelectionManager};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use store::{GridState, SharedGrid};
use validation::RuleRegistry;

/// The engine facade. One instance owns one grid.
pub struct Grid {
    shared: SharedGrid,
    rules: RwLock<RuleRegistry>,
    filters: Mutex<FilterEngine>,
    selection: Mutex<SelectionManager>,
    edit: Mutex<EditManager>,
    options: GridOptions,
    notifier: Arc<dyn UiNotifier>,
    disposed: AtomicBool,
}

impl Grid {
    /// Headless construction with a no-op notifier.
    pub fn new(options: GridOptions) -> GridResult<Self> {
        Self::with_notifier(options, Arc::new(NoopNotifier))
    }

    /// Construction with a UI adapter. The notifier only fires for
    /// mutating operations in interactive mode.
    pub fn with_notifier(
        options: GridOptions,
        notifier: Arc<dyn UiNotifier>,
    ) -> GridResult<Self> {
        options.validate()?;
        let bounds = columns::WidthBounds {
            min: options.min_column_width,
            max: options.max_column_width,
        };
        let max_selection = options.max_selection_size;
        Ok(Self {
            shared: store::shared(GridState::new(bounds)),
            rules: RwLock::new(RuleRegistry::new()),
            filters: Mutex::new(FilterEngine::new()),
            selection: Mutex::new(SelectionManager::new(max_selection)),
            edit: Mutex::new(EditManager::new()),
            options,
            notifier,
            disposed: AtomicBool::new(false),
        })
    }

    pub fn options(&self) -> &GridOptions {
        &self.options
    }

    /// Tear down the facade. Every later operation, including a second
    /// dispose, fails with a lifecycle error.
    pub fn dispose(&self) -> GridResult<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Err(GridError::Lifecycle("grid already disposed".into()));
        }
        tracing::debug!("grid disposed");
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    // Feature sub-interfaces

    pub fn rows(&self) -> RowsApi<'_> {
        RowsApi { grid: self }
    }

    pub fn columns(&self) -> ColumnsApi<'_> {
        ColumnsApi { grid: self }
    }

    pub fn io(&self) -> IoApi<'_> {
        IoApi { grid: self }
    }

    pub fn validation(&self) -> ValidationApi<'_> {
        ValidationApi { grid: self }
    }

    pub fn query(&self) -> QueryApi<'_> {
        QueryApi { grid: self }
    }

    pub fn session(&self) -> SessionApi<'_> {
        SessionApi { grid: self }
    }

    // Dispatch plumbing shared by the feature modules

    pub(crate) fn begin(
        &self,
        name: &'static str,
        feature: Feature,
    ) -> GridResult<OperationScope> {
        if self.is_disposed() {
            return Err(GridError::Lifecycle(format!(
                "'{name}' called on a disposed grid"
            )));
        }
        if !self.options.enabled_features.contains(&feature) {
            return Err(GridError::FeatureDisabled(format!(
                "'{name}' requires the {feature:?} feature"
            )));
        }
        Ok(OperationScope::new(name, self.options.operation_mode))
    }

    /// Run a read-style operation under a scope.
    pub(crate) fn execute<T>(
        &self,
        name: &'static str,
        feature: Feature,
        f: impl FnOnce(&Grid, &mut OperationScope) -> GridResult<T>,
    ) -> GridResult<T> {
        let mut scope = self.begin(name, feature)?;
        let result = f(self, &mut scope);
        scope.record_result(&result);
        scope.finish();
        result
    }

    /// Run a mutating operation under a scope, posting `kind` to the UI
    /// adapter on success in interactive mode.
    pub(crate) fn execute_mut<T>(
        &self,
        name: &'static str,
        feature: Feature,
        kind: RefreshKind,
        f: impl FnOnce(&Grid, &mut OperationScope) -> GridResult<(T, usize)>,
    ) -> GridResult<T> {
        let mut scope = self.begin(name, feature)?;
        let result = f(self, &mut scope);
        scope.record_result(&result);
        match result {
            Ok((value, affected)) => {
                self.notify(&scope, kind, affected);
                scope.finish();
                Ok(value)
            }
            Err(err) => {
                // Failures notify too, so interactive adapters can
                // surface them without polling.
                self.notify(&scope, RefreshKind::Full, 0);
                scope.finish();
                Err(err)
            }
        }
    }

    pub(crate) fn notify(&self, scope: &OperationScope, kind: RefreshKind, affected: usize) {
        if scope.mode == common::OperationMode::Interactive {
            self.notifier.notify(kind, affected);
        }
    }

    pub(crate) fn shared(&self) -> &SharedGrid {
        &self.shared
    }

    pub(crate) fn rules(&self) -> &RwLock<RuleRegistry> {
        &self.rules
    }

    pub(crate) fn filters(&self) -> &Mutex<FilterEngine> {
        &self.filters
    }

    pub(crate) fn selection(&self) -> &Mutex<SelectionManager> {
        &self.selection
    }

    pub(crate) fn edit(&self) -> &Mutex<EditManager> {
        &self.edit
    }

    /// Mark a scope as warning-level without failing the operation.
    pub(crate) fn warn_scope(scope: &mut OperationScope, message: &str) {
        tracing::warn!(operation = scope.name, message);
        scope.set_outcome(ScopeOutcome::Warning);
    }
}

impl std::fmt::Debug for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grid")
            .field("disposed", &self.is_disposed())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
