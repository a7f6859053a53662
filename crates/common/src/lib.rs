
pub mod pretty;
pub mod scope;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use types::Value;
use uuid::Uuid;

/// Reserved per-row field carrying the stable row identity.
pub const ROW_ID_FIELD: &str = "__rowId";
/// Reserved per-row field carrying serialized validation alerts.
pub const ALERTS_FIELD: &str = "__validationAlerts";

/// Returns true for field names the engine owns. Incoming data for these
/// keys is discarded and replaced; they are never user-facing columns.
pub fn is_reserved_field(name: &str) -> bool {
    name == ROW_ID_FIELD || name == ALERTS_FIELD
}

/// Stable opaque identifier assigned at row creation. Never reused;
/// survives sort, filter, and index renumbering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowId(Uuid);

impl RowId {
    pub fn allocate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text).ok().map(Self)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Named-cell mapping used on the import/export boundary.
pub type RowMap = HashMap<String, Value>;

/// A row: a stable identity plus named, nullable cells.
///
/// Cells are keyed by the column's canonical name. Reserved fields are
/// not stored in `cells`; the identity lives in `id` and serialized
/// alerts are materialized on demand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    cells: RowMap,
}

impl Row {
    pub fn new(id: RowId) -> Self {
        Self {
            id,
            cells: RowMap::new(),
        }
    }

    /// Build a row from incoming data, discarding reserved fields.
    pub fn from_cells(id: RowId, cells: RowMap) -> Self {
        let cells = cells
            .into_iter()
            .filter(|(name, _)| !is_reserved_field(name))
            .collect();
        Self { id, cells }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells.get(column)
    }

    /// Cell value with Null standing in for a missing key.
    pub fn value_or_null(&self, column: &str) -> Value {
        self.cells.get(column).cloned().unwrap_or(Value::Null)
    }

    /// Sets a cell. Reserved fields are rejected by the store before
    /// this is reached; the row itself just stores what it is given.
    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.cells.insert(column.into(), value);
    }

    pub fn remove_cell(&mut self, column: &str) -> Option<Value> {
        self.cells.remove(column)
    }

    pub fn cells(&self) -> &RowMap {
        &self.cells
    }

    /// True when every cell is null or blank text.
    pub fn is_empty(&self) -> bool {
        self.cells.values().all(Value::is_empty)
    }

    /// Owned snapshot of the non-reserved cells.
    pub fn to_map(&self) -> RowMap {
        self.cells.clone()
    }
}

/// Rectangular interchange shape: column labels plus positional rows.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TableShape {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl TableShape {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Canonical error type shared across the engine subsystems.
#[derive(Error, Debug)]
pub enum GridError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("feature disabled: {0}")]
    FeatureDisabled(String),
    #[error("lifecycle: {0}")]
    Lifecycle(String),
    #[error("cancelled: {0}")]
    Cancelled(String),
    #[error("internal: {0}")]
    Internal(String),
}

/// Result alias that carries a `GridError`.
pub type GridResult<T> = Result<T, GridError>;

/// Severity of a validation outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "Info"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Error => write!(f, "Error"),
        }
    }
}

/// A stored per-(row, rule) validation outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub message: String,
    /// Column the failure points at, when the rule names one.
    pub column: Option<String>,
    pub error_code: Option<String>,
}

impl AlertRecord {
    /// Serialized form surfaced through the alerts column.
    pub fn render(&self) -> String {
        format!("{}: {}", self.severity, self.message)
    }
}

/// Controls whether mutating operations post UI refresh notifications.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationMode {
    Interactive,
    #[default]
    Headless,
}

/// Feature tags gating facade operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    Rows,
    Columns,
    Import,
    Export,
    Validation,
    Sort,
    Filter,
    Search,
    Selection,
    Edit,
}

impl Feature {
    pub fn all() -> HashSet<Feature> {
        use Feature::*;
        [
            Rows, Columns, Import, Export, Validation, Sort, Filter, Search, Selection, Edit,
        ]
        .into_iter()
        .collect()
    }
}

/// What a UI adapter should refresh after a mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshKind {
    Rows,
    Schema,
    Alerts,
    Filter,
    Selection,
    Full,
}

/// UI refresh hook. Interactive-mode mutations post through this;
/// headless wiring uses [`NoopNotifier`]. Implementations are expected
/// to coalesce bursts on their own dispatcher.
pub trait UiNotifier: Send + Sync {
    fn notify(&self, kind: RefreshKind, affected: usize);
}

/// The headless notifier: drops every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

impl UiNotifier for NoopNotifier {
    fn notify(&self, _kind: RefreshKind, _affected: usize) {}
}

/// Engine configuration.
///
/// # Example
/// ```
/// use common::{GridOptions, OperationMode};
///
/// let options = GridOptions::builder()
///     .operation_mode(OperationMode::Headless)
///     .batch_size(10_000)
///     .enable_parallel_processing(true)
///     .build();
/// assert!(options.validate().is_ok());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct GridOptions {
    #[builder(default = OperationMode::Headless)]
    pub operation_mode: OperationMode,
    /// Rows per validation batch.
    #[builder(default = 2000)]
    pub batch_size: usize,
    /// Rows per export batch.
    #[builder(default = 10_000)]
    pub export_batch_size: usize,
    #[builder(default = true)]
    pub enable_parallel_processing: bool,
    #[builder(default = 4)]
    pub degree_of_parallelism: usize,
    /// Row count above which batch work fans out to worker threads.
    #[builder(default = 10_000)]
    pub parallel_processing_threshold: usize,
    #[builder(default = true)]
    pub enable_real_time_validation: bool,
    #[builder(default = true)]
    pub enable_batch_validation: bool,
    #[builder(default = true)]
    pub enable_validation_alerts_column: bool,
    #[builder(default = 40.0)]
    pub min_column_width: f64,
    #[builder(default = 600.0)]
    pub max_column_width: f64,
    #[builder(default = 1_000_000)]
    pub max_selection_size: usize,
    #[builder(default = Feature::all())]
    pub enabled_features: HashSet<Feature>,
}

impl GridOptions {
    /// Boundary checks for the numeric knobs.
    pub fn validate(&self) -> GridResult<()> {
        if self.batch_size == 0 {
            return Err(GridError::InvalidInput("batch_size must be positive".into()));
        }
        if self.export_batch_size == 0 {
            return Err(GridError::InvalidInput(
                "export_batch_size must be positive".into(),
            ));
        }
        if self.degree_of_parallelism == 0 {
            return Err(GridError::InvalidInput(
                "degree_of_parallelism must be positive".into(),
            ));
        }
        if self.parallel_processing_threshold == 0 {
            return Err(GridError::InvalidInput(
                "parallel_processing_threshold must be positive".into(),
            ));
        }
        if self.max_selection_size == 0 {
            return Err(GridError::InvalidInput(
                "max_selection_size must be positive".into(),
            ));
        }
        if self.min_column_width > self.max_column_width {
            return Err(GridError::InvalidInput(format!(
                "min_column_width {} exceeds max_column_width {}",
                self.min_column_width, self.max_column_width
            )));
        }
        Ok(())
    }
}

impl Default for GridOptions {
    fn default() -> Self {
        GridOptions::builder().build()
    }
}

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::scope::{CancelToken, OperationScope, ProgressFn, ScopeOutcome};
    pub use crate::{
        AlertRecord, Feature, GridError, GridOptions, GridResult, OperationMode, RefreshKind, Row,
        RowId, RowMap, Severity, TableShape, UiNotifier,
    };
    pub use types::{CellType, Value};
}
