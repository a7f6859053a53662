//! Import: batched ingestion of table shapes and row mappings.

use columns::ColumnDef;
use common::scope::{CancelToken, ProgressFn};
use common::{GridResult, ROW_ID_FIELD, RowId, RowMap, TableShape, is_reserved_field};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use store::SharedGrid;
use types::{CellType, Value};

/// The two accepted input shapes.
#[derive(Clone, Debug)]
pub enum ImportSource {
    Table(TableShape),
    Mappings(Vec<RowMap>),
}

impl ImportSource {
    pub fn len(&self) -> usize {
        match self {
            ImportSource::Table(shape) => shape.rows.len(),
            ImportSource::Mappings(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImportMode {
    /// Clear the store, then append everything.
    Replace,
    #[default]
    Append,
    /// Update rows whose incoming `__rowId` matches; append the rest.
    Merge,
}

#[derive(Clone, Default)]
pub struct ImportOptions {
    pub mode: ImportMode,
    /// Rows per committed batch; 0 falls back to the default.
    pub batch_size: usize,
    /// Add unknown headers as Text columns instead of ignoring them.
    pub expand_schema: bool,
    /// Header rename applied before schema matching (source -> target).
    pub column_mappings: HashMap<String, String>,
    /// Ask the caller to validate the ingested rows afterwards. The
    /// pipeline itself never evaluates rules.
    pub validate_after: bool,
    pub progress: Option<ProgressFn>,
    pub cancel: CancelToken,
}

pub const DEFAULT_IMPORT_BATCH: usize = 5000;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportReport {
    pub imported_rows: usize,
    pub failed_rows: usize,
    pub duration: Duration,
    pub errors: Vec<String>,
}

/// Run an import.
///
/// Each batch commits under its own store-lock acquisition, so a
/// cancelled import keeps the batches that already landed and reports
/// `Cancelled`. Per-row failures inside a batch are collected into the
/// report without aborting the batch.
pub fn import(
    shared: &SharedGrid,
    source: ImportSource,
    options: &ImportOptions,
) -> GridResult<ImportReport> {
    let started = Instant::now();
    let batch_size = if options.batch_size == 0 {
        DEFAULT_IMPORT_BATCH
    } else {
        options.batch_size
    };

    let headers = ordered_headers(&source, &options.column_mappings);
    let rows = normalize(source, &options.column_mappings);
    let total = rows.len();
    tracing::debug!(total, mode = ?options.mode, "import started");

    reconcile_schema(shared, &headers, options.expand_schema);

    if options.mode == ImportMode::Replace {
        shared.write().clear_all_rows();
    }

    let mut report = ImportReport::default();
    let batches: Vec<&[RowMap]> = rows.chunks(batch_size).collect();
    let batch_count = batches.len().max(1);

    for (done, batch) in batches.into_iter().enumerate() {
        options.cancel.check("import")?;
        let mut state = shared.write();
        for cells in batch {
            let outcome = match options.mode {
                ImportMode::Merge => merge_row(&mut state, cells.clone()),
                _ => state.add_row_lenient(cells.clone()).map(|_| ()),
            };
            match outcome {
                Ok(()) => report.imported_rows += 1,
                Err(err) => {
                    report.failed_rows += 1;
                    report.errors.push(err.to_string());
                }
            }
        }
        drop(state);
        if let Some(progress) = &options.progress {
            progress((done + 1) as f64 / batch_count as f64);
        }
    }

    report.duration = started.elapsed();
    tracing::debug!(
        imported = report.imported_rows,
        failed = report.failed_rows,
        "import finished"
    );
    Ok(report)
}

/// Collapse both source shapes into row mappings with renamed headers.
fn normalize(source: ImportSource, mappings: &HashMap<String, String>) -> Vec<RowMap> {
    let rename = |name: &str| -> String {
        mappings
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    };
    match source {
        ImportSource::Mappings(rows) => rows
            .into_iter()
            .map(|cells| {
                cells
                    .into_iter()
                    .map(|(k, v)| (rename(&k), v))
                    .collect()
            })
            .collect(),
        ImportSource::Table(shape) => {
            let headers: Vec<String> = shape.columns.iter().map(|h| rename(h)).collect();
            shape
                .rows
                .into_iter()
                .map(|values| {
                    headers
                        .iter()
                        .cloned()
                        .zip(values.into_iter().chain(std::iter::repeat(Value::Null)))
                        .collect()
                })
                .collect()
        }
    }
}

/// Incoming header names after renames. Table headers keep their
/// declaration order; mapping keys are sorted so schema expansion is
/// deterministic.
fn ordered_headers(source: &ImportSource, mappings: &HashMap<String, String>) -> Vec<String> {
    let rename = |name: &str| -> String {
        mappings
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    };
    match source {
        ImportSource::Table(shape) => shape.columns.iter().map(|h| rename(h)).collect(),
        ImportSource::Mappings(rows) => {
            let mut seen = Vec::new();
            for cells in rows {
                for key in cells.keys() {
                    let name = rename(key);
                    if !seen.contains(&name) {
                        seen.push(name);
                    }
                }
            }
            seen.sort();
            seen
        }
    }
}

/// Grow the schema for unknown headers when asked; otherwise unknown
/// cells are silently dropped by lenient shaping.
fn reconcile_schema(shared: &SharedGrid, headers: &[String], expand_schema: bool) {
    if !expand_schema {
        return;
    }
    let mut state = shared.write();
    for name in headers {
        if is_reserved_field(name) || state.registry.contains(name) {
            continue;
        }
        let _ = state.add_column(ColumnDef::new(name.clone(), CellType::Text));
    }
}

/// Merge semantics: an incoming `__rowId` that resolves updates that
/// row in place; anything else appends with a fresh identity.
fn merge_row(state: &mut store::GridState, mut cells: RowMap) -> GridResult<()> {
    let incoming_id = cells
        .remove(ROW_ID_FIELD)
        .and_then(|v| RowId::parse(&v.display_text()));

    if let Some(id) = incoming_id {
        if state.store.index_of(id).is_some() {
            let payload: RowMap = cells
                .into_iter()
                .filter(|(k, _)| !is_reserved_field(k) && state.registry.contains(k))
                .collect();
            return state.update_row(id, payload);
        }
    }
    state.add_row_lenient(cells).map(|_| ())
}
