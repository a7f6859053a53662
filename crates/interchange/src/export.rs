//! Export: batched egress with selection filters and projection.

use common::scope::{CancelToken, ProgressFn};
use common::{
    ALERTS_FIELD, AlertRecord, GridResult, ROW_ID_FIELD, RowId, RowMap, TableShape,
};
use std::time::{Duration, Instant};
use store::{GridState, SharedGrid};
use types::Value;

/// The two supported output materializations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportTarget {
    #[default]
    Table,
    Mappings,
}

#[derive(Clone, Default)]
pub struct ExportOptions {
    pub target: ExportTarget,
    /// Only rows visible under the current filter.
    pub only_filtered: bool,
    /// Only rows whose checkbox column is truthy.
    pub only_checked: bool,
    /// Column projection; `None` exports every column.
    pub columns: Option<Vec<String>>,
    /// Append the serialized alerts as a synthetic column.
    pub include_validation_alerts: bool,
    /// Remove exported rows after a fully successful export.
    pub remove_after_export: bool,
    /// Rows per cooperative batch; 0 falls back to the default.
    pub batch_size: usize,
    pub progress: Option<ProgressFn>,
    pub cancel: CancelToken,
}

pub const DEFAULT_EXPORT_BATCH: usize = 10_000;

#[derive(Clone, Debug)]
pub enum ExportedData {
    Table(TableShape),
    Mappings(Vec<RowMap>),
}

impl ExportedData {
    pub fn row_count(&self) -> usize {
        match self {
            ExportedData::Table(shape) => shape.rows.len(),
            ExportedData::Mappings(rows) => rows.len(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExportReport {
    pub exported_rows: usize,
    pub duration: Duration,
    pub target: ExportTarget,
    /// Rough serialized size in bytes.
    pub data_size_estimate: usize,
}

struct ExportRow {
    id: RowId,
    values: Vec<Value>,
    alerts: Option<String>,
}

/// Run an export.
///
/// Selection filters intersect; projection restricts columns; the
/// alerts column is appended last when requested. Row deletion for
/// `remove_after_export` happens only after the whole result is
/// materialized, so a cancelled export deletes nothing.
pub fn export(
    shared: &SharedGrid,
    options: &ExportOptions,
) -> GridResult<(ExportedData, ExportReport)> {
    let started = Instant::now();
    let batch_size = if options.batch_size == 0 {
        DEFAULT_EXPORT_BATCH
    } else {
        options.batch_size
    };

    // Resolve the projection and cut the selection snapshot under one
    // read-lock acquisition.
    let (columns, selected) = {
        let state = shared.read();
        let columns = match &options.columns {
            Some(requested) => {
                let mut resolved = Vec::with_capacity(requested.len());
                for name in requested {
                    resolved.push(state.registry.canonical_name(name)?);
                }
                resolved
            }
            None => state.registry.names(),
        };
        let selected = select_rows(&state, options, &columns);
        (columns, selected)
    };
    let total = selected.len();
    tracing::debug!(total, target = ?options.target, "export started");

    let chunk_count = total.div_ceil(batch_size).max(1);
    let mut rows: Vec<ExportRow> = Vec::with_capacity(total);
    let mut size_estimate = 0usize;
    let mut batches = selected.into_iter();
    let mut done = 0usize;
    loop {
        options.cancel.check("export")?;
        let chunk: Vec<ExportRow> = batches.by_ref().take(batch_size).collect();
        if chunk.is_empty() {
            break;
        }
        for row in &chunk {
            size_estimate += estimate_row(row);
        }
        rows.extend(chunk);
        done += 1;
        if let Some(progress) = &options.progress {
            progress(done as f64 / chunk_count as f64);
        }
    }

    let exported_ids: Vec<RowId> = rows.iter().map(|r| r.id).collect();
    let data = materialize(rows, &columns, options);

    if options.remove_after_export && !exported_ids.is_empty() {
        let removed = shared.write().remove_rows(&exported_ids);
        tracing::debug!(removed, "removed exported rows");
    }

    let report = ExportReport {
        exported_rows: data.row_count(),
        duration: started.elapsed(),
        target: options.target,
        data_size_estimate: size_estimate,
    };
    Ok((data, report))
}

/// Apply the filtered/checked intersection and project each row onto
/// the export columns.
fn select_rows(state: &GridState, options: &ExportOptions, columns: &[String]) -> Vec<ExportRow> {
    let checkbox = state.registry.checkbox_column().map(|c| c.name.clone());

    let mut out = Vec::new();
    for index in 0..state.store.row_count() {
        if options.only_filtered && !state.store.is_visible(index) {
            continue;
        }
        let Some(row) = state.store.get(index) else { continue };
        if options.only_checked {
            let checked = checkbox
                .as_deref()
                .map(|c| row.value_or_null(c).is_truthy())
                .unwrap_or(false);
            if !checked {
                continue;
            }
        }
        let alerts = if options.include_validation_alerts {
            Some(render_alerts(state.store.alerts_for(row.id)))
        } else {
            None
        };
        out.push(ExportRow {
            id: row.id,
            values: columns.iter().map(|c| row.value_or_null(c)).collect(),
            alerts,
        });
    }
    out
}

fn render_alerts(records: &[AlertRecord]) -> String {
    records
        .iter()
        .map(AlertRecord::render)
        .collect::<Vec<_>>()
        .join("; ")
}

fn materialize(rows: Vec<ExportRow>, columns: &[String], options: &ExportOptions) -> ExportedData {
    match options.target {
        ExportTarget::Table => {
            let mut shape = TableShape::new(columns.to_vec());
            if options.include_validation_alerts {
                shape.columns.push(ALERTS_FIELD.to_string());
            }
            shape.rows = rows
                .into_iter()
                .map(|row| {
                    let mut values = row.values;
                    if options.include_validation_alerts {
                        values.push(Value::Text(row.alerts.unwrap_or_default()));
                    }
                    values
                })
                .collect();
            ExportedData::Table(shape)
        }
        ExportTarget::Mappings => {
            let maps = rows
                .into_iter()
                .map(|row| {
                    let mut map = RowMap::with_capacity(columns.len() + 2);
                    for (column, value) in columns.iter().zip(row.values) {
                        map.insert(column.clone(), value);
                    }
                    // The identity rides along so Merge re-imports can
                    // match rows; it is discarded on ingest otherwise.
                    map.insert(ROW_ID_FIELD.into(), Value::Text(row.id.to_string()));
                    if options.include_validation_alerts {
                        map.insert(
                            ALERTS_FIELD.into(),
                            Value::Text(row.alerts.unwrap_or_default()),
                        );
                    }
                    map
                })
                .collect();
            ExportedData::Mappings(maps)
        }
    }
}

fn estimate_row(row: &ExportRow) -> usize {
    row.values
        .iter()
        .map(|v| match v {
            Value::Text(t) => t.len() + 2,
            Value::Null => 4,
            _ => 8,
        })
        .sum::<usize>()
        + row.alerts.as_ref().map(|a| a.len()).unwrap_or(0)
}
