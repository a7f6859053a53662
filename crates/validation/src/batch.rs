//! Batch and dataset validation.

use crate::evaluate::evaluate_row;
use crate::rule::{RuleContext, RuleRegistry};
use ahash::RandomState;
use common::scope::{CancelToken, ProgressFn};
use common::{AlertRecord, GridError, GridOptions, GridResult, Row, RowId, Severity};
use hashbrown::HashMap;
use rayon::prelude::*;
use store::{GridState, SharedGrid};
use types::Value;

type Map<K, V> = HashMap<K, V, RandomState>;

/// What to validate and how to report it.
#[derive(Clone, Default)]
pub struct BatchRequest {
    pub only_filtered: bool,
    pub only_checked: bool,
    pub progress: Option<ProgressFn>,
    pub cancel: CancelToken,
}

/// Aggregate result of a dataset validation pass.
///
/// A row counts as invalid when it holds at least one Error-severity
/// alert; Info and Warning records show up in `errors_by_severity` but
/// do not invalidate the row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationStatistics {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    pub errors_by_severity: std::collections::HashMap<Severity, usize>,
}

struct RowVerdict {
    id: RowId,
    evaluated: Vec<String>,
    records: Vec<AlertRecord>,
}

/// Validate the dataset in batches, merging outcomes into the store's
/// alert table as each batch completes.
///
/// Batches fan out to a bounded worker pool when parallel processing is
/// enabled and the row count exceeds the configured threshold.
/// Cancellation is honored between batches: outcomes already merged
/// stay, in-flight batches are discarded, and the call reports
/// `Cancelled`.
pub fn validate_all(
    shared: &SharedGrid,
    registry: &RuleRegistry,
    options: &GridOptions,
    request: &BatchRequest,
) -> GridResult<ValidationStatistics> {
    let snapshot = selected_rows(&shared.read(), request.only_filtered, request.only_checked);
    let total = snapshot.len();
    tracing::debug!(total, "batch validation started");

    let chunks: Vec<&[(usize, Row)]> = snapshot.chunks(options.batch_size.max(1)).collect();
    let chunk_count = chunks.len().max(1);

    let parallel =
        options.enable_parallel_processing && total > options.parallel_processing_threshold;

    let mut stats = ValidationStatistics {
        total_rows: total,
        ..Default::default()
    };

    if parallel {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.degree_of_parallelism)
            .build()
            .map_err(|e| GridError::Internal(format!("worker pool: {e}")))?;

        let cancel = request.cancel.clone();
        let verdicts: Vec<Option<Vec<RowVerdict>>> = pool.install(|| {
            chunks
                .par_iter()
                .map(|chunk| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    Some(evaluate_chunk(registry, chunk))
                })
                .collect()
        });

        let mut merged = 0usize;
        for verdict_chunk in verdicts.into_iter().flatten() {
            merge_chunk(shared, &verdict_chunk, &mut stats);
            merged += 1;
            report_progress(request, merged, chunk_count);
        }
        request.cancel.check("validate_all")?;
    } else {
        for (done, chunk) in chunks.into_iter().enumerate() {
            request.cancel.check("validate_all")?;
            let verdict_chunk = evaluate_chunk(registry, chunk);
            merge_chunk(shared, &verdict_chunk, &mut stats);
            report_progress(request, done + 1, chunk_count);
        }
    }

    stats.valid_rows = stats.total_rows - stats.invalid_rows;
    tracing::debug!(
        total = stats.total_rows,
        invalid = stats.invalid_rows,
        "batch validation finished"
    );
    Ok(stats)
}

fn evaluate_chunk(registry: &RuleRegistry, chunk: &[(usize, Row)]) -> Vec<RowVerdict> {
    chunk
        .iter()
        .map(|(index, row)| {
            let ctx = RuleContext {
                changed_columns: None,
                row_index: Some(*index),
            };
            let (evaluated, records) = evaluate_row(registry, row, &ctx, None);
            RowVerdict {
                id: row.id,
                evaluated,
                records,
            }
        })
        .collect()
}

fn merge_chunk(shared: &SharedGrid, verdicts: &[RowVerdict], stats: &mut ValidationStatistics) {
    let mut state = shared.write();
    for verdict in verdicts {
        for record in &verdict.records {
            *stats
                .errors_by_severity
                .entry(record.severity)
                .or_insert(0) += 1;
        }
        if verdict
            .records
            .iter()
            .any(|r| r.severity == Severity::Error)
        {
            stats.invalid_rows += 1;
        }
        // Rows removed since the snapshot was cut are skipped.
        if state.store.index_of(verdict.id).is_some() {
            let _ = state.store.merge_row_alerts(
                verdict.id,
                &verdict.evaluated,
                verdict.records.clone(),
            );
        }
    }
}

fn report_progress(request: &BatchRequest, done: usize, total: usize) {
    if let Some(progress) = &request.progress {
        progress(done as f64 / total as f64);
    }
}

/// Pre-export gate: every non-empty selected row passes its rules with
/// no Error-severity outcome. Does not touch the alert table.
pub fn are_all_non_empty_rows_valid(
    shared: &SharedGrid,
    registry: &RuleRegistry,
    only_filtered: bool,
    only_checked: bool,
) -> GridResult<bool> {
    let snapshot = selected_rows(&shared.read(), only_filtered, only_checked);
    for (index, row) in &snapshot {
        if row.is_empty() {
            continue;
        }
        let ctx = RuleContext {
            changed_columns: None,
            row_index: Some(*index),
        };
        let (_, records) = evaluate_row(registry, row, &ctx, None);
        if records.iter().any(|r| r.severity == Severity::Error) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Stored alerts for the selected rows, in row order.
pub fn stored_alerts(
    state: &GridState,
    only_filtered: bool,
    only_checked: bool,
) -> Vec<(RowId, AlertRecord)> {
    let checkbox = checkbox_column(state);
    let mut out = Vec::new();
    for index in 0..state.store.row_count() {
        if only_filtered && !state.store.is_visible(index) {
            continue;
        }
        let Some(row) = state.store.get(index) else { continue };
        if only_checked && !row_checked(row, checkbox.as_deref()) {
            continue;
        }
        for record in state.store.alerts_for(row.id) {
            out.push((row.id, record.clone()));
        }
    }
    out
}

/// Serialize each row's alerts into the designated alerts column, when
/// the schema declares one. Returns the number of rows carrying alerts.
pub fn refresh_alerts_column(state: &mut GridState) -> usize {
    let column = state
        .registry
        .alerts_column()
        .map(|c| c.name.clone());
    let rendered: Map<RowId, String> = state.rendered_alerts().into_iter().collect();

    if let Some(column) = column {
        for index in 0..state.store.row_count() {
            let Some(id) = state.store.id_at(index) else { continue };
            let text = rendered.get(&id).cloned().unwrap_or_default();
            let value = if text.is_empty() {
                Value::Text(String::new())
            } else {
                Value::Text(text)
            };
            let _ = state.store.set_cell_untracked(index, &column, value);
        }
    }
    rendered.len()
}

fn checkbox_column(state: &GridState) -> Option<String> {
    state.registry.checkbox_column().map(|c| c.name.clone())
}

fn row_checked(row: &Row, checkbox: Option<&str>) -> bool {
    match checkbox {
        Some(column) => row.value_or_null(column).is_truthy(),
        None => false,
    }
}

/// Rows selected by the filter/checkbox toggles, paired with their
/// index at snapshot time.
fn selected_rows(
    state: &GridState,
    only_filtered: bool,
    only_checked: bool,
) -> Vec<(usize, Row)> {
    let checkbox = checkbox_column(state);
    let mut out = Vec::new();
    for index in 0..state.store.row_count() {
        if only_filtered && !state.store.is_visible(index) {
            continue;
        }
        let Some(row) = state.store.get(index) else { continue };
        if only_checked && !row_checked(row, checkbox.as_deref()) {
            continue;
        }
        out.push((index, row.clone()));
    }
    out
}
