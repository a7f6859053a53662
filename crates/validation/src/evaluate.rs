//! Guarded rule evaluation and per-row alert merging.

use crate::rule::{GroupOperator, Rule, RuleContext, RuleGroup, RuleOutcome, RuleRegistry};
use common::{AlertRecord, GridResult, Row, Severity};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;
use store::GridState;

/// Run one rule under its guards.
///
/// A panicking evaluator yields an Error alert for that rule; an
/// evaluator that overruns its timeout budget yields a synthetic
/// Warning. Neither aborts the surrounding evaluation.
pub fn run_rule(rule: &Rule, row: &Row, ctx: &RuleContext) -> Option<AlertRecord> {
    let started = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(|| rule.evaluate(row, ctx)));
    let elapsed = started.elapsed();

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(payload) => {
            let detail = panic_message(&payload);
            tracing::warn!(rule = %rule.id, detail, "rule crashed");
            return Some(AlertRecord {
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                severity: Severity::Error,
                message: format!("rule crashed: {detail}"),
                column: rule.dependent_columns.first().cloned(),
                error_code: Some("RULE_CRASHED".into()),
            });
        }
    };

    if elapsed > rule.timeout {
        tracing::warn!(rule = %rule.id, elapsed_ms = elapsed.as_millis() as u64, "rule timeout");
        return Some(AlertRecord {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            severity: Severity::Warning,
            message: "timeout".into(),
            column: rule.dependent_columns.first().cloned(),
            error_code: Some("RULE_TIMEOUT".into()),
        });
    }

    match outcome {
        RuleOutcome::Pass => None,
        RuleOutcome::Fail(failure) => Some(AlertRecord {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            severity: failure.severity.unwrap_or(rule.severity),
            message: failure.message,
            column: failure
                .column
                .or_else(|| rule.dependent_columns.first().cloned()),
            error_code: None,
        }),
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

/// Evaluate the rules relevant to a row.
///
/// `changed` limits evaluation to rules whose dependencies intersect the
/// changed columns; `None` rechecks every enabled rule. Returns the ids
/// that were evaluated (so stale outcomes can be dropped) and the
/// resulting alert records.
pub fn evaluate_row(
    registry: &RuleRegistry,
    row: &Row,
    ctx: &RuleContext,
    changed: Option<&[String]>,
) -> (Vec<String>, Vec<AlertRecord>) {
    let rules = match changed {
        Some(columns) => registry.rules_for_changes(columns),
        None => registry.enabled_rules(),
    };

    let mut evaluated = Vec::with_capacity(rules.len());
    let mut records = Vec::new();
    for rule in rules {
        evaluated.push(rule.id.clone());
        if let Some(record) = run_rule(rule, row, ctx) {
            records.push(record);
        }
    }

    for group in registry.groups() {
        if let Some(record) = evaluate_group(registry, group, row, ctx, changed) {
            evaluated.push(group.id.clone());
            records.push(record);
        } else if group_is_relevant(registry, group, changed) {
            evaluated.push(group.id.clone());
        }
    }

    (evaluated, records)
}

fn group_is_relevant(
    registry: &RuleRegistry,
    group: &RuleGroup,
    changed: Option<&[String]>,
) -> bool {
    let Some(columns) = changed else { return true };
    group
        .rule_ids
        .iter()
        .filter_map(|id| registry.get(id))
        .any(|r| r.depends_on_any(columns))
}

/// Combined group outcome: AND fails on the first member failure, OR
/// fails only when every member fails (surfacing the first failure).
fn evaluate_group(
    registry: &RuleRegistry,
    group: &RuleGroup,
    row: &Row,
    ctx: &RuleContext,
    changed: Option<&[String]>,
) -> Option<AlertRecord> {
    if !group_is_relevant(registry, group, changed) {
        return None;
    }
    let mut first_failure = None;
    let mut any_pass = false;
    for rule in group.rule_ids.iter().filter_map(|id| registry.get(id)) {
        match run_rule(rule, row, ctx) {
            Some(record) => {
                if first_failure.is_none() {
                    first_failure = Some(record);
                }
                if group.operator == GroupOperator::And {
                    break;
                }
            }
            None => {
                any_pass = true;
                if group.operator == GroupOperator::Or {
                    break;
                }
            }
        }
    }

    let failed = match group.operator {
        GroupOperator::And => first_failure.is_some(),
        GroupOperator::Or => !any_pass && first_failure.is_some(),
    };
    if !failed {
        return None;
    }
    first_failure.map(|inner| AlertRecord {
        rule_id: group.id.clone(),
        rule_name: group.name.clone(),
        severity: inner.severity,
        message: inner.message,
        column: Some(group.column.clone()),
        error_code: inner.error_code,
    })
}

/// Re-evaluate one row in place and merge the outcomes into the store's
/// alert table.
pub fn revalidate_row(
    state: &mut GridState,
    registry: &RuleRegistry,
    row_index: usize,
    changed: Option<&[String]>,
) -> GridResult<usize> {
    let row = state
        .store
        .get(row_index)
        .cloned()
        .ok_or_else(|| common::GridError::NotFound(format!("row index {row_index} out of range")))?;
    let ctx = RuleContext {
        changed_columns: changed.map(|c| c.to_vec()),
        row_index: Some(row_index),
    };
    let (evaluated, records) = evaluate_row(registry, &row, &ctx, changed);
    let count = records.len();
    state.store.merge_row_alerts(row.id, &evaluated, records)?;
    Ok(count)
}
