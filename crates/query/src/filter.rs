//! Filter: composable predicates over the store's visibility bitmap.
//!
//! A filter never removes rows; it recomputes per-row visibility. The
//! active clause set is a conjunction, so each applied clause narrows
//! the previous result.

use common::{GridError, GridResult, Row};
use lru::LruCache;
use regex::Regex;
use std::num::NonZeroUsize;
use store::GridState;
use types::Value;

const REGEX_CACHE_SIZE: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    IsNull,
    IsNotNull,
    Regex,
}

/// One predicate of shape (column, operator, operand).
#[derive(Clone, Debug)]
pub struct FilterClause {
    pub column: String,
    pub op: FilterOperator,
    pub operand: Value,
}

impl FilterClause {
    pub fn new(column: impl Into<String>, op: FilterOperator, operand: Value) -> Self {
        Self {
            column: column.into(),
            op,
            operand,
        }
    }
}

struct CompiledClause {
    clause: FilterClause,
    regex: Option<Regex>,
}

/// Owns the active clause set and a compiled-regex cache.
pub struct FilterEngine {
    active: Vec<CompiledClause>,
    regex_cache: LruCache<String, Regex>,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self {
            active: Vec::new(),
            regex_cache: LruCache::new(
                NonZeroUsize::new(REGEX_CACHE_SIZE).expect("cache size is non-zero"),
            ),
        }
    }

    pub fn active_clauses(&self) -> Vec<&FilterClause> {
        self.active.iter().map(|c| &c.clause).collect()
    }

    /// Add a clause and recompute visibility. Returns the now-visible
    /// row count. Fails before any mutation on an unknown column or a
    /// malformed regex.
    pub fn apply_filter(
        &mut self,
        state: &mut GridState,
        clause: FilterClause,
    ) -> GridResult<usize> {
        let canonical = state.registry.canonical_name(&clause.column)?;
        let compiled = self.compile(FilterClause {
            column: canonical,
            ..clause
        })?;
        self.active.push(compiled);
        Ok(self.recompute(state))
    }

    /// Drop every clause and restore all rows to visible. Returns the
    /// total row count.
    pub fn clear_filters(&mut self, state: &mut GridState) -> usize {
        self.active.clear();
        state.store.clear_visibility()
    }

    /// Re-evaluate the active conjunction against every row. Called
    /// after bulk mutations so new rows pick up the current filter.
    pub fn recompute(&self, state: &mut GridState) -> usize {
        if self.active.is_empty() {
            return state.store.clear_visibility();
        }
        let active = &self.active;
        state
            .store
            .set_visibility(|row| active.iter().all(|clause| clause_matches(clause, row)))
    }

    /// Evaluate one clause against one row without touching the store.
    pub fn matches(&mut self, clause: &FilterClause, row: &Row) -> GridResult<bool> {
        let compiled = self.compile(clause.clone())?;
        Ok(clause_matches(&compiled, row))
    }

    fn compile(&mut self, clause: FilterClause) -> GridResult<CompiledClause> {
        let regex = if clause.op == FilterOperator::Regex {
            let pattern = match &clause.operand {
                Value::Text(p) => p.clone(),
                other => {
                    return Err(GridError::InvalidInput(format!(
                        "regex filter needs a text pattern, got {other:?}"
                    )));
                }
            };
            if let Some(compiled) = self.regex_cache.get(&pattern) {
                Some(compiled.clone())
            } else {
                let compiled = Regex::new(&pattern).map_err(|e| {
                    GridError::InvalidInput(format!("invalid regex '{pattern}': {e}"))
                })?;
                self.regex_cache.put(pattern, compiled.clone());
                Some(compiled)
            }
        } else {
            None
        };
        Ok(CompiledClause { clause, regex })
    }
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Clause evaluation. Null cells match only IsNull; every other
/// operator treats null as non-matching.
fn clause_matches(compiled: &CompiledClause, row: &Row) -> bool {
    let clause = &compiled.clause;
    let cell = row.value_or_null(&clause.column);

    match clause.op {
        FilterOperator::IsNull => return cell.is_null(),
        FilterOperator::IsNotNull => return !cell.is_null(),
        _ => {}
    }
    if cell.is_null() {
        return false;
    }

    match clause.op {
        FilterOperator::Equals => cell.loose_eq(&clause.operand),
        FilterOperator::NotEquals => !cell.loose_eq(&clause.operand),
        FilterOperator::Contains => text_op(&cell, &clause.operand, |h, n| h.contains(n)),
        FilterOperator::StartsWith => text_op(&cell, &clause.operand, |h, n| h.starts_with(n)),
        FilterOperator::EndsWith => text_op(&cell, &clause.operand, |h, n| h.ends_with(n)),
        FilterOperator::GreaterThan => ordered(&cell, &clause.operand, |o| o.is_gt()),
        FilterOperator::GreaterOrEqual => ordered(&cell, &clause.operand, |o| o.is_ge()),
        FilterOperator::LessThan => ordered(&cell, &clause.operand, |o| o.is_lt()),
        FilterOperator::LessOrEqual => ordered(&cell, &clause.operand, |o| o.is_le()),
        FilterOperator::Regex => compiled
            .regex
            .as_ref()
            .is_some_and(|r| r.is_match(&cell.display_text())),
        FilterOperator::IsNull | FilterOperator::IsNotNull => unreachable!("handled above"),
    }
}

/// Case-insensitive text predicate over the display rendering.
fn text_op(cell: &Value, operand: &Value, pred: impl Fn(&str, &str) -> bool) -> bool {
    let haystack = cell.display_text().to_lowercase();
    let needle = operand.display_text().to_lowercase();
    pred(&haystack, &needle)
}

/// Ordering predicate; null operands never match.
fn ordered(cell: &Value, operand: &Value, pred: impl Fn(std::cmp::Ordering) -> bool) -> bool {
    if operand.is_null() {
        return false;
    }
    pred(cell.compare(operand))
}
