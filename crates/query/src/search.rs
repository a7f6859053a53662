//! Search: text matching over row snapshots with modes, scopes, and
//! result ranking.

use common::{GridError, GridResult, Row, RowId};
use rayon::prelude::*;
use regex::{Regex, RegexBuilder};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use store::GridState;
use types::Value;

/// Rows above this count search on the worker pool when the request
/// opts into parallel execution.
const PARALLEL_SEARCH_THRESHOLD: usize = 10_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchMode {
    #[default]
    Contains,
    Exact,
    StartsWith,
    EndsWith,
    Regex,
    Fuzzy,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchScope {
    #[default]
    AllData,
    VisibleData,
    SelectedData,
    FilteredData,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchRanking {
    #[default]
    None,
    Relevance,
    Position,
    Frequency,
}

/// Full search specification. [`SearchRequest::simple`] covers the
/// plain contains-text case.
#[derive(Clone, Debug)]
pub struct SearchRequest {
    pub text: String,
    pub case_sensitive: bool,
    pub whole_word: bool,
    /// Restrict to these columns; `None` searches every column.
    pub columns: Option<Vec<String>>,
    pub scope: SearchScope,
    pub mode: SearchMode,
    pub ranking: SearchRanking,
    pub max_matches: Option<usize>,
    /// Minimum score a fuzzy match must reach, in `0.0..=1.0`.
    pub fuzzy_threshold: f64,
    pub parallel: bool,
}

impl SearchRequest {
    pub fn simple(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            case_sensitive: false,
            whole_word: false,
            columns: None,
            scope: SearchScope::AllData,
            mode: SearchMode::Contains,
            ranking: SearchRanking::None,
            max_matches: None,
            fuzzy_threshold: 0.5,
            parallel: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchMatch {
    pub row_index: usize,
    pub column: String,
    pub value: Value,
    pub matched_text: String,
    pub exact: bool,
    pub score: f64,
}

#[derive(Clone, Debug, Default)]
pub struct SearchReport {
    pub matches: Vec<SearchMatch>,
    pub total_rows_searched: usize,
    pub duration: Duration,
}

/// Search the store under the request's scope.
///
/// `selected` supplies the row set for [`SearchScope::SelectedData`];
/// passing `None` with that scope searches nothing. Results reference
/// row indexes valid at the time of the call.
pub fn search(
    state: &GridState,
    selected: Option<&HashSet<RowId>>,
    request: &SearchRequest,
) -> GridResult<SearchReport> {
    let started = Instant::now();
    if request.text.is_empty() {
        return Err(GridError::InvalidInput("search text must not be empty".into()));
    }

    let columns = match &request.columns {
        Some(requested) => {
            let mut resolved = Vec::with_capacity(requested.len());
            for name in requested {
                resolved.push(state.registry.canonical_name(name)?);
            }
            resolved
        }
        None => state.registry.names(),
    };

    let regex = build_regex(request)?;

    let rows: Vec<(usize, Row)> = (0..state.store.row_count())
        .filter(|&index| match request.scope {
            SearchScope::AllData => true,
            // Headless visibility is the filter bitmap for both scopes
            SearchScope::VisibleData | SearchScope::FilteredData => state.store.is_visible(index),
            SearchScope::SelectedData => state
                .store
                .id_at(index)
                .is_some_and(|id| selected.is_some_and(|s| s.contains(&id))),
        })
        .filter_map(|index| state.store.get(index).map(|r| (index, r.clone())))
        .collect();
    let total_rows_searched = rows.len();

    let match_row = |(index, row): &(usize, Row)| -> Vec<SearchMatch> {
        let mut found = Vec::new();
        for column in &columns {
            let Some(value) = row.get(column) else { continue };
            if value.is_null() {
                continue;
            }
            let haystack = value.display_text();
            if let Some(hit) = match_text(&haystack, request, regex.as_ref()) {
                found.push(SearchMatch {
                    row_index: *index,
                    column: column.clone(),
                    value: value.clone(),
                    matched_text: hit.matched,
                    exact: hit.exact,
                    score: hit.score,
                });
            }
        }
        found
    };

    let mut matches: Vec<SearchMatch> =
        if request.parallel && rows.len() > PARALLEL_SEARCH_THRESHOLD {
            rows.par_iter().map(match_row).flatten().collect()
        } else {
            rows.iter().flat_map(match_row).collect()
        };

    rank(&mut matches, request.ranking);
    if let Some(cap) = request.max_matches {
        matches.truncate(cap);
    }

    Ok(SearchReport {
        matches,
        total_rows_searched,
        duration: started.elapsed(),
    })
}

struct TextHit {
    matched: String,
    exact: bool,
    score: f64,
}

fn build_regex(request: &SearchRequest) -> GridResult<Option<Regex>> {
    if request.mode != SearchMode::Regex {
        return Ok(None);
    }
    RegexBuilder::new(&request.text)
        .case_insensitive(!request.case_sensitive)
        .build()
        .map(Some)
        .map_err(|e| GridError::InvalidInput(format!("invalid search pattern: {e}")))
}

fn match_text(haystack: &str, request: &SearchRequest, regex: Option<&Regex>) -> Option<TextHit> {
    let (hay, needle) = if request.case_sensitive {
        (haystack.to_string(), request.text.clone())
    } else {
        (haystack.to_lowercase(), request.text.to_lowercase())
    };

    match request.mode {
        SearchMode::Exact => {
            if hay == needle {
                Some(TextHit {
                    matched: haystack.to_string(),
                    exact: true,
                    score: 1.0,
                })
            } else {
                None
            }
        }
        SearchMode::StartsWith => hay.starts_with(&needle).then(|| TextHit {
            matched: haystack
                .get(..needle.len())
                .unwrap_or(haystack)
                .to_string(),
            exact: hay == needle,
            score: 0.9,
        }),
        SearchMode::EndsWith => hay.ends_with(&needle).then(|| TextHit {
            matched: haystack
                .get(haystack.len().saturating_sub(needle.len())..)
                .unwrap_or(haystack)
                .to_string(),
            exact: hay == needle,
            score: 0.9,
        }),
        SearchMode::Contains => {
            let at = hay.find(&needle)?;
            if request.whole_word && !word_bounded(&hay, at, needle.len()) {
                return None;
            }
            // Case folding can shift byte offsets for non-ASCII text;
            // fall back to the folded span when it does.
            let matched = haystack
                .get(at..at + needle.len())
                .unwrap_or(&hay[at..at + needle.len()])
                .to_string();
            Some(TextHit {
                matched,
                exact: hay == needle,
                score: if hay == needle { 1.0 } else { 0.8 },
            })
        }
        SearchMode::Regex => {
            let found = regex?.find(haystack)?;
            Some(TextHit {
                matched: found.as_str().to_string(),
                exact: found.as_str() == haystack,
                score: 0.9,
            })
        }
        SearchMode::Fuzzy => {
            let score = fuzzy_score(&needle, &hay);
            (score >= request.fuzzy_threshold).then(|| TextHit {
                matched: haystack.to_string(),
                exact: score >= 1.0,
                score,
            })
        }
    }
}

/// A match is whole-word when its ends sit on non-alphanumeric
/// boundaries.
fn word_bounded(hay: &str, at: usize, len: usize) -> bool {
    let before_ok = at == 0
        || hay[..at]
            .chars()
            .next_back()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true);
    let after_ok = hay[at + len..]
        .chars()
        .next()
        .map(|c| !c.is_alphanumeric())
        .unwrap_or(true);
    before_ok && after_ok
}

/// Lightweight fuzzy scoring: exact > prefix > substring > acronym >
/// scattered subsequence. Returns 0.0 when the needle cannot be
/// threaded through the haystack at all.
fn fuzzy_score(needle: &str, haystack: &str) -> f64 {
    if needle.is_empty() || haystack.is_empty() {
        return 0.0;
    }
    if haystack == needle {
        return 1.0;
    }
    if haystack.starts_with(needle) {
        return 0.95;
    }
    if haystack.contains(needle) {
        return 0.85;
    }
    // Acronym: first letters of the haystack's words
    let acronym: String = haystack
        .split(|c: char| !c.is_alphanumeric())
        .filter_map(|w| w.chars().next())
        .collect();
    if !acronym.is_empty() && acronym == needle {
        return 0.7;
    }
    // Scattered subsequence, weighted by how much of the haystack it spans
    let mut chars = haystack.chars();
    let mut matched = 0usize;
    for nc in needle.chars() {
        if chars.by_ref().any(|hc| hc == nc) {
            matched += 1;
        } else {
            break;
        }
    }
    if matched == needle.chars().count() {
        let density = needle.chars().count() as f64 / haystack.chars().count() as f64;
        0.3 + 0.3 * density
    } else {
        0.0
    }
}

fn rank(matches: &mut [SearchMatch], ranking: SearchRanking) {
    match ranking {
        SearchRanking::None => {}
        SearchRanking::Relevance => {
            matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        }
        SearchRanking::Position => {
            matches.sort_by(|a, b| {
                a.row_index
                    .cmp(&b.row_index)
                    .then_with(|| a.column.cmp(&b.column))
            });
        }
        SearchRanking::Frequency => {
            let mut counts: HashMap<String, usize> = HashMap::new();
            for m in matches.iter() {
                *counts.entry(m.matched_text.clone()).or_insert(0) += 1;
            }
            matches.sort_by(|a, b| {
                counts[&b.matched_text]
                    .cmp(&counts[&a.matched_text])
                    .then_with(|| a.row_index.cmp(&b.row_index))
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use columns::ColumnDef;
    use common::RowMap;
    use types::CellType;

    fn state_with_names(names: &[&str]) -> GridState {
        let mut state = GridState::default();
        state
            .add_column(ColumnDef::new("name", CellType::Text))
            .unwrap();
        state
            .add_column(ColumnDef::new("note", CellType::Text))
            .unwrap();
        for name in names {
            let mut cells = RowMap::new();
            cells.insert("name".into(), Value::Text((*name).into()));
            cells.insert("note".into(), Value::Text(format!("about {name}")));
            state.add_row(cells).unwrap();
        }
        state
    }

    #[test]
    fn contains_is_case_insensitive_by_default() {
        let state = state_with_names(&["Widget", "gadget", "doohickey"]);
        let report = search(&state, None, &SearchRequest::simple("GET")).unwrap();

        assert_eq!(report.total_rows_searched, 3);
        // "Widget" and "gadget" match in both columns
        assert_eq!(report.matches.len(), 4);
    }

    #[test]
    fn case_sensitive_narrows() {
        let state = state_with_names(&["Widget", "widget"]);
        let mut request = SearchRequest::simple("Widget");
        request.case_sensitive = true;
        request.columns = Some(vec!["name".into()]);

        let report = search(&state, None, &request).unwrap();
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].row_index, 0);
    }

    #[test]
    fn whole_word_requires_boundaries() {
        let state = state_with_names(&["blue sky", "bluesky"]);
        let mut request = SearchRequest::simple("blue");
        request.whole_word = true;
        request.columns = Some(vec!["name".into()]);

        let report = search(&state, None, &request).unwrap();
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].matched_text, "blue");
    }

    #[test]
    fn scope_respects_visibility() {
        let mut state = state_with_names(&["alpha", "beta", "gamma"]);
        state.store.set_visibility(|row| {
            row.value_or_null("name").display_text() != "beta"
        });

        let mut request = SearchRequest::simple("a");
        request.scope = SearchScope::VisibleData;
        request.columns = Some(vec!["name".into()]);

        let report = search(&state, None, &request).unwrap();
        assert_eq!(report.total_rows_searched, 2);
        assert!(report.matches.iter().all(|m| m.row_index != 1));
    }

    #[test]
    fn selected_scope_needs_the_selection() {
        let state = state_with_names(&["alpha", "beta"]);
        let id = state.store.id_at(1).unwrap();
        let selected: HashSet<RowId> = [id].into_iter().collect();

        let mut request = SearchRequest::simple("a");
        request.scope = SearchScope::SelectedData;
        request.columns = Some(vec!["name".into()]);

        let report = search(&state, Some(&selected), &request).unwrap();
        assert_eq!(report.total_rows_searched, 1);
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].row_index, 1);

        let report = search(&state, None, &request).unwrap();
        assert_eq!(report.total_rows_searched, 0);
    }

    #[test]
    fn exact_and_prefix_modes() {
        let state = state_with_names(&["alpha", "alphabet"]);
        let mut request = SearchRequest::simple("alpha");
        request.columns = Some(vec!["name".into()]);

        request.mode = SearchMode::Exact;
        let report = search(&state, None, &request).unwrap();
        assert_eq!(report.matches.len(), 1);
        assert!(report.matches[0].exact);

        request.mode = SearchMode::StartsWith;
        let report = search(&state, None, &request).unwrap();
        assert_eq!(report.matches.len(), 2);
    }

    #[test]
    fn regex_mode_reports_the_span() {
        let state = state_with_names(&["item-42", "item-x"]);
        let mut request = SearchRequest::simple(r"item-\d+");
        request.mode = SearchMode::Regex;
        request.columns = Some(vec!["name".into()]);

        let report = search(&state, None, &request).unwrap();
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].matched_text, "item-42");

        request.text = "(".into();
        assert!(matches!(
            search(&state, None, &request),
            Err(GridError::InvalidInput(_))
        ));
    }

    #[test]
    fn fuzzy_ladder_orders_match_quality() {
        assert_eq!(fuzzy_score("abc", "abc"), 1.0);
        assert!(fuzzy_score("abc", "abcdef") > fuzzy_score("abc", "xxabcxx"));
        assert!(fuzzy_score("fb", "foo bar") >= 0.7); // acronym
        assert!(fuzzy_score("ace", "abcde") > 0.0); // scattered
        assert_eq!(fuzzy_score("xyz", "abc"), 0.0);
    }

    #[test]
    fn fuzzy_mode_applies_the_threshold() {
        let state = state_with_names(&["foo bar", "unrelated"]);
        let mut request = SearchRequest::simple("fb");
        request.mode = SearchMode::Fuzzy;
        request.fuzzy_threshold = 0.6;
        request.columns = Some(vec!["name".into()]);

        let report = search(&state, None, &request).unwrap();
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].row_index, 0);
    }

    #[test]
    fn relevance_ranking_sorts_by_score() {
        let state = state_with_names(&["alpha", "ralpha"]);
        let mut request = SearchRequest::simple("alpha");
        request.mode = SearchMode::Fuzzy;
        request.ranking = SearchRanking::Relevance;
        request.columns = Some(vec!["name".into()]);

        let report = search(&state, None, &request).unwrap();
        assert!(report.matches.len() >= 2);
        assert!(report.matches[0].score >= report.matches[1].score);
        assert_eq!(report.matches[0].row_index, 0);
    }

    #[test]
    fn max_matches_caps_the_result() {
        let state = state_with_names(&["a1", "a2", "a3", "a4"]);
        let mut request = SearchRequest::simple("a");
        request.max_matches = Some(2);

        let report = search(&state, None, &request).unwrap();
        assert_eq!(report.matches.len(), 2);
    }

    #[test]
    fn empty_needle_is_invalid() {
        let state = state_with_names(&["a"]);
        assert!(matches!(
            search(&state, None, &SearchRequest::simple("")),
            Err(GridError::InvalidInput(_))
        ));
    }
}
