//! Rule model and registry.

use ahash::RandomState;
use common::{GridError, GridResult, Row, Severity};
use hashbrown::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type Map<K, V> = HashMap<K, V, RandomState>;
type Set<T> = HashSet<T, RandomState>;

/// Context handed to every evaluator. Rules must be pure functions of
/// the row and this context.
#[derive(Clone, Debug, Default)]
pub struct RuleContext {
    /// Columns changed by the triggering edit, when known. `None` means
    /// a full recheck.
    pub changed_columns: Option<Vec<String>>,
    pub row_index: Option<usize>,
}

/// Result of one rule evaluation.
#[derive(Clone, Debug, PartialEq)]
pub enum RuleOutcome {
    Pass,
    Fail(Failure),
}

impl RuleOutcome {
    pub fn fail(message: impl Into<String>) -> Self {
        RuleOutcome::Fail(Failure {
            message: message.into(),
            severity: None,
            column: None,
        })
    }
}

/// Details of a failed evaluation. Severity and column fall back to the
/// rule's own severity and first dependent column when unset.
#[derive(Clone, Debug, PartialEq)]
pub struct Failure {
    pub message: String,
    pub severity: Option<Severity>,
    pub column: Option<String>,
}

impl Failure {
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

pub type RuleFn = Arc<dyn Fn(&Row, &RuleContext) -> RuleOutcome + Send + Sync>;

/// A registered validation rule.
#[derive(Clone)]
pub struct Rule {
    pub id: String,
    pub name: String,
    /// Columns this rule reads. Never empty.
    pub dependent_columns: Vec<String>,
    pub severity: Severity,
    pub enabled: bool,
    pub timeout: Duration,
    evaluator: RuleFn,
}

impl Rule {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

    pub fn new<F>(
        id: impl Into<String>,
        name: impl Into<String>,
        dependent_columns: Vec<String>,
        severity: Severity,
        evaluator: F,
    ) -> GridResult<Self>
    where
        F: Fn(&Row, &RuleContext) -> RuleOutcome + Send + Sync + 'static,
    {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(GridError::InvalidInput("rule id must not be empty".into()));
        }
        if dependent_columns.is_empty() {
            return Err(GridError::InvalidInput(format!(
                "rule '{id}' must depend on at least one column"
            )));
        }
        Ok(Self {
            id,
            name: name.into(),
            dependent_columns,
            severity,
            enabled: true,
            timeout: Self::DEFAULT_TIMEOUT,
            evaluator: Arc::new(evaluator),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Raw evaluator call. Use [`crate::run_rule`] for the guarded
    /// variant that catches panics and applies the timeout.
    pub fn evaluate(&self, row: &Row, ctx: &RuleContext) -> RuleOutcome {
        (self.evaluator)(row, ctx)
    }

    /// True when any of the rule's dependent columns is in `changed`
    /// (case-insensitive).
    pub fn depends_on_any(&self, changed: &[String]) -> bool {
        self.dependent_columns.iter().any(|dep| {
            changed
                .iter()
                .any(|c| c.eq_ignore_ascii_case(dep))
        })
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("dependent_columns", &self.dependent_columns)
            .field("severity", &self.severity)
            .field("enabled", &self.enabled)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// How a group combines its member outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupOperator {
    And,
    Or,
}

/// An ordered set of rules combined under one operator. Groups bind to a
/// column for presentation but evaluate across the whole row.
#[derive(Clone, Debug)]
pub struct RuleGroup {
    pub id: String,
    pub name: String,
    pub column: String,
    pub operator: GroupOperator,
    pub rule_ids: Vec<String>,
}

/// Rule storage plus the derived column index used for dependency
/// tracking.
#[derive(Default)]
pub struct RuleRegistry {
    rules: Map<String, Rule>,
    order: Vec<String>,
    by_column: Map<String, Set<String>>,
    groups: Map<String, RuleGroup>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Register a rule. An existing rule with the same id is replaced;
    /// the replaced id is returned so its stored alerts can be
    /// invalidated.
    pub fn add_rule(&mut self, rule: Rule) -> Option<String> {
        let id = rule.id.clone();
        let replaced = if self.rules.contains_key(&id) {
            self.order.retain(|r| r != &id);
            Some(id.clone())
        } else {
            None
        };
        self.order.push(id.clone());
        self.rules.insert(id, rule);
        self.rebuild_column_index();
        replaced
    }

    /// Remove by id, falling back to rule name. Returns the removed
    /// rule's id.
    pub fn remove_rule(&mut self, id_or_name: &str) -> GridResult<String> {
        let id = if self.rules.contains_key(id_or_name) {
            id_or_name.to_string()
        } else {
            self.order
                .iter()
                .find(|id| {
                    self.rules
                        .get(*id)
                        .is_some_and(|r| r.name == id_or_name)
                })
                .cloned()
                .ok_or_else(|| GridError::NotFound(format!("unknown rule '{id_or_name}'")))?
        };
        self.rules.remove(&id);
        self.order.retain(|r| r != &id);
        self.groups.retain(|_, g| {
            g.rule_ids.retain(|r| r != &id);
            !g.rule_ids.is_empty()
        });
        self.rebuild_column_index();
        Ok(id)
    }

    /// Remove every rule depending on any of `columns`. Returns the
    /// removed ids.
    pub fn remove_rules_for_columns(&mut self, columns: &[String]) -> Vec<String> {
        let doomed: Vec<String> = self
            .order
            .iter()
            .filter(|id| {
                self.rules
                    .get(*id)
                    .is_some_and(|r| r.depends_on_any(columns))
            })
            .cloned()
            .collect();
        for id in &doomed {
            self.rules.remove(id);
        }
        self.order.retain(|id| !doomed.contains(id));
        self.groups.retain(|_, g| {
            g.rule_ids.retain(|r| !doomed.contains(r));
            !g.rule_ids.is_empty()
        });
        self.rebuild_column_index();
        doomed
    }

    /// Drop everything. Returns the removed ids.
    pub fn clear(&mut self) -> Vec<String> {
        let ids = std::mem::take(&mut self.order);
        self.rules.clear();
        self.by_column.clear();
        self.groups.clear();
        ids
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.get(id)
    }

    /// Enabled rules in registration order.
    pub fn enabled_rules(&self) -> Vec<&Rule> {
        self.order
            .iter()
            .filter_map(|id| self.rules.get(id))
            .filter(|r| r.enabled)
            .collect()
    }

    /// Enabled rules whose dependencies intersect `changed`, in
    /// registration order.
    pub fn rules_for_changes(&self, changed: &[String]) -> Vec<&Rule> {
        self.enabled_rules()
            .into_iter()
            .filter(|r| r.depends_on_any(changed))
            .collect()
    }

    /// Ordered rules scoped to one column.
    pub fn rules_for_column(&self, column: &str) -> Vec<&Rule> {
        self.by_column
            .get(&column.to_lowercase())
            .map(|ids| {
                self.order
                    .iter()
                    .filter(|id| ids.contains(*id))
                    .filter_map(|id| self.rules.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn add_group(&mut self, group: RuleGroup) -> GridResult<()> {
        if group.rule_ids.is_empty() {
            return Err(GridError::InvalidInput(format!(
                "rule group '{}' must contain at least one rule",
                group.id
            )));
        }
        for id in &group.rule_ids {
            if !self.rules.contains_key(id) {
                return Err(GridError::NotFound(format!(
                    "rule group '{}' references unknown rule '{id}'",
                    group.id
                )));
            }
        }
        self.groups.insert(group.id.clone(), group);
        Ok(())
    }

    pub fn remove_group(&mut self, id: &str) -> GridResult<RuleGroup> {
        self.groups
            .remove(id)
            .ok_or_else(|| GridError::NotFound(format!("unknown rule group '{id}'")))
    }

    pub fn groups(&self) -> impl Iterator<Item = &RuleGroup> {
        self.groups.values()
    }

    fn rebuild_column_index(&mut self) {
        self.by_column.clear();
        for rule in self.rules.values() {
            for column in &rule.dependent_columns {
                self.by_column
                    .entry(column.to_lowercase())
                    .or_default()
                    .insert(rule.id.clone());
            }
        }
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.order)
            .field("groups", &self.groups.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{RowId, RowMap};
    use types::Value;

    fn not_null_rule(id: &str, column: &str) -> Rule {
        let column_name = column.to_string();
        Rule::new(
            id,
            format!("{column} required"),
            vec![column.to_string()],
            Severity::Error,
            move |row, _ctx| {
                if row.value_or_null(&column_name).is_null() {
                    RuleOutcome::fail(format!("{column_name} must not be null"))
                } else {
                    RuleOutcome::Pass
                }
            },
        )
        .unwrap()
    }

    fn row_with(column: &str, value: Value) -> Row {
        let mut cells = RowMap::new();
        cells.insert(column.into(), value);
        Row::from_cells(RowId::allocate(), cells)
    }

    #[test]
    fn rules_require_dependent_columns() {
        let err = Rule::new("r1", "r1", vec![], Severity::Error, |_, _| RuleOutcome::Pass)
            .unwrap_err();
        assert!(matches!(err, GridError::InvalidInput(_)));
    }

    #[test]
    fn same_row_same_outcome() {
        let rule = not_null_rule("r1", "a");
        let row = row_with("a", Value::Null);
        let ctx = RuleContext::default();
        assert_eq!(rule.evaluate(&row, &ctx), rule.evaluate(&row, &ctx));
    }

    #[test]
    fn add_with_same_id_replaces() {
        let mut registry = RuleRegistry::new();
        assert_eq!(registry.add_rule(not_null_rule("r1", "a")), None);
        assert_eq!(
            registry.add_rule(not_null_rule("r1", "b")),
            Some("r1".to_string())
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("r1").unwrap().dependent_columns, vec!["b"]);
        // Column index follows the replacement
        assert!(registry.rules_for_column("a").is_empty());
        assert_eq!(registry.rules_for_column("b").len(), 1);
    }

    #[test]
    fn dependency_intersection_is_case_insensitive() {
        let mut registry = RuleRegistry::new();
        registry.add_rule(not_null_rule("r1", "Name"));
        registry.add_rule(not_null_rule("r2", "age"));

        let hits = registry.rules_for_changes(&["NAME".to_string()]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "r1");
    }

    #[test]
    fn remove_by_name_falls_back() {
        let mut registry = RuleRegistry::new();
        registry.add_rule(not_null_rule("r1", "a"));
        assert_eq!(registry.remove_rule("a required").unwrap(), "r1");
        assert!(registry.is_empty());
        assert!(registry.remove_rule("nope").is_err());
    }

    #[test]
    fn remove_for_columns_sweeps_dependents() {
        let mut registry = RuleRegistry::new();
        registry.add_rule(not_null_rule("r1", "a"));
        registry.add_rule(not_null_rule("r2", "b"));
        registry.add_rule(not_null_rule("r3", "a"));

        let removed = registry.remove_rules_for_columns(&["a".to_string()]);
        assert_eq!(removed, vec!["r1", "r3"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn disabled_rules_do_not_match() {
        let mut registry = RuleRegistry::new();
        registry.add_rule(not_null_rule("r1", "a").disabled());
        assert!(registry.rules_for_changes(&["a".to_string()]).is_empty());
        assert!(registry.enabled_rules().is_empty());
    }

    #[test]
    fn groups_validate_membership() {
        let mut registry = RuleRegistry::new();
        registry.add_rule(not_null_rule("r1", "a"));

        let err = registry
            .add_group(RuleGroup {
                id: "g1".into(),
                name: "g1".into(),
                column: "a".into(),
                operator: GroupOperator::And,
                rule_ids: vec!["missing".into()],
            })
            .unwrap_err();
        assert!(matches!(err, GridError::NotFound(_)));

        registry
            .add_group(RuleGroup {
                id: "g1".into(),
                name: "g1".into(),
                column: "a".into(),
                operator: GroupOperator::And,
                rule_ids: vec!["r1".into()],
            })
            .unwrap();
        // Removing the last member rule dissolves the group
        registry.remove_rule("r1").unwrap();
        assert_eq!(registry.groups().count(), 0);
    }

    #[test]
    fn groups_can_be_removed_directly() {
        let mut registry = RuleRegistry::new();
        registry.add_rule(not_null_rule("r1", "a"));
        registry
            .add_group(RuleGroup {
                id: "g1".into(),
                name: "g1".into(),
                column: "a".into(),
                operator: GroupOperator::Or,
                rule_ids: vec!["r1".into()],
            })
            .unwrap();

        let removed = registry.remove_group("g1").unwrap();
        assert_eq!(removed.id, "g1");
        assert_eq!(registry.groups().count(), 0);
        assert!(registry.remove_group("g1").is_err());
    }
}
