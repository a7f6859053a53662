//! Validation dispatch.

use crate::Grid;
use common::{AlertRecord, Feature, GridResult, RefreshKind, RowId};
use validation::{BatchRequest, Rule, RuleGroup, ValidationStatistics};

pub struct ValidationApi<'a> {
    pub(crate) grid: &'a Grid,
}

impl ValidationApi<'_> {
    /// Register a rule. Re-registering an id replaces the rule and
    /// invalidates its stored alerts.
    pub fn add_rule(&self, rule: Rule) -> GridResult<()> {
        self.grid.execute_mut(
            "add_rule",
            Feature::Validation,
            RefreshKind::Alerts,
            |grid, _| {
                let replaced = grid.rules().write().add_rule(rule);
                if let Some(rule_id) = replaced {
                    grid.shared().write().store.remove_rule_alerts(&rule_id);
                }
                Ok(((), 0))
            },
        )
    }

    /// Remove one rule by id or name, dropping its alerts.
    pub fn remove_rule(&self, id_or_name: &str) -> GridResult<()> {
        self.grid.execute_mut(
            "remove_rule",
            Feature::Validation,
            RefreshKind::Alerts,
            |grid, _| {
                let removed = grid.rules().write().remove_rule(id_or_name)?;
                grid.shared().write().store.remove_rule_alerts(&removed);
                Ok(((), 0))
            },
        )
    }

    /// Remove every rule depending on any of `columns`.
    pub fn remove_rules(&self, columns: &[String]) -> GridResult<usize> {
        self.grid.execute_mut(
            "remove_rules",
            Feature::Validation,
            RefreshKind::Alerts,
            |grid, _| {
                let removed = grid.rules().write().remove_rules_for_columns(columns);
                let mut state = grid.shared().write();
                for rule_id in &removed {
                    state.store.remove_rule_alerts(rule_id);
                }
                Ok((removed.len(), 0))
            },
        )
    }

    pub fn clear_all_rules(&self) -> GridResult<()> {
        self.grid.execute_mut(
            "clear_all_rules",
            Feature::Validation,
            RefreshKind::Alerts,
            |grid, _| {
                grid.rules().write().clear();
                grid.shared().write().store.clear_alerts();
                Ok(((), 0))
            },
        )
    }

    /// Names of the rules scoped to one column, in registration order.
    /// The association is derived from each rule's dependent columns,
    /// so it never drifts from the registry.
    pub fn get_rules_for_column(&self, column: &str) -> GridResult<Vec<String>> {
        self.grid
            .execute("get_rules_for_column", Feature::Validation, |grid, _| {
                let rules = grid.rules().read();
                Ok(rules
                    .rules_for_column(column)
                    .iter()
                    .map(|r| r.name.clone())
                    .collect())
            })
    }

    pub fn add_rule_group(&self, group: RuleGroup) -> GridResult<()> {
        self.grid.execute_mut(
            "add_rule_group",
            Feature::Validation,
            RefreshKind::Alerts,
            |grid, _| {
                grid.rules().write().add_group(group)?;
                Ok(((), 0))
            },
        )
    }

    /// Full dataset pass; true when no selected row holds an
    /// Error-severity alert.
    pub fn validate_all(&self, only_filtered: bool, only_checked: bool) -> GridResult<bool> {
        self.validate_all_with_statistics(only_filtered, only_checked)
            .map(|stats| stats.invalid_rows == 0)
    }

    pub fn validate_all_with_statistics(
        &self,
        only_filtered: bool,
        only_checked: bool,
    ) -> GridResult<ValidationStatistics> {
        let request = BatchRequest {
            only_filtered,
            only_checked,
            ..Default::default()
        };
        self.validate_all_with(&request)
    }

    /// Dataset pass with full control over progress and cancellation.
    pub fn validate_all_with(
        &self,
        request: &BatchRequest,
    ) -> GridResult<ValidationStatistics> {
        self.grid.execute_mut(
            "validate_all",
            Feature::Validation,
            RefreshKind::Alerts,
            |grid, _| {
                let rules = grid.rules().read();
                let stats =
                    validation::validate_all(grid.shared(), &rules, grid.options(), request)?;
                let affected = stats.invalid_rows;
                Ok((stats, affected))
            },
        )
    }

    pub fn are_all_non_empty_rows_valid(
        &self,
        only_filtered: bool,
        only_checked: bool,
    ) -> GridResult<bool> {
        self.grid
            .execute("are_all_non_empty_rows_valid", Feature::Validation, |grid, _| {
                let rules = grid.rules().read();
                validation::are_all_non_empty_rows_valid(
                    grid.shared(),
                    &rules,
                    only_filtered,
                    only_checked,
                )
            })
    }

    /// Stored alerts for the selected rows.
    pub fn get_validation_errors(
        &self,
        only_filtered: bool,
        only_checked: bool,
    ) -> GridResult<Vec<(RowId, AlertRecord)>> {
        self.grid
            .execute("get_validation_errors", Feature::Validation, |grid, _| {
                Ok(validation::stored_alerts(
                    &grid.shared().read(),
                    only_filtered,
                    only_checked,
                ))
            })
    }

    /// Stored alerts for one row.
    pub fn get_validation_alerts(&self, id: RowId) -> GridResult<Vec<AlertRecord>> {
        self.grid
            .execute("get_validation_alerts", Feature::Validation, |grid, _| {
                Ok(grid.shared().read().store.alerts_for(id).to_vec())
            })
    }

    pub fn has_validation_errors(&self, id: RowId) -> GridResult<bool> {
        self.grid
            .execute("has_validation_errors", Feature::Validation, |grid, _| {
                Ok(grid.shared().read().store.row_has_errors(id))
            })
    }

    /// Serialize current alerts into the designated alerts column.
    pub fn refresh_validation_results_to_ui(&self) -> GridResult<usize> {
        self.grid.execute_mut(
            "refresh_validation_results_to_ui",
            Feature::Validation,
            RefreshKind::Alerts,
            |grid, _| {
                let mut state = grid.shared().write();
                let touched = validation::refresh_alerts_column(&mut state);
                Ok((touched, touched))
            },
        )
    }
}
