//! Column registry: owns the column schema.
//!
//! Columns are ordered, unique by case-insensitive name, and carry the
//! width/visibility/special-type state the rest of the engine consults.
//! Mutations report a [`SchemaChange`] the row store consumes to
//! back-fill, drop, or reorder row keys.

use ahash::RandomState;
use common::{GridError, GridResult, is_reserved_field};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use types::{CellType, Value};

type Map<K, V> = HashMap<K, V, RandomState>;

/// Special-column semantics a column may declare.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialColumn {
    #[default]
    Normal,
    /// Drives the "only-checked" export selection.
    Checkbox,
    RowNumber,
    /// Receives serialized validation alerts.
    ValidationAlerts,
}

/// Describes one logical column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Canonical name; unique case-insensitively.
    pub name: String,
    pub header: String,
    pub data_type: CellType,
    pub visible: bool,
    pub width: f64,
    pub special: SpecialColumn,
    /// Value back-filled into existing rows when the column is added.
    pub default_value: Value,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: CellType) -> Self {
        let name = name.into();
        Self {
            header: name.clone(),
            name,
            data_type,
            visible: true,
            width: 100.0,
            special: SpecialColumn::Normal,
            default_value: Value::Null,
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = width;
        self
    }

    pub fn with_special(mut self, special: SpecialColumn) -> Self {
        self.special = special;
        self
    }

    pub fn with_default(mut self, default_value: Value) -> Self {
        self.default_value = default_value;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    fn validate(&self) -> GridResult<()> {
        if self.name.trim().is_empty() {
            return Err(GridError::InvalidInput("column name must not be empty".into()));
        }
        if is_reserved_field(&self.name) {
            return Err(GridError::InvalidInput(format!(
                "column name '{}' is reserved",
                self.name
            )));
        }
        if !self.width.is_finite() || self.width < 0.0 {
            return Err(GridError::InvalidInput(format!(
                "column '{}' has invalid width {}",
                self.name, self.width
            )));
        }
        Ok(())
    }
}

/// Width clamp applied by [`ColumnRegistry::resize_column`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WidthBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for WidthBounds {
    fn default() -> Self {
        Self {
            min: 40.0,
            max: 600.0,
        }
    }
}

/// Schema mutation the row store must mirror.
#[derive(Clone, Debug, PartialEq)]
pub enum SchemaChange {
    Added { name: String, default: Value },
    Removed { name: String },
    Replaced { name: String, default: Value },
    Reordered { order: Vec<String> },
}

/// Ordered column schema with a case-insensitive name index.
#[derive(Clone, Debug)]
pub struct ColumnRegistry {
    columns: Vec<ColumnDef>,
    bounds_min: f64,
    bounds_max: f64,
    name_index: Map<String, usize>,
}

impl ColumnRegistry {
    pub fn new(bounds: WidthBounds) -> Self {
        let mut registry = Self {
            columns: Vec::new(),
            bounds_min: bounds.min,
            bounds_max: bounds.max,
            name_index: Map::default(),
        };
        registry.rebuild_index();
        registry
    }

    fn rebuild_index(&mut self) {
        self.name_index.clear();
        for (idx, column) in self.columns.iter().enumerate() {
            self.name_index.insert(column.name.to_lowercase(), idx);
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Canonical (declaration-order) column names.
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn definitions(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> GridResult<&ColumnDef> {
        let idx = self
            .name_index
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| GridError::NotFound(format!("unknown column '{name}'")))?;
        self.columns
            .get(idx)
            .ok_or_else(|| GridError::NotFound(format!("unknown column '{name}'")))
    }

    pub fn get_at(&self, index: usize) -> GridResult<&ColumnDef> {
        self.columns
            .get(index)
            .ok_or_else(|| GridError::NotFound(format!("column index {index} out of range")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_index.contains_key(&name.to_lowercase())
    }

    /// Resolve any-case input to the canonical column name.
    pub fn canonical_name(&self, name: &str) -> GridResult<String> {
        self.get(name).map(|c| c.name.clone())
    }

    pub fn add_column(&mut self, def: ColumnDef) -> GridResult<SchemaChange> {
        def.validate()?;
        if self.contains(&def.name) {
            return Err(GridError::Conflict(format!(
                "column '{}' already exists",
                def.name
            )));
        }
        let change = SchemaChange::Added {
            name: def.name.clone(),
            default: def.default_value.clone(),
        };
        self.columns.push(def);
        self.rebuild_index();
        Ok(change)
    }

    pub fn remove_column(&mut self, name: &str) -> GridResult<SchemaChange> {
        let idx = self
            .name_index
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| GridError::NotFound(format!("unknown column '{name}'")))?;
        let removed = self.columns.remove(idx);
        self.rebuild_index();
        Ok(SchemaChange::Removed { name: removed.name })
    }

    /// Replace a definition in place, keyed by name. Schema changes that
    /// rewrite data (type or default changes) surface as `Replaced` so
    /// the store can re-coerce the column.
    pub fn update_column(&mut self, def: ColumnDef) -> GridResult<SchemaChange> {
        def.validate()?;
        let idx = self
            .name_index
            .get(&def.name.to_lowercase())
            .copied()
            .ok_or_else(|| GridError::NotFound(format!("unknown column '{}'", def.name)))?;
        let change = SchemaChange::Replaced {
            name: def.name.clone(),
            default: def.default_value.clone(),
        };
        self.columns[idx] = def;
        self.rebuild_index();
        Ok(change)
    }

    /// Reorder to `new_order`, which must be a case-insensitive
    /// permutation of the current names.
    pub fn reorder_columns(&mut self, new_order: &[String]) -> GridResult<SchemaChange> {
        if new_order.len() != self.columns.len() {
            return Err(GridError::Conflict(format!(
                "reorder lists {} columns, registry has {}",
                new_order.len(),
                self.columns.len()
            )));
        }
        let mut reordered = Vec::with_capacity(self.columns.len());
        let mut taken = vec![false; self.columns.len()];
        for name in new_order {
            let idx = self
                .name_index
                .get(&name.to_lowercase())
                .copied()
                .ok_or_else(|| {
                    GridError::Conflict(format!("reorder names unknown column '{name}'"))
                })?;
            if taken[idx] {
                return Err(GridError::Conflict(format!(
                    "reorder repeats column '{name}'"
                )));
            }
            taken[idx] = true;
            reordered.push(self.columns[idx].clone());
        }
        self.columns = reordered;
        self.rebuild_index();
        Ok(SchemaChange::Reordered {
            order: self.names(),
        })
    }

    /// Clamp to the configured bounds and return the applied width.
    pub fn resize_column(&mut self, index: usize, width: f64) -> GridResult<f64> {
        let (min, max) = (self.bounds_min, self.bounds_max);
        let column = self
            .columns
            .get_mut(index)
            .ok_or_else(|| GridError::NotFound(format!("column index {index} out of range")))?;
        let applied = if width.is_finite() {
            width.clamp(min, max)
        } else {
            min
        };
        column.width = applied;
        Ok(applied)
    }

    pub fn column_width(&self, index: usize) -> GridResult<f64> {
        self.get_at(index).map(|c| c.width)
    }

    /// The column that drives "only-checked" export selection: the
    /// explicit Checkbox special type wins, then the name heuristic.
    pub fn checkbox_column(&self) -> Option<&ColumnDef> {
        if let Some(column) = self
            .columns
            .iter()
            .find(|c| c.special == SpecialColumn::Checkbox)
        {
            return Some(column);
        }
        self.columns.iter().find(|c| {
            matches!(
                c.name.to_lowercase().as_str(),
                "selected" | "checked" | "isselected" | "ischecked"
            )
        })
    }

    /// The column designated to carry serialized alerts, if any.
    pub fn alerts_column(&self) -> Option<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.special == SpecialColumn::ValidationAlerts)
    }
}

impl Default for ColumnRegistry {
    fn default() -> Self {
        Self::new(WidthBounds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registry() -> ColumnRegistry {
        let mut registry = ColumnRegistry::default();
        registry
            .add_column(ColumnDef::new("id", CellType::Int))
            .unwrap();
        registry
            .add_column(ColumnDef::new("name", CellType::Text))
            .unwrap();
        registry
            .add_column(ColumnDef::new("age", CellType::Int))
            .unwrap();
        registry
    }

    #[test]
    fn add_and_lookup_is_case_insensitive() {
        let registry = sample_registry();
        assert_eq!(registry.get("NAME").unwrap().name, "name");
        assert_eq!(registry.canonical_name("Id").unwrap(), "id");
        assert!(registry.get("missing").is_err());
    }

    #[test]
    fn rejects_duplicate_names_any_case() {
        let mut registry = sample_registry();
        let err = registry
            .add_column(ColumnDef::new("NAME", CellType::Text))
            .unwrap_err();
        assert!(matches!(err, GridError::Conflict(_)));
        assert!(format!("{err}").contains("already exists"));
    }

    #[test]
    fn rejects_reserved_names() {
        let mut registry = ColumnRegistry::default();
        let err = registry
            .add_column(ColumnDef::new("__rowId", CellType::Text))
            .unwrap_err();
        assert!(matches!(err, GridError::InvalidInput(_)));
    }

    #[test]
    fn remove_reports_the_dropped_key() {
        let mut registry = sample_registry();
        let change = registry.remove_column("age").unwrap();
        assert_eq!(
            change,
            SchemaChange::Removed {
                name: "age".into()
            }
        );
        assert_eq!(registry.len(), 2);
        assert!(registry.get("age").is_err());
    }

    #[test]
    fn reorder_requires_a_permutation() {
        let mut registry = sample_registry();

        let err = registry
            .reorder_columns(&["id".into(), "name".into()])
            .unwrap_err();
        assert!(matches!(err, GridError::Conflict(_)));

        let err = registry
            .reorder_columns(&["id".into(), "name".into(), "name".into()])
            .unwrap_err();
        assert!(format!("{err}").contains("repeats"));

        registry
            .reorder_columns(&["age".into(), "id".into(), "name".into()])
            .unwrap();
        assert_eq!(registry.names(), vec!["age", "id", "name"]);
        // Index follows the order
        assert_eq!(registry.get_at(0).unwrap().name, "age");
    }

    #[test]
    fn resize_clamps_to_bounds() {
        let mut registry = ColumnRegistry::new(WidthBounds {
            min: 50.0,
            max: 300.0,
        });
        registry
            .add_column(ColumnDef::new("id", CellType::Int))
            .unwrap();

        assert_eq!(registry.resize_column(0, 10.0).unwrap(), 50.0);
        assert_eq!(registry.resize_column(0, 1000.0).unwrap(), 300.0);
        assert_eq!(registry.resize_column(0, 120.0).unwrap(), 120.0);
        assert_eq!(registry.column_width(0).unwrap(), 120.0);
        assert!(registry.resize_column(5, 100.0).is_err());
    }

    #[test]
    fn checkbox_detection_prefers_the_special_tag() {
        let mut registry = sample_registry();
        registry
            .add_column(ColumnDef::new("isChecked", CellType::Bool))
            .unwrap();
        // Name heuristic
        assert_eq!(registry.checkbox_column().unwrap().name, "isChecked");

        registry
            .add_column(
                ColumnDef::new("include", CellType::Bool).with_special(SpecialColumn::Checkbox),
            )
            .unwrap();
        // Explicit tag wins over the heuristic
        assert_eq!(registry.checkbox_column().unwrap().name, "include");
    }

    #[test]
    fn update_replaces_in_place() {
        let mut registry = sample_registry();
        let change = registry
            .update_column(
                ColumnDef::new("name", CellType::Text)
                    .with_header("Full name")
                    .with_default(Value::Text("?".into())),
            )
            .unwrap();
        assert!(matches!(change, SchemaChange::Replaced { .. }));
        assert_eq!(registry.get("name").unwrap().header, "Full name");
        // Position is preserved
        assert_eq!(registry.names(), vec!["id", "name", "age"]);
    }
}
