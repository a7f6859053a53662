//! Test support utilities for the grid engine workspace.
//!
//! This crate provides testing infrastructure shared by the engine
//! crates:
//! - Pre-wired grid fixtures with a canonical schema
//! - Row and table-shape builders
//! - Property-based test generators for core types
//! - Custom assertion helpers
//!
//! # Example Usage
//!
//! ```
//! use testsupport::prelude::*;
//! use types::Value;
//!
//! let grid = grid_fixture();
//! grid.rows().add_row(person_row(1, "Ada", 36)).unwrap();
//!
//! assert_row_count(&grid, 1);
//! assert_cell(&grid, 0, "name", &Value::Text("Ada".into()));
//! ```

pub mod assertions;
pub mod fixtures;
pub mod macros;
pub mod proptest_generators;

/// Convenient re-exports for common testing patterns.
pub mod prelude {
    pub use crate::assertions::*;
    pub use crate::fixtures::*;
    pub use crate::proptest_generators::*;
}
