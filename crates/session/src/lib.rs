//! Selection and the single-slot cell edit session.

mod edit;
mod selection;

pub use edit::{EditManager, EditSession};
pub use selection::{CellRef, Selection, SelectionManager, SelectionMode};
