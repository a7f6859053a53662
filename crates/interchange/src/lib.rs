//! Import/export pipeline over the two in-memory interchange shapes.
//!
//! Import streams batches into the store, committing batch by batch so
//! cancellation keeps completed work; export streams batches out,
//! composing the filtered/checked row selections with column projection
//! and the optional alerts column. The only supported shapes are the
//! rectangular [`common::TableShape`] and a list of row mappings; there
//! is no file or wire format on this boundary.

mod export;
mod import;

pub use export::{ExportOptions, ExportReport, ExportTarget, ExportedData, export};
pub use import::{ImportMode, ImportOptions, ImportReport, ImportSource, import};
