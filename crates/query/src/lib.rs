//! Query pipeline: pure sort/filter/search over row collections.
//!
//! Sort and search run over owned snapshots and never mutate the store;
//! the filter engine is the one stateful piece, owning the active clause
//! set and updating the store's visibility bitmap in place. All
//! functions produce results whose row references are valid at the time
//! of the call; callers serialize against mutators through the store
//! lock.

mod filter;
mod search;
mod sort;

pub use filter::{FilterClause, FilterEngine, FilterOperator};
pub use search::{
    SearchMatch, SearchMode, SearchRanking, SearchReport, SearchRequest, SearchScope, search,
};
pub use sort::{SortDirection, SortKey, compare_rows, sort_permutation, sort_rows};
