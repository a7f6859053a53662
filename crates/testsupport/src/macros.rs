//! Test setup macros for reducing boilerplate across the engine test
//! suites.

/// Creates a `RowMap` with typed cells.
///
/// # Syntax
///
/// ```text
/// row_map! { "col" => Value::Int(1), "other" => Value::Null }
/// ```
///
/// # Examples
///
/// ```
/// use testsupport::row_map;
/// use types::Value;
///
/// let cells = row_map! {
///     "id" => Value::Int(1),
///     "name" => Value::Text("Ada".into()),
/// };
/// assert_eq!(cells.len(), 2);
/// ```
#[macro_export]
macro_rules! row_map {
    { $($col:expr => $val:expr),* $(,)? } => {{
        let mut cells = ::common::RowMap::new();
        $(cells.insert($col.to_string(), $val);)*
        cells
    }};
}

/// Adds columns to a grid in one line.
///
/// # Examples
///
/// ```
/// use grid::Grid;
/// use common::GridOptions;
/// use testsupport::grid_schema;
/// use types::CellType;
///
/// let grid = Grid::new(GridOptions::default()).unwrap();
/// grid_schema!(grid, "id" => CellType::Int, "name" => CellType::Text);
/// assert_eq!(grid.columns().get_column_definitions().unwrap().len(), 2);
/// ```
#[macro_export]
macro_rules! grid_schema {
    ($grid:expr, $($col:expr => $typ:expr),+ $(,)?) => {
        $(
            $grid
                .columns()
                .add_column(::columns::ColumnDef::new($col, $typ))
                .expect("schema setup");
        )+
    };
}
