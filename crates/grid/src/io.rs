//! Import/export dispatch.

use crate::Grid;
use common::{Feature, GridResult, RefreshKind, RowMap, TableShape};
use interchange::{
    ExportOptions, ExportReport, ExportTarget, ExportedData, ImportOptions, ImportReport,
    ImportSource,
};
use validation::BatchRequest;

pub struct IoApi<'a> {
    pub(crate) grid: &'a Grid,
}

impl IoApi<'_> {
    /// Run an import. After the rows land, the active filter is
    /// re-applied so new rows pick it up. When real-time validation is
    /// on or the options ask for it, a deferred batch validation pass
    /// runs over the store.
    pub fn import(
        &self,
        source: ImportSource,
        options: &ImportOptions,
    ) -> GridResult<ImportReport> {
        self.grid
            .execute_mut("import", Feature::Import, RefreshKind::Full, |grid, scope| {
                let report = interchange::import(grid.shared(), source, options)?;

                {
                    let mut state = grid.shared().write();
                    grid.filters().lock().recompute(&mut state);
                    // A Replace import drops rows the selection may
                    // still reference
                    grid.selection().lock().prune(&state);
                }

                if options.validate_after || grid.options().enable_real_time_validation {
                    let rules = grid.rules().read();
                    if !rules.is_empty() {
                        let request = BatchRequest {
                            cancel: options.cancel.clone(),
                            ..Default::default()
                        };
                        validation::validate_all(
                            grid.shared(),
                            &rules,
                            grid.options(),
                            &request,
                        )?;
                    }
                }

                if report.failed_rows > 0 {
                    Grid::warn_scope(scope, "import completed with failed rows");
                }
                let imported = report.imported_rows;
                Ok((report, imported))
            })
    }

    /// Run an export. When batch validation is enabled and the selected
    /// rows do not all pass, the export proceeds and the scope records a
    /// warning; nothing is blocked by default.
    pub fn export(
        &self,
        options: &ExportOptions,
    ) -> GridResult<(ExportedData, ExportReport)> {
        self.grid
            .execute_mut("export", Feature::Export, RefreshKind::Rows, |grid, scope| {
                if grid.options().enable_batch_validation {
                    let rules = grid.rules().read();
                    if !rules.is_empty()
                        && !validation::are_all_non_empty_rows_valid(
                            grid.shared(),
                            &rules,
                            options.only_filtered,
                            options.only_checked,
                        )?
                    {
                        Grid::warn_scope(scope, "exporting rows with validation errors");
                    }
                }

                let mut options = options.clone();
                if options.batch_size == 0 {
                    options.batch_size = grid.options().export_batch_size;
                }
                let (data, report) = interchange::export(grid.shared(), &options)?;
                let affected = if options.remove_after_export {
                    let state = grid.shared().read();
                    grid.selection().lock().prune(&state);
                    report.exported_rows
                } else {
                    0
                };
                Ok(((data, report), affected))
            })
    }

    /// Current rows as a list of row mappings (ids included).
    pub fn get_current_data(&self) -> GridResult<Vec<RowMap>> {
        let (data, _) = self.export(&ExportOptions {
            target: ExportTarget::Mappings,
            ..Default::default()
        })?;
        match data {
            ExportedData::Mappings(rows) => Ok(rows),
            ExportedData::Table(_) => unreachable!("requested mappings"),
        }
    }

    /// Current rows as the rectangular table shape.
    pub fn get_current_data_as_table(&self) -> GridResult<TableShape> {
        let (data, _) = self.export(&ExportOptions {
            target: ExportTarget::Table,
            ..Default::default()
        })?;
        match data {
            ExportedData::Table(shape) => Ok(shape),
            ExportedData::Mappings(_) => unreachable!("requested table shape"),
        }
    }
}
