//! Workbook exporter.

use std::path::Path;

use tracing::info;
use umya_spreadsheet::{new_file, writer};

use crimelog_store::Store;
use crimelog_types::Record;

use crate::error::ExportError;
use crate::workbook::Column;

/// Name of the single sheet in exported workbooks.
pub const SHEET_NAME: &str = "Crime Data";

/// Default sheet created by a new umya workbook.
const DEFAULT_SHEET: &str = "Sheet1";

/// Write `records` to `path`, overwriting it.
///
/// `.xlsx` targets get a `Crime Data` sheet with fixed column widths;
/// `.csv` targets get the same header and rows.
pub fn write_workbook(records: &[Record], path: &Path) -> Result<usize, ExportError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xlsx" | "xlsm" => write_xlsx(records, path)?,
        "csv" => write_csv(records, path)?,
        _ => return Err(ExportError::UnsupportedFormat(ext)),
    }

    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(records.len())
}

/// Write the store's full contents, in id order, to `path`.
pub fn export_from(store: &Store, path: &Path) -> Result<usize, ExportError> {
    let records = store.all_records()?;
    write_workbook(&records, path)
}

fn write_xlsx(records: &[Record], path: &Path) -> Result<(), ExportError> {
    let mut book = new_file();
    let sheet = book
        .get_sheet_by_name_mut(DEFAULT_SHEET)
        .ok_or_else(|| ExportError::Write("new workbook has no default sheet".to_string()))?;
    sheet.set_name(SHEET_NAME);

    for (col_idx, column) in Column::ALL.iter().enumerate() {
        let col_num = (col_idx + 1) as u32;
        sheet.get_cell_mut((col_num, 1)).set_value(column.label());
        sheet
            .get_column_dimension_mut(column.letter())
            .set_width(column.width());
    }

    for (row_idx, record) in records.iter().enumerate() {
        let row_num = (row_idx + 2) as u32;
        sheet
            .get_cell_mut((1, row_num))
            .set_value_number(f64::from(record.year));
        sheet
            .get_cell_mut((2, row_num))
            .set_value_number(f64::from(record.month));
        sheet.get_cell_mut((3, row_num)).set_value(&record.station);
        sheet.get_cell_mut((4, row_num)).set_value(&record.category);
        sheet
            .get_cell_mut((5, row_num))
            .set_value_number(record.under_investigation as f64);
        sheet
            .get_cell_mut((6, row_num))
            .set_value_number(record.closed as f64);
    }

    writer::xlsx::write(&book, path).map_err(|e| ExportError::Write(format!("{}", e)))
}

fn write_csv(records: &[Record], path: &Path) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(Column::ALL.iter().map(|c| c.label()))?;

    for record in records {
        writer.write_record([
            record.year.to_string(),
            record.month.to_string(),
            record.station.clone(),
            record.category.clone(),
            record.under_investigation.to_string(),
            record.closed.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
