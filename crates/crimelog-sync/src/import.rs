//! Workbook importer.
//!
//! Parsing is synchronous and reads the whole first sheet into memory before
//! the store is touched. Run it on the blocking pool from async code.

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use tracing::{debug, info};

use crimelog_store::Store;
use crimelog_types::NewRecord;

use crate::error::ImportError;
use crate::workbook::{CellValue, HeaderMap};

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookFormat {
    /// Any format calamine reads (xlsx, xlsm, xlsb, xls, ods).
    Spreadsheet,
    Csv,
}

impl WorkbookFormat {
    /// Detect the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(WorkbookFormat::Spreadsheet),
            "csv" => Some(WorkbookFormat::Csv),
            _ => None,
        }
    }
}

/// Parse the first sheet of a workbook into records.
///
/// An entirely empty sheet yields no records. A header row without any
/// recognized column label is an error.
pub fn read_workbook(path: &Path) -> Result<Vec<NewRecord>, ImportError> {
    if !path.exists() {
        return Err(ImportError::NotFound(path.to_path_buf()));
    }

    let rows = match WorkbookFormat::from_path(path) {
        Some(WorkbookFormat::Spreadsheet) => read_spreadsheet_rows(path)?,
        Some(WorkbookFormat::Csv) => read_csv_rows(path)?,
        None => {
            return Err(ImportError::UnsupportedFormat(
                path.extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ));
        }
    };

    records_from_rows(rows)
}

/// Parse `path` and replace the store's contents with its rows.
///
/// Nothing is written unless the whole workbook parses.
pub fn import_into(store: &Store, path: &Path) -> Result<usize, ImportError> {
    let records = read_workbook(path)?;
    let count = store.replace_all(&records)?;
    info!("Imported {} records from {}", count, path.display());
    Ok(count)
}

pub(crate) fn records_from_rows<I>(rows: I) -> Result<Vec<NewRecord>, ImportError>
where
    I: IntoIterator<Item = Vec<CellValue>>,
{
    let mut rows = rows.into_iter();

    let Some(header) = rows.next() else {
        debug!("Workbook is empty");
        return Ok(Vec::new());
    };

    let columns = HeaderMap::from_row(&header);
    if columns.is_empty() {
        return Err(ImportError::NoRecognizedColumns);
    }

    Ok(rows.filter_map(|row| columns.record(&row)).collect())
}

fn read_spreadsheet_rows(path: &Path) -> Result<Vec<Vec<CellValue>>, ImportError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| ImportError::Read(format!("{}", e)))?;

    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ImportError::NoSheets)?;

    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| ImportError::Read(format!("sheet '{}': {}", first, e)))?;

    debug!("Reading sheet '{}' ({:?} cells)", first, range.get_size());

    Ok(range
        .rows()
        .map(|row| row.iter().map(convert_cell).collect())
        .collect())
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        // booleans, dates, durations and error cells count as non-numeric
        other => CellValue::Other(other.to_string()),
    }
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<CellValue>>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(rows)
}
