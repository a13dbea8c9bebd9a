//! Workbook column layout and cell coercion shared by import and export.

use crimelog_types::NewRecord;

/// Largest magnitude an imported count is clamped to.
pub const MAX_IMPORTED_COUNT: i64 = 1_000_000_000;

/// Canonical workbook columns, in export order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Year,
    Month,
    Station,
    Category,
    UnderInvestigation,
    Closed,
}

impl Column {
    /// All columns in export order.
    pub const ALL: [Column; 6] = [
        Column::Year,
        Column::Month,
        Column::Station,
        Column::Category,
        Column::UnderInvestigation,
        Column::Closed,
    ];

    /// Header label written on export.
    pub fn label(self) -> &'static str {
        match self {
            Column::Year => "Year",
            Column::Month => "Month",
            Column::Station => "Police Station",
            Column::Category => "Crime Type",
            Column::UnderInvestigation => "Under Investigation",
            Column::Closed => "Closed",
        }
    }

    /// Exported column width, in characters.
    pub fn width(self) -> f64 {
        match self {
            Column::Year | Column::Month => 6.0,
            Column::Station | Column::UnderInvestigation => 20.0,
            Column::Category => 25.0,
            Column::Closed => 10.0,
        }
    }

    /// Spreadsheet column letter in export order.
    pub fn letter(self) -> &'static str {
        match self {
            Column::Year => "A",
            Column::Month => "B",
            Column::Station => "C",
            Column::Category => "D",
            Column::UnderInvestigation => "E",
            Column::Closed => "F",
        }
    }

    /// Lowercase header spellings accepted on import, besides the label.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::Year => &["year"],
            Column::Month => &["month"],
            Column::Station => &["station", "police_station", "policestation"],
            Column::Category => &["category", "crime_type", "crimetype"],
            Column::UnderInvestigation => &["under_investigation", "underinvestigation"],
            Column::Closed => &["closed"],
        }
    }

    /// Map a header cell to a column, case-insensitively.
    ///
    /// ```
    /// use crimelog_sync::Column;
    ///
    /// assert_eq!(Column::from_header(" police station "), Some(Column::Station));
    /// assert_eq!(Column::from_header("crimeType"), Some(Column::Category));
    /// assert_eq!(Column::from_header("Notes"), None);
    /// ```
    pub fn from_header(header: &str) -> Option<Column> {
        let header = header.trim().to_lowercase();
        if header.is_empty() {
            return None;
        }
        Column::ALL.into_iter().find(|column| {
            column.label().to_lowercase() == header || column.aliases().contains(&header.as_str())
        })
    }
}

/// A cell value as read from any supported workbook format.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    /// Booleans, dates, durations, error cells.
    Other(String),
}

impl CellValue {
    fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Integer coercion. Fractions truncate toward zero; anything else is `0`.
    pub fn to_count(&self) -> i64 {
        match self {
            CellValue::Int(i) => *i,
            CellValue::Float(f) => truncate(*f),
            CellValue::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(truncate))
                    .unwrap_or(0)
            }
            CellValue::Empty | CellValue::Other(_) => 0,
        }
    }

    /// Text coercion. Integral numbers render without a fractional part.
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) | CellValue::Other(s) => s.trim().to_string(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) if f.fract() == 0.0 && f.is_finite() => format!("{}", *f as i64),
            CellValue::Float(f) => f.to_string(),
        }
    }
}

fn truncate(value: f64) -> i64 {
    if value.is_finite() {
        value.trunc() as i64
    } else {
        0
    }
}

fn clamp_count(value: &CellValue) -> i64 {
    value
        .to_count()
        .clamp(-MAX_IMPORTED_COUNT, MAX_IMPORTED_COUNT)
}

/// Header positions of the recognized columns.
#[derive(Debug, Clone, Default)]
pub(crate) struct HeaderMap {
    positions: Vec<(usize, Column)>,
}

impl HeaderMap {
    /// Recognize columns in a header row. The first match for a column wins.
    pub(crate) fn from_row(row: &[CellValue]) -> Self {
        let mut positions: Vec<(usize, Column)> = Vec::new();
        for (index, cell) in row.iter().enumerate() {
            if let Some(column) = Column::from_header(&cell.to_text())
                && !positions.iter().any(|(_, c)| *c == column)
            {
                positions.push((index, column));
            }
        }
        Self { positions }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Build a record from a data row, or `None` when every recognized cell is blank.
    pub(crate) fn record(&self, row: &[CellValue]) -> Option<NewRecord> {
        let cell = |index: usize| row.get(index).unwrap_or(&CellValue::Empty);

        if self.positions.iter().all(|(index, _)| cell(*index).is_blank()) {
            return None;
        }

        let mut record = NewRecord::default();
        for &(index, column) in &self.positions {
            let value = cell(index);
            match column {
                Column::Year => record.year = i32::try_from(value.to_count()).unwrap_or(0),
                Column::Month => record.month = i32::try_from(value.to_count()).unwrap_or(0),
                Column::Station => record.station = value.to_text(),
                Column::Category => record.category = value.to_text(),
                Column::UnderInvestigation => record.under_investigation = clamp_count(value),
                Column::Closed => record.closed = clamp_count(value),
            }
        }
        Some(record)
    }
}
