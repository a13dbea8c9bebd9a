//! Query builder and page type for record listings.
//!
//! [`RecordFilter`] follows the builder pattern; every condition is optional
//! and conditions combine with `AND`.
//!
//! # Example
//!
//! ```
//! use crimelog_store::{RecordFilter, Store};
//! use crimelog_types::NewRecord;
//!
//! let store = Store::open_in_memory()?;
//! store.insert(&NewRecord::new(2024, 1, "Central", "Theft", 1, 1))?;
//!
//! let filter = RecordFilter::new().year(2024).search("cent");
//! let page = store.list(&filter, 1, 50)?;
//! assert_eq!(page.total, 1);
//! # Ok::<(), crimelog_store::Error>(())
//! ```

use serde::Serialize;

use crimelog_types::Record;

/// Largest page size accepted by [`Store::list`](crate::Store::list).
pub const MAX_PAGE_SIZE: u32 = 500;

/// Filters for listing and summarizing records.
///
/// Exact-match filters apply to `year`, `month`, `station` and `category`.
/// `search` matches a substring of either the station or the category.
///
/// # Example
///
/// ```
/// use crimelog_store::RecordFilter;
///
/// let filter = RecordFilter::new()
///     .year(2024)
///     .station("Central")
///     .search("theft");
/// assert!(!filter.is_empty());
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct RecordFilter {
    /// Only this year.
    pub year: Option<i32>,
    /// Only this month.
    pub month: Option<i32>,
    /// Only this police station.
    pub station: Option<String>,
    /// Only this crime category.
    pub category: Option<String>,
    /// Substring over station or category.
    pub search: Option<String>,
}

impl RecordFilter {
    /// A filter matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn month(mut self, month: i32) -> Self {
        self.month = Some(month);
        self
    }

    pub fn station(mut self, station: &str) -> Self {
        self.station = Some(station.to_string());
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    /// Substring search. An empty string is ignored.
    pub fn search(mut self, text: &str) -> Self {
        self.search = Some(text.to_string()).filter(|s| !s.is_empty());
        self
    }

    /// True when no condition is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(year) = self.year {
            conditions.push("year = ?");
            params.push(Box::new(year));
        }

        if let Some(month) = self.month {
            conditions.push("month = ?");
            params.push(Box::new(month));
        }

        if let Some(ref station) = self.station {
            conditions.push("police_station = ?");
            params.push(Box::new(station.clone()));
        }

        if let Some(ref category) = self.category {
            conditions.push("crime_type = ?");
            params.push(Box::new(category.clone()));
        }

        if let Some(ref search) = self.search {
            conditions.push(
                "(police_station LIKE ? ESCAPE '\\' OR crime_type LIKE ? ESCAPE '\\')",
            );
            let pattern = format!("%{}%", escape_like(search));
            params.push(Box::new(pattern.clone()));
            params.push(Box::new(pattern));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

/// Escape `LIKE` wildcards so the text matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// One page of a filtered listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPage {
    pub records: Vec<Record>,
    /// Matching records across all pages.
    pub total: u64,
    /// 1-based page number that was served.
    pub page: u32,
    pub page_size: u32,
    pub page_count: u32,
}

/// Normalize a requested page and page size.
///
/// Page `0` is treated as `1`; the size is clamped to `1..=MAX_PAGE_SIZE`.
pub(crate) fn normalize_page(page: u32, page_size: u32) -> (u32, u32) {
    (page.max(1), page_size.clamp(1, MAX_PAGE_SIZE))
}

/// Number of pages needed for `total` rows.
pub(crate) fn page_count(total: u64, page_size: u32) -> u32 {
    let size = u64::from(page_size.max(1));
    u32::try_from(total.div_ceil(size)).unwrap_or(u32::MAX)
}
