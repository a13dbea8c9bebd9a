//! Core types for crime-log datasets.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{ValidationError, ValidationResult};

/// One crime-log entry as held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Record {
    /// Store-assigned identifier. Reassigned on every full replace.
    pub id: i64,
    /// Calendar year.
    pub year: i32,
    /// Month in 1..=12.
    pub month: i32,
    /// Police station the entry was logged at.
    pub station: String,
    /// Crime category.
    pub category: String,
    /// Cases still under investigation.
    pub under_investigation: i64,
    /// Cases closed.
    pub closed: i64,
    /// When the store created the row.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub created_at: OffsetDateTime,
    /// When the row last changed.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub updated_at: OffsetDateTime,
}

impl Record {
    /// The record's fields without identity or timestamps.
    pub fn to_new_record(&self) -> NewRecord {
        NewRecord {
            year: self.year,
            month: self.month,
            station: self.station.clone(),
            category: self.category.clone(),
            under_investigation: self.under_investigation,
            closed: self.closed,
        }
    }
}

/// Field values for a record that has not been stored yet.
///
/// A missing field deserializes to its zero value and is then rejected by
/// [`NewRecord::validate`]. A year of `0` counts as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct NewRecord {
    pub year: i32,
    pub month: i32,
    #[cfg_attr(feature = "serde", serde(alias = "policeStation", alias = "police_station"))]
    pub station: String,
    #[cfg_attr(feature = "serde", serde(alias = "crimeType", alias = "crime_type"))]
    pub category: String,
    #[cfg_attr(feature = "serde", serde(alias = "under_investigation"))]
    pub under_investigation: i64,
    pub closed: i64,
}

impl NewRecord {
    /// Create a record with all fields set.
    pub fn new(
        year: i32,
        month: i32,
        station: impl Into<String>,
        category: impl Into<String>,
        under_investigation: i64,
        closed: i64,
    ) -> Self {
        Self {
            year,
            month,
            station: station.into(),
            category: category.into(),
            under_investigation,
            closed,
        }
    }

    /// Check required fields, month range, and count signs.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.year == 0 {
            return Err(ValidationError::MissingField("year"));
        }
        if self.month == 0 {
            return Err(ValidationError::MissingField("month"));
        }
        validate_month(self.month)?;
        validate_text("station", &self.station)?;
        validate_text("category", &self.category)?;
        validate_count("underInvestigation", self.under_investigation)?;
        validate_count("closed", self.closed)?;
        Ok(())
    }
}

/// A partial update. Only `Some` fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct RecordPatch {
    pub year: Option<i32>,
    pub month: Option<i32>,
    #[cfg_attr(feature = "serde", serde(alias = "policeStation", alias = "police_station"))]
    pub station: Option<String>,
    #[cfg_attr(feature = "serde", serde(alias = "crimeType", alias = "crime_type"))]
    pub category: Option<String>,
    #[cfg_attr(feature = "serde", serde(alias = "under_investigation"))]
    pub under_investigation: Option<i64>,
    pub closed: Option<i64>,
}

impl RecordPatch {
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

    pub fn station(mut self, station: impl Into<String>) -> Self {
        self.station = Some(station.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn under_investigation(mut self, count: i64) -> Self {
        self.under_investigation = Some(count);
        self
    }

    pub fn closed(mut self, count: i64) -> Self {
        self.closed = Some(count);
        self
    }

    /// True when no field is supplied.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validate only the supplied fields.
    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(year) = self.year
            && year == 0
        {
            return Err(ValidationError::MissingField("year"));
        }
        if let Some(month) = self.month {
            validate_month(month)?;
        }
        if let Some(station) = &self.station {
            validate_text("station", station)?;
        }
        if let Some(category) = &self.category {
            validate_text("category", category)?;
        }
        if let Some(count) = self.under_investigation {
            validate_count("underInvestigation", count)?;
        }
        if let Some(count) = self.closed {
            validate_count("closed", count)?;
        }
        Ok(())
    }
}

fn validate_month(month: i32) -> ValidationResult<()> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(ValidationError::MonthOutOfRange(month))
    }
}

fn validate_text(field: &'static str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}

fn validate_count(field: &'static str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        Err(ValidationError::NegativeCount { field, value })
    } else {
        Ok(())
    }
}

/// Aggregates over a (possibly filtered) dataset. Derived, never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DatasetSummary {
    pub total_records: u64,
    pub total_under_investigation: i64,
    pub total_closed: i64,
    /// Percentage of cases closed, one decimal place.
    pub closure_rate: f64,
    pub years: Vec<i32>,
    pub months: Vec<i32>,
    pub stations: Vec<String>,
    pub categories: Vec<String>,
}

/// Closed cases as a percentage of all cases, rounded to one decimal.
///
/// Returns `0.0` when there are no cases at all. The sum is taken in
/// `i128`, so counts near `i64::MAX` cannot overflow.
///
/// # Examples
///
/// ```
/// use crimelog_types::closure_rate;
///
/// assert_eq!(closure_rate(2, 8), 80.0);
/// assert_eq!(closure_rate(0, 0), 0.0);
/// assert_eq!(closure_rate(2, 1), 33.3);
/// ```
#[must_use]
pub fn closure_rate(under_investigation: i64, closed: i64) -> f64 {
    let denominator = i128::from(under_investigation) + i128::from(closed);
    if denominator <= 0 {
        return 0.0;
    }
    let percent = closed as f64 / denominator as f64 * 100.0;
    (percent * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> NewRecord {
        NewRecord::new(2024, 3, "Central", "Theft", 2, 3)
    }

    #[test]
    fn test_new_record_valid() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_new_record_missing_fields() {
        let mut record = valid();
        record.station = "   ".to_string();
        assert_eq!(
            record.validate(),
            Err(ValidationError::MissingField("station"))
        );

        let mut record = valid();
        record.year = 0;
        assert_eq!(record.validate(), Err(ValidationError::MissingField("year")));

        assert_eq!(
            NewRecord::default().validate(),
            Err(ValidationError::MissingField("year"))
        );
    }

    #[test]
    fn test_new_record_negative_count() {
        let mut record = valid();
        record.closed = -1;
        assert_eq!(
            record.validate(),
            Err(ValidationError::NegativeCount {
                field: "closed",
                value: -1
            })
        );
    }

    #[test]
    fn test_new_record_month_range() {
        let mut record = valid();
        record.month = 13;
        assert_eq!(record.validate(), Err(ValidationError::MonthOutOfRange(13)));
    }

    #[test]
    fn test_patch_validates_supplied_fields_only() {
        assert!(RecordPatch::new().validate().is_ok());
        assert!(RecordPatch::new().closed(4).validate().is_ok());
        assert!(RecordPatch::new().category("").validate().is_err());
        assert!(RecordPatch::new().under_investigation(-2).validate().is_err());
        assert!(RecordPatch::new().month(0).validate().is_err());
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(RecordPatch::new().is_empty());
        assert!(!RecordPatch::new().year(2023).is_empty());
    }

    #[test]
    fn test_closure_rate() {
        assert_eq!(closure_rate(2, 8), 80.0);
        assert_eq!(closure_rate(0, 0), 0.0);
        assert_eq!(closure_rate(5, 0), 0.0);
        assert_eq!(closure_rate(0, 5), 100.0);
        assert_eq!(closure_rate(1, 2), 66.7);
    }

    #[test]
    fn test_closure_rate_extreme_counts() {
        assert_eq!(closure_rate(i64::MAX, 1), 0.0);
        assert_eq!(closure_rate(i64::MAX, i64::MAX), 50.0);
        assert_eq!(closure_rate(1, i64::MAX), 100.0);
        assert_eq!(closure_rate(i64::MIN, i64::MIN), 0.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_new_record_deserialize_aliases() {
        let json = r#"{"year":2024,"month":5,"policeStation":"North","crimeType":"Fraud","underInvestigation":1,"closed":2}"#;
        let record: NewRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.station, "North");
        assert_eq!(record.category, "Fraud");
        assert_eq!(record.under_investigation, 1);

        let json = r#"{"year":2024,"month":5,"police_station":"North","crime_type":"Fraud","under_investigation":1}"#;
        let record: NewRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.under_investigation, 1);
        assert_eq!(record.closed, 0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_missing_field_deserializes_then_fails_validation() {
        let record: NewRecord = serde_json::from_str(r#"{"year":2024,"month":5}"#).unwrap();
        assert_eq!(
            record.validate(),
            Err(ValidationError::MissingField("station"))
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_summary_serializes_camel_case() {
        let summary = DatasetSummary {
            total_records: 2,
            total_under_investigation: 2,
            total_closed: 8,
            closure_rate: 80.0,
            ..Default::default()
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"totalUnderInvestigation\":2"));
        assert!(json.contains("\"closureRate\":80.0"));
    }
}
