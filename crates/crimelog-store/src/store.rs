//! Main store implementation.

use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use time::OffsetDateTime;
use tracing::{debug, info};

use crimelog_types::{DatasetSummary, NewRecord, Record, RecordPatch, closure_rate};

use crate::error::{Error, Result};
use crate::queries::{RecordFilter, RecordPage, normalize_page, page_count};
use crate::schema;

const RECORD_COLUMNS: &str = "id, year, month, police_station, crime_type, \
     under_investigation, closed, created_at, updated_at";

/// SQLite-based store for crime-log records.
pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }
}

// Queries
impl Store {
    /// List one page of records matching `filter`.
    ///
    /// Records are ordered by year, then month, then id, all descending.
    /// A page past the end yields no records but the same `page_count`.
    pub fn list(&self, filter: &RecordFilter, page: u32, page_size: u32) -> Result<RecordPage> {
        let (page, page_size) = normalize_page(page, page_size);
        let (where_clause, params) = filter.build_where();
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM crime_records {}", where_clause),
            params_ref.as_slice(),
            |row| row.get(0),
        )?;
        let total = total as u64;

        let offset = u64::from(page - 1) * u64::from(page_size);
        let sql = format!(
            "SELECT {} FROM crime_records {} \
             ORDER BY year DESC, month DESC, id DESC LIMIT {} OFFSET {}",
            RECORD_COLUMNS, where_clause, page_size, offset
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_ref.as_slice(), row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(RecordPage {
            records,
            total,
            page,
            page_size,
            page_count: page_count(total, page_size),
        })
    }

    /// Get a record by id.
    pub fn get_record(&self, id: i64) -> Result<Option<Record>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM crime_records WHERE id = ?", RECORD_COLUMNS),
                [id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Every record in id order.
    pub fn all_records(&self) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM crime_records ORDER BY id ASC",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Total number of stored records.
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM crime_records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Aggregate totals and distinct classifier values for `filter`.
    pub fn summarize(&self, filter: &RecordFilter) -> Result<DatasetSummary> {
        let (where_clause, params) = filter.build_where();
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        // TOTAL() sums as REAL and never raises on integer overflow
        let (total_records, under_investigation, closed): (i64, f64, f64) = self.conn.query_row(
            &format!(
                "SELECT COUNT(*), TOTAL(under_investigation), TOTAL(closed) \
                 FROM crime_records {}",
                where_clause
            ),
            params_ref.as_slice(),
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        let total_under_investigation = saturating_count(under_investigation);
        let total_closed = saturating_count(closed);

        let distinct = |column: &str| -> Result<Vec<rusqlite::types::Value>> {
            let sql = format!(
                "SELECT DISTINCT {column} FROM crime_records {where_clause} ORDER BY {column}"
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let values = stmt
                .query_map(params_ref.as_slice(), |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(values)
        };

        Ok(DatasetSummary {
            total_records: total_records as u64,
            total_under_investigation,
            total_closed,
            closure_rate: closure_rate(total_under_investigation, total_closed),
            years: integers(distinct("year")?),
            months: integers(distinct("month")?),
            stations: texts(distinct("police_station")?),
            categories: texts(distinct("crime_type")?),
        })
    }
}

// Mutations
impl Store {
    /// Validate and insert a record.
    pub fn insert(&self, record: &NewRecord) -> Result<Record> {
        record.validate()?;

        let now = now_millis();
        self.conn.execute(
            "INSERT INTO crime_records (year, month, police_station, crime_type,
             under_investigation, closed, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            rusqlite::params![
                record.year,
                record.month,
                record.station,
                record.category,
                record.under_investigation,
                record.closed,
                now,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted record {}", id);
        self.get_record(id)?.ok_or(Error::NotFound(id))
    }

    /// Apply the supplied fields of `patch` to record `id`.
    ///
    /// `updated_at` is refreshed even when the patch is empty.
    pub fn update(&self, id: i64, patch: &RecordPatch) -> Result<Record> {
        patch.validate()?;

        let mut current = self.get_record(id)?.ok_or(Error::NotFound(id))?;
        if let Some(year) = patch.year {
            current.year = year;
        }
        if let Some(month) = patch.month {
            current.month = month;
        }
        if let Some(ref station) = patch.station {
            current.station = station.clone();
        }
        if let Some(ref category) = patch.category {
            current.category = category.clone();
        }
        if let Some(count) = patch.under_investigation {
            current.under_investigation = count;
        }
        if let Some(count) = patch.closed {
            current.closed = count;
        }

        self.conn.execute(
            "UPDATE crime_records SET year = ?1, month = ?2, police_station = ?3,
             crime_type = ?4, under_investigation = ?5, closed = ?6, updated_at = ?7
             WHERE id = ?8",
            rusqlite::params![
                current.year,
                current.month,
                current.station,
                current.category,
                current.under_investigation,
                current.closed,
                now_millis(),
                id,
            ],
        )?;

        debug!("Updated record {}", id);
        self.get_record(id)?.ok_or(Error::NotFound(id))
    }

    /// Delete record `id`.
    pub fn delete(&self, id: i64) -> Result<()> {
        let affected = self
            .conn
            .execute("DELETE FROM crime_records WHERE id = ?", [id])?;
        if affected == 0 {
            return Err(Error::NotFound(id));
        }
        debug!("Deleted record {}", id);
        Ok(())
    }

    /// Replace the whole dataset in one transaction.
    ///
    /// Prior ids are discarded and the new rows are numbered from 1. Rows are
    /// stored as given, without validation. On error nothing changes.
    pub fn replace_all(&self, records: &[NewRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM crime_records", [])?;
        tx.execute(
            "DELETE FROM sqlite_sequence WHERE name = 'crime_records'",
            [],
        )?;

        let now = now_millis();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO crime_records (year, month, police_station, crime_type,
                 under_investigation, closed, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            )?;
            for record in records {
                stmt.execute(rusqlite::params![
                    record.year,
                    record.month,
                    record.station,
                    record.category,
                    record.under_investigation,
                    record.closed,
                    now,
                ])?;
            }
        }
        tx.commit()?;

        info!("Replaced dataset with {} records", records.len());
        Ok(records.len())
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        year: row.get(1)?,
        month: row.get(2)?,
        station: row.get(3)?,
        category: row.get(4)?,
        under_investigation: row.get(5)?,
        closed: row.get(6)?,
        created_at: millis_to_datetime(7, row.get(7)?)?,
        updated_at: millis_to_datetime(8, row.get(8)?)?,
    })
}

fn millis_to_datetime(column: usize, millis: i64) -> rusqlite::Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Integer, Box::new(e)))
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Float-to-int casts saturate at the `i64` bounds.
fn saturating_count(total: f64) -> i64 {
    total.round() as i64
}

fn integers(values: Vec<rusqlite::types::Value>) -> Vec<i32> {
    values
        .into_iter()
        .filter_map(|v| match v {
            rusqlite::types::Value::Integer(i) => i32::try_from(i).ok(),
            _ => None,
        })
        .collect()
}

fn texts(values: Vec<rusqlite::types::Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| match v {
            rusqlite::types::Value::Text(s) => Some(s),
            _ => None,
        })
        .collect()
}
