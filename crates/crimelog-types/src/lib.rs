//! Data model for crime-log datasets.
//!
//! This crate provides the types shared by the record store (`crimelog-store`)
//! and the synchronization engine (`crimelog-sync`).
//!
//! # Features
//!
//! - [`Record`] rows with store-assigned ids and timestamps
//! - [`NewRecord`] / [`RecordPatch`] inputs with field validation
//! - [`DatasetSummary`] aggregates and the [`closure_rate`] calculation
//!
//! # Example
//!
//! ```
//! use crimelog_types::{NewRecord, closure_rate};
//!
//! let record = NewRecord::new(2024, 1, "Central", "Theft", 2, 3);
//! assert!(record.validate().is_ok());
//! assert_eq!(closure_rate(2, 8), 80.0);
//! ```

pub mod error;
pub mod types;

pub use error::{ValidationError, ValidationResult};
pub use types::{DatasetSummary, NewRecord, Record, RecordPatch, closure_rate};
