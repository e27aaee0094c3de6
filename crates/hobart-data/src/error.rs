//! Error types for panel ingestion.

use crate::period::Period;
use chrono::NaiveDate;
use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while reading or slicing the input panel.
#[derive(Debug, Error)]
pub enum DataError {
    /// Calculation and application dates cannot be zipped pairwise.
    #[error("Schedule mismatch: {calc_dates} calculation dates vs {apply_dates} application dates")]
    ScheduleMismatch {
        /// Number of unique calculation dates
        calc_dates: usize,
        /// Number of unique application dates
        apply_dates: usize,
    },

    /// Rows of one application date do not all carry the paired calculation date.
    #[error("Schedule mismatch on {apply_date}: expected calcDate {expected}, found {found}")]
    UnpairedPeriod {
        /// Application date of the offending rows
        apply_date: NaiveDate,
        /// Calculation date obtained from pairing
        expected: NaiveDate,
        /// Calculation date found in the rows
        found: NaiveDate,
    },

    /// Periods are not strictly ascending by both dates.
    #[error("Periods out of order: {previous} precedes {next}")]
    Unordered {
        /// Earlier period in input order
        previous: Period,
        /// Later period in input order
        next: Period,
    },

    /// A period carries no assets.
    #[error("Empty universe for {period}")]
    EmptyUniverse {
        /// Offending period
        period: Period,
    },

    /// A required column is missing.
    #[error("Missing column '{column}'{}", scope(.period))]
    Schema {
        /// Missing column name
        column: String,
        /// Period that needed the column, if the check was period specific
        period: Option<Period>,
    },

    /// A required column holds a null value.
    #[error("Null value in column '{column}' on {apply_date}")]
    NullValue {
        /// Column holding the null
        column: String,
        /// Application date of the row
        apply_date: NaiveDate,
    },

    /// The same asset code appears twice in one period.
    #[error("Duplicate asset code {code} for {period}")]
    DuplicateCode {
        /// Repeated asset code
        code: i64,
        /// Offending period
        period: Period,
    },

    /// Column lengths disagree inside a period.
    #[error("Column '{column}' has {actual} values, expected {expected} for {period}")]
    Length {
        /// Offending column
        column: String,
        /// Number of assets in the period
        expected: usize,
        /// Number of values supplied
        actual: usize,
        /// Offending period
        period: Period,
    },

    /// Date parsing error
    #[error("Date parsing error: {0}")]
    Parse(String),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn scope(period: &Option<Period>) -> String {
    period.map(|p| format!(" for {p}")).unwrap_or_default()
}

impl DataError {
    /// Build a missing-column error scoped to a period.
    pub fn missing_column(column: impl Into<String>, period: Period) -> Self {
        Self::Schema {
            column: column.into(),
            period: Some(period),
        }
    }
}
