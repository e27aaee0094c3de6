//! Per-period attribution report.
//!
//! The report has one row per processed application date. Its column schema
//! is fixed by the first appended row:
//!
//! `calcDate, total, <factors>, total_num, <factors>_num, benchmark_weight,
//! total_weight, <factors>_weight`
//!
//! Rows are append-only and keyed by a unique application date.

use chrono::NaiveDate;
use hobart_data::Period;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Name of the index column in exported tables.
pub const APPLY_DATE_COLUMN: &str = "applyDate";

/// Errors that can occur while accumulating a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// A row for this application date already exists.
    #[error("Duplicate application date {0} in report")]
    DuplicateApplyDate(NaiveDate),

    /// Inputs of one row disagree in shape with each other or with the schema.
    #[error("Shape mismatch for {period}: {reason}")]
    ShapeMismatch {
        /// Period of the rejected row
        period: Period,
        /// What disagreed
        reason: String,
    },

    /// Polars error.
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// Total and per-factor active P&L of one period.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodPnl {
    /// Active return of the whole portfolio.
    pub total: f64,
    /// Active return attributed to each factor, in factor order.
    pub factors: Array1<f64>,
}

/// One report row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    /// Application date (the report index).
    pub apply_date: NaiveDate,
    /// Calculation date paired with the application date.
    pub calc_date: NaiveDate,
    /// Total active P&L.
    pub total: f64,
    /// Per-factor active P&L.
    pub factor_pnl: Vec<f64>,
    /// Number of assets with a nonzero holding.
    pub total_num: usize,
    /// Per-factor number of nonzero attribution entries.
    pub factor_num: Vec<usize>,
    /// Sum of benchmark weights.
    pub benchmark_weight: f64,
    /// Sum of holdings.
    pub total_weight: f64,
    /// Per-factor sum of attribution weights.
    pub factor_weight: Vec<f64>,
}

impl ReportRow {
    /// Numeric values in schema order, without `calcDate`.
    ///
    /// Counts are widened to `f64`.
    pub fn values(&self) -> Vec<f64> {
        std::iter::once(self.total)
            .chain(self.factor_pnl.iter().copied())
            .chain(std::iter::once(self.total_num as f64))
            .chain(self.factor_num.iter().map(|&n| n as f64))
            .chain([self.benchmark_weight, self.total_weight])
            .chain(self.factor_weight.iter().copied())
            .collect()
    }
}

/// The attribution report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTable {
    factor_names: Vec<String>,
    rows: Vec<ReportRow>,
}

impl ReportTable {
    /// Create an empty report for the given factors.
    pub fn new<S: AsRef<str>>(factor_names: &[S]) -> Self {
        Self {
            factor_names: factor_names.iter().map(|f| f.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Factor names in column order.
    pub fn factor_names(&self) -> &[String] {
        &self.factor_names
    }

    /// Rows in append order.
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the report has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row for an application date.
    pub fn get(&self, apply_date: NaiveDate) -> Option<&ReportRow> {
        self.rows.iter().find(|row| row.apply_date == apply_date)
    }

    /// Column names in schema order (the index column is not included).
    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec!["calcDate".to_string(), "total".to_string()];
        columns.extend(self.factor_names.iter().cloned());
        columns.push("total_num".to_string());
        columns.extend(self.factor_names.iter().map(|f| format!("{f}_num")));
        columns.push("benchmark_weight".to_string());
        columns.push("total_weight".to_string());
        columns.extend(self.factor_names.iter().map(|f| format!("{f}_weight")));
        columns
    }

    /// Convert to a polars `DataFrame` with an `applyDate` column followed by the schema.
    pub fn to_frame(&self) -> Result<DataFrame, ReportError> {
        let k = self.factor_names.len();
        let columns = self.columns();
        let mut frame: Vec<Column> = Vec::with_capacity(columns.len() + 1);

        frame.push(date_series(APPLY_DATE_COLUMN, self.rows.iter().map(|r| r.apply_date))?.into());
        frame.push(date_series(&columns[0], self.rows.iter().map(|r| r.calc_date))?.into());
        frame.push(f64_series(&columns[1], self.rows.iter().map(|r| r.total)).into());
        for (f, name) in columns[2..2 + k].iter().enumerate() {
            frame.push(f64_series(name, self.rows.iter().map(|r| r.factor_pnl[f])).into());
        }
        frame.push(count_series(&columns[2 + k], self.rows.iter().map(|r| r.total_num)).into());
        for (f, name) in columns[3 + k..3 + 2 * k].iter().enumerate() {
            frame.push(count_series(name, self.rows.iter().map(|r| r.factor_num[f])).into());
        }
        frame.push(
            f64_series(&columns[3 + 2 * k], self.rows.iter().map(|r| r.benchmark_weight)).into(),
        );
        frame.push(
            f64_series(&columns[4 + 2 * k], self.rows.iter().map(|r| r.total_weight)).into(),
        );
        for (f, name) in columns[5 + 2 * k..].iter().enumerate() {
            frame.push(f64_series(name, self.rows.iter().map(|r| r.factor_weight[f])).into());
        }

        Ok(DataFrame::new(frame)?)
    }

    /// Running sums of the first four numeric report columns.
    ///
    /// With the schema above these are `total` and the leading factor P&L
    /// columns; with fewer than three factors the count columns follow.
    pub fn cumulative_pnl(&self) -> CumulativePnl {
        let columns: Vec<String> = self.columns().into_iter().skip(1).take(4).collect();
        let width = columns.len();
        let mut values = Array2::<f64>::zeros((self.rows.len(), width));
        let mut running = vec![0.0; width];

        for (i, row) in self.rows.iter().enumerate() {
            for (j, value) in row.values().into_iter().take(width).enumerate() {
                running[j] += value;
                values[[i, j]] = running[j];
            }
        }

        CumulativePnl {
            dates: self.rows.iter().map(|r| r.apply_date).collect(),
            columns,
            values,
        }
    }
}

/// Cumulative P&L series indexed by application date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativePnl {
    /// Application dates in report order.
    pub dates: Vec<NaiveDate>,
    /// Series names.
    pub columns: Vec<String>,
    /// `dates x columns` running sums.
    pub values: Array2<f64>,
}

impl CumulativePnl {
    /// Final value of a named series.
    pub fn last(&self, column: &str) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.values.rows().into_iter().last().map(|row| row[idx])
    }
}

/// Append-only builder of the [`ReportTable`].
#[derive(Debug, Default)]
pub struct ReportAccumulator {
    table: Option<ReportTable>,
    seen: HashSet<NaiveDate>,
}

impl ReportAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the row of one period.
    ///
    /// The first call fixes the factor schema. `attribution` is the
    /// `assets x factors` attribution matrix of the period.
    ///
    /// # Errors
    /// Fails on a repeated application date or when the shapes of the inputs
    /// disagree with each other or with the established schema.
    pub fn append(
        &mut self,
        period: Period,
        today_holding: ArrayView1<'_, f64>,
        attribution: ArrayView2<'_, f64>,
        evolved_bm: ArrayView1<'_, f64>,
        pnl: &PeriodPnl,
        factor_names: &[String],
    ) -> Result<&ReportRow, ReportError> {
        let shape_error = |reason: String| ReportError::ShapeMismatch { period, reason };

        if self.seen.contains(&period.apply_date) {
            return Err(ReportError::DuplicateApplyDate(period.apply_date));
        }
        let (n, k) = attribution.dim();
        if today_holding.len() != n || evolved_bm.len() != n {
            return Err(shape_error(format!(
                "{} holdings and {} benchmark weights for {n} attribution rows",
                today_holding.len(),
                evolved_bm.len()
            )));
        }
        if factor_names.len() != k || pnl.factors.len() != k {
            return Err(shape_error(format!(
                "{} factor names and {} factor P&Ls for {k} attribution columns",
                factor_names.len(),
                pnl.factors.len()
            )));
        }

        let table = self
            .table
            .get_or_insert_with(|| ReportTable::new(factor_names));
        if table.factor_names != factor_names {
            return Err(shape_error(format!(
                "factors {:?} differ from report schema {:?}",
                factor_names, table.factor_names
            )));
        }

        let row = ReportRow {
            apply_date: period.apply_date,
            calc_date: period.calc_date,
            total: pnl.total,
            factor_pnl: pnl.factors.to_vec(),
            total_num: today_holding.iter().filter(|&&w| w != 0.0).count(),
            factor_num: attribution
                .columns()
                .into_iter()
                .map(|col| col.iter().filter(|&&w| w != 0.0).count())
                .collect(),
            benchmark_weight: evolved_bm.sum(),
            total_weight: today_holding.sum(),
            factor_weight: attribution.sum_axis(Axis(0)).to_vec(),
        };

        self.seen.insert(period.apply_date);
        table.rows.push(row);
        Ok(&table.rows[table.rows.len() - 1])
    }

    /// The report accumulated so far, if any row was appended.
    pub const fn table(&self) -> Option<&ReportTable> {
        self.table.as_ref()
    }

    /// Number of rows appended.
    pub fn len(&self) -> usize {
        self.table.as_ref().map_or(0, ReportTable::len)
    }

    /// Whether no row was appended.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finish the report. Without any row the result is an empty report
    /// with the given factor schema.
    pub fn finish<S: AsRef<str>>(self, factor_names: &[S]) -> ReportTable {
        self.table
            .unwrap_or_else(|| ReportTable::new(factor_names))
    }
}

fn date_series(name: &str, dates: impl Iterator<Item = NaiveDate>) -> PolarsResult<Series> {
    let days: Vec<i32> = dates
        .map(|d| (d - NaiveDate::default()).num_days() as i32)
        .collect();
    Series::new(name.into(), days).cast(&DataType::Date)
}

fn f64_series(name: &str, values: impl Iterator<Item = f64>) -> Series {
    Series::new(name.into(), values.collect::<Vec<f64>>())
}

fn count_series(name: &str, values: impl Iterator<Item = usize>) -> Series {
    Series::new(name.into(), values.map(|v| v as u64).collect::<Vec<u64>>())
}
