//! The attribution input panel.
//!
//! The panel is read from a long-format table with one row per
//! `(asset, applyDate)`. Rows are grouped by application date, the sorted
//! unique calculation dates are zipped with the sorted unique application
//! dates, and each group becomes a [`PeriodFrame`].

use crate::error::{DataError, Result};
use crate::period::{Period, PeriodFrame};
use crate::schema::{
    APPLY_DATE, CALC_DATE, CODE, EVOLVED_BM_WEIGHT, EVOLVED_PRE_HOLDING, NEXT_RETURN,
    TODAY_HOLDING,
};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Days between 0001-01-01 and the Unix epoch.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Chronologically ordered periods of the input panel.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributionPanel {
    factor_names: Vec<String>,
    periods: Vec<PeriodFrame>,
}

impl AttributionPanel {
    /// Assemble a panel from already-built period frames.
    ///
    /// # Errors
    /// Fails when the frames do not share `factor_names` or are not strictly
    /// ascending by both calculation and application date.
    pub fn from_periods<S: AsRef<str>>(
        factor_names: &[S],
        periods: Vec<PeriodFrame>,
    ) -> Result<Self> {
        let factor_names: Vec<String> =
            factor_names.iter().map(|f| f.as_ref().to_string()).collect();

        for frame in &periods {
            if frame.factor_names() != factor_names.as_slice() {
                let column = factor_names
                    .iter()
                    .find(|name| !frame.factor_names().contains(*name))
                    .or_else(|| frame.factor_names().first())
                    .cloned()
                    .unwrap_or_default();
                return Err(DataError::missing_column(column, frame.period()));
            }
        }

        for pair in periods.windows(2) {
            let (previous, next) = (pair[0].period(), pair[1].period());
            if previous.apply_date >= next.apply_date || previous.calc_date >= next.calc_date {
                return Err(DataError::Unordered { previous, next });
            }
        }

        Ok(Self {
            factor_names,
            periods,
        })
    }

    /// Build a panel from a polars `DataFrame`.
    ///
    /// Date columns may be polars `Date`/`Datetime` or ISO `YYYY-MM-DD`
    /// strings. The `evolvedPreHolding` column is optional; a period whose
    /// pre-holdings contain nulls is loaded without them.
    pub fn from_frame<S: AsRef<str>>(df: &DataFrame, factor_names: &[S]) -> Result<Self> {
        let calc = date_column(df, CALC_DATE)?;
        let apply = date_column(df, APPLY_DATE)?;
        let codes = int_column(df, CODE)?;
        let next_return = float_column(df, NEXT_RETURN)?;
        let today_holding = float_column(df, TODAY_HOLDING)?;
        let evolved_bm = float_column(df, EVOLVED_BM_WEIGHT)?;
        let pre_holding = match df.column(EVOLVED_PRE_HOLDING) {
            Ok(_) => Some(float_column(df, EVOLVED_PRE_HOLDING)?),
            Err(_) => None,
        };
        let exposures = factor_names
            .iter()
            .map(|f| float_column(df, f.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let mut by_apply: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        for (row, date) in apply.iter().enumerate() {
            let date =
                date.ok_or_else(|| DataError::Parse(format!("null {APPLY_DATE} in row {row}")))?;
            by_apply.entry(date).or_default().push(row);
        }
        let calc_dates: BTreeSet<NaiveDate> = calc.iter().flatten().copied().collect();
        if calc_dates.len() != by_apply.len() {
            return Err(DataError::ScheduleMismatch {
                calc_dates: calc_dates.len(),
                apply_dates: by_apply.len(),
            });
        }

        let mut periods = Vec::with_capacity(by_apply.len());
        for (calc_date, (apply_date, rows)) in calc_dates.into_iter().zip(by_apply) {
            for &row in &rows {
                match calc[row] {
                    Some(found) if found != calc_date => {
                        return Err(DataError::UnpairedPeriod {
                            apply_date,
                            expected: calc_date,
                            found,
                        });
                    }
                    Some(_) => {}
                    None => {
                        return Err(DataError::NullValue {
                            column: CALC_DATE.to_string(),
                            apply_date,
                        });
                    }
                }
            }

            let required = |column: &str, values: &[Option<f64>]| -> Result<Vec<f64>> {
                rows.iter()
                    .map(|&row| {
                        values[row].ok_or_else(|| DataError::NullValue {
                            column: column.to_string(),
                            apply_date,
                        })
                    })
                    .collect()
            };

            let period_codes = rows
                .iter()
                .map(|&row| {
                    codes[row].ok_or_else(|| DataError::NullValue {
                        column: CODE.to_string(),
                        apply_date,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let mut builder = PeriodFrame::builder(Period::new(calc_date, apply_date), factor_names)
                .codes(period_codes)
                .next_return(required(NEXT_RETURN, &next_return)?)
                .today_holding(required(TODAY_HOLDING, &today_holding)?)
                .evolved_bm(required(EVOLVED_BM_WEIGHT, &evolved_bm)?);

            if let Some(values) = pre_holding
                .as_ref()
                .and_then(|pre| rows.iter().map(|&row| pre[row]).collect::<Option<Vec<_>>>())
            {
                builder = builder.evolved_pre_holding(values);
            }

            for (name, column) in factor_names.iter().zip(&exposures) {
                builder = builder.exposure(name.as_ref(), required(name.as_ref(), column)?);
            }

            periods.push(builder.build()?);
        }

        tracing::debug!(
            periods = periods.len(),
            factors = factor_names.len(),
            "loaded attribution panel"
        );

        Self::from_periods(factor_names, periods)
    }

    /// Read a panel from a CSV file with a header row.
    pub fn read_csv<P: AsRef<Path>, S: AsRef<str>>(path: P, factor_names: &[S]) -> Result<Self> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_parse_options(CsvParseOptions::default().with_try_parse_dates(true))
            .try_into_reader_with_file_path(Some(path.as_ref().to_path_buf()))?
            .finish()?;
        Self::from_frame(&df, factor_names)
    }

    /// Factor names in column order.
    pub fn factor_names(&self) -> &[String] {
        &self.factor_names
    }

    /// Periods in chronological order.
    pub fn periods(&self) -> &[PeriodFrame] {
        &self.periods
    }

    /// Iterate over the periods in chronological order.
    pub fn iter(&self) -> std::slice::Iter<'_, PeriodFrame> {
        self.periods.iter()
    }

    /// Number of periods.
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    /// Whether the panel has no periods.
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}

impl<'a> IntoIterator for &'a AttributionPanel {
    type Item = &'a PeriodFrame;
    type IntoIter = std::slice::Iter<'a, PeriodFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(Column::as_materialized_series)
        .map_err(|_| DataError::Schema {
            column: name.to_string(),
            period: None,
        })
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let values = series(df, name)?.cast(&DataType::Float64)?;
    Ok(values.f64()?.into_iter().collect())
}

fn int_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let values = series(df, name)?.cast(&DataType::Int64)?;
    Ok(values.i64()?.into_iter().collect())
}

fn date_column(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDate>>> {
    let values = series(df, name)?;
    if values.dtype() == &DataType::String {
        return values
            .str()?
            .into_iter()
            .map(|v| v.map(parse_date).transpose())
            .collect();
    }
    let days = values.cast(&DataType::Date)?.cast(&DataType::Int32)?;
    Ok(days
        .i32()?
        .into_iter()
        .map(|d| d.and_then(|d| NaiveDate::from_num_days_from_ce_opt(d + EPOCH_DAYS_FROM_CE)))
        .collect())
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| DataError::Parse(format!("'{value}': {e}")))
}
