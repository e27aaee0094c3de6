//! Periods and the per-period asset slice.
//!
//! A [`PeriodFrame`] holds the asset rows of one application date in
//! columnar form: asset codes, next-period returns, today holdings, evolved
//! benchmark weights, the optional evolved pre-rebalance holdings, and an
//! `assets x factors` exposure matrix whose columns follow the factor order
//! supplied by the return model.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A `(calculation date, application date)` pair.
///
/// Reports are keyed by the application date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    /// Date the signals were calculated on.
    pub calc_date: NaiveDate,
    /// Date the holdings apply to.
    pub apply_date: NaiveDate,
}

impl Period {
    /// Create a new period.
    pub const fn new(calc_date: NaiveDate, apply_date: NaiveDate) -> Self {
        Self {
            calc_date,
            apply_date,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "period {} -> {}", self.calc_date, self.apply_date)
    }
}

/// Asset rows of a single period.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodFrame {
    period: Period,
    codes: Vec<i64>,
    next_return: Array1<f64>,
    today_holding: Array1<f64>,
    evolved_bm: Array1<f64>,
    evolved_pre_holding: Option<Array1<f64>>,
    factor_names: Vec<String>,
    exposures: Array2<f64>,
}

impl PeriodFrame {
    /// Start building a frame for `period` with the given factor order.
    pub fn builder<S: AsRef<str>>(period: Period, factor_names: &[S]) -> PeriodFrameBuilder {
        PeriodFrameBuilder::new(period, factor_names)
    }

    /// The period this frame belongs to.
    pub const fn period(&self) -> Period {
        self.period
    }

    /// Asset codes in row order.
    pub fn codes(&self) -> &[i64] {
        &self.codes
    }

    /// Number of assets.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the frame carries no assets. Always false for a built frame.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Next-period return per asset.
    pub fn next_return(&self) -> ArrayView1<'_, f64> {
        self.next_return.view()
    }

    /// Holding weight per asset on the application date.
    pub fn today_holding(&self) -> ArrayView1<'_, f64> {
        self.today_holding.view()
    }

    /// Benchmark weight per asset after drift.
    pub fn evolved_bm(&self) -> ArrayView1<'_, f64> {
        self.evolved_bm.view()
    }

    /// Pre-rebalance holding per asset after drift, when the panel carries it.
    pub fn evolved_pre_holding(&self) -> Option<ArrayView1<'_, f64>> {
        self.evolved_pre_holding.as_ref().map(Array1::view)
    }

    /// Factor names in column order.
    pub fn factor_names(&self) -> &[String] {
        &self.factor_names
    }

    /// `assets x factors` exposure matrix.
    pub fn exposures(&self) -> ArrayView2<'_, f64> {
        self.exposures.view()
    }

    /// Exposure column of a named factor.
    pub fn exposure(&self, factor: &str) -> Option<ArrayView1<'_, f64>> {
        self.factor_names
            .iter()
            .position(|name| name == factor)
            .map(|idx| self.exposures.column(idx))
    }

    /// Copy of the frame with the exposure column `factor` zeroed.
    ///
    /// All other factors keep their exposures.
    pub fn with_factor_left_out(&self, factor: usize) -> Self {
        let mut frame = self.clone();
        frame.exposures.column_mut(factor).fill(0.0);
        frame
    }

    /// Copy of the frame where only the exposure column `factor` survives.
    pub fn with_factor_isolated(&self, factor: usize) -> Self {
        let mut frame = self.clone();
        for (idx, mut column) in frame.exposures.columns_mut().into_iter().enumerate() {
            if idx != factor {
                column.fill(0.0);
            }
        }
        frame
    }
}

/// Builder for [`PeriodFrame`].
///
/// Columns may be given in any order; [`PeriodFrameBuilder::build`] checks
/// that every column has one value per asset code.
#[derive(Debug, Clone)]
pub struct PeriodFrameBuilder {
    period: Period,
    codes: Vec<i64>,
    next_return: Vec<f64>,
    today_holding: Vec<f64>,
    evolved_bm: Vec<f64>,
    evolved_pre_holding: Option<Vec<f64>>,
    factor_names: Vec<String>,
    exposures: Vec<Option<Vec<f64>>>,
}

impl PeriodFrameBuilder {
    fn new<S: AsRef<str>>(period: Period, factor_names: &[S]) -> Self {
        Self {
            period,
            codes: Vec::new(),
            next_return: Vec::new(),
            today_holding: Vec::new(),
            evolved_bm: Vec::new(),
            evolved_pre_holding: None,
            factor_names: factor_names.iter().map(|s| s.as_ref().to_string()).collect(),
            exposures: vec![None; factor_names.len()],
        }
    }

    /// Set the asset codes.
    pub fn codes(mut self, codes: impl IntoIterator<Item = i64>) -> Self {
        self.codes = codes.into_iter().collect();
        self
    }

    /// Set the next-period returns.
    pub fn next_return(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.next_return = values.into_iter().collect();
        self
    }

    /// Set the holdings on the application date.
    pub fn today_holding(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.today_holding = values.into_iter().collect();
        self
    }

    /// Set the evolved benchmark weights.
    pub fn evolved_bm(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.evolved_bm = values.into_iter().collect();
        self
    }

    /// Set the evolved pre-rebalance holdings.
    pub fn evolved_pre_holding(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.evolved_pre_holding = Some(values.into_iter().collect());
        self
    }

    /// Set the exposures of one factor. Unknown factor names are ignored.
    pub fn exposure(mut self, factor: &str, values: impl IntoIterator<Item = f64>) -> Self {
        if let Some(idx) = self.factor_names.iter().position(|name| name == factor) {
            self.exposures[idx] = Some(values.into_iter().collect());
        }
        self
    }

    /// Validate the columns and build the frame.
    pub fn build(self) -> Result<PeriodFrame> {
        let period = self.period;
        let n = self.codes.len();
        if n == 0 {
            return Err(DataError::EmptyUniverse { period });
        }

        let mut seen = HashSet::with_capacity(n);
        for &code in &self.codes {
            if !seen.insert(code) {
                return Err(DataError::DuplicateCode { code, period });
            }
        }

        let check = |column: &str, len: usize| {
            if len == n {
                Ok(())
            } else {
                Err(DataError::Length {
                    column: column.to_string(),
                    expected: n,
                    actual: len,
                    period,
                })
            }
        };
        check(crate::schema::NEXT_RETURN, self.next_return.len())?;
        check(crate::schema::TODAY_HOLDING, self.today_holding.len())?;
        check(crate::schema::EVOLVED_BM_WEIGHT, self.evolved_bm.len())?;
        if let Some(pre) = &self.evolved_pre_holding {
            check(crate::schema::EVOLVED_PRE_HOLDING, pre.len())?;
        }

        let k = self.factor_names.len();
        let mut exposures = Array2::<f64>::zeros((n, k));
        for (idx, (name, values)) in self.factor_names.iter().zip(self.exposures).enumerate() {
            let values = values.ok_or_else(|| DataError::missing_column(name.as_str(), period))?;
            check(name.as_str(), values.len())?;
            exposures.column_mut(idx).assign(&Array1::from(values));
        }

        Ok(PeriodFrame {
            period,
            codes: self.codes,
            next_return: Array1::from(self.next_return),
            today_holding: Array1::from(self.today_holding),
            evolved_bm: Array1::from(self.evolved_bm),
            evolved_pre_holding: self.evolved_pre_holding.map(Array1::from),
            factor_names: self.factor_names,
            exposures,
        })
    }
}
