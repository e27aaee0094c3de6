//! Interfaces of the collaborators the engine consumes.
//!
//! The rebalance scheduler, the portfolio optimizer and the expected-return
//! model live outside this crate; the engine only relies on the contracts
//! below.

use chrono::{Datelike, NaiveDate, Weekday};
use hobart_data::PeriodFrame;
use ndarray::Array1;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Decides which application dates are rebalance dates.
pub trait Scheduler {
    /// Whether the portfolio is traded on `apply_date`.
    fn is_rebalance(&self, apply_date: NaiveDate) -> bool;
}

/// The expected-return model trained for the optimizer.
pub trait ReturnModel {
    /// Ordered factor names. The order defines the column order of every
    /// factor-indexed structure and must be stable for a whole run.
    fn factor_names(&self) -> &[String];
}

/// Errors reported by an optimizer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerError {
    /// The optimizer could not produce a trade.
    #[error("trade failed: {0}")]
    Failed(String),

    /// The positions do not cover an asset of the period.
    #[error("positions miss asset {0}")]
    MissingAsset(i64),
}

/// Holding weight per asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Positions {
    codes: Vec<i64>,
    today_holding: Array1<f64>,
}

impl Positions {
    /// Create positions from codes and their `todayHolding` weights.
    ///
    /// # Panics
    ///
    /// Panics if `codes` and `today_holding` differ in length.
    pub fn new(codes: Vec<i64>, today_holding: Array1<f64>) -> Self {
        assert_eq!(
            codes.len(),
            today_holding.len(),
            "one holding per asset code"
        );
        Self {
            codes,
            today_holding,
        }
    }

    /// Asset codes.
    pub fn codes(&self) -> &[i64] {
        &self.codes
    }

    /// The `todayHolding` column.
    pub const fn today_holding(&self) -> &Array1<f64> {
        &self.today_holding
    }

    /// Holding of one asset.
    pub fn get(&self, code: i64) -> Option<f64> {
        self.codes
            .iter()
            .position(|&c| c == code)
            .map(|idx| self.today_holding[idx])
    }

    /// The `todayHolding` column reordered to `codes`.
    ///
    /// Extra assets are ignored.
    ///
    /// # Errors
    /// Fails with [`OptimizerError::MissingAsset`] when an asset of `codes`
    /// has no position.
    pub fn aligned_to(&self, codes: &[i64]) -> Result<Array1<f64>, OptimizerError> {
        if self.codes == codes {
            return Ok(self.today_holding.clone());
        }
        let weights: HashMap<i64, f64> = self
            .codes
            .iter()
            .copied()
            .zip(self.today_holding.iter().copied())
            .collect();
        codes
            .iter()
            .map(|code| {
                weights
                    .get(code)
                    .copied()
                    .ok_or(OptimizerError::MissingAsset(*code))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Array1::from)
    }
}

/// Expected return per asset as evaluated by the optimizer's model.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Asset codes.
    pub codes: Vec<i64>,
    /// Expected return per asset.
    pub expected_return: Array1<f64>,
}

/// Output of one optimizer trade.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOutcome {
    /// Evaluation table of the trade.
    pub evaluation: Evaluation,
    /// Resulting positions.
    pub positions: Positions,
}

/// Portfolio construction engine.
///
/// `trade` may be called concurrently for different factors of the same
/// period when parallel execution is enabled.
pub trait Optimizer: Sync {
    /// The model supplying the factor names.
    fn model(&self) -> &dyn ReturnModel;

    /// The rebalance scheduler.
    fn scheduler(&self) -> &dyn Scheduler;

    /// Trade from `pre_holding` given the asset rows of one period.
    ///
    /// # Errors
    /// Returns an error when no trade can be produced.
    fn trade(
        &self,
        calc_date: NaiveDate,
        apply_date: NaiveDate,
        pre_holding: &Positions,
        period: &PeriodFrame,
    ) -> Result<TradeOutcome, OptimizerError>;
}

/// A [`Scheduler`] backed by a fixed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebalanceCalendar {
    /// Rebalance on the listed dates only.
    Dates(BTreeSet<NaiveDate>),
    /// Rebalance on one weekday.
    Weekly(Weekday),
    /// Rebalance on every date.
    Daily,
}

impl RebalanceCalendar {
    /// Rebalance on the given dates.
    pub fn dates(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self::Dates(dates.into_iter().collect())
    }

    /// Rebalance on every `n`-th of `dates` after sorting, starting with the first.
    ///
    /// `n == 0` is treated as 1.
    pub fn every_nth(dates: impl IntoIterator<Item = NaiveDate>, n: usize) -> Self {
        let sorted: BTreeSet<NaiveDate> = dates.into_iter().collect();
        Self::Dates(sorted.into_iter().step_by(n.max(1)).collect())
    }
}

impl Scheduler for RebalanceCalendar {
    fn is_rebalance(&self, apply_date: NaiveDate) -> bool {
        match self {
            Self::Dates(dates) => dates.contains(&apply_date),
            Self::Weekly(weekday) => apply_date.weekday() == *weekday,
            Self::Daily => true,
        }
    }
}
