//! Signal-tilt optimizer.
//!
//! Target weights tilt the benchmark by a linear factor signal:
//!
//! ```text
//! signal_i = Σ_f w_f · x_if
//! target_i = b_i · (1 + scale · signal_i)
//! ```
//!
//! Long-only targets are clipped at zero. Targets are renormalized to the
//! benchmark's total weight, and the trade moves a `participation` fraction
//! of the way from the pre-trade holdings to the target.

use chrono::NaiveDate;
use hobart_attribution::{
    Evaluation, Optimizer, OptimizerError, Positions, RebalanceCalendar, ReturnModel, Scheduler,
    TradeOutcome,
};
use hobart_data::PeriodFrame;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Settings of the [`TiltOptimizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct TiltConfig {
    /// Signal weight per factor. Factors not listed weigh 1.
    pub factor_weights: BTreeMap<String, f64>,
    /// Benchmark tilt per unit of signal.
    pub scale: f64,
    /// Clip negative targets to zero.
    pub long_only: bool,
    /// Fraction of the move from pre-trade holdings to target, in `[0, 1]`.
    pub participation: f64,
}

impl Default for TiltConfig {
    fn default() -> Self {
        Self {
            factor_weights: BTreeMap::new(),
            scale: 0.5,
            long_only: true,
            participation: 1.0,
        }
    }
}

/// Factor names of the run.
#[derive(Debug, Clone)]
struct FactorList(Vec<String>);

impl ReturnModel for FactorList {
    fn factor_names(&self) -> &[String] {
        &self.0
    }
}

/// Benchmark-tilting optimizer driven by factor exposures.
#[derive(Debug, Clone)]
pub(crate) struct TiltOptimizer {
    model: FactorList,
    calendar: RebalanceCalendar,
    weights: Array1<f64>,
    config: TiltConfig,
}

impl TiltOptimizer {
    pub(crate) fn new(
        factors: Vec<String>,
        calendar: RebalanceCalendar,
        config: TiltConfig,
    ) -> Self {
        let weights = factors
            .iter()
            .map(|f| config.factor_weights.get(f).copied().unwrap_or(1.0))
            .collect();
        Self {
            model: FactorList(factors),
            calendar,
            weights,
            config,
        }
    }

    /// Expected return per asset of the given rows.
    fn signal(&self, period: &PeriodFrame) -> Array1<f64> {
        period.exposures().dot(&self.weights)
    }
}

impl Optimizer for TiltOptimizer {
    fn model(&self) -> &dyn ReturnModel {
        &self.model
    }

    fn scheduler(&self) -> &dyn Scheduler {
        &self.calendar
    }

    fn trade(
        &self,
        _calc_date: NaiveDate,
        _apply_date: NaiveDate,
        pre_holding: &Positions,
        period: &PeriodFrame,
    ) -> Result<TradeOutcome, OptimizerError> {
        let signal = self.signal(period);
        let bm = period.evolved_bm();

        let mut target = &bm * &signal.mapv(|s| 1.0 + self.config.scale * s);
        if self.config.long_only {
            target.mapv_inplace(|w| w.max(0.0));
        }
        let total = target.sum();
        if total <= 0.0 || !total.is_finite() {
            return Err(OptimizerError::Failed(format!(
                "tilted weights sum to {total}"
            )));
        }
        target *= bm.sum() / total;

        let pre = pre_holding.aligned_to(period.codes())?;
        let p = self.config.participation.clamp(0.0, 1.0);
        let holding = &pre + &((&target - &pre) * p);

        Ok(TradeOutcome {
            evaluation: Evaluation {
                codes: period.codes().to_vec(),
                expected_return: signal,
            },
            positions: Positions::new(period.codes().to_vec(), holding),
        })
    }
}
