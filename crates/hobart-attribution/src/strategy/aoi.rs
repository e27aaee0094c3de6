//! All-others-in attribution.
//!
//! The counterfactual for a factor is the portfolio the optimizer builds
//! from that factor alone. The counterfactual itself is the attribution.

use super::counterfactual::{Execution, Scenario, counterfactual_holdings};
use super::{AttributionStrategy, NEGLIGIBLE_HOLDING, Rebalanced, mask_negligible};
use crate::collaborator::{Optimizer, Positions};
use crate::error::Result;
use crate::table::HoldingTable;
use hobart_data::PeriodFrame;
use ndarray::{Array2, ArrayView1};

/// All-others-in strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllOthersIn {
    execution: Execution,
}

impl AllOthersIn {
    /// Sequential all-others-in.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how the per-factor trades are executed.
    pub const fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }
}

impl AttributionStrategy for AllOthersIn {
    fn name(&self) -> &'static str {
        "aoi"
    }

    fn evolve(
        &self,
        _codes: &[i64],
        _today_holding: ArrayView1<'_, f64>,
        _evolved_bm: ArrayView1<'_, f64>,
        grown: &HoldingTable,
    ) -> Array2<f64> {
        grown.values().to_owned()
    }

    fn rebalance(
        &self,
        _today_holding: ArrayView1<'_, f64>,
        pre_holding: &Positions,
        _evolved_bm: ArrayView1<'_, f64>,
        period: &PeriodFrame,
        factor_names: &[String],
        optimizer: &dyn Optimizer,
    ) -> Result<Rebalanced> {
        let carry = counterfactual_holdings(
            Scenario::Isolate,
            pre_holding,
            period,
            factor_names,
            optimizer,
            self.execution,
        )?;
        let attribution = carry.values().to_owned();
        Ok(Rebalanced { carry, attribution })
    }
}

/// All-others-in restricted to currently held assets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusAllOthersIn {
    execution: Execution,
    threshold: f64,
}

impl Default for FocusAllOthersIn {
    fn default() -> Self {
        Self {
            execution: Execution::default(),
            threshold: NEGLIGIBLE_HOLDING,
        }
    }
}

impl FocusAllOthersIn {
    /// Sequential focus all-others-in with the default threshold.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how the per-factor trades are executed.
    pub const fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    /// Holdings with absolute value at or below `threshold` are masked.
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Masking threshold.
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl AttributionStrategy for FocusAllOthersIn {
    fn name(&self) -> &'static str {
        "focus-aoi"
    }

    fn evolve(
        &self,
        _codes: &[i64],
        today_holding: ArrayView1<'_, f64>,
        _evolved_bm: ArrayView1<'_, f64>,
        grown: &HoldingTable,
    ) -> Array2<f64> {
        mask_negligible(today_holding, grown.values(), self.threshold)
    }

    fn rebalance(
        &self,
        today_holding: ArrayView1<'_, f64>,
        pre_holding: &Positions,
        _evolved_bm: ArrayView1<'_, f64>,
        period: &PeriodFrame,
        factor_names: &[String],
        optimizer: &dyn Optimizer,
    ) -> Result<Rebalanced> {
        let carry = counterfactual_holdings(
            Scenario::Isolate,
            pre_holding,
            period,
            factor_names,
            optimizer,
            self.execution,
        )?;
        let attribution = mask_negligible(today_holding, carry.values(), self.threshold);
        Ok(Rebalanced { carry, attribution })
    }
}
