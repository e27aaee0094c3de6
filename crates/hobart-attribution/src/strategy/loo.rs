//! Leave-one-out attribution.
//!
//! The counterfactual for a factor is the portfolio the optimizer builds
//! without that factor. What the factor contributes is the difference between
//! the actual holding and that counterfactual.

use super::counterfactual::{Execution, Scenario, counterfactual_holdings};
use super::{
    AttributionStrategy, NEGLIGIBLE_HOLDING, Rebalanced, leave_one_out, mask_negligible,
};
use crate::collaborator::{Optimizer, Positions};
use crate::error::Result;
use crate::table::HoldingTable;
use hobart_data::PeriodFrame;
use ndarray::{Array2, ArrayView1};

/// Leave-one-out strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeaveOneOut {
    execution: Execution,
}

impl LeaveOneOut {
    /// Sequential leave-one-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how the per-factor trades are executed.
    pub const fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }
}

impl AttributionStrategy for LeaveOneOut {
    fn name(&self) -> &'static str {
        "loo"
    }

    fn evolve(
        &self,
        _codes: &[i64],
        today_holding: ArrayView1<'_, f64>,
        _evolved_bm: ArrayView1<'_, f64>,
        grown: &HoldingTable,
    ) -> Array2<f64> {
        leave_one_out(today_holding, grown.values())
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
            Scenario::LeaveOut,
            pre_holding,
            period,
            factor_names,
            optimizer,
            self.execution,
        )?;
        let attribution = leave_one_out(today_holding, carry.values());
        Ok(Rebalanced { carry, attribution })
    }
}

/// Leave-one-out restricted to currently held assets.
///
/// Counterfactual weights of assets the portfolio does not hold are zeroed
/// before the difference is taken, so those assets contribute their full
/// actual holding (which is negligible) and nothing else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusLeaveOneOut {
    execution: Execution,
    threshold: f64,
}

impl Default for FocusLeaveOneOut {
    fn default() -> Self {
        Self {
            execution: Execution::default(),
            threshold: NEGLIGIBLE_HOLDING,
        }
    }
}

impl FocusLeaveOneOut {
    /// Sequential focus leave-one-out with the default threshold.
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

impl AttributionStrategy for FocusLeaveOneOut {
    fn name(&self) -> &'static str {
        "focus-loo"
    }

    fn evolve(
        &self,
        _codes: &[i64],
        today_holding: ArrayView1<'_, f64>,
        _evolved_bm: ArrayView1<'_, f64>,
        grown: &HoldingTable,
    ) -> Array2<f64> {
        let masked = mask_negligible(today_holding, grown.values(), self.threshold);
        leave_one_out(today_holding, masked.view())
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
            Scenario::LeaveOut,
            pre_holding,
            period,
            factor_names,
            optimizer,
            self.execution,
        )?;
        let masked = mask_negligible(today_holding, carry.values(), self.threshold);
        let attribution = leave_one_out(today_holding, masked.view());
        Ok(Rebalanced { carry, attribution })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{
        Evaluation, OptimizerError, RebalanceCalendar, ReturnModel, Scheduler, TradeOutcome,
    };
    use chrono::NaiveDate;
    use hobart_data::Period;
    use ndarray::array;

    /// Trades to the same weights whatever the rows.
    struct Fixed {
        factors: Vec<String>,
        calendar: RebalanceCalendar,
    }

    impl ReturnModel for Fixed {
        fn factor_names(&self) -> &[String] {
            &self.factors
        }
    }

    impl Optimizer for Fixed {
        fn model(&self) -> &dyn ReturnModel {
            self
        }

        fn scheduler(&self) -> &dyn Scheduler {
            &self.calendar
        }

        fn trade(
            &self,
            _calc_date: NaiveDate,
            _apply_date: NaiveDate,
            _pre_holding: &Positions,
            period: &PeriodFrame,
        ) -> std::result::Result<TradeOutcome, OptimizerError> {
            Ok(TradeOutcome {
                evaluation: Evaluation {
                    codes: period.codes().to_vec(),
                    expected_return: period.exposures().sum_axis(ndarray::Axis(1)),
                },
                positions: Positions::new(period.codes().to_vec(), array![0.3, 0.2]),
            })
        }
    }

    fn grown() -> HoldingTable {
        HoldingTable::new(
            vec![1, 2],
            vec!["value".to_string(), "momentum".to_string()],
            array![[0.25, 0.5], [0.125, 0.25]],
        )
    }

    #[test]
    fn test_evolve_subtracts_grown() {
        let matrix = LeaveOneOut::new().evolve(
            &[1, 2],
            array![0.5, 0.25].view(),
            array![0.5, 0.5].view(),
            &grown(),
        );
        assert_eq!(matrix, array![[0.25, 0.0], [0.125, 0.0]]);
    }

    #[test]
    fn test_focus_evolve_masks_unheld() {
        let matrix = FocusLeaveOneOut::new().evolve(
            &[1, 2],
            array![0.5, 0.0].view(),
            array![0.5, 0.5].view(),
            &grown(),
        );
        assert_eq!(matrix, array![[0.25, 0.0], [0.0, 0.0]]);
    }

    #[test]
    fn test_focus_threshold_builder() {
        let strategy = FocusLeaveOneOut::new().with_threshold(0.01);
        assert_eq!(strategy.threshold(), 0.01);
        assert_eq!(strategy.name(), "focus-loo");
    }

    #[test]
    fn test_focus_evolve_keeps_tiny_holding() {
        let today = array![0.5, 5e-5];
        let bm = array![0.5, 0.5];
        let grown = HoldingTable::new(vec![1, 2], vec!["value".to_string()], array![[0.3], [0.2]]);

        let focus = FocusLeaveOneOut::new().evolve(&[1, 2], today.view(), bm.view(), &grown);
        let plain = LeaveOneOut::new().evolve(&[1, 2], today.view(), bm.view(), &grown);

        // the masked row is the holding itself, not zero
        assert_eq!(focus[[1, 0]], 5e-5);
        assert_eq!(focus.row(0), plain.row(0));
    }

    #[test]
    fn test_focus_rebalance_keeps_tiny_holding() {
        let factors = vec!["value".to_string()];
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let period = PeriodFrame::builder(Period::new(d(2), d(3)), &factors)
            .codes([1, 2])
            .next_return([0.0, 0.0])
            .today_holding([0.5, 5e-5])
            .evolved_bm([0.5, 0.5])
            .evolved_pre_holding([0.5, 5e-5])
            .exposure("value", [0.125, -0.125])
            .build()
            .unwrap();
        let optimizer = Fixed {
            factors: factors.clone(),
            calendar: RebalanceCalendar::Daily,
        };
        let pre = Positions::new(vec![1, 2], array![0.5, 5e-5]);
        let today = period.today_holding();
        let bm = period.evolved_bm();

        let focus = FocusLeaveOneOut::new()
            .rebalance(today, &pre, bm, &period, &factors, &optimizer)
            .unwrap();
        let plain = LeaveOneOut::new()
            .rebalance(today, &pre, bm, &period, &factors, &optimizer)
            .unwrap();

        assert_eq!(focus.attribution[[1, 0]], 5e-5);
        assert_eq!(focus.attribution.row(0), plain.attribution.row(0));
        // the carried table keeps the raw counterfactual
        assert_eq!(focus.carry, plain.carry);
        assert_eq!(focus.carry.values(), array![[0.3], [0.2]]);
    }
}
