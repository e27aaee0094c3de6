//! Attribution strategies.
//!
//! A strategy turns one period into an attribution matrix (`assets x
//! factors`) used for factor P&L. On non-trading days it reads the drifted
//! holding table; on rebalance days it builds one counterfactual portfolio
//! per factor through the optimizer and returns both the table to carry
//! forward and the matrix to report.
//!
//! | Strategy | Counterfactual per factor | Attribution |
//! |---|---|---|
//! | [`LeaveOneOut`] | factor zeroed | `h − holdings` |
//! | [`AllOthersIn`] | only the factor kept | `holdings` |
//! | [`FocusLeaveOneOut`] | factor zeroed | `h − masked holdings` |
//! | [`FocusAllOthersIn`] | only the factor kept | `masked holdings` |
//!
//! Masking zeroes the rows of assets whose current holding is negligible.
//! The carried table is never masked.

pub mod aoi;
pub mod counterfactual;
pub mod loo;

pub use aoi::{AllOthersIn, FocusAllOthersIn};
pub use counterfactual::{Execution, Scenario};
pub use loo::{FocusLeaveOneOut, LeaveOneOut};

use crate::collaborator::{Optimizer, Positions};
use crate::error::Result;
use crate::table::HoldingTable;
use hobart_data::PeriodFrame;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Holdings with `|h| <= NEGLIGIBLE_HOLDING` count as not held.
pub const NEGLIGIBLE_HOLDING: f64 = 1e-4;

/// Result of a rebalance step.
#[derive(Debug, Clone, PartialEq)]
pub struct Rebalanced {
    /// Raw counterfactual holdings, carried to the next period.
    pub carry: HoldingTable,
    /// Matrix used for factor P&L.
    pub attribution: Array2<f64>,
}

/// Evolve and rebalance steps of an attribution strategy.
///
/// Strategies hold configuration only; all state across periods lives in
/// the engine.
pub trait AttributionStrategy: fmt::Debug + Send + Sync {
    /// Short name of the strategy.
    fn name(&self) -> &'static str;

    /// Attribution matrix of a non-trading period.
    ///
    /// `grown` is the holding table after drift, over the period's `codes`.
    fn evolve(
        &self,
        codes: &[i64],
        today_holding: ArrayView1<'_, f64>,
        evolved_bm: ArrayView1<'_, f64>,
        grown: &HoldingTable,
    ) -> Array2<f64>;

    /// Counterfactual holdings and attribution matrix of a rebalance period.
    ///
    /// Calls `optimizer.trade` exactly once per entry of `factor_names`.
    ///
    /// # Errors
    /// Fails when a factor is missing from the period or the optimizer fails.
    fn rebalance(
        &self,
        today_holding: ArrayView1<'_, f64>,
        pre_holding: &Positions,
        evolved_bm: ArrayView1<'_, f64>,
        period: &PeriodFrame,
        factor_names: &[String],
        optimizer: &dyn Optimizer,
    ) -> Result<Rebalanced>;
}

/// `today_holding − holdings`, broadcast over the factor columns.
pub fn leave_one_out(
    today_holding: ArrayView1<'_, f64>,
    holdings: ArrayView2<'_, f64>,
) -> Array2<f64> {
    &today_holding.insert_axis(Axis(1)) - &holdings
}

/// Copy of `matrix` with the rows of negligibly held assets zeroed.
pub fn mask_negligible(
    today_holding: ArrayView1<'_, f64>,
    matrix: ArrayView2<'_, f64>,
    threshold: f64,
) -> Array2<f64> {
    let mut masked = matrix.to_owned();
    for (mut row, &held) in masked.rows_mut().into_iter().zip(today_holding.iter()) {
        if held.abs() <= threshold {
            row.fill(0.0);
        }
    }
    masked
}

/// Selector for the four strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// [`LeaveOneOut`]
    #[serde(alias = "loo")]
    LeaveOneOut,
    /// [`AllOthersIn`]
    #[default]
    #[serde(alias = "aoi")]
    AllOthersIn,
    /// [`FocusLeaveOneOut`]
    #[serde(alias = "focus-loo")]
    FocusLeaveOneOut,
    /// [`FocusAllOthersIn`]
    #[serde(alias = "focus-aoi")]
    FocusAllOthersIn,
}

impl StrategyKind {
    /// All strategies.
    pub const ALL: [Self; 4] = [
        Self::LeaveOneOut,
        Self::AllOthersIn,
        Self::FocusLeaveOneOut,
        Self::FocusAllOthersIn,
    ];

    /// Short name, as accepted by [`FromStr`].
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LeaveOneOut => "loo",
            Self::AllOthersIn => "aoi",
            Self::FocusLeaveOneOut => "focus-loo",
            Self::FocusAllOthersIn => "focus-aoi",
        }
    }

    /// Whether attribution is restricted to held assets.
    pub const fn is_focus(&self) -> bool {
        matches!(self, Self::FocusLeaveOneOut | Self::FocusAllOthersIn)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "loo" | "leave-one-out" => Ok(Self::LeaveOneOut),
            "aoi" | "all-others-in" => Ok(Self::AllOthersIn),
            "focus-loo" | "focus-leave-one-out" => Ok(Self::FocusLeaveOneOut),
            "focus-aoi" | "focus-all-others-in" => Ok(Self::FocusAllOthersIn),
            other => Err(format!(
                "unknown strategy '{other}' (expected loo, aoi, focus-loo or focus-aoi)"
            )),
        }
    }
}

/// Strategy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Which strategy to run.
    pub kind: StrategyKind,
    /// How the per-factor optimizer calls are executed.
    pub execution: Execution,
    /// Holding below which focus strategies mask an asset.
    pub focus_threshold: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            kind: StrategyKind::default(),
            execution: Execution::default(),
            focus_threshold: NEGLIGIBLE_HOLDING,
        }
    }
}

impl StrategyConfig {
    /// Build the configured strategy.
    pub fn build(&self) -> Box<dyn AttributionStrategy> {
        match self.kind {
            StrategyKind::LeaveOneOut => {
                Box::new(LeaveOneOut::new().with_execution(self.execution))
            }
            StrategyKind::AllOthersIn => {
                Box::new(AllOthersIn::new().with_execution(self.execution))
            }
            StrategyKind::FocusLeaveOneOut => Box::new(
                FocusLeaveOneOut::new()
                    .with_execution(self.execution)
                    .with_threshold(self.focus_threshold),
            ),
            StrategyKind::FocusAllOthersIn => Box::new(
                FocusAllOthersIn::new()
                    .with_execution(self.execution)
                    .with_threshold(self.focus_threshold),
            ),
        }
    }
}
