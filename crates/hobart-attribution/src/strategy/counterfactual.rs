//! Counterfactual portfolio construction.
//!
//! For every factor the period's rows are copied with some exposure columns
//! zeroed and handed to the optimizer. The `todayHolding` of each resulting
//! trade becomes one column of the counterfactual holding table.

use crate::collaborator::{Optimizer, Positions};
use crate::error::{AttributionError, Result};
use crate::table::HoldingTable;
use hobart_data::{DataError, PeriodFrame};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// How the rows are modified for one factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Zero the factor's exposures, keep all others.
    LeaveOut,
    /// Zero every factor except this one.
    Isolate,
}

impl Scenario {
    /// Modified copy of `period` for the factor at column `factor`.
    pub fn apply(self, period: &PeriodFrame, factor: usize) -> PeriodFrame {
        match self {
            Self::LeaveOut => period.with_factor_left_out(factor),
            Self::Isolate => period.with_factor_isolated(factor),
        }
    }
}

/// Execution of the per-factor optimizer calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Execution {
    /// One factor after another.
    #[default]
    Sequential,
    /// Factors on the rayon thread pool. Each call fills its own column.
    Parallel,
}

/// Build the counterfactual holding table of a rebalance period.
///
/// The optimizer is called once per entry of `factor_names`, each time from
/// the same `pre_holding`.
///
/// # Errors
/// Fails when a factor is not a column of `period`, or when a trade fails or
/// misses an asset of the period. No partial table is returned.
pub fn counterfactual_holdings(
    scenario: Scenario,
    pre_holding: &Positions,
    period: &PeriodFrame,
    factor_names: &[String],
    optimizer: &dyn Optimizer,
    execution: Execution,
) -> Result<HoldingTable> {
    let columns = factor_names
        .iter()
        .map(|name| {
            period
                .factor_names()
                .iter()
                .position(|f| f == name)
                .ok_or_else(|| DataError::missing_column(name.as_str(), period.period()))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let solve = |factor_index: usize| -> Result<Array1<f64>> {
        let factor = &factor_names[factor_index];
        let p = period.period();
        tracing::debug!(
            apply_date = %p.apply_date,
            factor = %factor,
            ?scenario,
            "counterfactual trade"
        );
        let rows = scenario.apply(period, columns[factor_index]);
        let failure = |source| AttributionError::OptimizerFailure {
            period: p,
            factor_index,
            factor: factor.clone(),
            source,
        };
        let outcome = optimizer
            .trade(p.calc_date, p.apply_date, pre_holding, &rows)
            .map_err(failure)?;
        outcome.positions.aligned_to(period.codes()).map_err(failure)
    };

    let solved: Vec<Array1<f64>> = match execution {
        Execution::Sequential => (0..factor_names.len())
            .map(solve)
            .collect::<Result<_>>()?,
        Execution::Parallel => (0..factor_names.len())
            .into_par_iter()
            .map(solve)
            .collect::<Result<_>>()?,
    };

    let mut holdings = Array2::<f64>::zeros((period.len(), factor_names.len()));
    for (mut column, values) in holdings.columns_mut().into_iter().zip(solved) {
        column.assign(&values);
    }

    Ok(HoldingTable::new(
        period.codes().to_vec(),
        factor_names.to_vec(),
        holdings,
    ))
}
