//! The attribution state machine.
//!
//! [`AttributionEngine`] walks the periods of a panel in date order. It
//! owns the per-factor holding table carried between periods and the report
//! being accumulated:
//!
//! - before the first rebalance the table is empty and periods are skipped;
//! - on a rebalance date the strategy builds counterfactual portfolios and
//!   their holdings become the new table;
//! - on any other date the table drifts with the period's returns.
//!
//! State is only replaced once a period has been fully processed, so a failed
//! [`AttributionEngine::step`] leaves the engine as it was.

use crate::collaborator::{Optimizer, Positions};
use crate::error::{AttributionError, Result};
use crate::pnl::{active_return, factor_active_return};
use crate::strategy::{AttributionStrategy, Rebalanced};
use crate::table::HoldingTable;
use hobart_data::schema::EVOLVED_PRE_HOLDING;
use hobart_data::{AttributionPanel, DataError, Period, PeriodFrame};
use hobart_output::{PeriodPnl, ReportAccumulator, ReportRow, ReportTable};
use std::fmt;

/// What the engine did with a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodStatus {
    /// Before the first rebalance; no row emitted.
    Skipped,
    /// Holdings drifted with returns.
    Evolved,
    /// The optimizer built new counterfactual holdings.
    Rebalanced,
}

type ProgressFn = Box<dyn FnMut(Period, PeriodStatus) + Send>;

/// Factor attribution engine.
pub struct AttributionEngine {
    table: HoldingTable,
    report: ReportAccumulator,
    progress: Option<ProgressFn>,
}

impl fmt::Debug for AttributionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributionEngine")
            .field("table", &self.table)
            .field("report", &self.report)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl Default for AttributionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributionEngine {
    /// Create an engine with an empty holding table.
    pub fn new() -> Self {
        Self {
            table: HoldingTable::empty::<String>(&[]),
            report: ReportAccumulator::new(),
            progress: None,
        }
    }

    /// Call `progress` after every period, processed or skipped.
    pub fn with_progress(
        mut self,
        progress: impl FnMut(Period, PeriodStatus) + Send + 'static,
    ) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// The holding table carried into the next period.
    pub const fn holdings(&self) -> &HoldingTable {
        &self.table
    }

    /// Rows produced so far by [`step`](Self::step).
    pub const fn report(&self) -> Option<&ReportTable> {
        self.report.table()
    }

    /// Run the attribution over every period of `panel`.
    ///
    /// The holding table and the report are reset first, so running twice on
    /// the same inputs gives the same report.
    ///
    /// # Errors
    /// Aborts at the first period that fails; see [`step`](Self::step).
    pub fn run(
        &mut self,
        strategy: &dyn AttributionStrategy,
        optimizer: &dyn Optimizer,
        panel: &AttributionPanel,
    ) -> Result<ReportTable> {
        let factor_names = optimizer.model().factor_names();
        self.table = HoldingTable::empty(factor_names);
        self.report = ReportAccumulator::new();

        tracing::info!(
            strategy = strategy.name(),
            periods = panel.len(),
            factors = factor_names.len(),
            "starting attribution"
        );

        for period in panel {
            self.step(period, strategy, optimizer)?;
        }

        let report = std::mem::take(&mut self.report).finish(factor_names);
        tracing::info!(rows = report.len(), "attribution finished");
        Ok(report)
    }

    /// Process one period.
    ///
    /// Returns the emitted row, or `None` when the period precedes the first
    /// rebalance.
    ///
    /// # Errors
    /// Fails when the period's factors differ from the model's, the benchmark
    /// weights sum to zero, a factor column cannot be renormalized, the
    /// pre-trade holdings of a rebalance date are missing, the optimizer
    /// fails, or the application date was already reported.
    pub fn step(
        &mut self,
        period: &PeriodFrame,
        strategy: &dyn AttributionStrategy,
        optimizer: &dyn Optimizer,
    ) -> Result<Option<ReportRow>> {
        let p = period.period();
        let factor_names = optimizer.model().factor_names();
        if period.factor_names() != factor_names {
            return Err(AttributionError::FactorMismatch {
                period: p,
                data: period.factor_names().to_vec(),
                model: factor_names.to_vec(),
            });
        }

        let rebalance = optimizer.scheduler().is_rebalance(p.apply_date);
        if self.table.is_empty() && !rebalance {
            tracing::debug!(%p, "no position yet, skipping");
            self.notify(p, PeriodStatus::Skipped);
            return Ok(None);
        }

        let today = period.today_holding();
        let next_return = period.next_return();
        let evolved_bm = period.evolved_bm();

        let total = active_return(today, next_return, evolved_bm)
            .ok_or(AttributionError::DegenerateBenchmark { period: p })?;

        let (next_table, attribution, status) = if rebalance {
            let pre = period
                .evolved_pre_holding()
                .ok_or_else(|| DataError::missing_column(EVOLVED_PRE_HOLDING, p))?;
            let pre_holding = Positions::new(period.codes().to_vec(), pre.to_owned());
            let Rebalanced { carry, attribution } = strategy.rebalance(
                today,
                &pre_holding,
                evolved_bm,
                period,
                factor_names,
                optimizer,
            )?;
            (carry, attribution, PeriodStatus::Rebalanced)
        } else {
            let grown = self
                .table
                .evolve(period.codes(), next_return)
                .map_err(|e| AttributionError::DegenerateHoldings {
                    period: p,
                    factor: e.factor,
                })?;
            let attribution = strategy.evolve(period.codes(), today, evolved_bm, &grown);
            (grown, attribution, PeriodStatus::Evolved)
        };

        let factors = factor_active_return(attribution.view(), next_return, evolved_bm)
            .ok_or(AttributionError::DegenerateBenchmark { period: p })?;
        let pnl = PeriodPnl { total, factors };

        let row = self
            .report
            .append(p, today, attribution.view(), evolved_bm, &pnl, factor_names)?
            .clone();
        self.table = next_table;

        tracing::info!(%p, ?status, total = row.total, assets = period.len(), "period attributed");
        self.notify(p, status);
        Ok(Some(row))
    }

    fn notify(&mut self, period: Period, status: PeriodStatus) {
        if let Some(progress) = self.progress.as_mut() {
            progress(period, status);
        }
    }
}
