//! Integration tests for the attribution engine and its strategies.

use approx::assert_relative_eq;
use chrono::NaiveDate;
use hobart_attribution::{
    AttributionEngine, AttributionError, Evaluation, Execution, Optimizer, OptimizerError,
    Positions, RebalanceCalendar, ReturnModel, Scheduler, StrategyConfig, StrategyKind,
    TradeOutcome,
};
use hobart_data::{AttributionPanel, DataError, Period, PeriodFrame, PeriodFrameBuilder};
use ndarray::{Array1, Array2, Axis, array};
use rstest::rstest;
use std::sync::Mutex;

const FACTORS: [&str; 2] = ["value", "momentum"];

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

/// Rows of one period over assets 1, 2 and 3 with zero returns.
fn rows(day: u32) -> PeriodFrameBuilder {
    PeriodFrame::builder(Period::new(date(day - 1), date(day)), &FACTORS)
        .codes([1, 2, 3])
        .next_return([0.0, 0.0, 0.0])
        .today_holding([0.5, 0.25, 0.25])
        .evolved_bm([0.25, 0.25, 0.5])
        .evolved_pre_holding([0.5, 0.25, 0.25])
        .exposure("value", [1.0, -1.0, 0.0])
        .exposure("momentum", [0.0, 1.0, 1.0])
}

fn panel(frames: Vec<PeriodFrameBuilder>) -> AttributionPanel {
    let periods = frames.into_iter().map(|f| f.build().unwrap()).collect();
    AttributionPanel::from_periods(&FACTORS, periods).unwrap()
}

/// Benchmark tilted by `1/16` per unit of summed exposure.
fn tilt(period: &PeriodFrame) -> Array1<f64> {
    &period.evolved_bm() + &(period.exposures().sum_axis(Axis(1)) * 0.0625)
}

/// Always the same two-asset portfolio.
fn fixed(_period: &PeriodFrame) -> Array1<f64> {
    array![0.5, 0.3]
}

/// Optimizer double that records the exposures of every trade.
struct Recorder {
    factors: Vec<String>,
    calendar: RebalanceCalendar,
    weights: fn(&PeriodFrame) -> Array1<f64>,
    fail_on_call: Option<usize>,
    calls: Mutex<Vec<(NaiveDate, Array2<f64>)>>,
}

impl Recorder {
    fn new(factors: &[&str], calendar: RebalanceCalendar) -> Self {
        Self {
            factors: factors.iter().map(|f| f.to_string()).collect(),
            calendar,
            weights: tilt,
            fail_on_call: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(NaiveDate, Array2<f64>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ReturnModel for Recorder {
    fn factor_names(&self) -> &[String] {
        &self.factors
    }
}

impl Optimizer for Recorder {
    fn model(&self) -> &dyn ReturnModel {
        self
    }

    fn scheduler(&self) -> &dyn Scheduler {
        &self.calendar
    }

    fn trade(
        &self,
        _calc_date: NaiveDate,
        apply_date: NaiveDate,
        _pre_holding: &Positions,
        period: &PeriodFrame,
    ) -> Result<TradeOutcome, OptimizerError> {
        let mut calls = self.calls.lock().unwrap();
        if self.fail_on_call == Some(calls.len()) {
            return Err(OptimizerError::Failed("infeasible".to_string()));
        }
        calls.push((apply_date, period.exposures().to_owned()));

        // positions cover the leading codes when the weights are fewer
        let weights = (self.weights)(period);
        let codes = period.codes()[..weights.len()].to_vec();
        Ok(TradeOutcome {
            evaluation: Evaluation {
                codes: period.codes().to_vec(),
                expected_return: period.exposures().sum_axis(Axis(1)),
            },
            positions: Positions::new(codes, weights),
        })
    }
}

fn strategy(kind: StrategyKind) -> Box<dyn hobart_attribution::AttributionStrategy> {
    StrategyConfig {
        kind,
        ..Default::default()
    }
    .build()
}

#[rstest]
#[case::loo(StrategyKind::LeaveOneOut)]
#[case::aoi(StrategyKind::AllOthersIn)]
#[case::focus_loo(StrategyKind::FocusLeaveOneOut)]
#[case::focus_aoi(StrategyKind::FocusAllOthersIn)]
fn test_zero_returns_leave_holdings_unchanged(#[case] kind: StrategyKind) {
    let optimizer = Recorder::new(&FACTORS, RebalanceCalendar::dates([date(2)]));
    let strategy = strategy(kind);
    let mut engine = AttributionEngine::new();

    let first = engine
        .step(&rows(2).build().unwrap(), strategy.as_ref(), &optimizer)
        .unwrap()
        .unwrap();
    let carried = engine.holdings().clone();

    for day in 3..=4 {
        let row = engine
            .step(&rows(day).build().unwrap(), strategy.as_ref(), &optimizer)
            .unwrap()
            .unwrap();
        assert_eq!(engine.holdings(), &carried);
        assert_eq!(row.factor_weight, first.factor_weight);
        assert_eq!(row.factor_num, first.factor_num);
    }
}

#[test]
fn test_all_others_in_reports_single_factor_portfolios() {
    let optimizer = Recorder::new(&FACTORS, RebalanceCalendar::Daily);
    let report = AttributionEngine::new()
        .run(
            strategy(StrategyKind::AllOthersIn).as_ref(),
            &optimizer,
            &panel(vec![rows(2)]),
        )
        .unwrap();

    // value alone: [0.3125, 0.1875, 0.5]; momentum alone: [0.25, 0.3125, 0.5625]
    let row = &report.rows()[0];
    assert_eq!(row.factor_weight, vec![1.0, 1.125]);
    assert_eq!(row.factor_num, vec![3, 3]);
}

#[rstest]
#[case::loo(StrategyKind::LeaveOneOut, [[0.0, 1.0]; 3], [[1.0, 0.0]; 3])]
#[case::aoi(StrategyKind::AllOthersIn, [[1.0, 0.0]; 3], [[0.0, 1.0]; 3])]
fn test_one_trade_per_factor_with_columns_zeroed(
    #[case] kind: StrategyKind,
    #[case] value_mask: [[f64; 2]; 3],
    #[case] momentum_mask: [[f64; 2]; 3],
) {
    let optimizer = Recorder::new(&FACTORS, RebalanceCalendar::dates([date(3)]));
    let original = rows(3).build().unwrap().exposures().to_owned();
    AttributionEngine::new()
        .run(
            strategy(kind).as_ref(),
            &optimizer,
            &panel(vec![rows(2), rows(3), rows(4)]),
        )
        .unwrap();

    let calls = optimizer.calls();
    assert_eq!(calls.len(), FACTORS.len());
    assert!(calls.iter().all(|(day, _)| *day == date(3)));
    assert_eq!(calls[0].1, &original * &Array2::from(value_mask.to_vec()));
    assert_eq!(calls[1].1, &original * &Array2::from(momentum_mask.to_vec()));
}

#[rstest]
#[case::focus_loo(StrategyKind::FocusLeaveOneOut, vec![0.4375, 0.5])]
#[case::focus_aoi(StrategyKind::FocusAllOthersIn, vec![0.5, 0.5625])]
fn test_focus_masks_unheld_assets(#[case] kind: StrategyKind, #[case] weights: Vec<f64>) {
    let optimizer = Recorder::new(&FACTORS, RebalanceCalendar::dates([date(2)]));
    let unheld = |day| rows(day).today_holding([0.5, 0.5, 0.0]);
    let report = AttributionEngine::new()
        .run(
            strategy(kind).as_ref(),
            &optimizer,
            &panel(vec![unheld(2), unheld(3)]),
        )
        .unwrap();

    for row in report.rows() {
        assert_eq!(row.factor_num, vec![2, 2]);
        assert_eq!(row.factor_weight, weights);
    }
}

#[test]
fn test_focus_carries_unmasked_holdings() {
    let optimizer = Recorder::new(&FACTORS, RebalanceCalendar::Daily);
    let mut engine = AttributionEngine::new();
    let frame = rows(2).today_holding([0.5, 0.5, 0.0]).build().unwrap();
    let row = engine
        .step(
            &frame,
            strategy(StrategyKind::FocusAllOthersIn).as_ref(),
            &optimizer,
        )
        .unwrap()
        .unwrap();

    assert_eq!(row.factor_num, vec![2, 2]);
    assert_eq!(engine.holdings().row(3).unwrap().to_vec(), vec![0.5, 0.5625]);
}

#[test]
fn test_unfocused_leave_one_out_counts_unheld_assets() {
    let optimizer = Recorder::new(&FACTORS, RebalanceCalendar::Daily);
    let report = AttributionEngine::new()
        .run(
            strategy(StrategyKind::LeaveOneOut).as_ref(),
            &optimizer,
            &panel(vec![rows(2).today_holding([0.5, 0.5, 0.0])]),
        )
        .unwrap();
    assert_eq!(report.rows()[0].factor_num, vec![3, 3]);
}

#[rstest]
#[case::loo(StrategyKind::LeaveOneOut)]
#[case::aoi(StrategyKind::AllOthersIn)]
#[case::focus_loo(StrategyKind::FocusLeaveOneOut)]
#[case::focus_aoi(StrategyKind::FocusAllOthersIn)]
fn test_runs_are_deterministic(#[case] kind: StrategyKind) {
    let optimizer = Recorder::new(&FACTORS, RebalanceCalendar::dates([date(2), date(4)]));
    let panel = panel(vec![
        rows(2).next_return([0.01, -0.02, 0.03]),
        rows(3).next_return([0.02, 0.01, -0.01]),
        rows(4).next_return([-0.01, 0.0, 0.02]),
        rows(5).next_return([0.005, 0.01, 0.0]),
    ]);
    let strategy = strategy(kind);

    let mut engine = AttributionEngine::new();
    let first = engine.run(strategy.as_ref(), &optimizer, &panel).unwrap();
    let second = engine.run(strategy.as_ref(), &optimizer, &panel).unwrap();
    let fresh = AttributionEngine::new()
        .run(strategy.as_ref(), &optimizer, &panel)
        .unwrap();

    assert_eq!(first.len(), 4);
    assert_eq!(first, second);
    assert_eq!(first, fresh);
}

#[rstest]
#[case::loo(StrategyKind::LeaveOneOut)]
#[case::aoi(StrategyKind::AllOthersIn)]
#[case::focus_loo(StrategyKind::FocusLeaveOneOut)]
#[case::focus_aoi(StrategyKind::FocusAllOthersIn)]
fn test_parallel_matches_sequential(#[case] kind: StrategyKind) {
    let optimizer = Recorder::new(&FACTORS, RebalanceCalendar::every_nth((2..=6).map(date), 2));
    let panel = panel(
        (2..=6)
            .map(|day| rows(day).next_return([0.01 * f64::from(day), -0.01, 0.02]))
            .collect(),
    );
    let run = |execution| {
        let strategy = StrategyConfig {
            kind,
            execution,
            ..Default::default()
        }
        .build();
        AttributionEngine::new()
            .run(strategy.as_ref(), &optimizer, &panel)
            .unwrap()
    };

    assert_eq!(run(Execution::Sequential), run(Execution::Parallel));
}

#[test]
fn test_two_asset_scenario() {
    let factors = ["F"];
    let frame = |day, ret: [f64; 2]| {
        PeriodFrame::builder(Period::new(date(day - 1), date(day)), &factors)
            .codes([1, 2])
            .next_return(ret)
            .today_holding([0.5, 0.3])
            .evolved_bm([0.4, 0.4])
            .evolved_pre_holding([0.5, 0.3])
            .exposure("F", [1.0, -1.0])
            .build()
            .unwrap()
    };
    let mut optimizer = Recorder::new(&factors, RebalanceCalendar::dates([date(2)]));
    optimizer.weights = fixed;
    let panel = AttributionPanel::from_periods(
        &factors,
        vec![frame(2, [0.02, -0.01]), frame(3, [0.01, 0.01])],
    )
    .unwrap();

    let mut engine = AttributionEngine::new();
    let strategy = strategy(StrategyKind::AllOthersIn);
    let rebalance = engine
        .step(&panel.periods()[0], strategy.as_ref(), &optimizer)
        .unwrap()
        .unwrap();
    // portfolio return 0.007 less the benchmark return 0.004 at equal weight
    assert_relative_eq!(rebalance.total, 0.003, epsilon = 1e-12);
    assert_relative_eq!(rebalance.factor_pnl[0], 0.003, epsilon = 1e-12);
    assert_relative_eq!(rebalance.factor_weight[0], 0.8, epsilon = 1e-12);
    assert_eq!(engine.holdings().values(), array![[0.5], [0.3]]);

    engine
        .step(&panel.periods()[1], strategy.as_ref(), &optimizer)
        .unwrap()
        .unwrap();
    let carried = engine.holdings();
    // (0.505, 0.303) over 0.2 cash + 0.808 grown
    assert_relative_eq!(carried.values()[[0, 0]], 0.505 / 1.008, epsilon = 1e-12);
    assert_relative_eq!(carried.values()[[1, 0]], 0.303 / 1.008, epsilon = 1e-12);
    assert_relative_eq!(
        carried.implied_cash()[0] + carried.column_sums()[0],
        1.0,
        epsilon = 1e-12
    );
}

#[rstest]
#[case::zero([0.0, 0.0, 0.0])]
#[case::nan([f64::NAN, 0.25, 0.5])]
#[case::infinite([0.25, f64::INFINITY, 0.5])]
fn test_degenerate_benchmark_is_rejected(#[case] bm: [f64; 3]) {
    let optimizer = Recorder::new(&FACTORS, RebalanceCalendar::Daily);
    let err = AttributionEngine::new()
        .run(
            strategy(StrategyKind::LeaveOneOut).as_ref(),
            &optimizer,
            &panel(vec![rows(2).evolved_bm(bm)]),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        AttributionError::DegenerateBenchmark { period } if period.apply_date == date(2)
    ));
}

#[test]
fn test_optimizer_failure_names_factor() {
    let mut optimizer = Recorder::new(&FACTORS, RebalanceCalendar::Daily);
    optimizer.fail_on_call = Some(1);
    let err = AttributionEngine::new()
        .run(
            strategy(StrategyKind::LeaveOneOut).as_ref(),
            &optimizer,
            &panel(vec![rows(2)]),
        )
        .unwrap_err();

    match err {
        AttributionError::OptimizerFailure {
            period,
            factor_index,
            factor,
            source,
        } => {
            assert_eq!(period.apply_date, date(2));
            assert_eq!(factor_index, 1);
            assert_eq!(factor, "momentum");
            assert_eq!(source, OptimizerError::Failed("infeasible".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_positions_missing_an_asset() {
    let mut optimizer = Recorder::new(&FACTORS, RebalanceCalendar::Daily);
    optimizer.weights = fixed;
    let err = AttributionEngine::new()
        .run(
            strategy(StrategyKind::AllOthersIn).as_ref(),
            &optimizer,
            &panel(vec![rows(2)]),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        AttributionError::OptimizerFailure {
            factor_index: 0,
            source: OptimizerError::MissingAsset(3),
            ..
        }
    ));
}

#[test]
fn test_periods_before_first_rebalance_are_skipped() {
    let optimizer = Recorder::new(&FACTORS, RebalanceCalendar::dates([date(4)]));
    let report = AttributionEngine::new()
        .run(
            strategy(StrategyKind::AllOthersIn).as_ref(),
            &optimizer,
            &panel((2..=6).map(rows).collect()),
        )
        .unwrap();

    let dates: Vec<_> = report.rows().iter().map(|r| r.apply_date).collect();
    assert_eq!(dates, vec![date(4), date(5), date(6)]);
}

#[test]
fn test_no_rebalance_gives_empty_report() {
    let optimizer = Recorder::new(&FACTORS, RebalanceCalendar::dates([]));
    let report = AttributionEngine::new()
        .run(
            strategy(StrategyKind::LeaveOneOut).as_ref(),
            &optimizer,
            &panel(vec![rows(2), rows(3)]),
        )
        .unwrap();
    assert!(report.is_empty());
    assert_eq!(report.factor_names(), &FACTORS.map(String::from));
}

#[test]
fn test_disjoint_universe_resets_holdings() {
    let optimizer = Recorder::new(&FACTORS, RebalanceCalendar::dates([date(2)]));
    let moved = rows(3)
        .codes([7, 8, 9])
        .next_return([0.01, 0.02, 0.03]);
    let mut engine = AttributionEngine::new();
    let strategy = strategy(StrategyKind::AllOthersIn);
    let report = engine
        .run(strategy.as_ref(), &optimizer, &panel(vec![rows(2), moved]))
        .unwrap();

    assert_eq!(engine.holdings().codes(), &[7, 8, 9]);
    assert!(engine.holdings().values().iter().all(|&v| v == 0.0));
    let row = &report.rows()[1];
    assert_eq!(row.factor_num, vec![0, 0]);
    assert_eq!(row.factor_pnl, vec![0.0, 0.0]);
}

#[test]
fn test_rebalance_without_pre_holding() {
    let optimizer = Recorder::new(&FACTORS, RebalanceCalendar::Daily);
    let frame = PeriodFrame::builder(Period::new(date(1), date(2)), &FACTORS)
        .codes([1])
        .next_return([0.0])
        .today_holding([1.0])
        .evolved_bm([1.0])
        .exposure("value", [1.0])
        .exposure("momentum", [1.0])
        .build()
        .unwrap();
    let err = AttributionEngine::new()
        .step(&frame, strategy(StrategyKind::AllOthersIn).as_ref(), &optimizer)
        .unwrap_err();
    assert!(matches!(err, AttributionError::Data(DataError::Schema { .. })));
}
