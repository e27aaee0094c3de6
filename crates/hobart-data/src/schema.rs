//! Column names of the input panel.

/// Calculation date of the row.
pub const CALC_DATE: &str = "calcDate";
/// Application date of the row; the report index.
pub const APPLY_DATE: &str = "applyDate";
/// Integer asset identifier.
pub const CODE: &str = "code";
/// Return over the next period.
pub const NEXT_RETURN: &str = "nextReturn1day";
/// Holding weight on the application date.
pub const TODAY_HOLDING: &str = "todayHolding";
/// Benchmark weight after drift.
pub const EVOLVED_BM_WEIGHT: &str = "evolvedBMWeight";
/// Pre-rebalance holding after drift. Needed on rebalance dates only.
pub const EVOLVED_PRE_HOLDING: &str = "evolvedPreHolding";

/// Columns every row must carry, before the factor columns.
pub const BASE_COLUMNS: [&str; 6] = [
    CALC_DATE,
    APPLY_DATE,
    CODE,
    NEXT_RETURN,
    TODAY_HOLDING,
    EVOLVED_BM_WEIGHT,
];

/// All columns required for a panel with the given factors.
///
/// `evolvedPreHolding` is not listed: it is only checked when a rebalance
/// date is processed.
pub fn required_columns<S: AsRef<str>>(factor_names: &[S]) -> Vec<String> {
    BASE_COLUMNS
        .iter()
        .map(|c| (*c).to_string())
        .chain(factor_names.iter().map(|f| f.as_ref().to_string()))
        .collect()
}
