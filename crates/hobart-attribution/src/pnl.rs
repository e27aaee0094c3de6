//! Active-return formulas.
//!
//! Active return of a holding vector `h` against evolved benchmark weights
//! `b` with next-period returns `r`:
//!
//! ```text
//! active = h·r − (Σh / Σb) · (b·r)
//! ```
//!
//! The benchmark is scaled to the portfolio's total weight. Factor P&L applies
//! the same scale `Σ column / Σb` to every column of the attribution matrix.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

/// Total active return. `None` when the benchmark weights sum to zero or to
/// a non-finite value.
pub fn active_return(
    holding: ArrayView1<'_, f64>,
    next_return: ArrayView1<'_, f64>,
    evolved_bm: ArrayView1<'_, f64>,
) -> Option<f64> {
    let bm_sum = evolved_bm.sum();
    if bm_sum == 0.0 || !bm_sum.is_finite() {
        return None;
    }
    Some(holding.dot(&next_return) - holding.sum() / bm_sum * evolved_bm.dot(&next_return))
}

/// Active return of every column of an `assets x factors` attribution matrix.
/// `None` when the benchmark weights sum to zero or to a non-finite value.
pub fn factor_active_return(
    attribution: ArrayView2<'_, f64>,
    next_return: ArrayView1<'_, f64>,
    evolved_bm: ArrayView1<'_, f64>,
) -> Option<Array1<f64>> {
    let bm_sum = evolved_bm.sum();
    if bm_sum == 0.0 || !bm_sum.is_finite() {
        return None;
    }
    let bm_return = evolved_bm.dot(&next_return);
    Some(next_return.dot(&attribution) - attribution.sum_axis(Axis(0)) / bm_sum * bm_return)
}
