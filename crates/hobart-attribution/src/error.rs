//! Error types for the attribution engine.

use crate::collaborator::OptimizerError;
use hobart_data::{DataError, Period};
use hobart_output::ReportError;
use thiserror::Error;

/// Result type for attribution operations.
pub type Result<T> = std::result::Result<T, AttributionError>;

/// Errors that abort an attribution run.
///
/// Every variant raised while processing a period names that period, and the
/// factor when one is involved.
#[derive(Debug, Error)]
pub enum AttributionError {
    /// Input panel error (schedule mismatch, empty universe, missing column).
    #[error(transparent)]
    Data(#[from] DataError),

    /// Report accumulation error.
    #[error(transparent)]
    Report(#[from] ReportError),

    /// Evolved benchmark weights sum to zero, so active return is undefined.
    #[error("Degenerate benchmark for {period}: evolved benchmark weights sum to zero")]
    DegenerateBenchmark {
        /// Offending period
        period: Period,
    },

    /// A factor sub-portfolio cannot be renormalized after drift.
    #[error("Degenerate holdings for {period}: factor '{factor}' renormalizes by zero")]
    DegenerateHoldings {
        /// Offending period
        period: Period,
        /// Factor whose cash plus holdings is zero
        factor: String,
    },

    /// The panel's factors differ from the return model's factors.
    #[error("Factor mismatch for {period}: data has {data:?}, model has {model:?}")]
    FactorMismatch {
        /// Offending period
        period: Period,
        /// Factor names carried by the data
        data: Vec<String>,
        /// Factor names supplied by the return model
        model: Vec<String>,
    },

    /// The optimizer failed or returned unusable positions.
    #[error("Optimizer failure for {period}, factor #{factor_index} '{factor}': {source}")]
    OptimizerFailure {
        /// Offending period
        period: Period,
        /// Position of the factor in the factor list
        factor_index: usize,
        /// Factor whose counterfactual trade failed
        factor: String,
        /// Underlying optimizer error
        source: OptimizerError,
    },
}
