#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod collaborator;
pub mod engine;
pub mod error;
pub mod pnl;
pub mod strategy;
pub mod table;

pub use collaborator::{
    Evaluation, Optimizer, OptimizerError, Positions, RebalanceCalendar, ReturnModel, Scheduler,
    TradeOutcome,
};
pub use engine::{AttributionEngine, PeriodStatus};
pub use error::{AttributionError, Result};
pub use strategy::{
    AllOthersIn, AttributionStrategy, Execution, FocusAllOthersIn, FocusLeaveOneOut, LeaveOneOut,
    Rebalanced, StrategyConfig, StrategyKind,
};
pub use table::{DegenerateFactor, HoldingTable};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
