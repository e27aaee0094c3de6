#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export main types from sub-crates
pub use hobart_attribution as attribution;
pub use hobart_data as data;
pub use hobart_output as output;

pub use hobart_attribution::{AttributionEngine, AttributionError, StrategyConfig, StrategyKind};
pub use hobart_data::AttributionPanel;
pub use hobart_output::ReportTable;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
