#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod panel;
pub mod period;
pub mod schema;

pub use error::{DataError, Result};
pub use panel::AttributionPanel;
pub use period::{Period, PeriodFrame, PeriodFrameBuilder};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
