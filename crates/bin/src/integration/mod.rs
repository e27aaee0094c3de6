//! Integration module for running attributions from the command line.
//!
//! Provides the run configuration file and a signal-tilt optimizer that
//! stands in for a production portfolio construction engine.

pub(crate) mod config;
pub(crate) mod tilt;
