//! dropship: Command-line interface
//!
//! Provides the `dropship` CLI: resolves the deployment target from flags
//! and the saved record, runs the deploy pipeline and reports the outcome.

pub mod commands;
pub mod output;
pub mod resolver;
