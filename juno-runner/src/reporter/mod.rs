// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporting of test outcomes.
//!
//! The main structure in this module is [`ResultCollector`]. It writes one progress line per test,
//! writes an error block as soon as a test fails or errors, and writes every error block again
//! in the summary at the end of the run.

mod collector;
mod duration;
mod error_block;

pub use collector::{
    ReporterOutput, ResultCollector, ResultCollectorBuilder, RunReport, TestTiming,
};
pub use error_block::SEPARATOR_WIDTH;
