// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for juno, a test runner that reports failures as soon as they happen and
//! remembers which tests failed so that they can be rerun.
//!
//! The two central pieces are:
//!
//! * [`reporter::ResultCollector`], which turns test outcomes into live progress lines and error
//!   blocks, and replays those error blocks in a final summary.
//! * [`runner::TestRunner`], which selects the tests to run (everything, a prefix, or the tests
//!   listed in the rerun log), drives them, and writes the rerun log afterwards.

pub mod config;
pub mod environment;
pub mod errors;
pub mod exit_codes;
pub mod helpers;
pub mod manifest;
pub mod outcome;
pub mod reporter;
pub mod rerun_log;
pub mod runner;
mod stopwatch;
#[cfg(test)]
mod test_helpers;
pub mod test_list;
