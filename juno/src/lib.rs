// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The juno command line.
//!
//! juno runs the tests listed in a TOML manifest, shows live progress on stderr, prints
//! failures on stdout as they happen and again after the summary, and records the ids of
//! failing tests so they can be rerun with `--only-failed`.
//!
//! The logic lives in `juno-runner`. This crate parses arguments, sets up colors and logging,
//! and maps errors to exit codes.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
pub use output::{Color, OutputContext, StderrStyles};
