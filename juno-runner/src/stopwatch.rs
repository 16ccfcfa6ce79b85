// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stopwatch for tracking how long it takes to run tests.
//!
//! The run as a whole and each individual test are timed with a monotonic clock. Once a stopwatch
//! is stopped, its duration is frozen so that reading it again produces the same value.

use std::time::{Duration, Instant};

pub(crate) fn stopwatch() -> StopwatchStart {
    StopwatchStart::new()
}

/// The start state of a stopwatch.
#[derive(Clone, Debug)]
pub(crate) struct StopwatchStart {
    instant: Instant,
}

impl StopwatchStart {
    fn new() -> Self {
        Self {
            instant: Instant::now(),
        }
    }

    pub(crate) fn snapshot(&self) -> StopwatchSnapshot {
        StopwatchSnapshot {
            duration: self.instant.elapsed(),
        }
    }
}

/// A frozen reading of a stopwatch.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct StopwatchSnapshot {
    pub(crate) duration: Duration,
}
