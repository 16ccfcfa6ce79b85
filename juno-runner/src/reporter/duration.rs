// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Display helpers for durations.

use std::{fmt, time::Duration};

/// Displays a duration as `[   1.234s]`, used for the slow test list.
pub(super) struct DisplayBracketedDuration(pub(super) Duration);

impl fmt::Display for DisplayBracketedDuration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // * > means right-align.
        // * 8 is the number of characters to pad to.
        // * .3 means print three digits after the decimal point.
        write!(f, "[{:>8.3?}s]", self.0.as_secs_f64())
    }
}

/// Displays a duration as `1.234s`, used for the total time taken by a run.
pub(super) struct DisplayElapsed(pub(super) Duration);

impl fmt::Display for DisplayElapsed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.3}s", self.0.as_secs_f64())
    }
}
