// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Setup and teardown around a whole test run.

use crate::errors::EnvironmentError;

/// Prepares the world for a test run and cleans it up afterwards.
///
/// `setup` is called once before the first test runs, and `teardown` once after the summary is
/// written. Failures in either are fatal to the run. `teardown` is only called if `setup`
/// succeeded.
pub trait TestEnvironment {
    /// State produced by setup and handed back to teardown.
    type Context;

    /// Sets up the environment.
    fn setup(&mut self) -> Result<Self::Context, EnvironmentError>;

    /// Tears down the environment.
    fn teardown(&mut self, context: Self::Context) -> Result<(), EnvironmentError>;
}

/// An environment that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEnvironment;

impl TestEnvironment for NoopEnvironment {
    type Context = ();

    fn setup(&mut self) -> Result<(), EnvironmentError> {
        Ok(())
    }

    fn teardown(&mut self, _context: ()) -> Result<(), EnvironmentError> {
        Ok(())
    }
}
