// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `juno` failures.
///
/// `juno` runs may fail for a variety of reasons. This structure documents the exit codes that may
/// occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum JunoExitCode {}

impl JunoExitCode {
    /// No errors occurred and juno exited normally.
    pub const OK: i32 = 0;

    /// One or more tests failed or errored, or a test passed unexpectedly.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// Resolving labels into tests produced an error.
    pub const TEST_LIST_CREATION_FAILED: i32 = 104;

    /// Setting up or tearing down the test environment failed.
    pub const ENVIRONMENT_FAILED: i32 = 105;

    /// Writing data to stdout or stderr, or writing the rerun log, produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// A test produced an error payload that could not be rendered.
    pub const RENDER_ERROR: i32 = 111;

    /// A user issue happened while setting up a juno invocation, for example an invalid config or
    /// `--only-failed` without a rerun log.
    pub const SETUP_ERROR: i32 = 96;
}
