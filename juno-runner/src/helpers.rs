// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for juno-runner.

/// Utilities for pluralizing various words based on count or plurality.
pub mod plural {
    /// Returns "test" if `count` is 1, otherwise "tests".
    pub fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }

    /// Returns "label" if `count` is 1, otherwise "labels".
    pub fn labels_str(count: usize) -> &'static str {
        if count == 1 { "label" } else { "labels" }
    }

    /// Returns "setup script" if `count` is 1, otherwise "setup scripts".
    pub fn setup_scripts_str(count: usize) -> &'static str {
        if count == 1 {
            "setup script"
        } else {
            "setup scripts"
        }
    }
}

/// Returns the last dotted component of a test id, which is the test's method name.
///
/// `app.tests.MathTests.test_add` has method name `test_add`.
pub(crate) fn method_name(id: &str) -> &str {
    match id.rsplit_once('.') {
        Some((_, method)) => method,
        None => id,
    }
}

/// Returns true if `id` is selected by `label`: either equal to it, or nested below it.
pub(crate) fn label_matches(label: &str, id: &str) -> bool {
    match id.strip_prefix(label) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}
