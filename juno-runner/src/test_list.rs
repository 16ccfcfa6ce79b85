// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test collections, and the seam through which tests are discovered.
//!
//! A [`TestDiscovery`] provider resolves labels into a [`TestSuite`]: the full, ordered collection
//! of tests for those labels. The tests that actually run are an [`ExecutedSuite`], which is
//! either the whole suite or a prefix of it. An executed suite always keeps a reference back to
//! the suite it came from, so the original total can be reported even when only a prefix runs.

use crate::{
    errors::{DiscoveryError, MethodFilterParseError},
    helpers::method_name,
    outcome::TestOutcome,
};
use std::{collections::BTreeSet, fmt, str::FromStr};

/// A single runnable test.
///
/// Implementations are provided by discovery providers. `run` must not panic on test failure:
/// failures and errors are reported through the returned [`TestOutcome`]. (The runner catches
/// panics anyway and reports them as errors.)
pub trait TestCase: fmt::Debug {
    /// The test's id. This is a dotted label, and is what gets written to the rerun log.
    fn id(&self) -> &str;

    /// A short human-readable description of the test, if any.
    fn description(&self) -> Option<&str> {
        None
    }

    /// Runs the test to completion.
    fn run(&self) -> TestOutcome;
}

/// Represents a single test by reference, for reporting.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TestInstance<'a> {
    /// The id of the test.
    pub id: &'a str,

    /// The description of the test, if any.
    pub description: Option<&'a str>,
}

impl<'a> TestInstance<'a> {
    /// Creates a new `TestInstance`.
    pub fn new(id: &'a str, description: Option<&'a str>) -> Self {
        Self { id, description }
    }

    /// Creates a new `TestInstance` for the given test case.
    pub fn from_case(case: &'a dyn TestCase) -> Self {
        Self::new(case.id(), case.description())
    }
}

impl fmt::Display for TestInstance<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id)
    }
}

/// The full, ordered collection of tests resolved for a set of labels.
///
/// Duplicates are allowed: the same test may appear more than once, and each occurrence runs.
#[derive(Debug, Default)]
pub struct TestSuite {
    tests: Vec<Box<dyn TestCase>>,
}

impl TestSuite {
    /// Creates a new suite from the given tests, in order.
    pub fn new(tests: Vec<Box<dyn TestCase>>) -> Self {
        Self { tests }
    }

    /// Returns the number of tests in this suite.
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    /// Returns true if this suite has no tests.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Iterates over the tests in this suite.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &dyn TestCase> + '_ {
        self.tests.iter().map(|test| &**test)
    }

    /// Returns the tests to execute: the first `first_n` tests if specified, otherwise all of them.
    pub fn to_execute(&self, first_n: Option<usize>) -> ExecutedSuite<'_> {
        let run_count = match first_n {
            Some(first_n) => first_n.min(self.tests.len()),
            None => self.tests.len(),
        };
        ExecutedSuite {
            tests: &self.tests[..run_count],
            original: self,
        }
    }
}

/// The tests that are actually executed in a run.
///
/// This borrows a prefix of a [`TestSuite`] and keeps a reference back to it.
#[derive(Clone, Copy, Debug)]
pub struct ExecutedSuite<'a> {
    tests: &'a [Box<dyn TestCase>],
    original: &'a TestSuite,
}

impl<'a> ExecutedSuite<'a> {
    /// Returns the number of tests that will run.
    pub fn run_count(&self) -> usize {
        self.tests.len()
    }

    /// Returns the number of tests in the untrimmed suite.
    ///
    /// This is the total reported in progress lines and the summary.
    pub fn original_total(&self) -> usize {
        self.original.test_count()
    }

    /// Returns true if fewer tests will run than were resolved.
    pub fn is_trimmed(&self) -> bool {
        self.run_count() < self.original_total()
    }

    /// Returns the untrimmed suite.
    pub fn original(&self) -> &'a TestSuite {
        self.original
    }

    /// Iterates over the tests that will run, in order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &'a dyn TestCase> + 'a {
        self.tests.iter().map(|test| &**test)
    }
}

/// Restricts discovered tests to those with the given method names.
///
/// A test's method name is the last dotted component of its id.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MethodFilter {
    methods: BTreeSet<String>,
}

impl MethodFilter {
    /// Creates a new filter from the given method names.
    pub fn new(methods: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            methods: methods.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if the test with this id is selected by the filter.
    pub fn is_match(&self, id: &str) -> bool {
        self.methods.contains(method_name(id))
    }

    /// Iterates over the method names in this filter, in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.methods.iter().map(String::as_str)
    }
}

impl FromStr for MethodFilter {
    type Err = MethodFilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let methods: BTreeSet<_> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect();
        if methods.is_empty() {
            return Err(MethodFilterParseError::new(s));
        }
        Ok(Self { methods })
    }
}

/// Resolves labels into tests.
///
/// This is the seam between juno and whatever knows where tests live.
pub trait TestDiscovery {
    /// Resolves `labels` into the full ordered collection of tests.
    ///
    /// An empty `labels` slice means every known test. If `methods` is specified, only tests whose
    /// method name is in the filter are included.
    fn discover(
        &self,
        labels: &[String],
        methods: Option<&MethodFilter>,
    ) -> Result<TestSuite, DiscoveryError>;
}
