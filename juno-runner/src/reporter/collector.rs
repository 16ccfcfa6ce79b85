// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    duration::{DisplayBracketedDuration, DisplayElapsed},
    error_block::{SEPARATOR_WIDTH, render_error_block},
};
use crate::{
    errors::WriteEventError,
    helpers::plural,
    outcome::{ErrorPayload, OutcomeKind, TestOutcome},
    stopwatch::{StopwatchStart, stopwatch},
    test_list::TestInstance,
};
use itertools::Itertools;
use owo_colors::{OwoColorize, Style};
use std::{
    cmp::Reverse,
    fmt,
    io::{self, Write},
    time::Duration,
};
use swrite::{SWrite, swrite, swriteln};
use tracing::debug;

/// Where a [`ResultCollector`] writes its output.
pub enum ReporterOutput<'a> {
    /// Write to standard output.
    Stdout,

    /// Write to standard error.
    Stderr,

    /// Write to an in-memory buffer, mostly for tests.
    Buffer(&'a mut Vec<u8>),
}

impl ReporterOutput<'_> {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        match self {
            Self::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(s.as_bytes())?;
                stdout.flush()
            }
            Self::Stderr => {
                let mut stderr = io::stderr().lock();
                stderr.write_all(s.as_bytes())?;
                stderr.flush()
            }
            Self::Buffer(buf) => {
                buf.extend_from_slice(s.as_bytes());
                Ok(())
            }
        }
    }
}

impl fmt::Debug for ReporterOutput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "Stdout"),
            Self::Stderr => write!(f, "Stderr"),
            Self::Buffer(buf) => write!(f, "Buffer({} bytes)", buf.len()),
        }
    }
}

/// Builder for a [`ResultCollector`].
#[derive(Debug)]
pub struct ResultCollectorBuilder {
    original_total: usize,
    verbosity: u8,
    should_colorize: bool,
    should_colorize_errors: Option<bool>,
}

impl ResultCollectorBuilder {
    /// Creates a new builder.
    ///
    /// `original_total` is the number of tests in the untrimmed suite. It is shown on every
    /// progress line, even if fewer tests end up running. Zero is allowed, in which case no
    /// percentage is shown.
    pub fn new(original_total: usize) -> Self {
        Self {
            original_total,
            verbosity: 1,
            should_colorize: false,
            should_colorize_errors: None,
        }
    }

    /// Sets the verbosity.
    ///
    /// * 0: no progress lines, only error blocks and the summary.
    /// * 1: one progress line per test (the default).
    /// * 2 and above: progress lines also include each test's description.
    pub fn set_verbosity(&mut self, verbosity: u8) -> &mut Self {
        self.verbosity = verbosity;
        self
    }

    /// Sets whether the output should be colorized.
    pub fn set_colorize(&mut self, should_colorize: bool) -> &mut Self {
        self.should_colorize = should_colorize;
        self
    }

    /// Sets whether error blocks should be colorized, if they go to a different stream.
    ///
    /// Defaults to the value passed to [`Self::set_colorize`].
    pub fn set_colorize_errors(&mut self, should_colorize_errors: bool) -> &mut Self {
        self.should_colorize_errors = Some(should_colorize_errors);
        self
    }

    /// Creates a new collector.
    ///
    /// Progress lines and the summary are written to `output`. Error blocks are written to
    /// `error_output` if it is specified, and to `output` otherwise.
    pub fn build<'a>(
        &self,
        output: ReporterOutput<'a>,
        error_output: Option<ReporterOutput<'a>>,
    ) -> ResultCollector<'a> {
        let mut styles = Styles::default();
        if self.should_colorize {
            styles.colorize();
        }
        let error_label = if self
            .should_colorize_errors
            .unwrap_or(self.should_colorize)
        {
            Style::new().red().bold()
        } else {
            Style::new()
        };

        ResultCollector {
            verbosity: self.verbosity,
            styles,
            error_label,
            output,
            error_output,
            state: RunState::new(self.original_total),
        }
    }
}

/// Accumulates test outcomes for a run and reports them as they come in.
///
/// Every failure and error is rendered twice: once as soon as it is recorded, and once more when
/// the summary is written at the end of the run.
#[derive(Debug)]
pub struct ResultCollector<'a> {
    verbosity: u8,
    styles: Styles,
    // Error blocks may go to a stream with different color support.
    error_label: Style,
    output: ReporterOutput<'a>,
    error_output: Option<ReporterOutput<'a>>,
    state: RunState,
}

impl<'a> ResultCollector<'a> {
    /// Called once before any tests run, with the number of tests that are going to run.
    pub fn run_started(&mut self, run_count: usize) -> Result<(), WriteEventError> {
        self.state.stopwatch = stopwatch();
        self.state.elapsed = None;

        if self.verbosity == 0 {
            return Ok(());
        }

        let total = self.state.original_total;
        let mut out = String::new();
        swrite!(out, "{:>12} ", "Starting".style(self.styles.pass));
        if run_count < total {
            swrite!(
                out,
                "{} of {} {}",
                run_count.style(self.styles.count),
                total.style(self.styles.count),
                plural::tests_str(total),
            );
        } else {
            swrite!(
                out,
                "{} {}",
                run_count.style(self.styles.count),
                plural::tests_str(run_count),
            );
        }
        out.push('\n');
        self.output.write_str(&out)?;
        Ok(())
    }

    /// Called just before a test runs.
    pub fn test_started(&mut self, test: TestInstance<'_>) {
        self.state.started += 1;
        debug!(test = %test, started = self.state.started, "test started");
    }

    /// Records the outcome of a test.
    ///
    /// If the test failed or errored, its error block is written out immediately and kept for the
    /// summary. A payload that can't be rendered fails before anything is written or counted.
    pub fn record_outcome(
        &mut self,
        test: TestInstance<'_>,
        outcome: &TestOutcome,
    ) -> Result<(), WriteEventError> {
        let block = match outcome.error_block() {
            Some((status_label, payload)) => {
                let rendered =
                    render_error_block(status_label, self.error_label, &test, payload)?;
                Some((status_label, payload, rendered))
            }
            None => None,
        };

        self.state.record(outcome.kind());

        if self.verbosity > 0 {
            let line = self.progress_line(test, outcome);
            self.output.write_str(&line)?;
        }

        if let Some((status_label, payload, rendered)) = block {
            self.error_sink().write_str(&rendered)?;
            self.state.error_blocks.push(RecordedError {
                status_label,
                test: test.id.to_owned(),
                payload: payload.clone(),
            });
        }

        Ok(())
    }

    /// Writes a single error block to the error output.
    pub fn print_single_error(
        &mut self,
        status_label: &str,
        test: &dyn fmt::Display,
        payload: &ErrorPayload,
    ) -> Result<(), WriteEventError> {
        let rendered = render_error_block(status_label, self.error_label, test, payload)?;
        self.error_sink().write_str(&rendered)?;
        Ok(())
    }

    /// Called once after the last test has run. Freezes the elapsed time for the run.
    pub fn run_finished(&mut self) {
        if self.state.elapsed.is_none() {
            self.state.elapsed = Some(self.state.stopwatch.snapshot().duration);
        }
    }

    /// Writes the summary for the run and returns the report.
    ///
    /// Every error block recorded during the run is written again, followed by the aggregate
    /// counts. This doesn't change any state, so calling it twice produces the same output.
    pub fn finalize_summary(&mut self) -> Result<RunReport, WriteEventError> {
        let report = self.report();
        debug!(?report, "writing summary");

        let mut blocks = String::new();
        for recorded in &self.state.error_blocks {
            blocks.push_str(&render_error_block(
                recorded.status_label,
                self.error_label,
                &recorded.test,
                &recorded.payload,
            )?);
        }
        if !blocks.is_empty() {
            self.error_sink().write_str(&blocks)?;
        }

        let summary = self.summary_text(&report);
        self.output.write_str(&summary)?;
        Ok(report)
    }

    /// Returns the report for the tests recorded so far, without writing anything.
    pub fn report(&self) -> RunReport {
        let state = &self.state;
        RunReport {
            original_total: state.original_total,
            tests_run: state.completed,
            passed: state.passed,
            failures: state.failures,
            errors: state.errors,
            skipped: state.skipped,
            expected_failures: state.expected_failures,
            unexpected_successes: state.unexpected_successes,
            elapsed: state.elapsed,
        }
    }

    /// Returns the ids of tests that failed or errored, in the order they were recorded.
    pub fn failing_tests(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.state
            .error_blocks
            .iter()
            .map(|recorded| recorded.test.as_str())
    }

    /// Writes the `count` slowest tests out of `timings`, slowest first.
    ///
    /// Nothing is written if `count` is 0 or no tests were timed.
    pub fn write_slow_tests(
        &mut self,
        timings: &[TestTiming],
        count: usize,
    ) -> Result<(), WriteEventError> {
        let slowest = slowest_tests(timings, count);
        if slowest.is_empty() {
            return Ok(());
        }

        let mut out = String::new();
        swriteln!(
            out,
            "{:>12} {} {}:",
            "Slowest".style(self.styles.skip),
            slowest.len().style(self.styles.count),
            plural::tests_str(slowest.len()),
        );
        for timing in slowest {
            swriteln!(
                out,
                " {} {}",
                DisplayBracketedDuration(timing.duration),
                timing.id,
            );
        }
        self.output.write_str(&out)?;
        Ok(())
    }

    fn error_sink(&mut self) -> &mut ReporterOutput<'a> {
        match &mut self.error_output {
            Some(error_output) => error_output,
            None => &mut self.output,
        }
    }

    fn progress_line(&self, test: TestInstance<'_>, outcome: &TestOutcome) -> String {
        let completed = self.state.completed;
        let total = self.state.original_total;

        let mut out = String::new();
        if total > 0 {
            let width = usize_decimal_width(total);
            let percent = completed * 100 / total;
            swrite!(
                out,
                "[{:>width$}/{} {:>3}%] ",
                completed.style(self.styles.count),
                total.style(self.styles.count),
                percent,
            );
        } else {
            swrite!(out, "[{completed}/0] ");
        }

        swrite!(out, "{test}");
        if self.verbosity >= 2 {
            if let Some(description) = test.description {
                swrite!(out, " ({description})");
            }
        }
        out.push_str(" ... ");

        let kind = outcome.kind();
        let status_style = match kind {
            OutcomeKind::Success => self.styles.pass,
            OutcomeKind::Failure | OutcomeKind::Error | OutcomeKind::UnexpectedSuccess => {
                self.styles.fail
            }
            OutcomeKind::Skip | OutcomeKind::ExpectedFailure => self.styles.skip,
        };
        swrite!(out, "{}", kind.style(status_style));
        if let TestOutcome::Skip { reason } = outcome {
            swrite!(out, " '{reason}'");
        }
        out.push('\n');
        out
    }

    fn summary_text(&self, report: &RunReport) -> String {
        let mut out = String::new();
        swriteln!(out, "{}", "-".repeat(SEPARATOR_WIDTH));

        if report.tests_run < report.original_total {
            swrite!(
                out,
                "Ran {}/{} {}",
                report.tests_run,
                report.original_total,
                plural::tests_str(report.original_total),
            );
        } else {
            swrite!(
                out,
                "Ran {} {}",
                report.tests_run,
                plural::tests_str(report.tests_run),
            );
        }
        if let Some(elapsed) = report.elapsed {
            swrite!(out, " in {}", DisplayElapsed(elapsed));
        }
        out.push_str("\n\n");

        let details = [
            ("failures", report.failures),
            ("errors", report.errors),
            ("skipped", report.skipped),
            ("expected failures", report.expected_failures),
            ("unexpected successes", report.unexpected_successes),
        ]
        .into_iter()
        .filter(|&(_, count)| count > 0)
        .map(|(name, count)| format!("{name}={count}"))
        .join(", ");

        if report.is_success() {
            swrite!(out, "{}", "OK".style(self.styles.pass));
        } else {
            swrite!(out, "{}", "FAILED".style(self.styles.fail));
        }
        if !details.is_empty() {
            swrite!(out, " ({details})");
        }
        out.push('\n');
        out
    }
}

/// The result of a run, as returned by [`ResultCollector::finalize_summary`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunReport {
    /// The number of tests in the untrimmed suite.
    pub original_total: usize,

    /// The number of tests that ran.
    pub tests_run: usize,

    /// The number of tests that didn't fail, error or get skipped. Expected failures and
    /// unexpected successes are counted here as well as in their own counters.
    pub passed: usize,

    /// The number of tests that failed.
    pub failures: usize,

    /// The number of tests that errored.
    pub errors: usize,

    /// The number of tests that were skipped.
    pub skipped: usize,

    /// The number of tests that failed as expected.
    pub expected_failures: usize,

    /// The number of tests that were expected to fail but passed.
    pub unexpected_successes: usize,

    /// The time the run took, if it was timed.
    pub elapsed: Option<Duration>,
}

impl RunReport {
    /// Returns true if no tests failed, errored or unexpectedly succeeded.
    pub fn is_success(&self) -> bool {
        self.failures == 0 && self.errors == 0 && self.unexpected_successes == 0
    }
}

/// How long a single test took to run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestTiming {
    /// The id of the test.
    pub id: String,

    /// The wall-clock time the test took.
    pub duration: Duration,
}

impl TestTiming {
    /// Creates a new `TestTiming`.
    pub fn new(id: impl Into<String>, duration: Duration) -> Self {
        Self {
            id: id.into(),
            duration,
        }
    }
}

/// Ranks timings slowest first. Tests that took the same time stay in execution order.
pub(crate) fn slowest_tests(timings: &[TestTiming], count: usize) -> Vec<&TestTiming> {
    let mut ranked: Vec<_> = timings.iter().collect();
    // sort_by_key is stable.
    ranked.sort_by_key(|timing| Reverse(timing.duration));
    ranked.truncate(count);
    ranked
}

#[derive(Debug)]
struct RunState {
    original_total: usize,
    started: usize,
    completed: usize,
    passed: usize,
    failures: usize,
    errors: usize,
    skipped: usize,
    expected_failures: usize,
    unexpected_successes: usize,
    error_blocks: Vec<RecordedError>,
    stopwatch: StopwatchStart,
    elapsed: Option<Duration>,
}

impl RunState {
    fn new(original_total: usize) -> Self {
        Self {
            original_total,
            started: 0,
            completed: 0,
            passed: 0,
            failures: 0,
            errors: 0,
            skipped: 0,
            expected_failures: 0,
            unexpected_successes: 0,
            error_blocks: Vec::new(),
            stopwatch: stopwatch(),
            elapsed: None,
        }
    }

    fn record(&mut self, kind: OutcomeKind) {
        self.completed += 1;
        match kind {
            OutcomeKind::Success => self.passed += 1,
            OutcomeKind::Failure => self.failures += 1,
            OutcomeKind::Error => self.errors += 1,
            OutcomeKind::Skip => self.skipped += 1,
            OutcomeKind::ExpectedFailure => {
                self.passed += 1;
                self.expected_failures += 1;
            }
            OutcomeKind::UnexpectedSuccess => {
                self.passed += 1;
                self.unexpected_successes += 1;
            }
        }
    }
}

#[derive(Debug)]
struct RecordedError {
    status_label: &'static str,
    test: String,
    payload: ErrorPayload,
}

#[derive(Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    skip: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
    }
}

fn usize_decimal_width(n: usize) -> usize {
    n.checked_ilog10().map_or(1, |log| log as usize + 1)
}
