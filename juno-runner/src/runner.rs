// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Selecting and running tests.
//!
//! The main structure in this module is [`TestRunner`].

use crate::{
    environment::TestEnvironment,
    errors::RunError,
    helpers::plural,
    outcome::{ErrorPayload, TestOutcome},
    reporter::{ReporterOutput, ResultCollector, ResultCollectorBuilder, RunReport, TestTiming},
    rerun_log::RerunLog,
    stopwatch::stopwatch,
    test_list::{ExecutedSuite, MethodFilter, TestCase, TestDiscovery, TestInstance, TestSuite},
};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};
use tracing::{debug, info, warn};

/// The number of tests run by `--first-ten`.
pub const FIRST_TEN: usize = 10;

/// Test runner options.
#[derive(Clone, Debug)]
pub struct TestRunnerBuilder {
    only_failed: bool,
    first_n: Option<usize>,
    method_filter: Option<MethodFilter>,
    slow_test_count: usize,
    verbosity: u8,
    should_colorize: bool,
    should_colorize_errors: Option<bool>,
}

impl Default for TestRunnerBuilder {
    fn default() -> Self {
        Self {
            only_failed: false,
            first_n: None,
            method_filter: None,
            slow_test_count: 0,
            verbosity: 1,
            should_colorize: false,
            should_colorize_errors: None,
        }
    }
}

impl TestRunnerBuilder {
    /// If true, run only the tests listed in the rerun log, instead of the labels passed in.
    pub fn set_only_failed(&mut self, only_failed: bool) -> &mut Self {
        self.only_failed = only_failed;
        self
    }

    /// Runs at most the first `first_n` tests. Totals still reflect every test that was
    /// resolved.
    pub fn set_first_n(&mut self, first_n: Option<usize>) -> &mut Self {
        self.first_n = first_n;
        self
    }

    /// Restricts tests to those with the given method names. The filter is passed to discovery.
    pub fn set_method_filter(&mut self, method_filter: Option<MethodFilter>) -> &mut Self {
        self.method_filter = method_filter;
        self
    }

    /// Lists this many of the slowest tests after the run. 0 disables the list.
    pub fn set_slow_test_count(&mut self, slow_test_count: usize) -> &mut Self {
        self.slow_test_count = slow_test_count;
        self
    }

    /// Sets the reporter verbosity. See [`ResultCollectorBuilder::set_verbosity`].
    pub fn set_verbosity(&mut self, verbosity: u8) -> &mut Self {
        self.verbosity = verbosity;
        self
    }

    /// Sets whether reporter output should be colorized.
    pub fn set_colorize(&mut self, should_colorize: bool) -> &mut Self {
        self.should_colorize = should_colorize;
        self
    }

    /// Sets whether error blocks should be colorized. See
    /// [`ResultCollectorBuilder::set_colorize_errors`].
    pub fn set_colorize_errors(&mut self, should_colorize_errors: bool) -> &mut Self {
        self.should_colorize_errors = Some(should_colorize_errors);
        self
    }

    /// Creates a new test runner that reads and writes the given rerun log.
    pub fn build(&self, rerun_log: RerunLog) -> TestRunner {
        TestRunner {
            opts: self.clone(),
            rerun_log,
        }
    }
}

/// Selects tests, runs them, and records which ones failed.
#[derive(Debug)]
pub struct TestRunner {
    opts: TestRunnerBuilder,
    rerun_log: RerunLog,
}

impl TestRunner {
    /// Returns the rerun log this runner uses.
    pub fn rerun_log(&self) -> &RerunLog {
        &self.rerun_log
    }

    /// Resolves `labels` into the full suite of tests for a run.
    ///
    /// If only failed tests were requested, `labels` is ignored and the labels are read from the
    /// rerun log instead. An empty rerun log produces an empty suite without calling `discovery`,
    /// since no labels would mean every test.
    pub fn resolve_suite(
        &self,
        labels: &[String],
        discovery: &dyn TestDiscovery,
    ) -> Result<TestSuite, RunError> {
        let rerun_labels;
        let labels = if self.opts.only_failed {
            rerun_labels = self.rerun_log.load()?;
            info!(
                "selected {} failed {} from {}",
                rerun_labels.len(),
                plural::tests_str(rerun_labels.len()),
                self.rerun_log.path(),
            );
            if rerun_labels.is_empty() {
                return Ok(TestSuite::default());
            }
            &rerun_labels[..]
        } else {
            labels
        };

        let suite = discovery.discover(labels, self.opts.method_filter.as_ref())?;
        debug!(
            labels = labels.len(),
            tests = suite.test_count(),
            "resolved test suite"
        );
        Ok(suite)
    }

    /// Runs the tests selected by `labels`.
    ///
    /// Progress and the summary are written to `output`, and error blocks to `error_output` (or
    /// `output` if not specified). After the summary is written, the rerun log is replaced with
    /// the tests that failed or errored. If the run stops partway through, the log is still
    /// replaced with the failures seen so far.
    ///
    /// Test failures are reported through the returned [`RunReport`], not as errors.
    pub fn run<'a, E: TestEnvironment>(
        &self,
        labels: &[String],
        discovery: &dyn TestDiscovery,
        env: &mut E,
        output: ReporterOutput<'a>,
        error_output: Option<ReporterOutput<'a>>,
    ) -> Result<RunReport, RunError> {
        let suite = self.resolve_suite(labels, discovery)?;
        let executed = suite.to_execute(self.opts.first_n);
        if executed.is_trimmed() {
            info!(
                "running the first {} of {} {}",
                executed.run_count(),
                executed.original_total(),
                plural::tests_str(executed.original_total()),
            );
        }

        let mut builder = ResultCollectorBuilder::new(executed.original_total());
        builder
            .set_verbosity(self.opts.verbosity)
            .set_colorize(self.opts.should_colorize);
        if let Some(should_colorize_errors) = self.opts.should_colorize_errors {
            builder.set_colorize_errors(should_colorize_errors);
        }
        let mut collector = builder.build(output, error_output);

        let context = env.setup().map_err(RunError::EnvironmentSetup)?;
        let result = self.run_executed(executed, &mut collector);

        match (result, env.teardown(context)) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(report), Err(error)) => Err(RunError::EnvironmentTeardown { report, error }),
            (Err(error), Ok(())) => Err(error),
            (Err(error), Err(teardown_error)) => {
                warn!("{teardown_error}");
                Err(error)
            }
        }
    }

    fn run_executed(
        &self,
        executed: ExecutedSuite<'_>,
        collector: &mut ResultCollector<'_>,
    ) -> Result<RunReport, RunError> {
        let mut timings = Vec::with_capacity(executed.run_count());
        if let Err(error) = run_tests(executed, collector, &mut timings) {
            self.abort_run(collector);
            return Err(error);
        }

        collector.run_finished();
        let summary = collector.finalize_summary();

        // The rerun log is replaced even if the summary couldn't be written.
        let failed = self.rerun_log.save(collector.failing_tests())?;
        debug!(failed, path = %self.rerun_log.path(), "saved rerun log");
        let report = summary?;

        if self.opts.slow_test_count > 0 {
            collector.write_slow_tests(&timings, self.opts.slow_test_count)?;
        }

        Ok(report)
    }

    /// Winds down a run that stopped partway through.
    ///
    /// The rerun log is still replaced with the failures seen so far, so a log from an earlier run
    /// can't survive. The summary is written if possible. Errors here are logged, since the error
    /// that stopped the run is the one reported.
    fn abort_run(&self, collector: &mut ResultCollector<'_>) {
        match self.rerun_log.save(collector.failing_tests()) {
            Ok(failed) => debug!(failed, path = %self.rerun_log.path(), "saved rerun log"),
            Err(error) => warn!("{error}"),
        }

        collector.run_finished();
        if let Err(error) = collector.finalize_summary() {
            warn!("could not write summary for the aborted run: {error}");
        }
    }
}

fn run_tests(
    executed: ExecutedSuite<'_>,
    collector: &mut ResultCollector<'_>,
    timings: &mut Vec<TestTiming>,
) -> Result<(), RunError> {
    collector.run_started(executed.run_count())?;

    for test in executed.iter() {
        let instance = TestInstance::from_case(test);
        collector.test_started(instance);

        let start = stopwatch();
        let outcome = run_test(test);
        let duration = start.snapshot().duration;

        collector.record_outcome(instance, &outcome)?;
        timings.push(TestTiming::new(test.id(), duration));
    }
    Ok(())
}

/// Runs a test, turning a panic into an error outcome.
fn run_test(test: &dyn TestCase) -> TestOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| test.run())) {
        Ok(outcome) => outcome,
        Err(payload) => {
            warn!(test = test.id(), "test panicked");
            TestOutcome::Error(ErrorPayload::structured("panic", panic_message(&*payload)))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "(non-string panic payload)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        environment::NoopEnvironment,
        errors::{
            ConfigurationError, DiscoveryError, EnvironmentError, EnvironmentPhase, WriteEventError,
        },
        reporter::SEPARATOR_WIDTH,
        test_helpers::{FakeDiscovery, FakeTest},
    };
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;
    use std::{cell::RefCell, rc::Rc};

    struct Fixture {
        _dir: Utf8TempDir,
        rerun_log: RerunLog,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = camino_tempfile::tempdir().expect("created temp dir");
            let rerun_log = RerunLog::new(dir.path().join("test_rerun.txt"));
            Self {
                _dir: dir,
                rerun_log,
            }
        }

        fn run(
            &self,
            builder: &TestRunnerBuilder,
            labels: &[&str],
            discovery: &FakeDiscovery,
        ) -> (Result<RunReport, RunError>, String) {
            let labels: Vec<_> = labels.iter().map(|label| (*label).to_owned()).collect();
            let runner = builder.build(self.rerun_log.clone());
            let mut buf = Vec::new();
            let result = runner.run(
                &labels,
                discovery,
                &mut NoopEnvironment,
                ReporterOutput::Buffer(&mut buf),
                None,
            );
            (result, String::from_utf8(buf).expect("output is valid UTF-8"))
        }

        fn rerun_log_contents(&self) -> String {
            std::fs::read_to_string(self.rerun_log.path()).expect("rerun log was written")
        }
    }

    fn dummy_tests(count: usize) -> Vec<FakeTest> {
        (0..count)
            .map(|i| FakeTest::pass(format!("app.tests.DummyTests.test_{i:02}")))
            .collect()
    }

    #[test]
    fn first_n_keeps_original_total() {
        let fixture = Fixture::new();
        let discovery = FakeDiscovery::new(dummy_tests(20));

        let (result, output) = fixture.run(
            TestRunnerBuilder::default().set_first_n(Some(FIRST_TEN)),
            &[],
            &discovery,
        );
        let report = result.unwrap();

        assert_eq!(report.tests_run, 10);
        assert_eq!(report.original_total, 20);
        assert_eq!(discovery.ran().len(), 10);
        assert_eq!(
            discovery.ran(),
            dummy_tests(10)
                .iter()
                .map(|test| test.id().to_owned())
                .collect::<Vec<_>>(),
            "the first ten tests ran, in order"
        );

        let progress: Vec<_> = output.lines().filter(|line| line.starts_with('[')).collect();
        assert_eq!(progress.len(), 10);
        assert!(
            progress.iter().all(|line| line.contains("/20 ")),
            "every progress line reports the untrimmed total:\n{output}"
        );
        assert!(progress[9].starts_with("[10/20  50%]"), "{output}");
        assert!(output.contains("Ran 10/20 tests"), "{output}");
    }

    #[test]
    fn rerun_log_lists_failures_in_order() {
        let fixture = Fixture::new();
        let discovery = FakeDiscovery::new([
            FakeTest::pass("app.tests.A.test_ok"),
            FakeTest::error("app.tests.A.test_error", "boom"),
            FakeTest::fail("app.tests.B.test_fail", "1 != 2"),
            FakeTest::new(
                "app.tests.B.test_skip",
                TestOutcome::Skip {
                    reason: "reason".to_owned(),
                },
            ),
        ]);

        let (result, output) = fixture.run(&TestRunnerBuilder::default(), &[], &discovery);
        let report = result.unwrap();

        assert_eq!(report.failures, 1);
        assert_eq!(report.errors, 1);
        assert_eq!(report.skipped, 1);
        assert!(!report.is_success());
        assert_eq!(
            fixture.rerun_log_contents(),
            "app.tests.A.test_error\napp.tests.B.test_fail\n"
        );
        assert!(output.contains("FAILED (failures=1, errors=1, skipped=1)"), "{output}");
    }

    #[test]
    fn only_failed_round_trip() {
        let fixture = Fixture::new();
        let tests = [
            FakeTest::fail("app.tests.B.test_2", "x"),
            FakeTest::pass("app.tests.A.test_1"),
            FakeTest::fail("app.tests.A.test_3", "y"),
        ];

        let discovery = FakeDiscovery::new(tests.clone());
        let (result, _) = fixture.run(&TestRunnerBuilder::default(), &[], &discovery);
        assert_eq!(result.unwrap().failures, 2);

        let discovery = FakeDiscovery::new(tests);
        let (result, _) = fixture.run(
            TestRunnerBuilder::default().set_only_failed(true),
            &["ignored.label"],
            &discovery,
        );
        let report = result.unwrap();

        assert_eq!(
            discovery.discover_calls.borrow().clone(),
            vec![vec![
                "app.tests.B.test_2".to_owned(),
                "app.tests.A.test_3".to_owned()
            ]],
            "labels come from the rerun log, in file order"
        );
        assert_eq!(report.tests_run, 2);
        assert_eq!(discovery.ran(), vec!["app.tests.B.test_2", "app.tests.A.test_3"]);
    }

    #[test]
    fn only_failed_after_clean_run_runs_nothing() {
        let fixture = Fixture::new();
        let discovery = FakeDiscovery::new(dummy_tests(3));

        let (result, _) = fixture.run(&TestRunnerBuilder::default(), &[], &discovery);
        assert!(result.unwrap().is_success());
        assert_eq!(fixture.rerun_log_contents(), "", "log is written even if empty");

        let discovery = FakeDiscovery::new(dummy_tests(3));
        let (result, output) = fixture.run(
            TestRunnerBuilder::default().set_only_failed(true),
            &[],
            &discovery,
        );
        let report = result.unwrap();

        assert_eq!(report.tests_run, 0);
        assert_eq!(report.original_total, 0);
        assert!(discovery.discover_calls.borrow().is_empty(), "discovery not called");
        assert!(discovery.ran().is_empty());
        assert!(output.contains("Ran 0 tests"), "{output}");
    }

    #[test]
    fn only_failed_without_rerun_log() {
        let fixture = Fixture::new();
        let discovery = FakeDiscovery::new(dummy_tests(3));

        let (result, output) = fixture.run(
            TestRunnerBuilder::default().set_only_failed(true),
            &[],
            &discovery,
        );
        let err = result.expect_err("no rerun log exists");

        assert!(
            matches!(
                &err,
                RunError::Configuration(ConfigurationError::RerunLogMissing { .. })
            ),
            "unexpected error: {err:?}"
        );
        assert!(discovery.ran().is_empty(), "no tests ran");
        assert_eq!(output, "", "nothing was reported");
        assert!(!fixture.rerun_log.path().exists(), "rerun log wasn't created");
    }

    #[test]
    fn stale_rerun_log_is_replaced() {
        let fixture = Fixture::new();
        fixture
            .rerun_log
            .save(["app.tests.Old.test_stale"])
            .unwrap();

        let discovery = FakeDiscovery::new([
            FakeTest::fail("app.tests.A.test_1", "x"),
            FakeTest::pass("app.tests.A.test_2"),
        ]);
        let (result, _) = fixture.run(
            TestRunnerBuilder::default().set_only_failed(false),
            &[],
            &discovery,
        );
        result.unwrap();
        assert_eq!(fixture.rerun_log_contents(), "app.tests.A.test_1\n");

        // Running only the failed test again, now passing, empties the log.
        let discovery = FakeDiscovery::new([FakeTest::pass("app.tests.A.test_1")]);
        let (result, _) = fixture.run(
            TestRunnerBuilder::default().set_only_failed(true),
            &[],
            &discovery,
        );
        assert!(result.unwrap().is_success());
        assert_eq!(fixture.rerun_log_contents(), "");
    }

    #[test]
    fn aborted_run_replaces_rerun_log() {
        let fixture = Fixture::new();
        fixture
            .rerun_log
            .save(["app.tests.Old.test_stale"])
            .unwrap();

        let discovery = FakeDiscovery::new([
            FakeTest::fail("app.tests.A.test_1", "x"),
            FakeTest::new(
                "app.tests.A.test_2",
                TestOutcome::Error(ErrorPayload::structured("Bad Kind", "y")),
            ),
            FakeTest::pass("app.tests.A.test_3"),
        ]);
        let (result, output) = fixture.run(&TestRunnerBuilder::default(), &[], &discovery);

        let err = result.expect_err("malformed error kind stops the run");
        assert!(
            matches!(err, RunError::WriteEvent(WriteEventError::Render(_))),
            "{err:?}"
        );
        assert_eq!(
            discovery.ran(),
            vec!["app.tests.A.test_1", "app.tests.A.test_2"],
            "no tests run after the render error"
        );
        assert_eq!(
            fixture.rerun_log_contents(),
            "app.tests.A.test_1\n",
            "failures seen before the abort replace the old log"
        );
        assert!(output.contains("Ran 1/3 tests"), "{output}");
        assert!(output.contains("FAILED (failures=1)\n"), "{output}");
        assert_eq!(
            output.matches("FAIL: app.tests.A.test_1\n").count(),
            2,
            "partial summary replays the failure:\n{output}"
        );
    }

    #[test]
    fn method_filter_is_passed_to_discovery() {
        let fixture = Fixture::new();
        let discovery = FakeDiscovery::new([
            FakeTest::pass("app.tests.A.test_add"),
            FakeTest::pass("app.tests.A.test_sub"),
            FakeTest::pass("app.tests.B.test_add"),
        ]);

        let (result, _) = fixture.run(
            TestRunnerBuilder::default().set_method_filter(Some("test_add".parse().unwrap())),
            &["app.tests"],
            &discovery,
        );
        assert_eq!(result.unwrap().original_total, 2);
        assert_eq!(
            discovery.ran(),
            vec!["app.tests.A.test_add", "app.tests.B.test_add"]
        );
    }

    #[test]
    fn discovery_error_aborts() {
        let fixture = Fixture::new();
        let discovery = FakeDiscovery::new(dummy_tests(3));

        let (result, _) = fixture.run(&TestRunnerBuilder::default(), &["missing"], &discovery);
        let err = result.expect_err("label doesn't exist");
        assert!(
            matches!(&err, RunError::Discovery(DiscoveryError::UnknownLabel { label }) if label == "missing"),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn panic_becomes_error() {
        let fixture = Fixture::new();
        let discovery = FakeDiscovery::new([
            FakeTest::panicking("app.tests.A.test_panics", "oh no"),
            FakeTest::pass("app.tests.A.test_after"),
        ]);

        let (result, output) = fixture.run(&TestRunnerBuilder::default(), &[], &discovery);
        let report = result.unwrap();

        assert_eq!(report.errors, 1);
        assert_eq!(report.passed, 1, "tests after the panic still run");
        assert!(
            output.contains(&format!(
                "ERROR: app.tests.A.test_panics\n{}\npanic: oh no\n",
                "-".repeat(SEPARATOR_WIDTH)
            )),
            "{output}"
        );
        assert_eq!(fixture.rerun_log_contents(), "app.tests.A.test_panics\n");
    }

    #[test]
    fn slow_tests_listed_after_summary() {
        let fixture = Fixture::new();
        let discovery = FakeDiscovery::new(dummy_tests(3));

        let (result, output) = fixture.run(
            TestRunnerBuilder::default()
                .set_slow_test_count(2)
                .set_verbosity(0),
            &[],
            &discovery,
        );
        result.unwrap();

        let summary = output.find("\nOK\n").expect("summary was written");
        let slowest = output.find("Slowest 2 tests:").expect("slow tests were listed");
        assert!(summary < slowest, "{output}");
        let listed = output[slowest..]
            .lines()
            .filter(|line| line.contains("s] app.tests.DummyTests.test_"))
            .count();
        assert_eq!(listed, 2, "{output}");
    }

    #[derive(Debug, Default)]
    struct RecordingEnvironment {
        events: Rc<RefCell<Vec<&'static str>>>,
        fail_setup: bool,
        fail_teardown: bool,
    }

    impl TestEnvironment for RecordingEnvironment {
        type Context = &'static str;

        fn setup(&mut self) -> Result<&'static str, EnvironmentError> {
            self.events.borrow_mut().push("setup");
            if self.fail_setup {
                return Err(EnvironmentError::Other {
                    phase: EnvironmentPhase::Setup,
                    error: "database unavailable".into(),
                });
            }
            Ok("context")
        }

        fn teardown(&mut self, context: &'static str) -> Result<(), EnvironmentError> {
            assert_eq!(context, "context", "teardown gets setup's context");
            self.events.borrow_mut().push("teardown");
            if self.fail_teardown {
                return Err(EnvironmentError::Other {
                    phase: EnvironmentPhase::Teardown,
                    error: "database busy".into(),
                });
            }
            Ok(())
        }
    }

    fn run_with_env(
        fixture: &Fixture,
        discovery: &FakeDiscovery,
        env: &mut RecordingEnvironment,
    ) -> Result<RunReport, RunError> {
        TestRunnerBuilder::default()
            .set_verbosity(0)
            .build(fixture.rerun_log.clone())
            .run(
                &[],
                discovery,
                env,
                ReporterOutput::Buffer(&mut Vec::new()),
                None,
            )
    }

    #[test]
    fn environment_wraps_run() {
        let fixture = Fixture::new();
        let discovery = FakeDiscovery::new(dummy_tests(2));
        let mut env = RecordingEnvironment::default();

        run_with_env(&fixture, &discovery, &mut env).unwrap();
        assert_eq!(*env.events.borrow(), vec!["setup", "teardown"]);
        assert_eq!(discovery.ran().len(), 2);
    }

    #[test]
    fn environment_setup_failure() {
        let fixture = Fixture::new();
        let discovery = FakeDiscovery::new(dummy_tests(2));
        let mut env = RecordingEnvironment {
            fail_setup: true,
            ..Default::default()
        };

        let err = run_with_env(&fixture, &discovery, &mut env).expect_err("setup fails");
        assert!(matches!(err, RunError::EnvironmentSetup(_)), "{err:?}");
        assert_eq!(*env.events.borrow(), vec!["setup"], "no teardown after failed setup");
        assert!(discovery.ran().is_empty(), "no tests ran");
        assert!(!fixture.rerun_log.path().exists(), "rerun log wasn't touched");
    }

    #[test]
    fn environment_teardown_failure_keeps_report() {
        let fixture = Fixture::new();
        let discovery = FakeDiscovery::new([
            FakeTest::fail("app.tests.A.test_1", "x"),
            FakeTest::pass("app.tests.A.test_2"),
        ]);
        let mut env = RecordingEnvironment {
            fail_teardown: true,
            ..Default::default()
        };

        let err = run_with_env(&fixture, &discovery, &mut env).expect_err("teardown fails");
        match err {
            RunError::EnvironmentTeardown { report, error } => {
                assert_eq!(report.tests_run, 2);
                assert_eq!(report.failures, 1);
                assert_eq!(error.phase(), EnvironmentPhase::Teardown);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            fixture.rerun_log_contents(),
            "app.tests.A.test_1\n",
            "rerun log is written before teardown"
        );
    }

    #[test]
    fn panic_message_from_payload() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*payload), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*payload), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(&*payload), "(non-string panic payload)");
    }
}
