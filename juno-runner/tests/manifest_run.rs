// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end runs over a real manifest, with real processes.

use camino_tempfile::Utf8TempDir;
use indoc::indoc;
use juno_runner::{
    errors::RunError,
    manifest::Manifest,
    reporter::{ReporterOutput, RunReport, SEPARATOR_WIDTH},
    rerun_log::RerunLog,
    runner::TestRunnerBuilder,
};
use pretty_assertions::assert_eq;

const MANIFEST: &str = indoc! {r#"
    [[setup]]
    name = "fixtures"
    setup = "sh -c 'echo ready > state'"
    teardown = "rm state"

    [[test]]
    id = "app.tests.MathTests.test_add"
    command = "sh -c 'test $((1 + 1)) -eq 2'"
    description = "Adds numbers"

    [[test]]
    id = "app.tests.MathTests.test_divide"
    command = "sh -c 'echo dividing by zero; exit 1'"

    [[test]]
    id = "app.tests.StateTests.test_state"
    command = "sh -c 'grep -q ready state'"

    [[test]]
    id = "app.tests.StateTests.test_crash"
    command = "sh -c 'exit 7'"

    [[test]]
    id = "app.tests.StateTests.test_skipped"
    command = "true"
    skip = "needs a network"
"#};

struct Workspace {
    dir: Utf8TempDir,
    manifest: Manifest,
}

impl Workspace {
    fn new() -> Self {
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        let manifest_path = dir.path().join("juno-tests.toml");
        std::fs::write(&manifest_path, MANIFEST).expect("wrote manifest");
        let manifest = Manifest::from_path(manifest_path).expect("manifest is valid");
        Self { dir, manifest }
    }

    fn rerun_log(&self) -> RerunLog {
        RerunLog::new(self.dir.path().join("test_rerun.txt"))
    }

    fn run(&self, builder: &TestRunnerBuilder, labels: &[&str]) -> (RunReport, String, String) {
        let labels: Vec<_> = labels.iter().map(|label| (*label).to_owned()).collect();
        let mut progress = Vec::new();
        let mut errors = Vec::new();
        let report = builder
            .build(self.rerun_log())
            .run(
                &labels,
                &self.manifest.discovery(),
                &mut self.manifest.environment(),
                ReporterOutput::Buffer(&mut progress),
                Some(ReporterOutput::Buffer(&mut errors)),
            )
            .expect("run completed");
        (
            report,
            String::from_utf8(progress).expect("valid UTF-8"),
            String::from_utf8(errors).expect("valid UTF-8"),
        )
    }
}

#[test]
fn full_run_then_only_failed() {
    let workspace = Workspace::new();

    let (report, progress, errors) = workspace.run(TestRunnerBuilder::default().set_verbosity(2), &[]);

    assert_eq!(report.tests_run, 5);
    assert_eq!(report.passed, 2);
    assert_eq!(report.failures, 1);
    assert_eq!(report.errors, 1);
    assert_eq!(report.skipped, 1);
    assert!(!report.is_success());

    assert!(
        progress.contains("[1/5  20%] app.tests.MathTests.test_add (Adds numbers) ... ok\n"),
        "{progress}"
    );
    assert!(
        progress.contains("app.tests.StateTests.test_state ... ok\n"),
        "setup ran before tests:\n{progress}"
    );
    assert!(
        progress.contains("app.tests.StateTests.test_skipped ... skipped 'needs a network'\n"),
        "{progress}"
    );
    assert!(
        progress.contains("FAILED (failures=1, errors=1, skipped=1)\n"),
        "{progress}"
    );
    assert!(!workspace.dir.path().join("state").exists(), "teardown ran");

    let divide_block = format!(
        "{}\nFAIL: app.tests.MathTests.test_divide\n{}\ndividing by zero\nTestFailure: ",
        "=".repeat(SEPARATOR_WIDTH),
        "-".repeat(SEPARATOR_WIDTH),
    );
    assert_eq!(
        errors.matches(&divide_block).count(),
        2,
        "failure is shown live and in the summary:\n{errors}"
    );
    assert_eq!(
        errors
            .matches("ERROR: app.tests.StateTests.test_crash\n")
            .count(),
        2
    );

    assert_eq!(
        workspace.rerun_log().load().unwrap(),
        vec![
            "app.tests.MathTests.test_divide",
            "app.tests.StateTests.test_crash"
        ],
    );

    // Rerun only the failed tests.
    let (report, progress, _) = workspace.run(TestRunnerBuilder::default().set_only_failed(true), &[]);
    assert_eq!(report.tests_run, 2);
    assert_eq!(report.original_total, 2);
    assert!(progress.contains("[1/2  50%] app.tests.MathTests.test_divide ... FAIL\n"), "{progress}");
    assert!(progress.contains("[2/2 100%] app.tests.StateTests.test_crash ... ERROR\n"), "{progress}");
}

#[test]
fn first_n_with_labels() {
    let workspace = Workspace::new();

    let (report, progress, errors) = workspace.run(
        TestRunnerBuilder::default().set_first_n(Some(2)),
        &["app.tests.MathTests.test_add", "app.tests.StateTests"],
    );

    assert_eq!(report.tests_run, 2);
    assert_eq!(report.original_total, 4);
    assert!(report.is_success(), "{progress}{errors}");
    assert!(progress.contains("[1/4  25%] app.tests.MathTests.test_add ... ok\n"), "{progress}");
    assert!(progress.contains("[2/4  50%] app.tests.StateTests.test_state ... ok\n"), "{progress}");
    assert!(!progress.contains("test_crash"), "tests past the cut don't run");
    assert!(progress.contains("Ran 2/4 tests"), "{progress}");
    assert_eq!(errors, "", "nothing failed");
}

#[test]
fn unknown_label() {
    let workspace = Workspace::new();
    let result = TestRunnerBuilder::default().build(workspace.rerun_log()).run(
        &["app.tests.Missing".to_owned()],
        &workspace.manifest.discovery(),
        &mut workspace.manifest.environment(),
        ReporterOutput::Buffer(&mut Vec::new()),
        None,
    );

    let err = result.expect_err("label doesn't match");
    assert!(matches!(err, RunError::Discovery(_)), "{err:?}");
    assert!(!workspace.rerun_log().path().exists());
}
