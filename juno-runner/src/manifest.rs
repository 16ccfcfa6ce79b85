// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tests and setup scripts defined in a TOML manifest.
//!
//! A manifest looks like:
//!
//! ```toml
//! [[setup]]
//! name = "database"
//! setup = "./scripts/create-db.sh"
//! teardown = "./scripts/drop-db.sh"
//!
//! [[test]]
//! id = "app.tests.MathTests.test_add"
//! command = "sh -c 'test $((1 + 1)) -eq 2'"
//! description = "Adds numbers"
//! ```
//!
//! Each test is a command. Exit code 0 means the test passed, and exit code 1 means it failed.
//! Anything else (another exit code, a signal, or a command that can't be started) is an error.
//! Commands and working directories are relative to the directory containing the manifest.

use crate::{
    environment::TestEnvironment,
    errors::{DiscoveryError, EnvironmentError, EnvironmentPhase, ManifestParseError},
    helpers::{label_matches, plural},
    outcome::{CapturedOutput, ErrorPayload, TestOutcome},
    test_list::{MethodFilter, TestCase, TestDiscovery, TestSuite},
};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::{io, process::Output};
use tracing::{debug, warn};

/// The default file name for the test manifest.
pub const DEFAULT_MANIFEST_FILE: &str = "juno-tests.toml";

/// A parsed test manifest.
#[derive(Clone, Debug)]
pub struct Manifest {
    base_dir: Utf8PathBuf,
    tests: Vec<ManifestTest>,
    setup_scripts: Vec<SetupScript>,
}

impl Manifest {
    /// Reads and parses the manifest at `path`.
    pub fn from_path(path: impl Into<Utf8PathBuf>) -> Result<Self, ManifestParseError> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path).map_err(|error| ManifestParseError::Read {
            path: path.clone(),
            error,
        })?;
        Self::parse(path, &contents)
    }

    /// Parses a manifest from a string. `path` is used for error messages and to resolve relative
    /// paths.
    pub fn parse(
        path: impl Into<Utf8PathBuf>,
        contents: &str,
    ) -> Result<Self, ManifestParseError> {
        let path = path.into();
        let deserialized: ManifestDeserialize =
            toml::from_str(contents).map_err(|error| ManifestParseError::Deserialize {
                path: path.clone(),
                error,
            })?;

        for (index, test) in deserialized.tests.iter().enumerate() {
            if test.id.is_empty() || test.id.contains(char::is_whitespace) {
                return Err(ManifestParseError::InvalidId {
                    path,
                    index: index + 1,
                    id: test.id.clone(),
                });
            }
        }

        let base_dir = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_owned(),
            _ => Utf8PathBuf::from("."),
        };
        debug!(
            %path,
            tests = deserialized.tests.len(),
            setup_scripts = deserialized.setup_scripts.len(),
            "parsed test manifest",
        );

        Ok(Self {
            base_dir,
            tests: deserialized.tests,
            setup_scripts: deserialized.setup_scripts,
        })
    }

    /// Returns the directory that commands in this manifest run in by default.
    pub fn base_dir(&self) -> &Utf8Path {
        &self.base_dir
    }

    /// Returns the tests defined in this manifest, in manifest order.
    pub fn tests(&self) -> &[ManifestTest] {
        &self.tests
    }

    /// Returns the setup scripts defined in this manifest, in manifest order.
    pub fn setup_scripts(&self) -> &[SetupScript] {
        &self.setup_scripts
    }

    /// Returns a discovery provider over the tests in this manifest.
    pub fn discovery(&self) -> ManifestDiscovery<'_> {
        ManifestDiscovery { manifest: self }
    }

    /// Returns an environment that runs the setup scripts in this manifest.
    pub fn environment(&self) -> ScriptEnvironment<'_> {
        ScriptEnvironment { manifest: self }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestDeserialize {
    #[serde(default, rename = "test")]
    tests: Vec<ManifestTest>,
    #[serde(default, rename = "setup")]
    setup_scripts: Vec<SetupScript>,
}

/// A test defined in a manifest.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ManifestTest {
    /// The dotted id of the test.
    pub id: String,

    /// The command to run, split into arguments the way a POSIX shell would.
    pub command: String,

    /// A short description of the test.
    #[serde(default)]
    pub description: Option<String>,

    /// The directory to run the command in, relative to the manifest's directory.
    #[serde(default)]
    pub cwd: Option<Utf8PathBuf>,

    /// If set, the test is skipped with this reason and the command isn't run.
    #[serde(default)]
    pub skip: Option<String>,

    /// If true, the command is expected to fail.
    #[serde(default)]
    pub expected_failure: bool,
}

/// A setup script defined in a manifest.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SetupScript {
    /// The name of the script, used in messages.
    pub name: String,

    /// The command to run before any tests run.
    #[serde(default)]
    pub setup: Option<String>,

    /// The command to run after all tests have run.
    #[serde(default)]
    pub teardown: Option<String>,
}

/// Resolves labels into the tests of a [`Manifest`].
///
/// A label selects every test whose id is equal to it, or starts with the label followed by a
/// `.`. Tests are returned in label order, and in manifest order within a label. A test selected
/// by more than one label appears once per label.
#[derive(Clone, Copy, Debug)]
pub struct ManifestDiscovery<'m> {
    manifest: &'m Manifest,
}

impl ManifestDiscovery<'_> {
    fn command_test(&self, test: &ManifestTest) -> CommandTest {
        let cwd = match &test.cwd {
            Some(cwd) => self.manifest.base_dir.join(cwd),
            None => self.manifest.base_dir.clone(),
        };
        CommandTest {
            test: test.clone(),
            cwd,
        }
    }

    fn is_selected(test: &ManifestTest, methods: Option<&MethodFilter>) -> bool {
        methods.is_none_or(|methods| methods.is_match(&test.id))
    }
}

impl TestDiscovery for ManifestDiscovery<'_> {
    fn discover(
        &self,
        labels: &[String],
        methods: Option<&MethodFilter>,
    ) -> Result<TestSuite, DiscoveryError> {
        let mut tests: Vec<Box<dyn TestCase>> = Vec::new();

        if labels.is_empty() {
            tests.extend(
                self.manifest
                    .tests
                    .iter()
                    .filter(|test| Self::is_selected(test, methods))
                    .map(|test| Box::new(self.command_test(test)) as Box<dyn TestCase>),
            );
        }

        for label in labels {
            let mut matched = false;
            for test in &self.manifest.tests {
                if !label_matches(label, &test.id) {
                    continue;
                }
                matched = true;
                if Self::is_selected(test, methods) {
                    tests.push(Box::new(self.command_test(test)));
                }
            }
            if !matched {
                return Err(DiscoveryError::UnknownLabel {
                    label: label.clone(),
                });
            }
        }

        debug!(
            labels = labels.len(),
            tests = tests.len(),
            "discovered {} from {} {}",
            plural::tests_str(tests.len()),
            labels.len(),
            plural::labels_str(labels.len()),
        );
        Ok(TestSuite::new(tests))
    }
}

/// A test that runs a command.
#[derive(Clone, Debug)]
pub struct CommandTest {
    test: ManifestTest,
    cwd: Utf8PathBuf,
}

impl CommandTest {
    fn exec_error(&self, error: io::Error) -> TestOutcome {
        TestOutcome::Error(ErrorPayload::structured(
            "ExecError",
            format_args!("failed to execute `{}`: {error}", self.test.command),
        ))
    }

    fn status_payload(&self, kind: &str, output: &Output) -> ErrorPayload {
        let payload = ErrorPayload::structured(
            kind,
            format_args!("`{}` failed with {}", self.test.command, output.status),
        );
        match CapturedOutput::new(&output.stdout, &output.stderr) {
            Some(captured) => payload.with_traceback(captured),
            None => payload,
        }
    }
}

impl TestCase for CommandTest {
    fn id(&self) -> &str {
        &self.test.id
    }

    fn description(&self) -> Option<&str> {
        self.test.description.as_deref()
    }

    fn run(&self) -> TestOutcome {
        if let Some(reason) = &self.test.skip {
            return TestOutcome::Skip {
                reason: reason.clone(),
            };
        }

        let argv = match shell_words::split(&self.test.command) {
            Ok(argv) => argv,
            Err(error) => {
                return TestOutcome::Error(ErrorPayload::preformatted(format!(
                    "failed to parse command `{}`: {error}",
                    self.test.command
                )));
            }
        };
        let Some((program, args)) = argv.split_first() else {
            return TestOutcome::Error(ErrorPayload::preformatted(format!(
                "command for `{}` is empty",
                self.test.id
            )));
        };

        let output = match duct::cmd(program.as_str(), args)
            .dir(&self.cwd)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
        {
            Ok(output) => output,
            Err(error) => return self.exec_error(error),
        };

        match (output.status.code(), self.test.expected_failure) {
            (Some(0), false) => TestOutcome::Success,
            (Some(0), true) => TestOutcome::UnexpectedSuccess,
            (Some(1), false) => {
                TestOutcome::Failure(self.status_payload("TestFailure", &output))
            }
            (Some(1), true) => {
                TestOutcome::ExpectedFailure(self.status_payload("TestFailure", &output))
            }
            _ => TestOutcome::Error(self.status_payload("ExecError", &output)),
        }
    }
}

/// Runs the setup scripts of a [`Manifest`] around a test run.
///
/// Setup commands run in manifest order. Teardown commands run in reverse order, and only for
/// scripts whose setup succeeded. If a setup command fails, the scripts set up before it are
/// torn down before the error is returned.
#[derive(Clone, Copy, Debug)]
pub struct ScriptEnvironment<'m> {
    manifest: &'m Manifest,
}

/// The scripts that were set up by a [`ScriptEnvironment`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ScriptContext {
    set_up: Vec<usize>,
}

impl ScriptEnvironment<'_> {
    fn run_script(
        &self,
        phase: EnvironmentPhase,
        script: &SetupScript,
    ) -> Result<(), EnvironmentError> {
        let command = match phase {
            EnvironmentPhase::Setup => script.setup.as_deref(),
            EnvironmentPhase::Teardown => script.teardown.as_deref(),
        };
        let Some(command) = command else {
            return Ok(());
        };

        let argv =
            shell_words::split(command).map_err(|error| EnvironmentError::CommandParse {
                phase,
                name: script.name.clone(),
                command: command.to_owned(),
                error,
            })?;
        let Some((program, args)) = argv.split_first() else {
            return Ok(());
        };

        debug!(name = %script.name, %phase, command, "running script");
        // Script output goes to stderr so it doesn't mix with error blocks.
        let output = duct::cmd(program.as_str(), args)
            .dir(&self.manifest.base_dir)
            .stdout_to_stderr()
            .unchecked()
            .run()
            .map_err(|error| EnvironmentError::Exec {
                phase,
                name: script.name.clone(),
                command: command.to_owned(),
                error,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(EnvironmentError::Failed {
                phase,
                name: script.name.clone(),
                command: command.to_owned(),
                status: output.status,
            })
        }
    }

    /// Tears down the given scripts in reverse order. Every script is torn down even if an earlier
    /// teardown fails; the first error is returned.
    fn teardown_scripts(&self, set_up: &[usize]) -> Result<(), EnvironmentError> {
        let mut first_error = None;
        for &index in set_up.iter().rev() {
            let script = &self.manifest.setup_scripts[index];
            if let Err(error) = self.run_script(EnvironmentPhase::Teardown, script) {
                if first_error.is_none() {
                    first_error = Some(error);
                } else {
                    warn!("{error}");
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl TestEnvironment for ScriptEnvironment<'_> {
    type Context = ScriptContext;

    fn setup(&mut self) -> Result<ScriptContext, EnvironmentError> {
        let mut set_up = Vec::with_capacity(self.manifest.setup_scripts.len());
        for (index, script) in self.manifest.setup_scripts.iter().enumerate() {
            if let Err(error) = self.run_script(EnvironmentPhase::Setup, script) {
                if let Err(teardown_error) = self.teardown_scripts(&set_up) {
                    warn!("after setup failure, {teardown_error}");
                }
                return Err(error);
            }
            set_up.push(index);
        }

        if !set_up.is_empty() {
            debug!(
                "set up {} {}",
                set_up.len(),
                plural::setup_scripts_str(set_up.len())
            );
        }
        Ok(ScriptContext { set_up })
    }

    fn teardown(&mut self, context: ScriptContext) -> Result<(), EnvironmentError> {
        self.teardown_scripts(&context.set_up)
    }
}
