// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by juno.

use crate::reporter::RunReport;
use camino::Utf8PathBuf;
use config::ConfigError;
use std::{fmt, io, process::ExitStatus};
use thiserror::Error;

/// An error that occurred while parsing the juno config.
#[derive(Debug, Error)]
#[error("failed to parse juno config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: ConfigError) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }

    /// Returns the config file that failed to parse.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }
}

/// An error payload reached the renderer in a shape it cannot express.
///
/// This indicates a bug in whatever produced the outcome, not in the test that was run.
#[derive(Clone, Debug, Error)]
#[error("error payload for `{test}` has a malformed error kind {kind:?}")]
pub struct RenderError {
    test: String,
    kind: String,
}

impl RenderError {
    pub(crate) fn new(test: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            test: test.into(),
            kind: kind.into(),
        }
    }

    /// Returns the test whose payload could not be rendered.
    pub fn test(&self) -> &str {
        &self.test
    }
}

/// An error returned while parsing a [`MethodFilter`](crate::test_list::MethodFilter) from a
/// string.
#[derive(Clone, Debug, Error)]
#[error("no method names found in `{input}` (expected a comma or space-separated list)")]
pub struct MethodFilterParseError {
    input: String,
}

impl MethodFilterParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurred while writing reporter output.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteEventError {
    /// An error occurred while writing to the output.
    #[error("error writing to output")]
    Io(#[from] io::Error),

    /// An error payload could not be rendered.
    #[error("error rendering test output")]
    Render(#[from] RenderError),
}

/// A run was configured in a way that can't be satisfied.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// Only failed tests were requested, but there's no rerun log from a previous run.
    #[error(
        "--only-failed was passed in, but no rerun log exists at `{path}` \
         (run the tests once without --only-failed to create it)"
    )]
    RerunLogMissing {
        /// The path where the rerun log was expected.
        path: Utf8PathBuf,
    },

    /// The rerun log exists but could not be read.
    #[error("failed to read rerun log at `{path}`")]
    RerunLogRead {
        /// The path to the rerun log.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },
}

/// An error that occurred while writing the rerun log.
#[derive(Debug, Error)]
#[error("failed to write rerun log to `{path}`")]
pub struct RerunLogWriteError {
    path: Utf8PathBuf,
    #[source]
    error: atomicwrites::Error<io::Error>,
}

impl RerunLogWriteError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, error: atomicwrites::Error<io::Error>) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }
}

/// An error that occurred while reading a test manifest.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ManifestParseError {
    /// The manifest could not be read.
    #[error("failed to read test manifest at `{path}`")]
    Read {
        /// The manifest path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The manifest is not valid TOML, or doesn't match the expected schema.
    #[error("failed to parse test manifest at `{path}`")]
    Deserialize {
        /// The manifest path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: toml::de::Error,
    },

    /// A test in the manifest has an id that can't be used as a label.
    #[error(
        "in test manifest `{path}`, test #{index} has invalid id {id:?} \
         (ids must be non-empty and can't contain whitespace)"
    )]
    InvalidId {
        /// The manifest path.
        path: Utf8PathBuf,

        /// The position of the test in the manifest, starting from 1.
        index: usize,

        /// The invalid id.
        id: String,
    },
}

/// An error that occurred while resolving labels into tests.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// A label didn't match any known tests.
    #[error("label `{label}` did not match any tests")]
    UnknownLabel {
        /// The label that didn't match.
        label: String,
    },

    /// A discovery provider failed in some other way.
    #[error("test discovery failed")]
    Other {
        /// The underlying error.
        #[source]
        error: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// The phase of environment handling during which an error happened.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EnvironmentPhase {
    /// Setting up the environment before any tests run.
    Setup,

    /// Tearing down the environment after all tests ran.
    Teardown,
}

impl fmt::Display for EnvironmentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::Teardown => write!(f, "teardown"),
        }
    }
}

/// An error that occurred while setting up or tearing down the test environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnvironmentError {
    /// A script command could not be parsed.
    #[error("{phase} command for `{name}` could not be parsed: `{command}`")]
    CommandParse {
        /// The phase the command belongs to.
        phase: EnvironmentPhase,

        /// The name of the script.
        name: String,

        /// The command that failed to parse.
        command: String,

        /// The underlying error.
        #[source]
        error: shell_words::ParseError,
    },

    /// A script command could not be executed.
    #[error("failed to execute {phase} command for `{name}`: `{command}`")]
    Exec {
        /// The phase the command belongs to.
        phase: EnvironmentPhase,

        /// The name of the script.
        name: String,

        /// The command that failed to execute.
        command: String,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// A script command ran but didn't succeed.
    #[error("{phase} command for `{name}` failed with {status}: `{command}`")]
    Failed {
        /// The phase the command belongs to.
        phase: EnvironmentPhase,

        /// The name of the script.
        name: String,

        /// The command that failed.
        command: String,

        /// The exit status of the command.
        status: ExitStatus,
    },

    /// A custom environment failed.
    #[error("environment {phase} failed")]
    Other {
        /// The phase that failed.
        phase: EnvironmentPhase,

        /// The underlying error.
        #[source]
        error: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl EnvironmentError {
    /// Returns the phase during which this error occurred.
    pub fn phase(&self) -> EnvironmentPhase {
        match self {
            Self::CommandParse { phase, .. }
            | Self::Exec { phase, .. }
            | Self::Failed { phase, .. }
            | Self::Other { phase, .. } => *phase,
        }
    }
}

/// An error that aborted a test run.
///
/// Test failures are not errors: they're recorded as outcomes and reported. This type covers the
/// orchestration itself going wrong.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    /// The run was misconfigured.
    #[error("invalid run configuration")]
    Configuration(#[from] ConfigurationError),

    /// Resolving labels into tests failed.
    #[error("error resolving tests to run")]
    Discovery(#[from] DiscoveryError),

    /// Environment setup failed. No tests were run.
    #[error("error setting up the test environment")]
    EnvironmentSetup(#[source] EnvironmentError),

    /// Environment teardown failed after all tests ran.
    ///
    /// The summary has already been reported by this point, and is included here.
    #[error("error tearing down the test environment")]
    EnvironmentTeardown {
        /// The report for the tests that ran.
        report: RunReport,

        /// The underlying error.
        #[source]
        error: EnvironmentError,
    },

    /// Writing reporter output failed.
    #[error("error reporting test results")]
    WriteEvent(#[from] WriteEventError),

    /// The rerun log could not be written.
    #[error("error saving failed tests")]
    RerunLogWrite(#[from] RerunLogWriteError),
}
