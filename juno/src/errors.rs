// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::FromPathBufError;
use juno_runner::{
    errors::{ConfigParseError, ManifestParseError, RunError, WriteEventError},
    exit_codes::JunoExitCode,
};
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;

/// An error that juno reports to the user and maps to an exit code.
///
/// Failing tests are not errors. They're reported through the summary, with
/// [`JunoExitCode::TEST_RUN_FAILED`].
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDirFailed { error: std::io::Error },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 { error: FromPathBufError },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("test manifest parse error")]
    ManifestParseError {
        #[from]
        err: ManifestParseError,
    },
    #[error("test run failed")]
    RunError {
        #[from]
        err: RunError,
    },
    #[error("error writing to output")]
    WriteError {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn write_error(err: std::io::Error) -> Self {
        Self::WriteError { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigParseError { .. } => JunoExitCode::SETUP_ERROR,
            Self::ManifestParseError { .. } => JunoExitCode::TEST_LIST_CREATION_FAILED,
            Self::RunError { err } => run_error_exit_code(err),
            Self::WriteError { .. } => JunoExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr, along with the chain of errors that caused it.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::CurrentDirFailed { error } => {
                error!("could not determine the current directory");
                Some(error as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { error } => {
                error!(
                    "current directory `{}` is not valid UTF-8",
                    error.as_path().display().style(styles.bold)
                );
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse juno config at `{}`",
                    err.config_file().style(styles.bold)
                );
                err.source()
            }
            Self::ManifestParseError { err } => {
                error!("{err}");
                err.source()
            }
            Self::RunError { err } => {
                if let RunError::EnvironmentTeardown { report, .. } = err {
                    // The summary was already printed, so point back at it.
                    let status = if report.is_success() { "OK" } else { "FAILED" };
                    error!(
                        "tests finished ({}), but the environment could not be torn down",
                        status.style(styles.bold)
                    );
                } else {
                    error!("{err}");
                }
                err.source()
            }
            Self::WriteError { err } => {
                error!("error writing to output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

/// Returns the exit code for a failed run.
fn run_error_exit_code(err: &RunError) -> i32 {
    match err {
        RunError::Configuration(_) => JunoExitCode::SETUP_ERROR,
        RunError::Discovery(_) => JunoExitCode::TEST_LIST_CREATION_FAILED,
        RunError::EnvironmentSetup(_) | RunError::EnvironmentTeardown { .. } => {
            JunoExitCode::ENVIRONMENT_FAILED
        }
        RunError::WriteEvent(WriteEventError::Render(_)) => JunoExitCode::RENDER_ERROR,
        RunError::WriteEvent(_) | RunError::RerunLogWrite(_) => JunoExitCode::WRITE_OUTPUT_ERROR,
        _ => JunoExitCode::SETUP_ERROR,
    }
}

impl From<FromPathBufError> for ExpectedError {
    fn from(error: FromPathBufError) -> Self {
        Self::CurrentDirInvalidUtf8 { error }
    }
}
