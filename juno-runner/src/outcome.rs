// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test outcomes and the error payloads attached to them.
//!
//! Every test that runs ends in exactly one [`TestOutcome`]. Failures and errors carry an
//! [`ErrorPayload`] describing what went wrong. Payloads come in three shapes, and the shape is
//! fixed when the outcome is created: the reporter never has to guess.

use std::{borrow::Cow, fmt, sync::Arc};

/// A source of formatted traceback lines attached to a structured error.
///
/// Implementations produce lines lazily. Each line is expected to end with a newline, matching the
/// way tracebacks are usually rendered.
pub trait Traceback: fmt::Debug + Send + Sync {
    /// Returns the formatted lines for this traceback.
    fn format_lines(&self) -> Box<dyn Iterator<Item = Cow<'_, str>> + '_>;
}

/// Output captured from a test process, used as the traceback for failing commands.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CapturedOutput {
    lines: Vec<String>,
}

impl CapturedOutput {
    /// Builds captured output from a process's standard output and standard error, in that order.
    ///
    /// Returns `None` if nothing was written to either stream.
    pub fn new(stdout: &[u8], stderr: &[u8]) -> Option<Self> {
        let mut lines = Vec::new();
        for stream in [stdout, stderr] {
            let text = String::from_utf8_lossy(stream);
            lines.extend(text.split_inclusive('\n').map(|line| {
                if line.ends_with('\n') {
                    line.to_owned()
                } else {
                    format!("{line}\n")
                }
            }));
        }

        (!lines.is_empty()).then_some(Self { lines })
    }

    /// Builds captured output from already-formatted lines. The lines are used as-is.
    pub fn from_lines(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl Traceback for CapturedOutput {
    fn format_lines(&self) -> Box<dyn Iterator<Item = Cow<'_, str>> + '_> {
        Box::new(self.lines.iter().map(|line| Cow::Borrowed(line.as_str())))
    }
}

/// The error detail attached to a failing outcome.
#[derive(Clone, Debug)]
pub enum ErrorPayload {
    /// An error kind, a rendered error value, and an optional traceback.
    ///
    /// Rendered as the traceback lines (if any) followed by `<kind>: <value>`.
    Structured {
        /// The name of the kind of error, for example `TypeError` or `ExecError`.
        kind: String,

        /// The string form of the error value.
        value: String,

        /// The traceback, if one was captured.
        traceback: Option<Arc<dyn Traceback>>,
    },

    /// A message that is already human-readable and is rendered verbatim.
    Preformatted(String),

    /// No detail at all. Renders as an empty body.
    Empty,
}

impl ErrorPayload {
    /// Creates a structured payload without a traceback.
    pub fn structured(kind: impl Into<String>, value: impl fmt::Display) -> Self {
        Self::Structured {
            kind: kind.into(),
            value: value.to_string(),
            traceback: None,
        }
    }

    /// Creates a preformatted payload.
    pub fn preformatted(message: impl Into<String>) -> Self {
        Self::Preformatted(message.into())
    }

    /// Attaches a traceback to a structured payload.
    ///
    /// Other shapes have nowhere to put a traceback, and are returned unchanged.
    pub fn with_traceback(self, traceback: impl Traceback + 'static) -> Self {
        match self {
            Self::Structured { kind, value, .. } => Self::Structured {
                kind,
                value,
                traceback: Some(Arc::new(traceback)),
            },
            other => other,
        }
    }
}

/// The terminal status of a single executed test.
#[derive(Clone, Debug)]
pub enum TestOutcome {
    /// The test passed.
    Success,

    /// The test ran, and an assertion failed.
    Failure(ErrorPayload),

    /// The test could not complete because of an unexpected error.
    Error(ErrorPayload),

    /// The test was skipped.
    Skip {
        /// Why the test was skipped.
        reason: String,
    },

    /// The test was expected to fail, and did.
    ExpectedFailure(ErrorPayload),

    /// The test was expected to fail, but passed.
    UnexpectedSuccess,
}

impl TestOutcome {
    /// Returns the kind of this outcome.
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success => OutcomeKind::Success,
            Self::Failure(_) => OutcomeKind::Failure,
            Self::Error(_) => OutcomeKind::Error,
            Self::Skip { .. } => OutcomeKind::Skip,
            Self::ExpectedFailure(_) => OutcomeKind::ExpectedFailure,
            Self::UnexpectedSuccess => OutcomeKind::UnexpectedSuccess,
        }
    }

    /// Returns the payload to render as an error block, along with the block's status label.
    ///
    /// Only failures and errors produce error blocks.
    pub fn error_block(&self) -> Option<(&'static str, &ErrorPayload)> {
        match self {
            Self::Failure(payload) => Some(("FAIL", payload)),
            Self::Error(payload) => Some(("ERROR", payload)),
            Self::Success
            | Self::Skip { .. }
            | Self::ExpectedFailure(_)
            | Self::UnexpectedSuccess => None,
        }
    }
}

/// The kind of a [`TestOutcome`], without its payload.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub enum OutcomeKind {
    /// See [`TestOutcome::Success`].
    Success,
    /// See [`TestOutcome::Failure`].
    Failure,
    /// See [`TestOutcome::Error`].
    Error,
    /// See [`TestOutcome::Skip`].
    Skip,
    /// See [`TestOutcome::ExpectedFailure`].
    ExpectedFailure,
    /// See [`TestOutcome::UnexpectedSuccess`].
    UnexpectedSuccess,
}

impl OutcomeKind {
    /// Returns true if a test with this outcome belongs in the rerun log.
    pub fn is_failing(self) -> bool {
        matches!(self, Self::Failure | Self::Error)
    }

    /// Returns true if this outcome makes the run as a whole unsuccessful.
    pub fn fails_run(self) -> bool {
        matches!(self, Self::Failure | Self::Error | Self::UnexpectedSuccess)
    }

    /// The short status shown on progress lines.
    pub fn status_str(self) -> &'static str {
        match self {
            Self::Success => "ok",
            Self::Failure => "FAIL",
            Self::Error => "ERROR",
            Self::Skip => "skipped",
            Self::ExpectedFailure => "expected failure",
            Self::UnexpectedSuccess => "unexpected success",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.status_str())
    }
}
