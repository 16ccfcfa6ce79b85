// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The rerun log: the ids of the tests that failed or errored in the last run.
//!
//! The log is a plain text file with one test id per line and nothing else. An empty file means
//! that nothing failed. The log is replaced in full at the end of every run, so it never contains
//! failures from an earlier run.

use crate::errors::{ConfigurationError, RerunLogWriteError};
use camino::{Utf8Path, Utf8PathBuf};
use std::io::{self, Write};
use tracing::debug;

/// The default file name for the rerun log.
pub const DEFAULT_RERUN_LOG_FILE: &str = "test_rerun.txt";

/// A rerun log at a particular path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RerunLog {
    path: Utf8PathBuf,
}

impl RerunLog {
    /// Creates a new `RerunLog` at the given path. The file isn't accessed until it's loaded or
    /// saved.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path to the log.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Reads the test ids in the log, in file order. Blank lines are ignored.
    ///
    /// A missing log is an error: there is no previous run to take failures from.
    pub fn load(&self) -> Result<Vec<String>, ConfigurationError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigurationError::RerunLogMissing {
                    path: self.path.clone(),
                });
            }
            Err(error) => {
                return Err(ConfigurationError::RerunLogRead {
                    path: self.path.clone(),
                    error,
                });
            }
        };

        let ids: Vec<_> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();
        debug!(path = %self.path, count = ids.len(), "loaded rerun log");
        Ok(ids)
    }

    /// Replaces the log with the given ids, one per line.
    ///
    /// The file is written atomically: readers see either the old log or the new one.
    pub fn save<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> Result<usize, RerunLogWriteError> {
        let mut contents = String::new();
        let mut count = 0;
        for id in ids {
            contents.push_str(id);
            contents.push('\n');
            count += 1;
        }

        atomicwrites::AtomicFile::new(&self.path, atomicwrites::AllowOverwrite)
            .write(|file| file.write_all(contents.as_bytes()))
            .map_err(|error| RerunLogWriteError::new(&self.path, error))?;
        debug!(path = %self.path, count, "wrote rerun log");
        Ok(count)
    }
}
