// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::ExpectedError,
    output::{OutputContext, OutputOpts, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use itertools::Itertools;
use juno_runner::{
    config::JunoConfig,
    exit_codes::JunoExitCode,
    helpers::plural,
    manifest::Manifest,
    reporter::ReporterOutput,
    rerun_log::RerunLog,
    runner::{FIRST_TEN, TestRunnerBuilder},
    test_list::MethodFilter,
};
use owo_colors::{OwoColorize, Style, style};
use std::io::Write;
use swrite::{SWrite, swrite};
use tracing::{debug, info};

/// A test runner with live progress, rerun logs and suite selection.
///
/// Tests are read from a TOML manifest (by default `juno-tests.toml`), and
/// selected with dotted labels such as `app.tests.MathTests`.
#[derive(Debug, Parser)]
#[command(version, name = "juno", styles = clap_styles::style())]
pub struct JunoApp {
    #[command(flatten)]
    output: OutputOpts,

    /// Config file [default: .config/juno.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Test manifest [default: juno-tests.toml, or manifest-file from the config]
    #[arg(long, global = true, value_name = "PATH")]
    manifest: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl JunoApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, output: OutputContext) -> Result<i32, ExpectedError> {
        let dir = std::env::current_dir()
            .map_err(|error| ExpectedError::CurrentDirFailed { error })?;
        let root = Utf8PathBuf::try_from(dir)?;
        self.exec_in(&root, output)
    }

    fn exec_in(self, root: &Utf8Path, output: OutputContext) -> Result<i32, ExpectedError> {
        let config_file = self.config_file.as_ref().map(|path| root.join(path));
        let config = JunoConfig::from_sources(root, config_file.as_deref())?;
        let manifest_path = match &self.manifest {
            Some(path) => root.join(path),
            None => config.manifest_file().to_owned(),
        };
        let manifest = Manifest::from_path(manifest_path)?;
        debug!(
            tests = manifest.tests().len(),
            setup_scripts = manifest.setup_scripts().len(),
            "loaded test manifest from {}",
            manifest.base_dir(),
        );

        match self.command {
            Command::Run(opts) => opts.exec(root, &config, &manifest, output),
            Command::List(opts) => opts.exec(root, &config, &manifest, output),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run tests, showing progress on stderr and failures on stdout
    ///
    /// After the run, the ids of the tests that failed or errored are written to the
    /// rerun log, so they can be run again with --only-failed.
    Run(RunOpts),

    /// List the tests a run would select
    ///
    /// Tests past --first-ten or --first-n are marked "(not run)".
    List(SelectionOpts),
}

#[derive(Debug, Args)]
struct SelectionOpts {
    /// Dotted test labels to select [default: all tests]
    #[arg(value_name = "LABELS")]
    labels: Vec<String>,

    /// Only select test methods with these names (comma or space-separated)
    #[arg(long, value_name = "NAMES")]
    methods: Option<MethodFilter>,

    /// Only select the tests that failed in the previous run
    #[arg(long, conflicts_with = "labels")]
    only_failed: bool,

    /// Only run the first 10 tests
    #[arg(long, conflicts_with = "first_n")]
    first_ten: bool,

    /// Only run the first N tests
    #[arg(long, value_name = "N")]
    first_n: Option<usize>,

    /// Rerun log to read and write [default: test_rerun.txt, or rerun-log-file from the config]
    #[arg(long, value_name = "PATH")]
    rerun_log: Option<Utf8PathBuf>,
}

impl SelectionOpts {
    fn first_n(&self) -> Option<usize> {
        if self.first_ten {
            Some(FIRST_TEN)
        } else {
            self.first_n
        }
    }

    fn rerun_log(&self, root: &Utf8Path, config: &JunoConfig) -> RerunLog {
        match &self.rerun_log {
            Some(path) => RerunLog::new(root.join(path)),
            None => RerunLog::new(config.rerun_log_file()),
        }
    }

    fn make_builder(&self) -> TestRunnerBuilder {
        if let Some(methods) = &self.methods {
            info!("selecting methods: {}", methods.iter().join(", "));
        }

        let mut builder = TestRunnerBuilder::default();
        builder
            .set_only_failed(self.only_failed)
            .set_first_n(self.first_n())
            .set_method_filter(self.methods.clone());
        builder
    }

    fn exec(
        self,
        root: &Utf8Path,
        config: &JunoConfig,
        manifest: &Manifest,
        output: OutputContext,
    ) -> Result<i32, ExpectedError> {
        let runner = self.make_builder().build(self.rerun_log(root, config));
        let suite = runner.resolve_suite(&self.labels, &manifest.discovery())?;
        let executed = suite.to_execute(self.first_n());

        let not_run_style = if output.color.should_colorize(supports_color::Stream::Stdout) {
            style().dimmed()
        } else {
            Style::new()
        };

        let mut out = String::new();
        for (index, test) in suite.iter().enumerate() {
            swrite!(out, "{}", test.id());
            if index >= executed.run_count() {
                swrite!(out, " {}", "(not run)".style(not_run_style));
            }
            out.push('\n');
        }
        std::io::stdout()
            .lock()
            .write_all(out.as_bytes())
            .map_err(ExpectedError::write_error)?;

        if suite.is_empty() {
            info!("no tests selected");
        } else {
            info!(
                "{} of {} {} selected",
                executed.run_count(),
                executed.original_total(),
                plural::tests_str(executed.original_total()),
            );
        }
        Ok(JunoExitCode::OK)
    }
}

#[derive(Debug, Args)]
struct RunOpts {
    #[command(flatten)]
    selection: SelectionOpts,

    /// List the N slowest tests after the summary [default: slow-tests from the config]
    #[arg(short, long, value_name = "N")]
    slow_tests: Option<usize>,

    /// Output verbosity: 0 (summary only), 1 (progress), 2 (progress with descriptions)
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        value_parser = clap::value_parser!(u8).range(0..=2),
    )]
    verbosity: Option<u8>,
}

impl RunOpts {
    fn exec(
        self,
        root: &Utf8Path,
        config: &JunoConfig,
        manifest: &Manifest,
        output: OutputContext,
    ) -> Result<i32, ExpectedError> {
        let mut builder = self.selection.make_builder();
        builder
            .set_slow_test_count(self.slow_tests.unwrap_or(config.slow_tests()))
            .set_verbosity(self.verbosity.unwrap_or(config.verbosity()))
            .set_colorize(output.color.should_colorize(supports_color::Stream::Stderr))
            .set_colorize_errors(output.color.should_colorize(supports_color::Stream::Stdout));
        let runner = builder.build(self.selection.rerun_log(root, config));

        let report = runner.run(
            &self.selection.labels,
            &manifest.discovery(),
            &mut manifest.environment(),
            ReporterOutput::Stderr,
            Some(ReporterOutput::Stdout),
        )?;

        if report.is_success() {
            Ok(JunoExitCode::OK)
        } else {
            Ok(JunoExitCode::TEST_RUN_FAILED)
        }
    }
}
