// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for juno.

use crate::errors::ConfigParseError;
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;

/// Overall configuration for juno.
///
/// Configuration is layered, lowest priority first:
///
/// 1. the default config, [`Self::DEFAULT_CONFIG`]
/// 2. the repository config, `.config/juno.toml` (or a file passed in explicitly)
/// 3. `JUNO_` environment variables, see [`Self::ENVIRONMENT_KEYS`]
///
/// Command-line arguments are applied on top of this by the caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JunoConfig {
    rerun_log_file: Utf8PathBuf,
    manifest_file: Utf8PathBuf,
    verbosity: u8,
    slow_tests: usize,
}

impl JunoConfig {
    /// The default location of the config within the root: `.config/juno.toml`.
    pub const CONFIG_PATH: &'static str = ".config/juno.toml";

    /// Contains the default config as a TOML file.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Environment variables that override config keys, and the keys they override.
    pub const ENVIRONMENT_KEYS: &'static [(&'static str, &'static str)] = &[
        ("JUNO_RERUN_LOG_FILE", "rerun-log-file"),
        ("JUNO_MANIFEST_FILE", "manifest-file"),
        ("JUNO_VERBOSITY", "verbosity"),
        ("JUNO_SLOW_TESTS", "slow-tests"),
    ];

    /// Reads the config from the given file, or if not specified from `.config/juno.toml` in
    /// `root`, then applies environment overrides.
    ///
    /// Relative paths in the config are resolved against `root`.
    pub fn from_sources(
        root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_with_env(root, config_file, |var| std::env::var(var).ok())
    }

    /// Returns the default config, without reading any files or environment variables.
    pub fn default_config(root: impl Into<Utf8PathBuf>) -> Self {
        let deserialized = Self::make_default_config()
            .build()
            .and_then(|config| config.try_deserialize())
            .expect("default config is always valid");
        Self::from_deserialized(&root.into(), deserialized)
    }

    /// Returns the path to the rerun log.
    pub fn rerun_log_file(&self) -> &Utf8Path {
        &self.rerun_log_file
    }

    /// Returns the path to the test manifest.
    pub fn manifest_file(&self) -> &Utf8Path {
        &self.manifest_file
    }

    /// Returns the default verbosity.
    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    /// Returns the default number of slow tests to list.
    pub fn slow_tests(&self) -> usize {
        self.slow_tests
    }

    // ---
    // Helper methods
    // ---

    fn from_sources_with_env(
        root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigParseError> {
        let root = root.into();

        let (config_file, builder) = match config_file {
            Some(file) => (
                file.to_owned(),
                Self::make_default_config().add_source(File::new(file.as_str(), FileFormat::Toml)),
            ),
            None => {
                let config_file = root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, Self::make_default_config().add_source(source))
            }
        };

        let deserialized = Self::apply_env(builder, env)
            .and_then(|builder| builder.build())
            .and_then(|config| config.try_deserialize::<JunoConfigDeserialize>())
            .map_err(|err| ConfigParseError::new(config_file, err))?;

        Ok(Self::from_deserialized(&root, deserialized))
    }

    fn from_deserialized(root: &Utf8Path, deserialized: JunoConfigDeserialize) -> Self {
        Self {
            rerun_log_file: root.join(deserialized.rerun_log_file),
            manifest_file: root.join(deserialized.manifest_file),
            verbosity: deserialized.verbosity,
            slow_tests: deserialized.slow_tests,
        }
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn apply_env(
        mut builder: ConfigBuilder<DefaultState>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        for &(var, key) in Self::ENVIRONMENT_KEYS {
            builder = builder.set_override_option(key, env(var))?;
        }
        Ok(builder)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct JunoConfigDeserialize {
    rerun_log_file: Utf8PathBuf,
    manifest_file: Utf8PathBuf,
    verbosity: u8,
    slow_tests: usize,
}
