//! Configuration resolution for bitext-align
//!
//! **Priority:** CLI flag (or its `BITEXT_*` environment variable, via clap)
//! → TOML file → compiled default.

use bitext_common::config::{MergeStrategy, OutputFormat, TomlConfig};
use bitext_common::Result;
use chrono::{DateTime, Local};
use std::path::PathBuf;
use tracing::info;

use crate::workflow::default_output_path;

/// Values given on the command line, each overriding its TOML counterpart
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub log_level: Option<String>,
    pub tolerance: Option<f32>,
    pub strategy: Option<MergeStrategy>,
    pub concurrency: Option<usize>,
    pub format: Option<OutputFormat>,
    pub output: Option<PathBuf>,
    /// Force `batch.accept_degraded = false`
    pub reject_degraded: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Apply CLI overrides on top of the loaded TOML config, then re-validate
pub fn apply_overrides(config: &mut TomlConfig, overrides: &CliOverrides) -> Result<()> {
    if let Some(level) = &overrides.log_level {
        config.logging.level = level.clone();
    }
    if let Some(tolerance) = overrides.tolerance {
        info!(tolerance, "Tolerance overridden from command line");
        config.alignment.tolerance = tolerance;
    }
    if let Some(strategy) = overrides.strategy {
        config.alignment.strategy = strategy;
    }
    if let Some(concurrency) = overrides.concurrency {
        config.batch.concurrency = concurrency;
    }
    if let Some(format) = overrides.format {
        config.output.format = format;
    }
    if let Some(output) = &overrides.output {
        config.output.path = Some(output.clone());
    }
    if overrides.reject_degraded {
        config.batch.accept_degraded = false;
    }
    if let Some(host) = &overrides.host {
        config.server.host = host.clone();
    }
    if let Some(port) = overrides.port {
        config.server.port = port;
    }

    config.validate()
}

/// Configured output path, or the default for the configured format
pub fn resolve_output_path(config: &TomlConfig, now: DateTime<Local>) -> PathBuf {
    config
        .output
        .path
        .clone()
        .unwrap_or_else(|| default_output_path(config.output.format, now))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_values_win_over_toml() {
        let mut config = TomlConfig::default();
        config.alignment.tolerance = -0.2;
        config.batch.accept_degraded = true;

        let overrides = CliOverrides {
            tolerance: Some(-0.05),
            strategy: Some(MergeStrategy::Global),
            format: Some(OutputFormat::Sqlite),
            reject_degraded: true,
            port: Some(6000),
            ..CliOverrides::default()
        };
        apply_overrides(&mut config, &overrides).unwrap();

        assert_eq!(config.alignment.tolerance, -0.05);
        assert_eq!(config.alignment.strategy, MergeStrategy::Global);
        assert_eq!(config.output.format, OutputFormat::Sqlite);
        assert!(!config.batch.accept_degraded);
        assert_eq!(config.server.port, 6000);
    }

    #[test]
    fn test_absent_overrides_keep_toml_values() {
        let mut config = TomlConfig::default();
        config.batch.concurrency = 9;
        apply_overrides(&mut config, &CliOverrides::default()).unwrap();
        assert_eq!(config.batch.concurrency, 9);
        assert!(config.batch.accept_degraded);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = TomlConfig::default();
        let overrides = CliOverrides {
            concurrency: Some(0),
            ..CliOverrides::default()
        };
        assert!(apply_overrides(&mut config, &overrides).is_err());
    }

    #[test]
    fn test_output_path_resolution() {
        let now = Local::now();
        let mut config = TomlConfig::default();
        config.output.format = OutputFormat::Sqlite;
        assert_eq!(resolve_output_path(&config, now), PathBuf::from("databases/aligned.db"));

        config.output.path = Some(PathBuf::from("custom.db"));
        assert_eq!(resolve_output_path(&config, now), PathBuf::from("custom.db"));
    }
}
