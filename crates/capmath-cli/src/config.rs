use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cli::{Cli, OutputFormat};
use crate::error::CliError;

pub const CONFIG_ENV: &str = "CAPMATH_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "capmath.toml";

#[derive(Debug, Default, Deserialize)]
pub struct CapmathConfig {
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputConfig {
    pub format: Option<OutputFormat>,
    pub pretty: Option<bool>,
    pub strict: Option<bool>,
}

/// Output behavior after merging flags over the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub pretty: bool,
    pub strict: bool,
}

impl CapmathConfig {
    pub fn load(explicit: Option<&Path>) -> Result<Self, CliError> {
        let from_env = env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::discover(explicit, from_env.as_deref(), Path::new(DEFAULT_CONFIG_FILE))
    }

    /// An explicit or environment path must load; the default file is optional.
    pub fn discover(
        explicit: Option<&Path>,
        from_env: Option<&Path>,
        default_path: &Path,
    ) -> Result<Self, CliError> {
        if let Some(path) = explicit.or(from_env) {
            return Self::from_path(path);
        }

        if !default_path.exists() {
            tracing::debug!(path = %default_path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        match Self::from_path(default_path) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Ignoring config at {:?}: {}", default_path, err);
                Ok(Self::default())
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::Config {
            path: path.to_path_buf(),
            reason: source.to_string(),
        })?;

        let config = toml::from_str(&content).map_err(|source| CliError::Config {
            path: path.to_path_buf(),
            reason: source.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn resolve(&self, cli: &Cli) -> OutputSettings {
        let output = self.output.as_ref();
        OutputSettings {
            format: cli
                .format
                .or_else(|| output.and_then(|o| o.format))
                .unwrap_or(OutputFormat::Json),
            pretty: cli.pretty || output.and_then(|o| o.pretty).unwrap_or(false),
            strict: cli.strict || output.and_then(|o| o.strict).unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::Parser;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("capmath.toml");
        std::fs::write(&path, content).expect("write config");
        path
    }

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["capmath"];
        argv.extend_from_slice(args);
        argv.extend_from_slice(&["vesting-schedule", "--input", "-"]);
        Cli::try_parse_from(argv).expect("valid arguments")
    }

    #[test]
    fn missing_default_file_yields_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let config = CapmathConfig::discover(None, None, &dir.path().join("capmath.toml"))
            .expect("defaults");

        assert_eq!(
            config.resolve(&cli(&[])),
            OutputSettings {
                format: OutputFormat::Json,
                pretty: false,
                strict: false,
            }
        );
    }

    #[test]
    fn flags_override_file_values() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(
            &dir,
            "[output]\nformat = \"table\"\npretty = true\nstrict = false\n",
        );
        let config = CapmathConfig::discover(Some(&path), None, Path::new("unused.toml"))
            .expect("valid config");

        let from_file = config.resolve(&cli(&[]));
        assert_eq!(from_file.format, OutputFormat::Table);
        assert!(from_file.pretty);

        let overridden = config.resolve(&cli(&["--format", "ndjson", "--strict"]));
        assert_eq!(overridden.format, OutputFormat::Ndjson);
        assert!(overridden.strict);
    }

    #[test]
    fn env_path_is_used_without_flag() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(&dir, "[output]\nstrict = true\n");
        let config = CapmathConfig::discover(None, Some(&path), Path::new("unused.toml"))
            .expect("valid config");

        assert!(config.resolve(&cli(&[])).strict);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().expect("temp dir");
        let err = CapmathConfig::discover(
            Some(&dir.path().join("absent.toml")),
            None,
            Path::new("unused.toml"),
        )
        .expect_err("must fail");
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn invalid_default_file_is_ignored() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(&dir, "[output]\nformat = \"yaml\"\n");

        let config = CapmathConfig::discover(None, None, &path).expect("falls back");
        assert!(config.output.is_none());

        let err = CapmathConfig::from_path(&path).expect_err("invalid format");
        assert_eq!(err.exit_code(), 10);
    }
}
