mod dilution;
mod vesting;
mod waterfall;

use std::io::Read;
use std::path::Path;
use std::time::Instant;

use capmath_core::{Computation, Envelope, EnvelopeError, EnvelopeMeta};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub struct CommandResult {
    pub computation: Computation,
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
}

impl CommandResult {
    pub fn ok(computation: Computation, data: Value) -> Self {
        Self {
            computation,
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_errors(mut self, errors: Vec<EnvelopeError>) -> Self {
        self.errors.extend(errors);
        self
    }
}

pub fn run(cli: &Cli) -> Result<Envelope<Value>, CliError> {
    let started = Instant::now();

    let command_result = match &cli.command {
        Command::Dilution(args) => dilution::run(args)?,
        Command::Waterfall(args) => waterfall::run(args)?,
        Command::Vesting(args) => vesting::run(args)?,
        Command::VestingSchedule(args) => vesting::run_schedule(args)?,
    };

    let CommandResult {
        computation,
        data,
        warnings,
        errors,
    } = command_result;

    let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    tracing::info!(%computation, elapsed_us, errors = errors.len(), "computation finished");

    let mut meta = EnvelopeMeta::new(Uuid::new_v4().to_string(), computation, elapsed_us)?;
    for warning in warnings {
        meta.push_warning(warning);
    }

    Envelope::with_errors(meta, data, errors).map_err(CliError::from)
}

/// Reads a JSON scenario from `path`, or from stdin when `path` is `-`.
pub(crate) fn read_input<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let content = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(path)?
    };

    serde_json::from_str(&content).map_err(|source| CliError::Input {
        path: path.to_path_buf(),
        source,
    })
}
