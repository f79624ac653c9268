mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::Cli;
use crate::config::CapmathConfig;
use crate::error::CliError;

fn main() {
    init_tracing();

    if let Err(error) = run() {
        tracing::debug!(exit_code = error.exit_code(), "command failed");
        eprintln!("error: {error}");
        std::process::exit(error.exit_code());
    }
}

/// Logs go to stderr so stdout stays machine-readable. `RUST_LOG` overrides
/// the default `warn` level.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(env_filter)
        .init();
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let settings = CapmathConfig::load(cli.config.as_deref())?.resolve(&cli);

    let envelope = commands::run(&cli)?;
    if cli.stream {
        output::render_stream(&envelope)?;
    } else {
        output::render(&envelope, settings.format, settings.pretty)?;
    }

    if settings.strict && (!envelope.meta.warnings.is_empty() || !envelope.errors.is_empty()) {
        return Err(CliError::StrictModeViolation {
            warning_count: envelope.meta.warnings.len(),
            error_count: envelope.errors.len(),
        });
    }

    Ok(())
}
