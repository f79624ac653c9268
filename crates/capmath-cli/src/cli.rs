//! CLI argument definitions for capmath.
//!
//! Every command reads a JSON scenario file (`-` for stdin) and prints a
//! response envelope.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dilution` | Apply a financing round to a cap table |
//! | `waterfall` | Distribute exit proceeds across the preference stack |
//! | `vesting` | Vested and unvested shares of a grant on a date |
//! | `vesting-schedule` | Every vesting event of a grant |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, ndjson, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Treat warnings and errors as failures |
//! | `--stream` | `false` | Emit NDJSON stream events |
//! | `--config` | `capmath.toml` | Configuration file |
//!
//! # Examples
//!
//! ```bash
//! capmath dilution --input round.json --pretty
//! capmath waterfall --input exit.json --exit 20000000 --exit 50000000
//! capmath vesting --input grant.json --as-of 2025-02-15
//! ```

use std::path::PathBuf;

use capmath_core::{CalendarDate, Money};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

/// Capitalization-table equity math.
#[derive(Debug, Parser)]
#[command(
    name = "capmath",
    author,
    version,
    about = "Cap-table dilution, exit waterfall and vesting calculator"
)]
pub struct Cli {
    /// Output format for results. Overrides `[output] format` in the config file.
    #[arg(long, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat warnings and errors as failures (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Emit NDJSON events: start, one chunk per scenario, end.
    #[arg(long, global = true, default_value_t = false)]
    pub stream: bool,

    /// Path to a TOML configuration file.
    ///
    /// Falls back to `$CAPMATH_CONFIG`, then `./capmath.toml`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Key/value summary for terminal display.
    Table,
    /// Single JSON object output.
    Json,
    /// Newline-delimited JSON (one object per line).
    Ndjson,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply a priced round to a cap table.
    ///
    /// The input file holds `{"positions": [...], "scenario": {...}}`.
    Dilution(DilutionArgs),

    /// Distribute exit proceeds across a preference stack.
    ///
    /// Give `--exit` several times to evaluate multiple exit values in parallel.
    Waterfall(WaterfallArgs),

    /// Vested and unvested shares of a grant on a date.
    Vesting(VestingArgs),

    /// List every scheduled vesting event of a grant.
    VestingSchedule(VestingScheduleArgs),
}

#[derive(Debug, Args)]
pub struct DilutionArgs {
    /// Scenario file, or `-` for stdin.
    #[arg(long, short)]
    pub input: PathBuf,
}

#[derive(Debug, Args)]
pub struct WaterfallArgs {
    /// Scenario file, or `-` for stdin.
    #[arg(long, short)]
    pub input: PathBuf,

    /// Exit value in major units; replaces the file's `exit_value`.
    #[arg(long = "exit", value_name = "AMOUNT")]
    pub exits: Vec<Money>,
}

#[derive(Debug, Args)]
pub struct VestingArgs {
    /// Grant file, or `-` for stdin.
    #[arg(long, short)]
    pub input: PathBuf,

    /// Evaluation date (YYYY-MM-DD).
    #[arg(long)]
    pub as_of: CalendarDate,
}

#[derive(Debug, Args)]
pub struct VestingScheduleArgs {
    /// Grant file, or `-` for stdin.
    #[arg(long, short)]
    pub input: PathBuf,
}
