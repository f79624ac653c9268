use std::collections::BTreeMap;

use capmath_core::{
    allocate_to_holders, compute_waterfall, Computation, EngineError, EnvelopeError,
    HolderPayout, HolderStake, Money, WaterfallInput, WaterfallResult, COMMON_POOL_ID,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cli::WaterfallArgs;
use crate::error::CliError;

use super::{read_input, CommandResult};

#[derive(Debug, Deserialize)]
struct WaterfallFile {
    #[serde(flatten)]
    input: WaterfallInput,
    /// Per-class holder stakes keyed by class id (or `common`).
    #[serde(default)]
    holders: BTreeMap<String, Vec<HolderStake>>,
}

#[derive(Debug, Serialize)]
struct ExitScenario {
    scenario: String,
    #[serde(flatten)]
    result: WaterfallResult,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    holder_payouts: BTreeMap<String, Vec<HolderPayout>>,
}

pub fn run(args: &WaterfallArgs) -> Result<CommandResult, CliError> {
    let file: WaterfallFile = read_input(&args.input)?;

    let mut warnings = Vec::new();
    for class_id in file.holders.keys() {
        let known = class_id == COMMON_POOL_ID
            || file.input.classes.iter().any(|class| &class.id == class_id);
        if !known {
            warnings.push(format!("holders listed for unknown class '{class_id}'"));
        }
    }

    let command_result = match args.exits.as_slice() {
        [] => single(&file, file.input.exit_value)?,
        [exit_value] => single(&file, *exit_value)?,
        exits => multiple(&file, exits)?,
    };

    Ok(warnings
        .into_iter()
        .fold(command_result, |result, warning| result.with_warning(warning)))
}

fn single(file: &WaterfallFile, exit_value: Money) -> Result<CommandResult, CliError> {
    let scenario = evaluate(file, exit_value)?;
    Ok(CommandResult::ok(
        Computation::Waterfall,
        serde_json::to_value(&scenario)?,
    ))
}

/// Evaluates every exit value in parallel. Failed exits become envelope
/// errors; the rest are reported in input order.
fn multiple(file: &WaterfallFile, exits: &[Money]) -> Result<CommandResult, CliError> {
    tracing::debug!(count = exits.len(), "evaluating exit values in parallel");

    let outcomes: Vec<(String, Result<ExitScenario, EngineError>)> = exits
        .par_iter()
        .map(|exit_value| (scenario_name(*exit_value), evaluate(file, *exit_value)))
        .collect();

    let mut scenarios = Vec::with_capacity(outcomes.len());
    let mut errors = Vec::new();
    for (name, outcome) in outcomes {
        match outcome {
            Ok(scenario) => scenarios.push(scenario),
            Err(err) => {
                tracing::warn!(scenario = %name, error = %err, "exit scenario failed");
                errors.push(EnvelopeError::from(&err).with_scenario(name));
            }
        }
    }

    let data = json!({ "scenarios": scenarios });
    Ok(CommandResult::ok(Computation::Waterfall, data).with_errors(errors))
}

fn evaluate(file: &WaterfallFile, exit_value: Money) -> Result<ExitScenario, EngineError> {
    let result = compute_waterfall(&file.input.with_exit_value(exit_value))?;

    let mut holder_payouts = BTreeMap::new();
    for (class_id, stakes) in &file.holders {
        if let Some(distribution) = result.distribution(class_id) {
            holder_payouts.insert(class_id.clone(), allocate_to_holders(distribution, stakes)?);
        }
    }

    Ok(ExitScenario {
        scenario: scenario_name(exit_value),
        result,
        holder_payouts,
    })
}

fn scenario_name(exit_value: Money) -> String {
    format!("exit-{exit_value}")
}
