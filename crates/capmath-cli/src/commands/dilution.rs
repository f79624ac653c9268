use capmath_core::{compute_dilution, Computation, RoundScenario, ShareholderPosition};
use serde::Deserialize;

use crate::cli::DilutionArgs;
use crate::error::CliError;

use super::{read_input, CommandResult};

#[derive(Debug, Deserialize)]
struct DilutionInput {
    positions: Vec<ShareholderPosition>,
    scenario: RoundScenario,
}

pub fn run(args: &DilutionArgs) -> Result<CommandResult, CliError> {
    let input: DilutionInput = read_input(&args.input)?;
    let result = compute_dilution(&input.positions, &input.scenario)?;

    let mut command_result =
        CommandResult::ok(Computation::Dilution, serde_json::to_value(&result)?);

    let unconverted = input
        .positions
        .iter()
        .filter(|position| position.instrument.is_convertible())
        .count();
    if !input.scenario.include_conversion && unconverted > 0 {
        command_result = command_result.with_warning(format!(
            "{unconverted} convertible position(s) left unconverted; set include_conversion to convert them"
        ));
    }
    if result.price_derived {
        command_result = command_result
            .with_warning("price_per_share not supplied; derived from pre-money and share count");
    }

    Ok(command_result)
}
