use capmath_core::{Computation, Grant};
use serde_json::json;

use crate::cli::{VestingArgs, VestingScheduleArgs};
use crate::error::CliError;

use super::{read_input, CommandResult};

pub fn run(args: &VestingArgs) -> Result<CommandResult, CliError> {
    let grant: Grant = read_input(&args.input)?;
    let summary = grant.summary(args.as_of)?;

    let command_result = CommandResult::ok(Computation::Vesting, serde_json::to_value(&summary)?);
    if args.as_of < grant.grant_date {
        return Ok(command_result.with_warning(format!(
            "as-of date {} precedes grant date {}",
            args.as_of, grant.grant_date
        )));
    }

    Ok(command_result)
}

pub fn run_schedule(args: &VestingScheduleArgs) -> Result<CommandResult, CliError> {
    let grant: Grant = read_input(&args.input)?;
    let events = grant.events()?;

    let data = json!({
        "quantity": grant.quantity,
        "grant_date": grant.grant_date,
        "end_date": grant.schedule.end_date()?,
        "events": events,
    });
    Ok(CommandResult::ok(Computation::Vesting, data))
}
