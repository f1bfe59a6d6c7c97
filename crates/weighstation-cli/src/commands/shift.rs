use weighstation_core::{OperatorContext, ShiftAction, ShiftEvent, ShiftEventSubmitter};

use crate::cli::ShiftArgs;
use crate::commands::common::{load_kiosk_config, require_relay_client};
use crate::error::CliError;

/// Send one shift row straight to the relay and report the outcome.
pub async fn run_shift(
    action: ShiftAction,
    args: ShiftArgs,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let config = load_kiosk_config(profile)?;
    let client = require_relay_client(args.relay_url, &config)?;
    let machine = args.machine.unwrap_or(config.machine_name);
    let context = OperatorContext::new(machine, args.operator, args.product)?;

    let event = ShiftEvent::now(&context, action);
    client.submit_shift_event(&event).await?;
    println!(
        "Shift {} recorded for {} on {}",
        action,
        context.operator_name,
        context.machine_name
    );
    Ok(())
}
