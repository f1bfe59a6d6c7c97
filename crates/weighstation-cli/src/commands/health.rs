use crate::commands::common::{load_kiosk_config, require_relay_client};
use crate::error::CliError;

pub async fn run_health(relay_url: Option<String>, profile: Option<&str>) -> Result<(), CliError> {
    let config = load_kiosk_config(profile)?;
    let client = require_relay_client(relay_url, &config)?;
    client.check_health().await?;
    println!("Relay {} is reachable", client.base_url());
    Ok(())
}
