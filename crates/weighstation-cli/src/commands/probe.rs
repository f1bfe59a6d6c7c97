use std::time::Duration;

use weighstation_core::transport::fetch_weight;
use weighstation_core::util::{format_weight, scale_base_url};

use crate::error::CliError;

pub async fn run_probe(
    address: &str,
    count: u32,
    interval: Duration,
    timeout: Duration,
) -> Result<(), CliError> {
    let base_url =
        scale_base_url(address).ok_or_else(|| CliError::InvalidAddress(address.to_string()))?;
    let client = reqwest::Client::new();

    for attempt in 0..count.max(1) {
        if attempt > 0 {
            tokio::time::sleep(interval).await;
        }
        let sample = fetch_weight(&client, &base_url, timeout).await?;
        println!("{} kg", format_weight(sample.kilograms()));
    }

    Ok(())
}
