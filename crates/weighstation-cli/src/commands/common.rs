use async_trait::async_trait;
use weighstation_core::config::normalize_relay_url;
use weighstation_core::submit::SubmitResult;
use weighstation_core::{
    KioskConfig, RecordSubmitter, RelayClient, ShiftEvent, ShiftEventSubmitter, SubmitError,
    WeightRecord,
};

use crate::config_profiles::{normalize_text_option, resolve_kiosk_config, CliProfilesConfig};
use crate::error::CliError;

/// Station configuration for the selected profile, layered over the environment.
pub fn load_kiosk_config(profile_name: Option<&str>) -> Result<KioskConfig, CliError> {
    let profiles = CliProfilesConfig::load().map_err(CliError::Config)?;
    let name = profiles.resolve_profile_name(profile_name);
    let profile = profiles.profile(&name);
    if profile.is_none() && profile_name.is_some() {
        tracing::warn!(profile = %name, "Profile not found, using environment settings");
    }
    Ok(resolve_kiosk_config(profile, |key| std::env::var(key).ok())?)
}

/// Relay URL from an explicit flag, falling back to the resolved config.
pub fn resolve_relay_url(
    explicit: Option<String>,
    config: &KioskConfig,
) -> Result<Option<String>, CliError> {
    match normalize_text_option(explicit) {
        Some(url) => Ok(Some(normalize_relay_url(&url)?)),
        None => Ok(config.relay_url.clone()),
    }
}

pub fn require_relay_client(
    explicit: Option<String>,
    config: &KioskConfig,
) -> Result<RelayClient, CliError> {
    let url = resolve_relay_url(explicit, config)?.ok_or(CliError::RelayNotConfigured)?;
    Ok(RelayClient::new(url, config.connect_timeout)?)
}

/// Stand-in submitter for a station running without a relay; every record
/// stays in the offline queue.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRelay;

#[async_trait]
impl RecordSubmitter for NoRelay {
    async fn submit_records(&self, _records: &[WeightRecord]) -> SubmitResult<()> {
        Err(SubmitError::InvalidConfiguration(
            "no relay URL configured".to_string(),
        ))
    }
}

#[async_trait]
impl ShiftEventSubmitter for NoRelay {
    async fn submit_shift_event(&self, _event: &ShiftEvent) -> SubmitResult<()> {
        Err(SubmitError::InvalidConfiguration(
            "no relay URL configured".to_string(),
        ))
    }
}

/// Parse a hex payload such as `00 d0 07`, `00:d0:07` or `0x00d007`.
pub fn parse_hex_payload(raw: &str) -> Result<Vec<u8>, CliError> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<char> = trimmed
        .chars()
        .filter(|ch| !ch.is_whitespace() && *ch != ':' && *ch != '-')
        .collect();

    if digits.is_empty() {
        return Err(CliError::InvalidPayload("payload is empty".to_string()));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::InvalidPayload(format!(
            "odd number of hex digits ({})",
            digits.len()
        )));
    }

    digits
        .chunks(2)
        .map(|pair| {
            let high = pair[0].to_digit(16);
            let low = pair[1].to_digit(16);
            match (high, low) {
                (Some(high), Some(low)) => u8::try_from(high * 16 + low)
                    .map_err(|_| CliError::InvalidPayload("byte out of range".to_string())),
                _ => Err(CliError::InvalidPayload(format!(
                    "'{}{}' is not a hex byte",
                    pair[0], pair[1]
                ))),
            }
        })
        .collect()
}
