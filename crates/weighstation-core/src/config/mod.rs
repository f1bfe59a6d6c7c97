//! Station configuration resolved from the environment.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::GattScheme;
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_MACHINE_NAME: &str = "SCALE 1";
pub const DEFAULT_WIFI_IP: &str = "192.168.1.100";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
const DEFAULT_SCAN_WINDOW_SECS: u64 = 5;
const DEFAULT_CONNECTIVITY_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KioskConfig {
    /// Sheet relay base URL; `None` keeps every record in the offline queue
    pub relay_url: Option<String>,
    pub machine_name: String,
    /// Address offered when the operator is asked for the Wi-Fi scale
    pub wifi_ip: String,
    pub gatt_scheme: GattScheme,
    pub connect_timeout: Duration,
    pub poll_interval: Duration,
    pub scan_window: Duration,
    pub connectivity_interval: Duration,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            relay_url: None,
            machine_name: DEFAULT_MACHINE_NAME.to_string(),
            wifi_ip: DEFAULT_WIFI_IP.to_string(),
            gatt_scheme: GattScheme::default(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            scan_window: Duration::from_secs(DEFAULT_SCAN_WINDOW_SECS),
            connectivity_interval: Duration::from_secs(DEFAULT_CONNECTIVITY_INTERVAL_SECS),
        }
    }
}

impl KioskConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| normalize_text_option(lookup(key));

        let relay_url = value("WEIGHSTATION_RELAY_URL")
            .map(|url| normalize_relay_url(&url))
            .transpose()?;
        let gatt_scheme = match value("WEIGHSTATION_GATT_SCHEME") {
            Some(raw) => raw
                .parse::<GattScheme>()
                .map_err(|error| Error::Config(format!("WEIGHSTATION_GATT_SCHEME: {error}")))?,
            None => GattScheme::default(),
        };

        Ok(Self {
            relay_url,
            machine_name: value("WEIGHSTATION_MACHINE_NAME")
                .unwrap_or_else(|| DEFAULT_MACHINE_NAME.to_string()),
            wifi_ip: value("WEIGHSTATION_WIFI_IP").unwrap_or_else(|| DEFAULT_WIFI_IP.to_string()),
            gatt_scheme,
            connect_timeout: seconds(
                value("WEIGHSTATION_CONNECT_TIMEOUT_SECS"),
                "WEIGHSTATION_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?,
            poll_interval: seconds(
                value("WEIGHSTATION_POLL_INTERVAL_SECS"),
                "WEIGHSTATION_POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )?,
            scan_window: seconds(
                value("WEIGHSTATION_SCAN_WINDOW_SECS"),
                "WEIGHSTATION_SCAN_WINDOW_SECS",
                DEFAULT_SCAN_WINDOW_SECS,
            )?,
            connectivity_interval: seconds(
                value("WEIGHSTATION_CONNECTIVITY_INTERVAL_SECS"),
                "WEIGHSTATION_CONNECTIVITY_INTERVAL_SECS",
                DEFAULT_CONNECTIVITY_INTERVAL_SECS,
            )?,
        })
    }
}

/// Validate a relay base URL and strip trailing slashes.
pub fn normalize_relay_url(raw: &str) -> Result<String> {
    let url = normalize_text_option(Some(raw.to_string()))
        .ok_or_else(|| Error::Config("relay URL must not be empty".to_string()))?;
    if is_http_url(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(format!(
            "relay URL '{url}' must include http:// or https://"
        )))
    }
}

fn seconds(raw: Option<String>, key: &str, default: u64) -> Result<Duration> {
    let Some(raw) = raw else {
        return Ok(Duration::from_secs(default));
    };
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => Ok(Duration::from_secs(value)),
        _ => Err(Error::Config(format!(
            "{key} must be a positive whole number of seconds, got '{raw}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| values.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = KioskConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, KioskConfig::default());
        assert_eq!(config.machine_name, "SCALE 1");
        assert_eq!(config.wifi_ip, "192.168.1.100");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn values_are_trimmed_and_parsed() {
        let config = KioskConfig::from_lookup(lookup(&[
            ("WEIGHSTATION_RELAY_URL", " http://relay.local:4000/ "),
            ("WEIGHSTATION_MACHINE_NAME", " SCALE 7 "),
            ("WEIGHSTATION_GATT_SCHEME", "weight-scale"),
            ("WEIGHSTATION_POLL_INTERVAL_SECS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.relay_url.as_deref(), Some("http://relay.local:4000"));
        assert_eq!(config.machine_name, "SCALE 7");
        assert_eq!(config.gatt_scheme, GattScheme::WeightScale);
        assert_eq!(config.poll_interval, Duration::from_secs(3));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(KioskConfig::from_lookup(lookup(&[("WEIGHSTATION_RELAY_URL", "relay.local")])).is_err());
        assert!(KioskConfig::from_lookup(lookup(&[("WEIGHSTATION_GATT_SCHEME", "auto")])).is_err());
        assert!(
            KioskConfig::from_lookup(lookup(&[("WEIGHSTATION_CONNECT_TIMEOUT_SECS", "0")])).is_err()
        );
        assert!(
            KioskConfig::from_lookup(lookup(&[("WEIGHSTATION_POLL_INTERVAL_SECS", "fast")])).is_err()
        );
    }
}
