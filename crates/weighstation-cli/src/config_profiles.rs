//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use weighstation_core::transport::GattScheme;
use weighstation_core::KioskConfig;

const CONFIG_FILE_NAME: &str = "cli-config.json";
const PROFILE_ENV: &str = "WEIGHSTATION_PROFILE";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default)]
    pub machine_name: Option<String>,
    #[serde(default)]
    pub wifi_ip: Option<String>,
    #[serde(default)]
    pub gatt_scheme: Option<GattScheme>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("weighstation").join(CONFIG_FILE_NAME))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    weighstation_core::util::normalize_text_option(value)
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    normalize_text_option(value.map(str::to_string))
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        self.resolve_profile_name_with(explicit, std::env::var(PROFILE_ENV).ok().as_deref())
    }

    fn resolve_profile_name_with(&self, explicit: Option<&str>, from_env: Option<&str>) -> String {
        normalize_profile_name(explicit)
            .or_else(|| normalize_profile_name(from_env))
            .or_else(|| normalize_profile_name(self.active_profile.as_deref()))
            .unwrap_or_else(|| "default".to_string())
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    /// Value this profile supplies for a station environment variable.
    pub fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "WEIGHSTATION_RELAY_URL" => self.relay_url.clone(),
            "WEIGHSTATION_MACHINE_NAME" => self.machine_name.clone(),
            "WEIGHSTATION_WIFI_IP" => self.wifi_ip.clone(),
            "WEIGHSTATION_GATT_SCHEME" => self.gatt_scheme.map(|scheme| scheme.as_str().to_string()),
            _ => None,
        }
    }

    fn normalize(&mut self) {
        self.relay_url = normalize_text_option(self.relay_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
        self.machine_name = normalize_text_option(self.machine_name.take());
        self.wifi_ip = normalize_text_option(self.wifi_ip.take());
    }
}

/// Resolve the station configuration: profile values win over the
/// environment, which wins over built-in defaults.
pub fn resolve_kiosk_config<F>(
    profile: Option<&CliProfile>,
    env_lookup: F,
) -> weighstation_core::Result<KioskConfig>
where
    F: Fn(&str) -> Option<String>,
{
    KioskConfig::from_lookup(|key| {
        profile
            .and_then(|profile| normalize_text_option(profile.lookup(key)))
            .or_else(|| env_lookup(key))
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn temp_config_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "weighstation-cli-{label}-{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_or(0, |duration| duration.as_nanos())
        ))
    }

    #[test]
    fn normalize_profile_name_rejects_empty() {
        assert_eq!(normalize_profile_name(None), None);
        assert_eq!(normalize_profile_name(Some(" ")), None);
        assert_eq!(normalize_profile_name(Some(" line-2 ")), Some("line-2".to_string()));
    }

    #[test]
    fn config_roundtrip_preserves_profiles() {
        let path = temp_config_path("roundtrip");

        let mut config = CliProfilesConfig {
            version: 1,
            active_profile: Some("default".to_string()),
            profiles: BTreeMap::new(),
        };
        config.profiles.insert(
            "default".to_string(),
            CliProfile {
                relay_url: Some(" http://relay.local:4000/ ".to_string()),
                machine_name: Some(" SCALE 3 ".to_string()),
                wifi_ip: Some(" ".to_string()),
                gatt_scheme: Some(GattScheme::WeightScale),
            },
        );

        config.save_to_path(&path).unwrap();
        let loaded = CliProfilesConfig::load_from_path(&path).unwrap();
        let profile = loaded.profiles.get("default").unwrap();
        assert_eq!(profile.relay_url.as_deref(), Some("http://relay.local:4000"));
        assert_eq!(profile.machine_name.as_deref(), Some("SCALE 3"));
        assert_eq!(profile.wifi_ip, None);
        assert_eq!(profile.gatt_scheme, Some(GattScheme::WeightScale));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_loads_empty_config() {
        let loaded = CliProfilesConfig::load_from_path(&temp_config_path("missing")).unwrap();
        assert_eq!(loaded, CliProfilesConfig::default());
    }

    #[test]
    fn resolve_profile_name_prefers_explicit_then_env_then_active() {
        let config = CliProfilesConfig {
            version: 1,
            active_profile: Some("line-1".to_string()),
            profiles: BTreeMap::new(),
        };
        assert_eq!(
            config.resolve_profile_name_with(Some("line-2"), Some("line-3")),
            "line-2"
        );
        assert_eq!(config.resolve_profile_name_with(None, Some("line-3")), "line-3");
        assert_eq!(config.resolve_profile_name_with(None, None), "line-1");
        assert_eq!(
            CliProfilesConfig::default().resolve_profile_name_with(None, Some(" ")),
            "default"
        );
    }

    #[test]
    fn profile_values_override_environment() {
        let profile = CliProfile {
            machine_name: Some("SCALE 9".to_string()),
            gatt_scheme: Some(GattScheme::WeightScale),
            ..CliProfile::default()
        };
        let env = |key: &str| match key {
            "WEIGHSTATION_MACHINE_NAME" => Some("SCALE 2".to_string()),
            "WEIGHSTATION_WIFI_IP" => Some("10.0.0.7".to_string()),
            _ => None,
        };

        let config = resolve_kiosk_config(Some(&profile), env).unwrap();
        assert_eq!(config.machine_name, "SCALE 9");
        assert_eq!(config.wifi_ip, "10.0.0.7");
        assert_eq!(config.gatt_scheme, GattScheme::WeightScale);
        assert_eq!(config.relay_url, None);
    }
}
