use weighstation_core::config::normalize_relay_url;
use weighstation_core::transport::GattScheme;

use crate::cli::ConfigCommands;
use crate::commands::common::load_kiosk_config;
use crate::config_profiles::{normalize_text_option, CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            relay_url,
            machine,
            wifi_ip,
            scheme,
            no_activate,
        } => {
            let updates = ProfileUpdates {
                relay_url,
                machine_name: machine,
                wifi_ip,
                gatt_scheme: scheme.map(GattScheme::from),
            };
            run_config_init(profile.as_deref().or(global_profile), updates, no_activate)
        }
        ConfigCommands::Show => run_config_show(global_profile),
    }
}

/// Values passed to `config init`; `None` keeps what the profile has.
#[derive(Debug, Default, Clone)]
pub struct ProfileUpdates {
    pub relay_url: Option<String>,
    pub machine_name: Option<String>,
    pub wifi_ip: Option<String>,
    pub gatt_scheme: Option<GattScheme>,
}

pub fn run_config_init(
    profile_name: Option<&str>,
    updates: ProfileUpdates,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    apply_profile_updates(config.profile_mut_or_default(&profile_name), updates)?;
    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let has_relay = config
        .profile(&profile_name)
        .is_some_and(|profile| profile.relay_url.is_some());
    if !has_relay {
        println!(
            "Profile '{profile_name}' has no relay_url; records will stay queued unless WEIGHSTATION_RELAY_URL is set."
        );
    }

    Ok(())
}

pub fn apply_profile_updates(
    profile: &mut CliProfile,
    updates: ProfileUpdates,
) -> Result<(), CliError> {
    if let Some(url) = normalize_text_option(updates.relay_url) {
        profile.relay_url = Some(normalize_relay_url(&url)?);
    }
    if let Some(machine) = normalize_text_option(updates.machine_name) {
        profile.machine_name = Some(machine);
    }
    if let Some(ip) = normalize_text_option(updates.wifi_ip) {
        profile.wifi_ip = Some(ip);
    }
    if let Some(scheme) = updates.gatt_scheme {
        profile.gatt_scheme = Some(scheme);
    }
    Ok(())
}

fn run_config_show(profile: Option<&str>) -> Result<(), CliError> {
    let config = load_kiosk_config(profile)?;
    println!(
        "relay_url:             {}",
        config.relay_url.as_deref().unwrap_or("(not set)")
    );
    println!("machine_name:          {}", config.machine_name);
    println!("wifi_ip:               {}", config.wifi_ip);
    println!("gatt_scheme:           {}", config.gatt_scheme.as_str());
    println!(
        "connect_timeout:       {}s",
        config.connect_timeout.as_secs()
    );
    println!("poll_interval:         {}s", config.poll_interval.as_secs());
    println!("scan_window:           {}s", config.scan_window.as_secs());
    println!(
        "connectivity_interval: {}s",
        config.connectivity_interval.as_secs()
    );
    Ok(())
}
