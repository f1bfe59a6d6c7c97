//! Interactive weighing loop: one shift, one operator, commands read from stdin.

use std::io::{self, BufRead, IsTerminal, Write};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use weighstation_core::transport::{
    AdapterConstructor, AdapterSelector, DeviceChooser, HostEnvironment, MockScaleHandle,
    MockScript,
};
use weighstation_core::util::format_weight;
use weighstation_core::{
    ConnectionCoordinator, ConnectivityMonitor, CoordinatorEvent, CoordinatorOptions,
    DeviceHandle, KioskConfig, RecordOutcome, RecordSubmitter, RelayClient, ShiftEventSubmitter,
    StationStatus, SwitchOutcome, SyncOutcome, TransportKind,
};

use crate::cli::RunArgs;
use crate::commands::common::{load_kiosk_config, resolve_relay_url, NoRelay};
use crate::config_profiles::normalize_text_option;
use crate::error::CliError;

const SIMULATED_BASE_WEIGHT: f64 = 25.0;
const SIMULATED_TICK: Duration = Duration::from_millis(500);

pub const KIOSK_HELP: &str = "\
Commands:
  record | r         capture the current weight
  weight | w         show the live weight
  bt                 connect the Bluetooth scale
  wifi [address]     switch to the Wi-Fi scale (connects when an address is given)
  status | s         show transports, queue and shift
  sync               push offline records now
  online | offline   override the network flag until the next probe
  help | ?           show this list
  end | quit         end the shift and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KioskCommand {
    Record,
    Weight,
    Bluetooth,
    Wifi(Option<String>),
    Status,
    Sync,
    Online(bool),
    Help,
    End,
}

impl FromStr for KioskCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Err("empty command".to_string());
        };
        let argument = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return Err(format!("too many arguments for '{verb}'"));
        }

        let command = match verb.to_ascii_lowercase().as_str() {
            "record" | "r" => Self::Record,
            "weight" | "w" => Self::Weight,
            "bt" | "bluetooth" => Self::Bluetooth,
            "wifi" => return Ok(Self::Wifi(argument)),
            "status" | "s" => Self::Status,
            "sync" => Self::Sync,
            "online" => Self::Online(true),
            "offline" => Self::Online(false),
            "help" | "?" => Self::Help,
            "end" | "quit" | "exit" | "q" => Self::End,
            other => return Err(format!("unknown command '{other}' (type 'help')")),
        };
        match argument {
            Some(extra) => Err(format!("'{verb}' takes no argument, got '{extra}'")),
            None => Ok(command),
        }
    }
}

/// Asks the operator to pick a scale on the terminal. Without a terminal
/// the first discovered scale is taken.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptChooser;

impl DeviceChooser for PromptChooser {
    fn choose(&self, candidates: &[DeviceHandle]) -> Option<DeviceHandle> {
        if candidates.is_empty() {
            println!("No scales found");
            return None;
        }
        if !io::stdin().is_terminal() {
            return candidates.first().cloned();
        }

        println!("Scales in range:");
        for (index, device) in candidates.iter().enumerate() {
            println!("  {}. {}", index + 1, device.display_name());
        }
        print!("Select a scale (blank to cancel): ");
        let _ = io::stdout().flush();

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer).ok()?;
        pick_candidate(candidates, &answer)
    }
}

/// Resolve a 1-based selection typed by the operator.
pub fn pick_candidate(candidates: &[DeviceHandle], answer: &str) -> Option<DeviceHandle> {
    let index = answer.trim().parse::<usize>().ok()?;
    index
        .checked_sub(1)
        .and_then(|index| candidates.get(index))
        .cloned()
}

/// In-process scale that drifts around a fixed load.
struct SimulatedScale {
    handle: MockScaleHandle,
    pusher: JoinHandle<()>,
}

impl SimulatedScale {
    fn start() -> Self {
        let handle = MockScaleHandle::new();
        let scale = handle.clone();
        let pusher = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SIMULATED_TICK);
            let mut step: u32 = 0;
            loop {
                ticker.tick().await;
                scale.push_weight(simulated_weight(step));
                step = step.wrapping_add(1);
            }
        });
        Self { handle, pusher }
    }

    fn constructor(&self) -> AdapterConstructor {
        self.handle.constructor(MockScript::healthy())
    }

    fn stop(self) {
        self.pusher.abort();
    }
}

fn simulated_weight(step: u32) -> f64 {
    SIMULATED_BASE_WEIGHT + (f64::from(step % 7) - 3.0) * 0.05
}

pub async fn run_kiosk(args: RunArgs, profile: Option<&str>) -> Result<(), CliError> {
    let mut config = load_kiosk_config(profile)?;
    config.relay_url = resolve_relay_url(args.relay_url.clone(), &config)?;
    if let Some(machine) = normalize_text_option(args.machine.clone()) {
        config.machine_name = machine;
    }

    let relay = config
        .relay_url
        .clone()
        .map(|url| RelayClient::new(url, config.connect_timeout))
        .transpose()?
        .map(Arc::new);
    let (records, shifts): (Arc<dyn RecordSubmitter>, Arc<dyn ShiftEventSubmitter>) =
        match &relay {
            Some(client) => (client.clone(), client.clone()),
            None => {
                println!("No relay configured: records will be kept offline");
                (Arc::new(NoRelay), Arc::new(NoRelay))
            }
        };

    let simulator = args.simulate.then(SimulatedScale::start);
    let adapters = simulator
        .as_ref()
        .map_or_else(|| host_adapters(&config), SimulatedScale::constructor);

    let (coordinator, events) = ConnectionCoordinator::new(
        CoordinatorOptions::from(&config),
        adapters,
        records,
        shifts,
    );
    let coordinator = Arc::new(coordinator);
    let notices = tokio::spawn(print_notices(events));
    let monitor = match (&relay, args.no_monitor) {
        (Some(client), false) => Some(ConnectivityMonitor::spawn(
            coordinator.clone(),
            client.clone(),
            config.connectivity_interval,
        )),
        _ => None,
    };

    let result = run_shift(&coordinator, &args).await;

    if coordinator.operator_context().is_some() {
        match coordinator.end_shift().await {
            Ok(dispatched) => {
                if let Err(error) = dispatched.await {
                    tracing::warn!("Shift end dispatch did not finish: {error}");
                }
            }
            Err(error) => tracing::warn!("Failed to end shift: {error}"),
        }
    } else {
        coordinator.shutdown().await;
    }
    if let Some(monitor) = monitor {
        monitor.stop().await;
    }
    if let Some(simulator) = simulator {
        simulator.stop();
    }

    let queued = coordinator.queue().len();
    if queued > 0 {
        println!("{queued} record(s) were still waiting to sync and have been discarded");
    }
    drop(coordinator);
    let _ = notices.await;

    result
}

fn host_adapters(config: &KioskConfig) -> AdapterConstructor {
    AdapterSelector::new(HostEnvironment::desktop(), config.gatt_scheme)
        .with_chooser(Arc::new(PromptChooser))
        .with_scan_window(config.scan_window)
        .into_constructor()
}

async fn run_shift(coordinator: &ConnectionCoordinator, args: &RunArgs) -> Result<(), CliError> {
    // Detached: the start row is sent at most once in the background.
    drop(coordinator.start_shift(&args.operator, &args.product)?);
    if let Some(context) = coordinator.operator_context() {
        println!(
            "Shift started: {} weighing {} on {}",
            context.operator_name, context.product_type, context.machine_name
        );
    }

    let wifi_address = normalize_text_option(args.wifi_ip.clone());
    let outcome = coordinator.switch_to(args.transport.into()).await;
    if let (true, Some(address)) = (awaits_wifi_address(&outcome), wifi_address.as_deref()) {
        connect_wifi(coordinator, address).await;
    }
    println!("{KIOSK_HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<KioskCommand>() {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        if command == KioskCommand::End {
            break;
        }
        execute(coordinator, command).await;
    }

    Ok(())
}

async fn execute(coordinator: &ConnectionCoordinator, command: KioskCommand) {
    match command {
        KioskCommand::Record => match coordinator.record_weight().await {
            Ok(RecordOutcome::Submitted(record) | RecordOutcome::Queued { record, .. }) => {
                println!("Captured {} kg", format_weight(record.weight));
            }
            Err(error) => println!("Cannot record: {error}"),
        },
        KioskCommand::Weight => {
            println!(
                "{} kg ({})",
                format_weight(coordinator.current_weight().kilograms()),
                coordinator.active_state()
            );
        }
        KioskCommand::Bluetooth => {
            let outcome = coordinator.switch_to(TransportKind::Bluetooth).await;
            match outcome {
                SwitchOutcome::Cancelled => println!("Bluetooth selection cancelled"),
                SwitchOutcome::Unchanged => println!("A Bluetooth connection is already in progress"),
                SwitchOutcome::BluetoothConnected(_)
                | SwitchOutcome::FellBackToWifi { .. }
                | SwitchOutcome::AwaitingWifiAddress => {}
            }
        }
        KioskCommand::Wifi(address) => {
            if coordinator.active_transport() != TransportKind::Wifi || address.is_none() {
                coordinator.switch_to(TransportKind::Wifi).await;
            }
            if let Some(address) = address {
                connect_wifi(coordinator, &address).await;
            }
        }
        KioskCommand::Status => {
            for line in format_status(&coordinator.status()) {
                println!("{line}");
            }
        }
        KioskCommand::Sync => println!("{}", describe_sync(&coordinator.sync_now().await)),
        KioskCommand::Online(online) => {
            let outcome = coordinator.on_network_status_change(online).await;
            println!("Network marked {}", if online { "online" } else { "offline" });
            if matches!(outcome, SyncOutcome::Flushed(_) | SyncOutcome::Failed(_)) {
                println!("{}", describe_sync(&outcome));
            }
        }
        KioskCommand::Help => println!("{KIOSK_HELP}"),
        KioskCommand::End => {}
    }
}

async fn connect_wifi(coordinator: &ConnectionCoordinator, address: &str) {
    if let Err(error) = coordinator.connect_wifi(address).await {
        tracing::debug!(address, "Wi-Fi connect failed: {error}");
    }
}

const fn awaits_wifi_address(outcome: &SwitchOutcome) -> bool {
    matches!(
        outcome,
        SwitchOutcome::AwaitingWifiAddress | SwitchOutcome::FellBackToWifi { .. }
    )
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

async fn print_notices(mut events: UnboundedReceiver<CoordinatorEvent>) {
    while let Some(event) = events.recv().await {
        println!("* {event}");
        if matches!(event, CoordinatorEvent::WifiConfigurationRequested { .. }) {
            println!("  type `wifi <address>` to connect");
        }
    }
}

pub fn describe_sync(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Skipped => "Nothing to sync".to_string(),
        SyncOutcome::Offline => "Offline: records stay queued".to_string(),
        SyncOutcome::InProgress => "A sync is already running".to_string(),
        SyncOutcome::Flushed(count) => format!("Synced {count} record(s)"),
        SyncOutcome::Failed(error) => format!("Sync failed, records kept: {error}"),
    }
}

pub fn format_status(status: &StationStatus) -> Vec<String> {
    let mut lines = vec![
        format!(
            "transport: {} ({})",
            status.active_transport,
            status.active_state()
        ),
        format!(
            "bluetooth: {}{}",
            status.bluetooth,
            status
                .bluetooth_device
                .as_deref()
                .map(|name| format!(" [{name}]"))
                .unwrap_or_default()
        ),
        format!("wi-fi:     {}", status.wifi),
        format!("weight:    {} kg", format_weight(status.weight.kilograms())),
        format!(
            "network:   {}, {} queued",
            if status.online { "online" } else { "offline" },
            status.queued_records
        ),
    ];
    lines.push(match &status.operator {
        Some(context) => format!(
            "shift:     {} / {} on {}",
            context.operator_name, context.product_type, context.machine_name
        ),
        None => "shift:     none".to_string(),
    });
    lines
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn simulated_weight_stays_near_base() {
        for step in 0..14 {
            let weight = simulated_weight(step);
            assert!((24.8..=25.2).contains(&weight), "{weight}");
        }
        assert_eq!(format_weight(simulated_weight(3)), "25.00");
    }

    #[test]
    fn pick_candidate_is_one_based() {
        let devices = vec![
            DeviceHandle::new("a", Some("Left".to_string())),
            DeviceHandle::new("b", None),
        ];
        assert_eq!(pick_candidate(&devices, " 2\n"), Some(devices[1].clone()));
        assert_eq!(pick_candidate(&devices, "0"), None);
        assert_eq!(pick_candidate(&devices, "3"), None);
        assert_eq!(pick_candidate(&devices, ""), None);
    }
}
