use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use weighstation_core::transport::GattScheme;
use weighstation_core::TransportKind;

#[derive(Parser)]
#[command(name = "weighstation")]
#[command(about = "Weigh, record and sync from a scale kiosk in the terminal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// CLI profile name for relay and station settings
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a shift and open the interactive weighing loop
    Run(RunArgs),
    /// Read the current weight from a Wi-Fi scale once
    Probe {
        /// Scale address, e.g. 192.168.1.100 or http://scale.local:8080
        address: String,
        /// Number of readings to take
        #[arg(short, long, default_value = "1")]
        count: u32,
        /// Seconds between readings
        #[arg(short, long, default_value = "2")]
        interval: u64,
        /// Request timeout in seconds
        #[arg(long, default_value = "5")]
        timeout: u64,
    },
    /// Decode a raw GATT weight notification given as hex
    Decode {
        /// Payload bytes, e.g. "00 d0 07" or 0x00d007
        payload: String,
        /// Characteristic layout of the payload
        #[arg(long, value_enum, default_value = "vendor")]
        scheme: SchemeArg,
    },
    /// Send a shift start or end row without opening the kiosk loop
    Shift {
        #[command(subcommand)]
        command: ShiftCommands,
    },
    /// Check that the sheet relay is reachable
    Health {
        /// Override the relay base URL
        #[arg(long, value_name = "URL")]
        relay_url: Option<String>,
    },
    /// Manage CLI profile configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Operator name for the shift
    #[arg(long)]
    pub operator: String,
    /// Product being weighed
    #[arg(long)]
    pub product: String,
    /// Machine name written on every row
    #[arg(long, value_name = "NAME")]
    pub machine: Option<String>,
    /// Transport to connect first
    #[arg(long, value_enum, default_value = "bluetooth")]
    pub transport: TransportArg,
    /// Wi-Fi scale address; connects straight away when Wi-Fi is chosen
    #[arg(long, value_name = "IP")]
    pub wifi_ip: Option<String>,
    /// Use a simulated Bluetooth scale instead of the host radio
    #[arg(long)]
    pub simulate: bool,
    /// Override the relay base URL
    #[arg(long, value_name = "URL")]
    pub relay_url: Option<String>,
    /// Do not probe the relay in the background
    #[arg(long)]
    pub no_monitor: bool,
}

#[derive(Subcommand)]
pub enum ShiftCommands {
    /// Record the start of a shift
    Start(ShiftArgs),
    /// Record the end of a shift
    End(ShiftArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ShiftArgs {
    #[arg(long)]
    pub operator: String,
    #[arg(long)]
    pub product: String,
    #[arg(long, value_name = "NAME")]
    pub machine: Option<String>,
    /// Override the relay base URL
    #[arg(long, value_name = "URL")]
    pub relay_url: Option<String>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update a profile
    Init {
        /// Profile name (defaults to --profile, WEIGHSTATION_PROFILE, active profile, then "default")
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Sheet relay base URL
        #[arg(long, value_name = "URL")]
        relay_url: Option<String>,
        /// Machine name written on every row
        #[arg(long, value_name = "NAME")]
        machine: Option<String>,
        /// Suggested Wi-Fi scale address
        #[arg(long, value_name = "IP")]
        wifi_ip: Option<String>,
        /// GATT layout of the station's Bluetooth scale
        #[arg(long, value_enum)]
        scheme: Option<SchemeArg>,
        /// Do not switch the active profile to this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved station configuration
    Show,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum TransportArg {
    Bluetooth,
    Wifi,
}

impl From<TransportArg> for TransportKind {
    fn from(value: TransportArg) -> Self {
        match value {
            TransportArg::Bluetooth => Self::Bluetooth,
            TransportArg::Wifi => Self::Wifi,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SchemeArg {
    /// Proprietary service, little-endian f32 kilograms
    Vendor,
    /// Bluetooth SIG Weight Scale service
    WeightScale,
}

impl From<SchemeArg> for GattScheme {
    fn from(value: SchemeArg) -> Self {
        match value {
            SchemeArg::Vendor => Self::Vendor,
            SchemeArg::WeightScale => Self::WeightScale,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
