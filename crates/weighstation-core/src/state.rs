//! Station-wide state snapshots and operator notices.

use std::fmt;

use serde::Serialize;

use crate::models::{ConnectionState, OperatorContext, TransportKind, WeightSample};

/// Point-in-time view of the station, for status screens.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationStatus {
    pub active_transport: TransportKind,
    pub bluetooth: ConnectionState,
    pub wifi: ConnectionState,
    pub weight: WeightSample,
    pub queued_records: usize,
    pub online: bool,
    pub operator: Option<OperatorContext>,
    pub bluetooth_device: Option<String>,
}

impl StationStatus {
    /// State of whichever transport is active
    #[must_use]
    pub const fn active_state(&self) -> ConnectionState {
        match self.active_transport {
            TransportKind::Bluetooth => self.bluetooth,
            TransportKind::Wifi => self.wifi,
        }
    }

    /// Whether a weight can be recorded right now
    #[must_use]
    pub const fn can_record(&self) -> bool {
        self.operator.is_some() && self.active_state().is_connected()
    }
}

/// Notices the coordinator raises for the operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CoordinatorEvent {
    /// Ask the operator for the Wi-Fi scale address
    WifiConfigurationRequested { suggested_ip: String },
    Connected { transport: TransportKind, detail: String },
    /// Connected, but weight will not update
    LiveUpdatesUnavailable { reason: String },
    ConnectionFailed { transport: TransportKind, error: String },
    RecordSubmitted,
    RecordQueued { queued: usize },
    SyncStarted { count: usize },
    SyncCompleted { count: usize },
    SyncFailed { error: String },
}

impl fmt::Display for CoordinatorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WifiConfigurationRequested { suggested_ip } => {
                write!(f, "Enter the Wi-Fi scale address (suggested {suggested_ip})")
            }
            Self::Connected { transport, detail } => {
                write!(f, "Connected via {transport} to {detail}")
            }
            Self::LiveUpdatesUnavailable { reason } => {
                write!(f, "Connected, but weight will not update: {reason}")
            }
            Self::ConnectionFailed { transport, error } => {
                write!(f, "{transport} connection failed: {error}")
            }
            Self::RecordSubmitted => f.write_str("Weight recorded"),
            Self::RecordQueued { queued } => {
                write!(f, "Saved offline ({queued} waiting to sync)")
            }
            Self::SyncStarted { count } => write!(f, "Syncing {count} offline record(s)"),
            Self::SyncCompleted { count } => write!(f, "Synced {count} offline record(s)"),
            Self::SyncFailed { error } => write!(f, "Sync failed: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reports_active_transport_state() {
        let status = StationStatus {
            active_transport: TransportKind::Wifi,
            bluetooth: ConnectionState::Connected,
            wifi: ConnectionState::Disconnected,
            weight: WeightSample::ZERO,
            queued_records: 0,
            online: true,
            operator: None,
            bluetooth_device: None,
        };
        assert_eq!(status.active_state(), ConnectionState::Disconnected);
        assert!(!status.can_record());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = CoordinatorEvent::RecordQueued { queued: 2 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "recordQueued");
        assert_eq!(json["queued"], 2);
        assert_eq!(event.to_string(), "Saved offline (2 waiting to sync)");
    }
}
