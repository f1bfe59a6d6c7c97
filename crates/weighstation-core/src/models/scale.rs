//! Scale-side model: devices, connection state and weight samples

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier and optional display name of a paired physical scale.
///
/// Owned by the adapter that discovered it; handles are never shared
/// between adapters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceHandle {
    /// Host-assigned opaque identifier
    pub id: String,
    /// Advertised name, when the host exposes one
    pub name: Option<String>,
}

impl DeviceHandle {
    #[must_use]
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: crate::util::normalize_text_option(name),
        }
    }

    /// Name suitable for operator notices
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("scale device")
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} ({})", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Connection state of one transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two physical ways a station reaches its scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Bluetooth,
    Wifi,
}

impl TransportKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Bluetooth => "Bluetooth",
            Self::Wifi => "Wi-Fi",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Latest weight reported by a transport, in kilograms.
///
/// Only the current sample is kept; every update overwrites the previous one.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightSample(f64);

impl WeightSample {
    pub const ZERO: Self = Self(0.0);

    /// Build a sample from a decoded reading.
    ///
    /// Negative (tare underflow) and non-finite readings clamp to zero.
    #[must_use]
    pub fn from_kilograms(kilograms: f64) -> Self {
        if kilograms.is_finite() && kilograms > 0.0 {
            Self(kilograms)
        } else {
            Self::ZERO
        }
    }

    #[must_use]
    pub const fn kilograms(self) -> f64 {
        self.0
    }
}

impl fmt::Display for WeightSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} kg", crate::util::format_weight(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_sample_clamps_invalid_readings() {
        assert_eq!(WeightSample::from_kilograms(-3.2), WeightSample::ZERO);
        assert_eq!(WeightSample::from_kilograms(f64::NAN), WeightSample::ZERO);
        assert_eq!(
            WeightSample::from_kilograms(f64::INFINITY),
            WeightSample::ZERO
        );
        assert!((WeightSample::from_kilograms(42.5).kilograms() - 42.5).abs() < f64::EPSILON);
    }

    #[test]
    fn weight_sample_displays_two_decimals() {
        assert_eq!(WeightSample::from_kilograms(10.0).to_string(), "10.00 kg");
    }

    #[test]
    fn device_handle_display_name_falls_back() {
        let unnamed = DeviceHandle::new("AA:BB", Some("  ".to_string()));
        assert_eq!(unnamed.name, None);
        assert_eq!(unnamed.display_name(), "scale device");

        let named = DeviceHandle::new("AA:BB", Some("Floor Scale".to_string()));
        assert_eq!(named.to_string(), "Floor Scale (AA:BB)");
    }

    #[test]
    fn connection_state_serializes_lowercase() {
        let json = serde_json::to_string(&ConnectionState::Connecting).unwrap();
        assert_eq!(json, "\"connecting\"");
        assert_eq!(TransportKind::Wifi.to_string(), "Wi-Fi");
    }
}
