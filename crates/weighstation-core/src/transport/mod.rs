//! Scale transports.
//!
//! Two physically different links deliver weight to the station:
//!
//! - Bluetooth LE GATT notifications, through one of the [`BluetoothAdapter`]
//!   implementations ([`HostBluetoothAdapter`] when the process talks to the
//!   host Bluetooth stack itself, [`NativeBridgeAdapter`] when a native shell
//!   owns the radio and relays GATT traffic),
//! - Wi-Fi HTTP polling of the scale's `/weight` endpoint ([`HttpPollAdapter`]).
//!
//! Every adapter publishes decoded readings into a single registered
//! [`WeightSink`]; registering again replaces the previous sink.

mod bridge;
pub mod gatt;
mod host;
mod http_poll;
pub mod mock;
mod selector;

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DeviceHandle, WeightSample};

pub use bridge::{BridgeError, NativeBleBridge, NativeBridgeAdapter, NotificationHandler};
pub use gatt::{decode_weight_payload, DecodeError, GattReading, GattScheme, WeightUnit};
pub use host::HostBluetoothAdapter;
pub use http_poll::{fetch_weight, HttpPollAdapter, WEIGHT_PATH};
pub use mock::{MockBluetoothAdapter, MockScaleHandle, MockScript};
pub use selector::{AdapterConstructor, AdapterSelector, HostEnvironment, HostKind};

/// Scale transport failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The host has no usable Bluetooth LE capability
    #[error("Bluetooth is not available on this device")]
    DeviceUnavailable,

    /// The operator dismissed the device chooser without picking a scale
    #[error("No scale was selected")]
    UserCancelled,

    /// The physical link or handshake could not be established
    #[error("Failed to connect to scale: {0}")]
    ConnectFailed(String),

    /// Connected, but the weight characteristic cannot notify
    #[error("Scale does not support weight notifications: {0}")]
    NotificationsUnsupported(String),

    /// Operation requires an established connection
    #[error("Scale is not connected")]
    NotConnected,

    /// A connect attempt is already running for this session
    #[error("A connection attempt is already in progress")]
    ConnectInProgress,
}

impl TransportError {
    /// Whether the failure came from the operator rather than the link.
    pub const fn is_user_cancellation(&self) -> bool {
        matches!(self, Self::UserCancelled)
    }
}

/// Receiver of decoded weight readings
pub type WeightSink = Arc<dyn Fn(WeightSample) + Send + Sync>;

/// Holds the one sink an adapter currently publishes to.
///
/// Clones share the slot, so a notification task can publish into whatever
/// sink is registered at the moment a reading arrives.
#[derive(Clone, Default)]
pub struct SinkSlot {
    inner: Arc<Mutex<Option<WeightSink>>>,
}

impl SinkSlot {
    pub fn replace(&self, sink: WeightSink) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    pub fn clear(&self) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_registered(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Deliver a sample to the registered sink, if any.
    pub fn publish(&self, sample: WeightSample) {
        let sink = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(sink) = sink {
            sink(sample);
        }
    }
}

impl std::fmt::Debug for SinkSlot {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SinkSlot")
            .field("registered", &self.is_registered())
            .finish()
    }
}

/// Picks one scale out of the devices a Bluetooth scan discovered.
///
/// Returning `None` means the operator dismissed the chooser.
pub trait DeviceChooser: Send + Sync {
    fn choose(&self, candidates: &[DeviceHandle]) -> Option<DeviceHandle>;
}

/// Chooser for unattended stations: takes the first discovered scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstDeviceChooser;

impl DeviceChooser for FirstDeviceChooser {
    fn choose(&self, candidates: &[DeviceHandle]) -> Option<DeviceHandle> {
        candidates.first().cloned()
    }
}

/// Capability set shared by every Bluetooth GATT adapter.
#[async_trait]
pub trait BluetoothAdapter: Send + Sync {
    /// Short label for logs (`host`, `native-bridge`, `simulated`)
    fn kind(&self) -> &'static str;

    /// Whether the host exposes Bluetooth LE at all.
    async fn is_available(&self) -> bool;

    /// Ask the host to let the operator pick a scale.
    async fn request_device(&mut self) -> Result<DeviceHandle, TransportError>;

    /// Open a GATT session to a previously selected scale.
    async fn connect(&mut self, device: &DeviceHandle) -> Result<(), TransportError>;

    /// Enable weight notifications and route every decoded reading to `sink`.
    async fn subscribe_to_weight(&mut self, sink: WeightSink) -> Result<(), TransportError>;

    /// Release notifications and the GATT link. Safe to call repeatedly and
    /// when never connected.
    async fn disconnect(&mut self);
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn sink_slot_publishes_to_latest_sink_only() {
        let slot = SinkSlot::default();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        slot.replace(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        slot.publish(WeightSample::from_kilograms(1.0));

        let counter = second.clone();
        slot.replace(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        slot.publish(WeightSample::from_kilograms(2.0));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        slot.clear();
        slot.publish(WeightSample::from_kilograms(3.0));
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert!(!slot.is_registered());
    }

    #[test]
    fn first_device_chooser_picks_first_candidate() {
        let chooser = FirstDeviceChooser;
        assert_eq!(chooser.choose(&[]), None);
        let picked = chooser.choose(&[
            DeviceHandle::new("a", None),
            DeviceHandle::new("b", None),
        ]);
        assert_eq!(picked.map(|device| device.id), Some("a".to_string()));
    }

    #[test]
    fn only_user_cancellation_is_flagged() {
        assert!(TransportError::UserCancelled.is_user_cancellation());
        assert!(!TransportError::DeviceUnavailable.is_user_cancellation());
        assert!(!TransportError::ConnectFailed("x".to_string()).is_user_cancellation());
    }
}
