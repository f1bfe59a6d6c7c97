//! Bluetooth through the host operating system's BLE stack.
//!
//! Built on `btleplug` when the `host-ble` feature is enabled. Without it the
//! adapter reports Bluetooth as unavailable, which sends the station straight
//! to the Wi-Fi fallback.

use std::sync::Arc;
use std::time::Duration;

use super::gatt::GattScheme;
use super::DeviceChooser;

pub use imp::HostBluetoothAdapter;

const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(5);

#[cfg(feature = "host-ble")]
mod imp {
    use async_trait::async_trait;
    use btleplug::api::{
        CharPropFlags, Central as _, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    };
    use btleplug::platform::{Adapter, Manager, Peripheral};
    use futures::StreamExt;
    use tokio_util::sync::CancellationToken;

    use super::{Arc, DeviceChooser, Duration, GattScheme, DEFAULT_SCAN_WINDOW};
    use crate::models::{DeviceHandle, WeightSample};
    use crate::transport::gatt::decode_weight_payload;
    use crate::transport::{BluetoothAdapter, SinkSlot, TransportError, WeightSink};

    struct Subscription {
        characteristic: Characteristic,
        cancel: CancellationToken,
    }

    pub struct HostBluetoothAdapter {
        scheme: GattScheme,
        chooser: Arc<dyn DeviceChooser>,
        scan_window: Duration,
        discovered: Vec<(DeviceHandle, Peripheral)>,
        peripheral: Option<Peripheral>,
        subscription: Option<Subscription>,
        sink: SinkSlot,
    }

    impl HostBluetoothAdapter {
        #[must_use]
        pub fn new(scheme: GattScheme, chooser: Arc<dyn DeviceChooser>) -> Self {
            Self {
                scheme,
                chooser,
                scan_window: DEFAULT_SCAN_WINDOW,
                discovered: Vec::new(),
                peripheral: None,
                subscription: None,
                sink: SinkSlot::default(),
            }
        }

        #[must_use]
        pub const fn with_scan_window(mut self, scan_window: Duration) -> Self {
            self.scan_window = scan_window;
            self
        }

        async fn first_adapter() -> Option<Adapter> {
            let manager = Manager::new().await.ok()?;
            manager.adapters().await.ok()?.into_iter().next()
        }

        async fn scan(&self, central: &Adapter) -> Result<Vec<(DeviceHandle, Peripheral)>, TransportError> {
            central
                .start_scan(ScanFilter {
                    services: vec![self.scheme.service_uuid()],
                })
                .await
                .map_err(|error| {
                    tracing::debug!("Bluetooth scan could not start: {error}");
                    TransportError::DeviceUnavailable
                })?;
            tokio::time::sleep(self.scan_window).await;
            if let Err(error) = central.stop_scan().await {
                tracing::debug!("Bluetooth scan did not stop cleanly: {error}");
            }

            let peripherals = central
                .peripherals()
                .await
                .map_err(|error| TransportError::ConnectFailed(error.to_string()))?;

            let mut discovered = Vec::with_capacity(peripherals.len());
            for peripheral in peripherals {
                let name = peripheral
                    .properties()
                    .await
                    .ok()
                    .flatten()
                    .and_then(|properties| properties.local_name);
                let handle = DeviceHandle::new(format!("{:?}", peripheral.id()), name);
                discovered.push((handle, peripheral));
            }
            Ok(discovered)
        }

        fn weight_characteristic(&self, peripheral: &Peripheral) -> Option<Characteristic> {
            peripheral.characteristics().into_iter().find(|characteristic| {
                characteristic.uuid == self.scheme.characteristic_uuid()
                    && characteristic.service_uuid == self.scheme.service_uuid()
            })
        }
    }

    #[async_trait]
    impl BluetoothAdapter for HostBluetoothAdapter {
        fn kind(&self) -> &'static str {
            "host"
        }

        async fn is_available(&self) -> bool {
            Self::first_adapter().await.is_some()
        }

        async fn request_device(&mut self) -> Result<DeviceHandle, TransportError> {
            let central = Self::first_adapter()
                .await
                .ok_or(TransportError::DeviceUnavailable)?;
            let discovered = self.scan(&central).await?;
            let candidates: Vec<DeviceHandle> =
                discovered.iter().map(|(handle, _)| handle.clone()).collect();
            tracing::debug!(count = candidates.len(), "Bluetooth scan finished");

            let chooser = self.chooser.clone();
            let chosen = tokio::task::spawn_blocking(move || chooser.choose(&candidates))
                .await
                .map_err(|error| TransportError::ConnectFailed(error.to_string()))?
                .ok_or(TransportError::UserCancelled)?;

            self.discovered = discovered;
            Ok(chosen)
        }

        async fn connect(&mut self, device: &DeviceHandle) -> Result<(), TransportError> {
            let peripheral = self
                .discovered
                .iter()
                .find(|(handle, _)| handle.id == device.id)
                .map(|(_, peripheral)| peripheral.clone())
                .ok_or_else(|| {
                    TransportError::ConnectFailed(format!("{device} was not discovered"))
                })?;

            peripheral
                .connect()
                .await
                .map_err(|error| TransportError::ConnectFailed(error.to_string()))?;
            if let Err(error) = peripheral.discover_services().await {
                if let Err(cleanup) = peripheral.disconnect().await {
                    tracing::warn!("Failed to release scale after service discovery: {cleanup}");
                }
                return Err(TransportError::ConnectFailed(error.to_string()));
            }
            self.peripheral = Some(peripheral);
            Ok(())
        }

        async fn subscribe_to_weight(&mut self, sink: WeightSink) -> Result<(), TransportError> {
            let peripheral = self.peripheral.clone().ok_or(TransportError::NotConnected)?;
            self.sink.replace(sink);
            if self.subscription.is_some() {
                return Ok(());
            }

            let characteristic = self.weight_characteristic(&peripheral).ok_or_else(|| {
                TransportError::NotificationsUnsupported(format!(
                    "characteristic {} not found",
                    self.scheme.characteristic_uuid()
                ))
            })?;
            if !characteristic
                .properties
                .intersects(CharPropFlags::NOTIFY | CharPropFlags::INDICATE)
            {
                return Err(TransportError::NotificationsUnsupported(
                    "weight characteristic does not notify".to_string(),
                ));
            }

            let mut notifications = peripheral
                .notifications()
                .await
                .map_err(|error| TransportError::NotificationsUnsupported(error.to_string()))?;
            peripheral
                .subscribe(&characteristic)
                .await
                .map_err(|error| TransportError::NotificationsUnsupported(error.to_string()))?;

            let cancel = CancellationToken::new();
            let task_cancel = cancel.clone();
            let sink = self.sink.clone();
            let scheme = self.scheme;
            let uuid = characteristic.uuid;
            tokio::spawn(async move {
                loop {
                    let notification = tokio::select! {
                        () = task_cancel.cancelled() => break,
                        next = notifications.next() => match next {
                            Some(notification) => notification,
                            None => break,
                        },
                    };
                    if notification.uuid != uuid {
                        continue;
                    }
                    match decode_weight_payload(scheme, &notification.value) {
                        Ok(reading) => {
                            sink.publish(WeightSample::from_kilograms(reading.kilograms()));
                        }
                        Err(error) => {
                            tracing::warn!(%scheme, "Ignoring undecodable weight notification: {error}");
                        }
                    }
                }
            });

            self.subscription = Some(Subscription {
                characteristic,
                cancel,
            });
            Ok(())
        }

        async fn disconnect(&mut self) {
            self.sink.clear();
            let subscription = self.subscription.take();
            let Some(peripheral) = self.peripheral.take() else {
                return;
            };

            if let Some(subscription) = subscription {
                subscription.cancel.cancel();
                if let Err(error) = peripheral.unsubscribe(&subscription.characteristic).await {
                    tracing::warn!("Failed to stop weight notifications: {error}");
                }
            }
            if let Err(error) = peripheral.disconnect().await {
                tracing::warn!("Failed to disconnect scale: {error}");
            }
        }
    }
}

#[cfg(not(feature = "host-ble"))]
mod imp {
    use async_trait::async_trait;

    use super::{Arc, DeviceChooser, Duration, GattScheme, DEFAULT_SCAN_WINDOW};
    use crate::models::DeviceHandle;
    use crate::transport::{BluetoothAdapter, TransportError, WeightSink};

    /// Stand-in used when the crate is built without host Bluetooth support.
    pub struct HostBluetoothAdapter {
        scheme: GattScheme,
        scan_window: Duration,
    }

    impl HostBluetoothAdapter {
        #[must_use]
        pub fn new(scheme: GattScheme, _chooser: Arc<dyn DeviceChooser>) -> Self {
            Self {
                scheme,
                scan_window: DEFAULT_SCAN_WINDOW,
            }
        }

        #[must_use]
        pub const fn with_scan_window(mut self, scan_window: Duration) -> Self {
            self.scan_window = scan_window;
            self
        }
    }

    #[async_trait]
    impl BluetoothAdapter for HostBluetoothAdapter {
        fn kind(&self) -> &'static str {
            "host"
        }

        async fn is_available(&self) -> bool {
            false
        }

        async fn request_device(&mut self) -> Result<DeviceHandle, TransportError> {
            tracing::debug!(
                scheme = %self.scheme,
                scan_window = ?self.scan_window,
                "Host Bluetooth support not compiled in"
            );
            Err(TransportError::DeviceUnavailable)
        }

        async fn connect(&mut self, _device: &DeviceHandle) -> Result<(), TransportError> {
            Err(TransportError::DeviceUnavailable)
        }

        async fn subscribe_to_weight(&mut self, _sink: WeightSink) -> Result<(), TransportError> {
            Err(TransportError::NotConnected)
        }

        async fn disconnect(&mut self) {}
    }
}

#[cfg(all(test, not(feature = "host-ble")))]
mod tests {
    use super::*;
    use crate::transport::{BluetoothAdapter, FirstDeviceChooser, TransportError};

    #[tokio::test(flavor = "current_thread")]
    async fn without_host_support_bluetooth_is_unavailable() {
        let mut adapter = HostBluetoothAdapter::new(GattScheme::Vendor, Arc::new(FirstDeviceChooser));
        assert!(!adapter.is_available().await);
        assert_eq!(
            adapter.request_device().await,
            Err(TransportError::DeviceUnavailable)
        );
        adapter.disconnect().await;
    }
}
