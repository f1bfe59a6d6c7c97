//! Bluetooth through a native shell that owns the radio.
//!
//! When the station runs inside a packaged native app, the shell exposes a
//! small BLE plugin surface ([`NativeBleBridge`]) and this adapter drives it.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::gatt::{decode_weight_payload, GattScheme};
use super::{BluetoothAdapter, SinkSlot, TransportError, WeightSink};
use crate::models::{DeviceHandle, WeightSample};

/// Callback invoked with the raw characteristic value of each notification
pub type NotificationHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("Bluetooth LE is not available: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Failed(String),
}

/// BLE plugin surface offered by a native host shell.
#[async_trait]
pub trait NativeBleBridge: Send + Sync {
    async fn initialize(&self) -> Result<(), BridgeError>;

    /// Show the native chooser filtered to `service`. `None` when dismissed.
    async fn request_device(&self, service: Uuid) -> Result<Option<DeviceHandle>, BridgeError>;

    async fn connect(&self, device_id: &str) -> Result<(), BridgeError>;

    async fn disconnect(&self, device_id: &str) -> Result<(), BridgeError>;

    async fn start_notifications(
        &self,
        device_id: &str,
        service: Uuid,
        characteristic: Uuid,
        on_value: NotificationHandler,
    ) -> Result<(), BridgeError>;

    async fn stop_notifications(
        &self,
        device_id: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), BridgeError>;
}

pub struct NativeBridgeAdapter {
    bridge: Arc<dyn NativeBleBridge>,
    scheme: GattScheme,
    connected: Option<String>,
    notifying: bool,
    sink: SinkSlot,
}

impl NativeBridgeAdapter {
    #[must_use]
    pub fn new(bridge: Arc<dyn NativeBleBridge>, scheme: GattScheme) -> Self {
        Self {
            bridge,
            scheme,
            connected: None,
            notifying: false,
            sink: SinkSlot::default(),
        }
    }

    fn notification_handler(&self) -> NotificationHandler {
        let scheme = self.scheme;
        let sink = self.sink.clone();
        Arc::new(move |payload: &[u8]| match decode_weight_payload(scheme, payload) {
            Ok(reading) => sink.publish(WeightSample::from_kilograms(reading.kilograms())),
            Err(error) => tracing::warn!(%scheme, "Ignoring undecodable weight notification: {error}"),
        })
    }
}

#[async_trait]
impl BluetoothAdapter for NativeBridgeAdapter {
    fn kind(&self) -> &'static str {
        "native-bridge"
    }

    async fn is_available(&self) -> bool {
        match self.bridge.initialize().await {
            Ok(()) => true,
            Err(error) => {
                tracing::debug!("Native Bluetooth bridge unavailable: {error}");
                false
            }
        }
    }

    async fn request_device(&mut self) -> Result<DeviceHandle, TransportError> {
        self.bridge.initialize().await.map_err(|error| {
            tracing::debug!("Native Bluetooth bridge unavailable: {error}");
            TransportError::DeviceUnavailable
        })?;

        let device = self
            .bridge
            .request_device(self.scheme.service_uuid())
            .await
            .map_err(|error| match error {
                BridgeError::Unavailable(_) => TransportError::DeviceUnavailable,
                BridgeError::Failed(message) => TransportError::ConnectFailed(message),
            })?
            .ok_or(TransportError::UserCancelled)?;

        Ok(device)
    }

    async fn connect(&mut self, device: &DeviceHandle) -> Result<(), TransportError> {
        self.bridge
            .connect(&device.id)
            .await
            .map_err(|error| TransportError::ConnectFailed(error.to_string()))?;
        self.connected = Some(device.id.clone());
        Ok(())
    }

    async fn subscribe_to_weight(&mut self, sink: WeightSink) -> Result<(), TransportError> {
        let Some(device_id) = self.connected.clone() else {
            return Err(TransportError::NotConnected);
        };
        self.sink.replace(sink);
        if self.notifying {
            return Ok(());
        }

        self.bridge
            .start_notifications(
                &device_id,
                self.scheme.service_uuid(),
                self.scheme.characteristic_uuid(),
                self.notification_handler(),
            )
            .await
            .map_err(|error| TransportError::NotificationsUnsupported(error.to_string()))?;
        self.notifying = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        let Some(device_id) = self.connected.take() else {
            self.sink.clear();
            return;
        };

        if std::mem::take(&mut self.notifying) {
            if let Err(error) = self
                .bridge
                .stop_notifications(
                    &device_id,
                    self.scheme.service_uuid(),
                    self.scheme.characteristic_uuid(),
                )
                .await
            {
                tracing::warn!(device = %device_id, "Failed to stop weight notifications: {error}");
            }
        }
        if let Err(error) = self.bridge.disconnect(&device_id).await {
            tracing::warn!(device = %device_id, "Failed to disconnect scale: {error}");
        }
        self.sink.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct FakeBridge {
        unavailable: bool,
        dismiss_chooser: bool,
        refuse_notifications: bool,
        handler: Mutex<Option<NotificationHandler>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeBridge {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn emit(&self, payload: &[u8]) {
            let handler = self.handler.lock().unwrap().clone();
            if let Some(handler) = handler {
                handler(payload);
            }
        }
    }

    #[async_trait]
    impl NativeBleBridge for FakeBridge {
        async fn initialize(&self) -> Result<(), BridgeError> {
            if self.unavailable {
                Err(BridgeError::Unavailable("no radio".to_string()))
            } else {
                Ok(())
            }
        }

        async fn request_device(&self, service: Uuid) -> Result<Option<DeviceHandle>, BridgeError> {
            self.record(format!("request:{service}"));
            if self.dismiss_chooser {
                Ok(None)
            } else {
                Ok(Some(DeviceHandle::new("dev-1", Some("Bench".to_string()))))
            }
        }

        async fn connect(&self, device_id: &str) -> Result<(), BridgeError> {
            self.record(format!("connect:{device_id}"));
            Ok(())
        }

        async fn disconnect(&self, device_id: &str) -> Result<(), BridgeError> {
            self.record(format!("disconnect:{device_id}"));
            Ok(())
        }

        async fn start_notifications(
            &self,
            device_id: &str,
            _service: Uuid,
            _characteristic: Uuid,
            on_value: NotificationHandler,
        ) -> Result<(), BridgeError> {
            self.record(format!("start:{device_id}"));
            if self.refuse_notifications {
                return Err(BridgeError::Failed("characteristic cannot notify".to_string()));
            }
            *self.handler.lock().unwrap() = Some(on_value);
            Ok(())
        }

        async fn stop_notifications(
            &self,
            device_id: &str,
            _service: Uuid,
            _characteristic: Uuid,
        ) -> Result<(), BridgeError> {
            self.record(format!("stop:{device_id}"));
            Ok(())
        }
    }

    fn sink_into(values: Arc<Mutex<Vec<f64>>>) -> WeightSink {
        Arc::new(move |sample: WeightSample| values.lock().unwrap().push(sample.kilograms()))
    }

    #[tokio::test(flavor = "current_thread")]
    async fn decodes_notifications_into_kilograms() {
        let bridge = Arc::new(FakeBridge::default());
        let mut adapter = NativeBridgeAdapter::new(bridge.clone(), GattScheme::WeightScale);
        let values = Arc::new(Mutex::new(Vec::new()));

        let device = adapter.request_device().await.unwrap();
        adapter.connect(&device).await.unwrap();
        adapter.subscribe_to_weight(sink_into(values.clone())).await.unwrap();

        bridge.emit(&[0x00, 0xD0, 0x07]);
        bridge.emit(&[0x00]);

        assert_eq!(values.lock().unwrap().as_slice(), &[10.0]);
        assert_eq!(
            bridge.calls(),
            vec![
                "request:0000181d-0000-1000-8000-00805f9b34fb".to_string(),
                "connect:dev-1".to_string(),
                "start:dev-1".to_string(),
            ]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn dismissed_chooser_is_user_cancelled() {
        let bridge = Arc::new(FakeBridge {
            dismiss_chooser: true,
            ..FakeBridge::default()
        });
        let mut adapter = NativeBridgeAdapter::new(bridge, GattScheme::Vendor);
        assert_eq!(
            adapter.request_device().await,
            Err(TransportError::UserCancelled)
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_radio_is_device_unavailable() {
        let bridge = Arc::new(FakeBridge {
            unavailable: true,
            ..FakeBridge::default()
        });
        let mut adapter = NativeBridgeAdapter::new(bridge, GattScheme::Vendor);
        assert!(!adapter.is_available().await);
        assert_eq!(
            adapter.request_device().await,
            Err(TransportError::DeviceUnavailable)
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn refused_notifications_surface_as_unsupported() {
        let bridge = Arc::new(FakeBridge {
            refuse_notifications: true,
            ..FakeBridge::default()
        });
        let mut adapter = NativeBridgeAdapter::new(bridge, GattScheme::Vendor);
        let device = adapter.request_device().await.unwrap();
        adapter.connect(&device).await.unwrap();

        let error = adapter
            .subscribe_to_weight(Arc::new(|_| {}))
            .await
            .unwrap_err();
        assert!(matches!(error, TransportError::NotificationsUnsupported(_)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn disconnect_is_idempotent() {
        let bridge = Arc::new(FakeBridge::default());
        let mut adapter = NativeBridgeAdapter::new(bridge.clone(), GattScheme::Vendor);
        let device = adapter.request_device().await.unwrap();
        adapter.connect(&device).await.unwrap();
        adapter.subscribe_to_weight(Arc::new(|_| {})).await.unwrap();

        adapter.disconnect().await;
        adapter.disconnect().await;

        let calls = bridge.calls();
        assert_eq!(calls.iter().filter(|call| call.starts_with("stop:")).count(), 1);
        assert_eq!(
            calls.iter().filter(|call| call.starts_with("disconnect:")).count(),
            1
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn subscribe_requires_connection() {
        let bridge = Arc::new(FakeBridge::default());
        let mut adapter = NativeBridgeAdapter::new(bridge, GattScheme::Vendor);
        assert_eq!(
            adapter.subscribe_to_weight(Arc::new(|_| {})).await,
            Err(TransportError::NotConnected)
        );
    }
}
