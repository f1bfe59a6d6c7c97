use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use super::{ConnectOutcome, SessionCore};
use crate::models::{ConnectionState, DeviceHandle, WeightSample};
use crate::transport::{AdapterConstructor, BluetoothAdapter, TransportError};

type AdapterBox = Box<dyn BluetoothAdapter>;

/// Bluetooth scale session.
///
/// Builds a fresh adapter for every connect attempt and keeps it until the
/// next `disconnect()`.
pub struct BluetoothSession {
    core: Arc<SessionCore<AdapterBox>>,
    constructor: AdapterConstructor,
    device: Mutex<Option<DeviceHandle>>,
}

impl BluetoothSession {
    #[must_use]
    pub fn new(constructor: AdapterConstructor) -> Self {
        Self {
            core: SessionCore::new(),
            constructor,
            device: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.core.state()
    }

    #[must_use]
    pub fn weight(&self) -> WeightSample {
        self.core.weight()
    }

    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.core.subscribe_state()
    }

    #[must_use]
    pub fn subscribe_weight(&self) -> watch::Receiver<WeightSample> {
        self.core.subscribe_weight()
    }

    /// Scale picked during the current connection
    #[must_use]
    pub fn device(&self) -> Option<DeviceHandle> {
        self.device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the host exposes Bluetooth LE at all. No side effects.
    pub async fn is_available(&self) -> bool {
        (self.constructor)().is_available().await
    }

    /// Pick a scale, open GATT and subscribe to weight notifications.
    ///
    /// A scale that connects but cannot notify still counts as connected;
    /// the outcome carries the reason instead.
    pub async fn connect(&self) -> Result<ConnectOutcome, TransportError> {
        let (generation, previous) = self.core.begin()?;
        if let Some(mut previous) = previous {
            previous.disconnect().await;
        }

        let mut adapter = (self.constructor)();
        tracing::info!(adapter = adapter.kind(), "Connecting to Bluetooth scale");

        let device = match open(adapter.as_mut()).await {
            Ok(device) => device,
            Err(error) => return self.abandon(generation, adapter, error).await,
        };

        let degraded = match adapter.subscribe_to_weight(self.core.sink(generation)).await {
            Ok(()) => None,
            Err(TransportError::NotificationsUnsupported(reason)) => Some(reason),
            Err(error) => return self.abandon(generation, adapter, error).await,
        };

        if let Err(mut stale) = self.core.complete(generation, adapter) {
            stale.disconnect().await;
            tracing::debug!(device = %device, "Bluetooth connect finished after being superseded");
            return Ok(ConnectOutcome::Superseded);
        }
        *self.device.lock().unwrap_or_else(PoisonError::into_inner) = Some(device.clone());

        let detail = device.display_name().to_string();
        Ok(match degraded {
            None => {
                tracing::info!(device = %device, "Bluetooth scale connected");
                ConnectOutcome::Connected { detail }
            }
            Some(reason) => {
                tracing::warn!(device = %device, "Bluetooth scale connected without weight updates: {reason}");
                ConnectOutcome::ConnectedWithoutUpdates { detail, reason }
            }
        })
    }

    async fn abandon(
        &self,
        generation: u64,
        mut adapter: AdapterBox,
        error: TransportError,
    ) -> Result<ConnectOutcome, TransportError> {
        adapter.disconnect().await;
        if self.core.fail(generation) {
            if error.is_user_cancellation() {
                tracing::info!("Bluetooth device selection cancelled");
            } else {
                tracing::warn!("Bluetooth connection failed: {error}");
            }
            Err(error)
        } else {
            Ok(ConnectOutcome::Superseded)
        }
    }

    /// Return to `Disconnected`, release the adapter and zero the sample.
    /// Idempotent.
    pub async fn disconnect(&self) {
        let adapter = self.core.reset();
        self.device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut adapter) = adapter {
            adapter.disconnect().await;
            tracing::info!("Bluetooth scale disconnected");
        }
    }
}

async fn open(adapter: &mut dyn BluetoothAdapter) -> Result<DeviceHandle, TransportError> {
    if !adapter.is_available().await {
        return Err(TransportError::DeviceUnavailable);
    }
    let device = adapter.request_device().await?;
    adapter.connect(&device).await?;
    Ok(device)
}

impl Drop for BluetoothSession {
    fn drop(&mut self) {
        let Some(mut adapter) = self.core.reset() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { adapter.disconnect().await });
            }
            Err(_) => tracing::warn!("Bluetooth session dropped outside a runtime while connected"),
        }
    }
}

impl std::fmt::Debug for BluetoothSession {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("BluetoothSession")
            .field("state", &self.state())
            .field("weight", &self.weight())
            .field("device", &self.device())
            .finish_non_exhaustive()
    }
}
