//! Scripted Bluetooth adapter for tests and the simulated station mode.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::selector::AdapterConstructor;
use super::{BluetoothAdapter, SinkSlot, TransportError, WeightSink};
use crate::models::{DeviceHandle, WeightSample};

/// How a simulated scale behaves across one connect sequence.
#[derive(Debug, Clone)]
pub struct MockScript {
    pub available: bool,
    /// Device the chooser returns; `None` dismisses the chooser.
    pub device: Option<DeviceHandle>,
    pub connect_error: Option<TransportError>,
    pub notifications_supported: bool,
    pub connect_delay: Duration,
}

impl MockScript {
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            available: true,
            device: Some(DeviceHandle::new(
                "sim-scale-1",
                Some("Simulated Scale".to_string()),
            )),
            connect_error: None,
            notifications_supported: true,
            connect_delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::healthy()
        }
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self {
            device: None,
            ..Self::healthy()
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            connect_error: Some(TransportError::ConnectFailed(message.into())),
            ..Self::healthy()
        }
    }

    #[must_use]
    pub fn without_notifications() -> Self {
        Self {
            notifications_supported: false,
            ..Self::healthy()
        }
    }

    #[must_use]
    pub const fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }
}

impl Default for MockScript {
    fn default() -> Self {
        Self::healthy()
    }
}

#[derive(Debug, Default)]
struct MockStats {
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    live_adapters: AtomicUsize,
}

/// Test-side view of every adapter built from the same handle.
///
/// Pushing a weight publishes it through whichever adapter currently has a
/// subscriber, like a physical scale notifying its connected central.
#[derive(Debug, Clone, Default)]
pub struct MockScaleHandle {
    sink: SinkSlot,
    stats: Arc<MockStats>,
}

impl MockScaleHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_weight(&self, kilograms: f64) {
        self.sink.publish(WeightSample::from_kilograms(kilograms));
    }

    #[must_use]
    pub fn connect_calls(&self) -> usize {
        self.stats.connects.load(Ordering::SeqCst)
    }

    /// Disconnects that actually released a link
    #[must_use]
    pub fn disconnect_calls(&self) -> usize {
        self.stats.disconnects.load(Ordering::SeqCst)
    }

    /// Adapters built from this handle that have not been dropped yet
    #[must_use]
    pub fn live_adapters(&self) -> usize {
        self.stats.live_adapters.load(Ordering::SeqCst)
    }

    /// Constructor producing a fresh adapter per connect attempt.
    #[must_use]
    pub fn constructor(&self, script: MockScript) -> AdapterConstructor {
        let handle = self.clone();
        Arc::new(move || -> Box<dyn BluetoothAdapter> {
            Box::new(MockBluetoothAdapter::new(script.clone(), handle.clone()))
        })
    }
}

pub struct MockBluetoothAdapter {
    script: MockScript,
    handle: MockScaleHandle,
    connected: bool,
    subscribed: bool,
}

impl MockBluetoothAdapter {
    #[must_use]
    pub fn new(script: MockScript, handle: MockScaleHandle) -> Self {
        handle.stats.live_adapters.fetch_add(1, Ordering::SeqCst);
        Self {
            script,
            handle,
            connected: false,
            subscribed: false,
        }
    }
}

impl Drop for MockBluetoothAdapter {
    fn drop(&mut self) {
        self.handle.stats.live_adapters.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BluetoothAdapter for MockBluetoothAdapter {
    fn kind(&self) -> &'static str {
        "simulated"
    }

    async fn is_available(&self) -> bool {
        self.script.available
    }

    async fn request_device(&mut self) -> Result<DeviceHandle, TransportError> {
        if !self.script.available {
            return Err(TransportError::DeviceUnavailable);
        }
        self.script
            .device
            .clone()
            .ok_or(TransportError::UserCancelled)
    }

    async fn connect(&mut self, _device: &DeviceHandle) -> Result<(), TransportError> {
        self.handle.stats.connects.fetch_add(1, Ordering::SeqCst);
        if !self.script.connect_delay.is_zero() {
            tokio::time::sleep(self.script.connect_delay).await;
        }
        if let Some(error) = self.script.connect_error.clone() {
            return Err(error);
        }
        self.connected = true;
        Ok(())
    }

    async fn subscribe_to_weight(&mut self, sink: WeightSink) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        if !self.script.notifications_supported {
            return Err(TransportError::NotificationsUnsupported(
                "simulated scale has no weight characteristic".to_string(),
            ));
        }
        self.handle.sink.replace(sink);
        self.subscribed = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        if std::mem::take(&mut self.subscribed) {
            self.handle.sink.clear();
        }
        if std::mem::take(&mut self.connected) {
            self.handle.stats.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn pushed_weights_reach_subscriber_until_disconnect() {
        let handle = MockScaleHandle::new();
        let mut adapter = MockBluetoothAdapter::new(MockScript::healthy(), handle.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();

        let device = adapter.request_device().await.unwrap();
        adapter.connect(&device).await.unwrap();
        adapter
            .subscribe_to_weight(Arc::new(move |sample: WeightSample| {
                captured.lock().unwrap().push(sample.kilograms());
            }))
            .await
            .unwrap();

        handle.push_weight(12.5);
        adapter.disconnect().await;
        adapter.disconnect().await;
        handle.push_weight(99.0);

        assert_eq!(seen.lock().unwrap().as_slice(), &[12.5]);
        assert_eq!(handle.connect_calls(), 1);
        assert_eq!(handle.disconnect_calls(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn scripts_drive_failures() {
        let handle = MockScaleHandle::new();

        let mut cancelled = MockBluetoothAdapter::new(MockScript::cancelled(), handle.clone());
        assert_eq!(
            cancelled.request_device().await,
            Err(TransportError::UserCancelled)
        );

        let mut unavailable = MockBluetoothAdapter::new(MockScript::unavailable(), handle.clone());
        assert!(!unavailable.is_available().await);
        assert_eq!(
            unavailable.request_device().await,
            Err(TransportError::DeviceUnavailable)
        );

        let mut failing = MockBluetoothAdapter::new(MockScript::failing("GATT error"), handle.clone());
        let device = failing.request_device().await.unwrap();
        assert_eq!(
            failing.connect(&device).await,
            Err(TransportError::ConnectFailed("GATT error".to_string()))
        );
        assert_eq!(handle.live_adapters(), 3);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn constructor_builds_fresh_adapters() {
        let handle = MockScaleHandle::new();
        let constructor = handle.constructor(MockScript::healthy());
        let first = constructor();
        let second = constructor();
        assert_eq!(first.kind(), "simulated");
        assert_eq!(handle.live_adapters(), 2);
        drop(first);
        drop(second);
        assert_eq!(handle.live_adapters(), 0);
    }
}
