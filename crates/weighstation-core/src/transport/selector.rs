//! Picks the Bluetooth adapter matching the host the station runs on.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::bridge::{NativeBleBridge, NativeBridgeAdapter};
use super::gatt::GattScheme;
use super::host::HostBluetoothAdapter;
use super::{BluetoothAdapter, DeviceChooser, FirstDeviceChooser};

/// Builds a fresh adapter for each Bluetooth connect attempt
pub type AdapterConstructor = Arc<dyn Fn() -> Box<dyn BluetoothAdapter> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    /// The process reaches the OS Bluetooth stack directly
    Desktop,
    /// A native shell owns the radio and exposes a BLE bridge
    NativeApp,
}

/// What the station knows about its host at startup.
#[derive(Clone, Default)]
pub struct HostEnvironment {
    native_bridge: Option<Arc<dyn NativeBleBridge>>,
}

impl HostEnvironment {
    #[must_use]
    pub fn desktop() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn native(bridge: Arc<dyn NativeBleBridge>) -> Self {
        Self {
            native_bridge: Some(bridge),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> HostKind {
        if self.native_bridge.is_some() {
            HostKind::NativeApp
        } else {
            HostKind::Desktop
        }
    }
}

impl fmt::Debug for HostEnvironment {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HostEnvironment")
            .field("kind", &self.kind())
            .finish()
    }
}

/// Stateless factory: inspects the host once per call and hands back the
/// matching adapter. Never shares an adapter between callers.
#[derive(Clone)]
pub struct AdapterSelector {
    host: HostEnvironment,
    scheme: GattScheme,
    chooser: Arc<dyn DeviceChooser>,
    scan_window: Option<Duration>,
}

impl AdapterSelector {
    #[must_use]
    pub fn new(host: HostEnvironment, scheme: GattScheme) -> Self {
        Self {
            host,
            scheme,
            chooser: Arc::new(FirstDeviceChooser),
            scan_window: None,
        }
    }

    #[must_use]
    pub fn with_chooser(mut self, chooser: Arc<dyn DeviceChooser>) -> Self {
        self.chooser = chooser;
        self
    }

    #[must_use]
    pub const fn with_scan_window(mut self, scan_window: Duration) -> Self {
        self.scan_window = Some(scan_window);
        self
    }

    #[must_use]
    pub const fn host_kind(&self) -> HostKind {
        self.host.kind()
    }

    #[must_use]
    pub fn create_adapter(&self) -> Box<dyn BluetoothAdapter> {
        match &self.host.native_bridge {
            Some(bridge) => Box::new(NativeBridgeAdapter::new(bridge.clone(), self.scheme)),
            None => {
                let mut adapter = HostBluetoothAdapter::new(self.scheme, self.chooser.clone());
                if let Some(window) = self.scan_window {
                    adapter = adapter.with_scan_window(window);
                }
                Box::new(adapter)
            }
        }
    }

    #[must_use]
    pub fn into_constructor(self) -> AdapterConstructor {
        Arc::new(move || self.create_adapter())
    }
}

impl fmt::Debug for AdapterSelector {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AdapterSelector")
            .field("host", &self.host.kind())
            .field("scheme", &self.scheme)
            .field("scan_window", &self.scan_window)
            .finish_non_exhaustive()
    }
}
