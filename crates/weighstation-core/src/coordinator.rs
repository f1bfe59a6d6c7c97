//! The connection coordinator: the single entry point a kiosk screen drives.
//!
//! It owns both scale sessions, tracks which transport is active, routes a
//! failed Bluetooth attempt to Wi-Fi configuration, turns the current sample
//! into weight records and decides whether a record is submitted or queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::KioskConfig;
use crate::error::{Error, Result};
use crate::models::{
    ConnectionState, OperatorContext, ShiftAction, ShiftEvent, TransportKind, WeightRecord,
    WeightSample,
};
use crate::queue::{FlushOutcome, OfflineQueue};
use crate::session::{BluetoothSession, ConnectOutcome, WifiSession};
use crate::state::{CoordinatorEvent, StationStatus};
use crate::submit::{dispatch_shift_event, RecordSubmitter, ShiftEventSubmitter};
use crate::transport::{AdapterConstructor, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorOptions {
    pub machine_name: String,
    pub suggested_wifi_ip: String,
    pub connect_timeout: Duration,
    pub poll_interval: Duration,
    pub initially_online: bool,
}

impl From<&KioskConfig> for CoordinatorOptions {
    fn from(config: &KioskConfig) -> Self {
        Self {
            machine_name: config.machine_name.clone(),
            suggested_wifi_ip: config.wifi_ip.clone(),
            connect_timeout: config.connect_timeout,
            poll_interval: config.poll_interval,
            initially_online: config.relay_url.is_some(),
        }
    }
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        let mut options = Self::from(&KioskConfig::default());
        options.initially_online = true;
        options
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// Bluetooth is up, possibly without live weight updates
    BluetoothConnected(ConnectOutcome),
    /// The operator dismissed the device chooser; nothing changed
    Cancelled,
    /// Another Bluetooth attempt is running or overtook this one
    Unchanged,
    /// Bluetooth failed; Wi-Fi is now active and waits for an address
    FellBackToWifi { error: TransportError },
    /// Wi-Fi selected; waits for an address
    AwaitingWifiAddress,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Submitted(WeightRecord),
    Queued { record: WeightRecord, queued: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No flush was needed
    Skipped,
    /// The station is offline
    Offline,
    /// A flush was already running
    InProgress,
    Flushed(usize),
    /// The batch was rejected and stays queued
    Failed(String),
}

pub struct ConnectionCoordinator {
    bluetooth: BluetoothSession,
    wifi: WifiSession,
    active: Mutex<TransportKind>,
    queue: OfflineQueue,
    online: AtomicBool,
    records: Arc<dyn RecordSubmitter>,
    shifts: Arc<dyn ShiftEventSubmitter>,
    operator: Mutex<Option<OperatorContext>>,
    machine_name: String,
    suggested_wifi_ip: String,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ConnectionCoordinator {
    /// Build a coordinator and the receiver for its operator notices.
    #[must_use]
    pub fn new(
        options: CoordinatorOptions,
        adapters: AdapterConstructor,
        records: Arc<dyn RecordSubmitter>,
        shifts: Arc<dyn ShiftEventSubmitter>,
    ) -> (Self, mpsc::UnboundedReceiver<CoordinatorEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let coordinator = Self {
            bluetooth: BluetoothSession::new(adapters),
            wifi: WifiSession::new(
                reqwest::Client::new(),
                options.connect_timeout,
                options.poll_interval,
            ),
            active: Mutex::new(TransportKind::default()),
            queue: OfflineQueue::new(),
            online: AtomicBool::new(options.initially_online),
            records,
            shifts,
            operator: Mutex::new(None),
            machine_name: options.machine_name,
            suggested_wifi_ip: options.suggested_wifi_ip,
            events,
        };
        (coordinator, receiver)
    }

    #[must_use]
    pub const fn bluetooth(&self) -> &BluetoothSession {
        &self.bluetooth
    }

    #[must_use]
    pub const fn wifi(&self) -> &WifiSession {
        &self.wifi
    }

    #[must_use]
    pub const fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    #[must_use]
    pub fn active_transport(&self) -> TransportKind {
        *lock(&self.active)
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn operator_context(&self) -> Option<OperatorContext> {
        lock(&self.operator).clone()
    }

    #[must_use]
    pub fn suggested_wifi_ip(&self) -> &str {
        &self.suggested_wifi_ip
    }

    fn set_active(&self, transport: TransportKind) {
        let previous = std::mem::replace(&mut *lock(&self.active), transport);
        if previous != transport {
            tracing::info!(%transport, "Active transport changed");
        }
    }

    fn emit(&self, event: CoordinatorEvent) {
        let _ = self.events.send(event);
    }

    fn request_wifi_configuration(&self) {
        self.emit(CoordinatorEvent::WifiConfigurationRequested {
            suggested_ip: self.suggested_wifi_ip.clone(),
        });
    }

    fn announce_connected(&self, transport: TransportKind, outcome: &ConnectOutcome) {
        match outcome {
            ConnectOutcome::Connected { detail } => self.emit(CoordinatorEvent::Connected {
                transport,
                detail: detail.clone(),
            }),
            ConnectOutcome::ConnectedWithoutUpdates { detail, reason } => {
                self.emit(CoordinatorEvent::Connected {
                    transport,
                    detail: detail.clone(),
                });
                self.emit(CoordinatorEvent::LiveUpdatesUnavailable {
                    reason: reason.clone(),
                });
            }
            ConnectOutcome::Superseded => {}
        }
    }

    /// Make `transport` the active one.
    ///
    /// Bluetooth connects right away; any failure other than the operator
    /// dismissing the chooser hands over to Wi-Fi and asks for an address.
    /// Wi-Fi releases Bluetooth first and asks for an address.
    pub async fn switch_to(&self, transport: TransportKind) -> SwitchOutcome {
        match transport {
            TransportKind::Bluetooth => self.switch_to_bluetooth().await,
            TransportKind::Wifi => {
                self.bluetooth.disconnect().await;
                self.set_active(TransportKind::Wifi);
                self.request_wifi_configuration();
                SwitchOutcome::AwaitingWifiAddress
            }
        }
    }

    async fn switch_to_bluetooth(&self) -> SwitchOutcome {
        self.set_active(TransportKind::Bluetooth);
        match self.bluetooth.connect().await {
            Ok(ConnectOutcome::Superseded) | Err(TransportError::ConnectInProgress) => {
                SwitchOutcome::Unchanged
            }
            Ok(outcome) => {
                self.announce_connected(TransportKind::Bluetooth, &outcome);
                SwitchOutcome::BluetoothConnected(outcome)
            }
            Err(TransportError::UserCancelled) => SwitchOutcome::Cancelled,
            Err(error) => {
                self.emit(CoordinatorEvent::ConnectionFailed {
                    transport: TransportKind::Bluetooth,
                    error: error.to_string(),
                });
                tracing::info!("Falling back to Wi-Fi after Bluetooth failure");
                self.set_active(TransportKind::Wifi);
                self.request_wifi_configuration();
                SwitchOutcome::FellBackToWifi { error }
            }
        }
    }

    /// Connect the Wi-Fi session to `address`. Leaves the active transport as is.
    pub async fn connect_wifi(&self, address: &str) -> std::result::Result<ConnectOutcome, TransportError> {
        match self.wifi.connect(address).await {
            Ok(outcome) => {
                self.announce_connected(TransportKind::Wifi, &outcome);
                Ok(outcome)
            }
            Err(error) => {
                if error != TransportError::ConnectInProgress {
                    self.emit(CoordinatorEvent::ConnectionFailed {
                        transport: TransportKind::Wifi,
                        error: error.to_string(),
                    });
                }
                Err(error)
            }
        }
    }

    /// Latest sample of the active transport; zero when it is disconnected.
    #[must_use]
    pub fn current_weight(&self) -> WeightSample {
        match self.active_transport() {
            TransportKind::Bluetooth => self.bluetooth.weight(),
            TransportKind::Wifi => self.wifi.weight(),
        }
    }

    #[must_use]
    pub fn active_state(&self) -> ConnectionState {
        match self.active_transport() {
            TransportKind::Bluetooth => self.bluetooth.state(),
            TransportKind::Wifi => self.wifi.state(),
        }
    }

    /// Capture the current weight as a record and deliver or queue it.
    pub async fn record_weight(&self) -> Result<RecordOutcome> {
        let context = self.operator_context().ok_or(Error::NoActiveShift)?;
        if !self.active_state().is_connected() {
            return Err(TransportError::NotConnected.into());
        }
        let record = WeightRecord::capture(&context, self.current_weight().kilograms());

        if self.is_online() {
            match self
                .records
                .submit_records(std::slice::from_ref(&record))
                .await
            {
                Ok(()) => {
                    tracing::info!(weight = record.weight, "Weight record submitted");
                    self.emit(CoordinatorEvent::RecordSubmitted);
                    if !self.queue.is_empty() {
                        self.flush_queue().await;
                    }
                    return Ok(RecordOutcome::Submitted(record));
                }
                Err(error) => {
                    tracing::warn!("Record submission failed, keeping it offline: {error}");
                }
            }
        }

        let queued = self.queue.enqueue(record.clone());
        tracing::info!(queued, "Weight record queued offline");
        self.emit(CoordinatorEvent::RecordQueued { queued });
        Ok(RecordOutcome::Queued { record, queued })
    }

    /// Feed the host's connectivity signal.
    ///
    /// Only a change from offline to online flushes the queue.
    pub async fn on_network_status_change(&self, online: bool) -> SyncOutcome {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        match (was_online, online) {
            (false, true) => {
                tracing::info!("Network connectivity restored");
                self.flush_queue().await
            }
            (true, false) => {
                tracing::info!("Network connectivity lost");
                SyncOutcome::Offline
            }
            (_, false) => SyncOutcome::Offline,
            (true, true) => SyncOutcome::Skipped,
        }
    }

    /// Operator-requested flush.
    pub async fn sync_now(&self) -> SyncOutcome {
        if !self.is_online() {
            return SyncOutcome::Offline;
        }
        self.flush_queue().await
    }

    async fn flush_queue(&self) -> SyncOutcome {
        let count = self.queue.len();
        if count == 0 {
            return SyncOutcome::Skipped;
        }
        if self.queue.is_flushing() {
            return SyncOutcome::InProgress;
        }

        self.emit(CoordinatorEvent::SyncStarted { count });
        match self.queue.flush(self.records.as_ref()).await {
            Ok(FlushOutcome::Flushed(flushed)) => {
                tracing::info!(flushed, "Offline records synced");
                self.emit(CoordinatorEvent::SyncCompleted { count: flushed });
                SyncOutcome::Flushed(flushed)
            }
            Ok(FlushOutcome::Empty) => SyncOutcome::Skipped,
            Ok(FlushOutcome::InProgress) => SyncOutcome::InProgress,
            Err(error) => {
                let error = error.to_string();
                tracing::warn!(queued = self.queue.len(), "Offline sync failed: {error}");
                self.emit(CoordinatorEvent::SyncFailed {
                    error: error.clone(),
                });
                SyncOutcome::Failed(error)
            }
        }
    }

    /// Begin a shift for `operator` weighing `product`.
    ///
    /// The start event is sent in the background; the returned handle
    /// resolves once that single attempt has finished.
    pub fn start_shift(&self, operator: &str, product: &str) -> Result<JoinHandle<()>> {
        let context = OperatorContext::new(self.machine_name.clone(), operator, product)?;
        {
            let mut current = lock(&self.operator);
            if current.is_some() {
                return Err(Error::InvalidInput(
                    "a shift is already active; end it before starting another".to_string(),
                ));
            }
            *current = Some(context.clone());
        }
        tracing::info!(
            operator = %context.operator_name,
            product = %context.product_type,
            machine = %context.machine_name,
            "Shift started"
        );
        Ok(dispatch_shift_event(
            self.shifts.clone(),
            ShiftEvent::now(&context, ShiftAction::Start),
        ))
    }

    /// End the active shift and release both scales.
    pub async fn end_shift(&self) -> Result<JoinHandle<()>> {
        let context = lock(&self.operator).take().ok_or(Error::NoActiveShift)?;
        let dispatched = dispatch_shift_event(
            self.shifts.clone(),
            ShiftEvent::now(&context, ShiftAction::End),
        );
        self.shutdown().await;
        tracing::info!(operator = %context.operator_name, "Shift ended");
        Ok(dispatched)
    }

    /// Disconnect both sessions, releasing timers and subscriptions.
    pub async fn shutdown(&self) {
        self.bluetooth.disconnect().await;
        self.wifi.disconnect();
    }

    #[must_use]
    pub fn status(&self) -> StationStatus {
        StationStatus {
            active_transport: self.active_transport(),
            bluetooth: self.bluetooth.state(),
            wifi: self.wifi.state(),
            weight: self.current_weight(),
            queued_records: self.queue.len(),
            online: self.is_online(),
            operator: self.operator_context(),
            bluetooth_device: self
                .bluetooth
                .device()
                .map(|device| device.display_name().to_string()),
        }
    }
}

impl std::fmt::Debug for ConnectionCoordinator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ConnectionCoordinator")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
