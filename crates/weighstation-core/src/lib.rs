//! weighstation-core - Core library for weighstation
//!
//! Scale connectivity for an industrial weighing kiosk: Bluetooth GATT and
//! Wi-Fi HTTP transports behind one session contract, the connection
//! coordinator that routes between them, and the offline queue that holds
//! weight records while the sheet relay is unreachable.

pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod error;
pub mod models;
pub mod queue;
pub mod session;
pub mod state;
pub mod submit;
pub mod transport;
pub mod util;

pub use config::KioskConfig;
pub use connectivity::{ConnectivityMonitor, ConnectivityProbe};
pub use coordinator::{
    ConnectionCoordinator, CoordinatorOptions, RecordOutcome, SwitchOutcome, SyncOutcome,
};
pub use error::{Error, Result};
pub use models::{
    ConnectionState, DeviceHandle, OperatorContext, ShiftAction, ShiftEvent, TransportKind,
    WeightRecord, WeightSample,
};
pub use queue::{FlushOutcome, OfflineQueue};
pub use session::{BluetoothSession, ConnectOutcome, WifiSession};
pub use state::{CoordinatorEvent, StationStatus};
pub use submit::{RecordSubmitter, RelayClient, ShiftEventSubmitter, SubmitError};
pub use transport::{TransportError, WeightSink};
