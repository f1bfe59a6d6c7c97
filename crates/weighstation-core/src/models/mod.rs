//! Data models for weighstation

mod record;
mod scale;

pub use record::{OperatorContext, ShiftAction, ShiftEvent, WeightRecord};
pub use scale::{ConnectionState, DeviceHandle, TransportKind, WeightSample};
