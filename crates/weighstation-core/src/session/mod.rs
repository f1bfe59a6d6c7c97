//! Scale sessions: one per transport.
//!
//! A session owns the adapter for its transport, drives the
//! `Disconnected -> Connecting -> {Connected | Disconnected}` state machine
//! and republishes the latest weight sample.
//!
//! Every connect attempt gets a generation number. `disconnect()` and newer
//! attempts bump the generation, so an attempt that resolves late tears down
//! its own adapter and reports [`ConnectOutcome::Superseded`] instead of
//! touching session state. Samples published under an old generation are
//! dropped.

mod bluetooth;
mod wifi;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;

use crate::models::{ConnectionState, WeightSample};
use crate::transport::{TransportError, WeightSink};

pub use bluetooth::BluetoothSession;
pub use wifi::WifiSession;

/// Result of a connect call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Connected; `detail` names the device or address
    Connected { detail: String },
    /// Connected, but the scale will never push weight updates
    ConnectedWithoutUpdates { detail: String, reason: String },
    /// A disconnect or newer attempt overtook this one
    Superseded,
}

impl ConnectOutcome {
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        !matches!(self, Self::Superseded)
    }
}

struct Inner<A> {
    generation: u64,
    pending: Option<u64>,
    adapter: Option<A>,
}

/// Bookkeeping shared by both sessions.
///
/// The lock is only held for synchronous updates; adapters are moved out of
/// it before any `.await`.
pub(crate) struct SessionCore<A> {
    inner: Mutex<Inner<A>>,
    state: watch::Sender<ConnectionState>,
    weight: watch::Sender<WeightSample>,
}

impl<A: Send + 'static> SessionCore<A> {
    pub(crate) fn new() -> Arc<Self> {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (weight, _) = watch::channel(WeightSample::ZERO);
        Arc::new(Self {
            inner: Mutex::new(Inner {
                generation: 0,
                pending: None,
                adapter: None,
            }),
            state,
            weight,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner<A>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a new attempt. Hands back the previous adapter for teardown.
    pub(crate) fn begin(&self) -> Result<(u64, Option<A>), TransportError> {
        let mut inner = self.lock();
        if inner.pending.is_some() {
            return Err(TransportError::ConnectInProgress);
        }
        inner.generation += 1;
        let generation = inner.generation;
        inner.pending = Some(generation);
        let previous = inner.adapter.take();
        self.state.send_replace(ConnectionState::Connecting);
        Ok((generation, previous))
    }

    /// Install the adapter of a successful attempt. Returns it back if the
    /// attempt was overtaken.
    pub(crate) fn complete(&self, generation: u64, adapter: A) -> Result<(), A> {
        let mut inner = self.lock();
        if inner.generation != generation {
            return Err(adapter);
        }
        inner.pending = None;
        inner.adapter = Some(adapter);
        self.state.send_replace(ConnectionState::Connected);
        Ok(())
    }

    /// Close a failed attempt. `false` when the attempt was already overtaken.
    pub(crate) fn fail(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        inner.pending = None;
        self.state.send_replace(ConnectionState::Disconnected);
        self.weight.send_replace(WeightSample::ZERO);
        true
    }

    /// Force `Disconnected`, invalidating any attempt in flight.
    pub(crate) fn reset(&self) -> Option<A> {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.pending = None;
        self.state.send_replace(ConnectionState::Disconnected);
        self.weight.send_replace(WeightSample::ZERO);
        inner.adapter.take()
    }

    pub(crate) fn has_adapter(&self) -> bool {
        self.lock().adapter.is_some()
    }

    fn publish(&self, generation: u64, sample: WeightSample) {
        let inner = self.lock();
        if inner.generation == generation {
            self.weight.send_replace(sample);
        }
    }

    /// Sink bound to one attempt. Holds the core weakly so an adapter stored
    /// inside the core does not keep it alive.
    pub(crate) fn sink(self: &Arc<Self>, generation: u64) -> WeightSink {
        let core: Weak<Self> = Arc::downgrade(self);
        Arc::new(move |sample| {
            if let Some(core) = core.upgrade() {
                core.publish(generation, sample);
            }
        })
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub(crate) fn weight(&self) -> WeightSample {
        *self.weight.borrow()
    }

    pub(crate) fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub(crate) fn subscribe_weight(&self) -> watch::Receiver<WeightSample> {
        self.weight.subscribe()
    }
}
