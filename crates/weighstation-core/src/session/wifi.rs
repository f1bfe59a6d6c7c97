use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::{ConnectOutcome, SessionCore};
use crate::models::{ConnectionState, WeightSample};
use crate::transport::{HttpPollAdapter, TransportError};

/// Wi-Fi scale session backed by HTTP polling.
pub struct WifiSession {
    core: Arc<SessionCore<HttpPollAdapter>>,
    client: reqwest::Client,
    connect_timeout: Duration,
    poll_interval: Duration,
}

impl WifiSession {
    #[must_use]
    pub fn new(client: reqwest::Client, connect_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            core: SessionCore::new(),
            client,
            connect_timeout,
            poll_interval,
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

    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.core.has_adapter()
    }

    /// Probe the scale at `address` and start polling it.
    pub async fn connect(&self, address: &str) -> Result<ConnectOutcome, TransportError> {
        let (generation, previous) = self.core.begin()?;
        if let Some(mut previous) = previous {
            previous.disconnect();
        }

        let mut adapter = HttpPollAdapter::new(self.client.clone())
            .with_timings(self.connect_timeout, self.poll_interval);
        adapter.subscribe_to_weight(self.core.sink(generation));

        if let Err(error) = adapter.connect(address).await {
            adapter.disconnect();
            if !self.core.fail(generation) {
                return Ok(ConnectOutcome::Superseded);
            }
            tracing::warn!(address, "Wi-Fi scale connection failed: {error}");
            return Err(error);
        }

        let detail = adapter.base_url().unwrap_or(address).to_string();
        match self.core.complete(generation, adapter) {
            Ok(()) => Ok(ConnectOutcome::Connected { detail }),
            Err(mut stale) => {
                stale.disconnect();
                Ok(ConnectOutcome::Superseded)
            }
        }
    }

    /// Stop polling and return to `Disconnected` with a zero sample. Idempotent.
    pub fn disconnect(&self) {
        if let Some(mut adapter) = self.core.reset() {
            adapter.disconnect();
        }
    }
}

impl std::fmt::Debug for WifiSession {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("WifiSession")
            .field("state", &self.state())
            .field("weight", &self.weight())
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
