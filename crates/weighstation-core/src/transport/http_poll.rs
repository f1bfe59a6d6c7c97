//! Wi-Fi scale link: periodic HTTP polling of `GET {base}/weight`.

use std::time::Duration;

use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{SinkSlot, TransportError, WeightSink};
use crate::models::WeightSample;
use crate::util::{compact_text, scale_base_url};

pub const WEIGHT_PATH: &str = "/weight";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct WeightPayload {
    #[serde(default)]
    weight: Option<f64>,
}

/// Fetch one reading from a Wi-Fi scale.
///
/// A missing or `null` `weight` field reads as zero.
pub async fn fetch_weight(
    client: &reqwest::Client,
    base_url: &str,
    timeout: Duration,
) -> Result<WeightSample, TransportError> {
    let url = format!("{base_url}{WEIGHT_PATH}");
    let response = client
        .get(&url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|error| TransportError::ConnectFailed(error.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = compact_text(&body);
        return Err(TransportError::ConnectFailed(if detail.is_empty() {
            format!("scale returned HTTP {status}")
        } else {
            format!("scale returned HTTP {status}: {detail}")
        }));
    }

    let payload: WeightPayload = response
        .json()
        .await
        .map_err(|error| TransportError::ConnectFailed(format!("invalid weight payload: {error}")))?;
    Ok(WeightSample::from_kilograms(payload.weight.unwrap_or(0.0)))
}

struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollTask {
    fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Polls a Wi-Fi scale for weight readings.
///
/// At most one poll loop runs per adapter; reconnecting stops the previous
/// loop first, and dropping the adapter stops it too.
pub struct HttpPollAdapter {
    client: reqwest::Client,
    connect_timeout: Duration,
    poll_interval: Duration,
    sink: SinkSlot,
    base_url: Option<String>,
    poll: Option<PollTask>,
}

impl HttpPollAdapter {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            sink: SinkSlot::default(),
            base_url: None,
            poll: None,
        }
    }

    #[must_use]
    pub const fn with_timings(mut self, connect_timeout: Duration, poll_interval: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.poll_interval = poll_interval;
        self
    }

    /// Register the one sink that receives readings, replacing any previous one.
    pub fn subscribe_to_weight(&self, sink: WeightSink) {
        self.sink.replace(sink);
    }

    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    #[must_use]
    pub const fn is_polling(&self) -> bool {
        self.poll.is_some()
    }

    /// Probe the scale at `address`, publish the first reading and start polling.
    pub async fn connect(&mut self, address: &str) -> Result<WeightSample, TransportError> {
        self.stop_polling();

        let base_url = scale_base_url(address).ok_or_else(|| {
            TransportError::ConnectFailed("scale address must not be empty".to_string())
        })?;
        let initial = fetch_weight(&self.client, &base_url, self.connect_timeout).await?;
        self.sink.publish(initial);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(
            self.client.clone(),
            base_url.clone(),
            self.poll_interval,
            self.connect_timeout,
            self.sink.clone(),
            cancel.clone(),
        ));
        self.poll = Some(PollTask { cancel, handle });

        tracing::info!(scale = %base_url, "Wi-Fi scale connected");
        self.base_url = Some(base_url);
        Ok(initial)
    }

    /// Stop polling. Idempotent.
    pub fn disconnect(&mut self) {
        self.stop_polling();
        if let Some(base_url) = self.base_url.take() {
            tracing::info!(scale = %base_url, "Wi-Fi scale disconnected");
        }
    }

    fn stop_polling(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.stop();
        }
    }
}

impl Drop for HttpPollAdapter {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

impl std::fmt::Debug for HttpPollAdapter {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpPollAdapter")
            .field("base_url", &self.base_url)
            .field("poll_interval", &self.poll_interval)
            .field("polling", &self.poll.is_some())
            .finish_non_exhaustive()
    }
}

async fn poll_loop(
    client: reqwest::Client,
    base_url: String,
    period: Duration,
    timeout: Duration,
    sink: SinkSlot,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            () = cancel.cancelled() => break,
            fetched = fetch_weight(&client, &base_url, timeout) => fetched,
        };

        match fetched {
            Ok(sample) => sink.publish(sample),
            Err(error) => {
                tracing::warn!(scale = %base_url, "Wi-Fi weight poll failed: {error}");
            }
        }
    }
}
