//! Background reachability checks that drive the coordinator's online flag.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::coordinator::{ConnectionCoordinator, SyncOutcome};
use crate::submit::RelayClient;

#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

#[async_trait]
impl ConnectivityProbe for RelayClient {
    async fn is_online(&self) -> bool {
        match self.check_health().await {
            Ok(()) => true,
            Err(error) => {
                tracing::debug!(relay = %self.base_url(), "Relay health check failed: {error}");
                false
            }
        }
    }
}

/// Periodically probes connectivity and reports every result to the
/// coordinator, which only acts on offline-to-online changes.
pub struct ConnectivityMonitor {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ConnectivityMonitor {
    #[must_use]
    pub fn spawn(
        coordinator: Arc<ConnectionCoordinator>,
        probe: Arc<dyn ConnectivityProbe>,
        interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(coordinator, probe, interval, cancel.clone()));
        Self { cancel, handle }
    }

    /// Stop probing and wait for the task to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(error) = self.handle.await {
            tracing::warn!("Connectivity monitor ended abnormally: {error}");
        }
    }
}

async fn run(
    coordinator: Arc<ConnectionCoordinator>,
    probe: Arc<dyn ConnectivityProbe>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let online = tokio::select! {
            () = cancel.cancelled() => break,
            online = probe.is_online() => online,
        };

        match coordinator.on_network_status_change(online).await {
            SyncOutcome::Failed(error) => {
                tracing::warn!("Sync after reconnect failed: {error}");
            }
            SyncOutcome::Flushed(count) => {
                tracing::debug!(count, "Sync after reconnect finished");
            }
            SyncOutcome::Skipped
            | SyncOutcome::Offline
            | SyncOutcome::InProgress => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::coordinator::CoordinatorOptions;
    use crate::models::{ShiftEvent, TransportKind, WeightRecord};
    use crate::submit::{RecordSubmitter, ShiftEventSubmitter, SubmitResult};
    use crate::transport::{MockScaleHandle, MockScript};

    /// Replays a fixed sequence, then stays at the last value.
    struct ScriptedProbe {
        answers: Mutex<VecDeque<bool>>,
        last: Mutex<bool>,
    }

    impl ScriptedProbe {
        fn new(answers: &[bool]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().copied().collect()),
                last: Mutex::new(false),
            }
        }
    }

    #[async_trait]
    impl ConnectivityProbe for ScriptedProbe {
        async fn is_online(&self) -> bool {
            let next = self.answers.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = next {
                *last = next;
            }
            *last
        }
    }

    #[derive(Default)]
    struct CountingRelay {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RecordSubmitter for CountingRelay {
        async fn submit_records(&self, _records: &[WeightRecord]) -> SubmitResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl ShiftEventSubmitter for CountingRelay {
        async fn submit_shift_event(&self, _event: &ShiftEvent) -> SubmitResult<()> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn reconnect_triggers_exactly_one_flush() {
        let relay = Arc::new(CountingRelay::default());
        let scale = MockScaleHandle::new();
        let (coordinator, _events) = ConnectionCoordinator::new(
            CoordinatorOptions {
                initially_online: false,
                ..CoordinatorOptions::default()
            },
            scale.constructor(MockScript::healthy()),
            relay.clone(),
            relay.clone(),
        );
        let coordinator = Arc::new(coordinator);
        coordinator.start_shift("Alice", "Flour-25kg").unwrap();
        coordinator.switch_to(TransportKind::Bluetooth).await;
        coordinator.record_weight().await.unwrap();
        assert_eq!(coordinator.queue().len(), 1);

        let monitor = ConnectivityMonitor::spawn(
            coordinator.clone(),
            Arc::new(ScriptedProbe::new(&[false, true, true, true])),
            Duration::from_millis(10),
        );
        tokio::time::sleep(Duration::from_millis(120)).await;
        monitor.stop().await;

        assert!(coordinator.is_online());
        assert!(coordinator.queue().is_empty());
        assert_eq!(relay.calls.load(Ordering::SeqCst), 1);
    }
}
