//! In-memory FIFO of weight records awaiting delivery.
//!
//! Contents are lost when the process exits.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::WeightRecord;
use crate::submit::{RecordSubmitter, SubmitError};

#[derive(Debug, Default)]
struct QueueState {
    records: VecDeque<WeightRecord>,
    flushing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was queued
    Empty,
    /// Another flush is already draining the queue
    InProgress,
    /// The batch was accepted and this many records left the queue
    Flushed(usize),
}

/// Records captured while the relay was unreachable.
///
/// A flush submits everything queued at the time it starts as one batch.
/// The batch is removed only after the submitter accepts it; records queued
/// while the batch is in flight stay behind for the next flush.
#[derive(Debug, Default)]
pub struct OfflineQueue {
    state: Mutex<QueueState>,
}

struct FlushGuard<'a> {
    queue: &'a OfflineQueue,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.queue.lock().flushing = false;
    }
}

impl OfflineQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a record and return the new queue length.
    pub fn enqueue(&self, record: WeightRecord) -> usize {
        let mut state = self.lock();
        state.records.push_back(record);
        state.records.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    #[must_use]
    pub fn is_flushing(&self) -> bool {
        self.lock().flushing
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<WeightRecord> {
        self.lock().records.iter().cloned().collect()
    }

    /// Submit every queued record in one call.
    ///
    /// On failure the queue is left exactly as it was. Only one flush runs at
    /// a time; overlapping calls return [`FlushOutcome::InProgress`].
    pub async fn flush(&self, submitter: &dyn RecordSubmitter) -> Result<FlushOutcome, SubmitError> {
        let batch: Vec<WeightRecord> = {
            let mut state = self.lock();
            if state.flushing {
                return Ok(FlushOutcome::InProgress);
            }
            if state.records.is_empty() {
                return Ok(FlushOutcome::Empty);
            }
            state.flushing = true;
            state.records.iter().cloned().collect()
        };
        let _guard = FlushGuard { queue: self };

        submitter.submit_records(&batch).await?;

        let mut state = self.lock();
        let drained = batch.len().min(state.records.len());
        state.records.drain(..drained);
        Ok(FlushOutcome::Flushed(drained))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::models::OperatorContext;
    use crate::submit::SubmitResult;

    #[derive(Default)]
    struct ScriptedSubmitter {
        fail: AtomicBool,
        calls: AtomicUsize,
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl RecordSubmitter for ScriptedSubmitter {
        async fn submit_records(&self, records: &[WeightRecord]) -> SubmitResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(SubmitError::Api("sheet unavailable (502)".to_string()));
            }
            self.batches.lock().unwrap().push(records.len());
            Ok(())
        }
    }

    /// Blocks inside `submit_records` until released.
    struct GatedSubmitter {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl RecordSubmitter for GatedSubmitter {
        async fn submit_records(&self, _records: &[WeightRecord]) -> SubmitResult<()> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(())
        }
    }

    fn record(weight: f64) -> WeightRecord {
        let context = OperatorContext::new("SCALE 1", "Alice", "Flour-25kg").unwrap();
        WeightRecord::capture(&context, weight)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_queue_does_not_call_submitter() {
        let queue = OfflineQueue::new();
        let submitter = ScriptedSubmitter::default();
        assert_eq!(queue.flush(&submitter).await.unwrap(), FlushOutcome::Empty);
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn successful_flush_sends_one_batch_and_empties_queue() {
        let queue = OfflineQueue::new();
        for weight in [1.0, 2.0, 3.0] {
            queue.enqueue(record(weight));
        }
        let submitter = ScriptedSubmitter::default();

        assert_eq!(
            queue.flush(&submitter).await.unwrap(),
            FlushOutcome::Flushed(3)
        );
        assert!(queue.is_empty());
        assert_eq!(submitter.batches.lock().unwrap().as_slice(), &[3]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_flush_leaves_queue_untouched() {
        let queue = OfflineQueue::new();
        queue.enqueue(record(1.0));
        queue.enqueue(record(2.0));
        let before = queue.snapshot();
        let submitter = ScriptedSubmitter {
            fail: AtomicBool::new(true),
            ..ScriptedSubmitter::default()
        };

        assert!(queue.flush(&submitter).await.is_err());
        assert_eq!(queue.snapshot(), before);
        assert!(!queue.is_flushing());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn records_enqueued_during_flush_survive_it() {
        let queue = Arc::new(OfflineQueue::new());
        queue.enqueue(record(1.0));
        let submitter = Arc::new(GatedSubmitter {
            entered: Notify::new(),
            release: Notify::new(),
        });

        let flushing = {
            let queue = queue.clone();
            let submitter = submitter.clone();
            tokio::spawn(async move { queue.flush(submitter.as_ref()).await })
        };
        submitter.entered.notified().await;

        queue.enqueue(record(2.0));
        assert_eq!(
            queue.flush(submitter.as_ref()).await.unwrap(),
            FlushOutcome::InProgress
        );

        submitter.release.notify_one();
        assert_eq!(flushing.await.unwrap().unwrap(), FlushOutcome::Flushed(1));

        let remaining = queue.snapshot();
        assert_eq!(remaining.len(), 1);
        assert!((remaining[0].weight - 2.0).abs() < f64::EPSILON);
    }
}
