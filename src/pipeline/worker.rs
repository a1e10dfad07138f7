use crate::config::PipelineConfig;
use crate::ingest::queue::IntakeReceiver;
use crate::pipeline::metrics::SharedMetrics;
use crate::pipeline::transform::{build_record, HeaderKeys};
use crate::storage::writer::EventStore;
use crate::types::EventRecord;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};

/// Fixed set of workers draining the intake queue.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

/// Everything a worker needs, shared across the pool.
struct WorkerContext {
    receiver: IntakeReceiver,
    store: Arc<dyn EventStore>,
    metrics: SharedMetrics,
    keys: HeaderKeys,
    /// Ceiling on persistence tasks running at once, across all workers.
    write_slots: Arc<Semaphore>,
    processing_delay: Duration,
}

impl WorkerPool {
    pub fn spawn(
        receiver: IntakeReceiver,
        store: Arc<dyn EventStore>,
        metrics: SharedMetrics,
        keys: HeaderKeys,
        config: &PipelineConfig,
    ) -> Self {
        let ctx = Arc::new(WorkerContext {
            receiver,
            store,
            metrics,
            keys,
            write_slots: Arc::new(Semaphore::new(config.max_in_flight_writes)),
            processing_delay: Duration::from_millis(config.processing_delay_ms),
        });

        let handles = (0..config.workers)
            .map(|id| {
                let ctx = ctx.clone();
                tokio::spawn(async move { run_worker(id, ctx).await })
            })
            .collect();

        tracing::info!(
            workers = config.workers,
            max_in_flight_writes = config.max_in_flight_writes,
            "worker pool started"
        );

        Self { handles }
    }

    /// Wait for every worker to drain the queue and finish its writes.
    ///
    /// The queue must already be closed (all producers dropped), otherwise
    /// workers keep waiting for new items until the timeout. Returns the
    /// number of workers still running when the timeout expired.
    pub async fn join(self, timeout: Duration) -> usize {
        let total = self.handles.len();
        let deadline = tokio::time::Instant::now() + timeout;
        let mut unfinished = 0usize;

        for handle in self.handles {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "worker task failed"),
                Err(_) => unfinished += 1,
            }
        }

        if unfinished > 0 {
            tracing::warn!(unfinished, "worker pool did not drain before timeout");
        } else {
            tracing::info!(workers = total, "worker pool drained");
        }
        unfinished
    }
}

async fn run_worker(id: usize, ctx: Arc<WorkerContext>) {
    let mut writes: JoinSet<()> = JoinSet::new();

    while let Some(item) = ctx.receiver.claim().await {
        // Reap finished writes so the set does not grow with throughput.
        while let Some(res) = writes.try_join_next() {
            log_join_error(id, res);
        }

        if !ctx.processing_delay.is_zero() {
            tokio::time::sleep(ctx.processing_delay).await;
        }

        let user_id = item.user_id.clone();
        let queued_ms = (chrono::Utc::now() - item.received_at).num_milliseconds();
        let record = match build_record(item, &ctx.keys) {
            Ok(record) => record,
            Err(e) => {
                ctx.metrics.record_parse_failure();
                tracing::warn!(worker = id, user_id = %user_id, error = %e, "event body failed to parse, skipping");
                continue;
            }
        };
        tracing::debug!(worker = id, user_id = %user_id, queued_ms, "event transformed");

        // Suspends while the global write ceiling is reached.
        let Ok(permit) = ctx.write_slots.clone().acquire_owned().await else {
            break;
        };

        let store = ctx.store.clone();
        let metrics = ctx.metrics.clone();
        writes.spawn(async move {
            persist(store.as_ref(), &record, &metrics).await;
            drop(permit);
        });
    }

    tracing::debug!(worker = id, in_flight = writes.len(), "queue closed, awaiting writes");
    while let Some(res) = writes.join_next().await {
        log_join_error(id, res);
    }
    tracing::debug!(worker = id, "worker stopped");
}

/// One write attempt. Failures are counted and logged; the record is dropped.
async fn persist(store: &dyn EventStore, record: &EventRecord, metrics: &SharedMetrics) {
    match store.insert(record).await {
        Ok(()) => metrics.record_write_ok(),
        Err(e) => {
            metrics.record_write_failure();
            tracing::error!(user_id = %record.user_id, error = %e, "failed to persist event, dropped");
        }
    }
}

fn log_join_error(worker: usize, res: Result<(), tokio::task::JoinError>) {
    if let Err(e) = res {
        tracing::error!(worker, error = %e, "write task failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::ingest::queue::intake_queue;
    use crate::pipeline::metrics::PipelineMetrics;
    use crate::types::RawIntakeItem;
    use async_trait::async_trait;
    use axum::body::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        records: Mutex<Vec<EventRecord>>,
        fail: bool,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl EventStore for RecordingStore {
        async fn insert(&self, record: &EventRecord) -> Result<(), StoreError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn ping(&self) -> bool {
            !self.fail
        }
    }

    fn keys() -> HeaderKeys {
        HeaderKeys {
            user_id: "X-Tantum-Authorization".to_string(),
            user_agent: "X-Tantum-UserAgent".to_string(),
        }
    }

    fn config(workers: usize, max_in_flight_writes: usize) -> PipelineConfig {
        PipelineConfig {
            workers,
            max_in_flight_writes,
            processing_delay_ms: 0,
            shutdown_timeout_secs: 5,
        }
    }

    fn item(user: &str, body: &'static str) -> RawIntakeItem {
        RawIntakeItem {
            body: Bytes::from_static(body.as_bytes()),
            user_id: user.to_string(),
            user_agent: "agent".to_string(),
            received_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_every_item_persisted_once() {
        let (queue, receiver) = intake_queue(64);
        let store = Arc::new(RecordingStore::default());
        let metrics = PipelineMetrics::new();
        let pool = WorkerPool::spawn(receiver, store.clone(), metrics.clone(), keys(), &config(4, 8));

        for n in 0..40 {
            queue
                .try_enqueue(item(&format!("u{n}"), r#"{"module":"m","data":{}}"#))
                .unwrap();
        }
        drop(queue);

        assert_eq!(pool.join(Duration::from_secs(5)).await, 0);

        let records = store.records.lock().unwrap();
        assert_eq!(records.len(), 40);
        let mut users: Vec<_> = records.iter().map(|r| r.user_id.clone()).collect();
        users.sort();
        users.dedup();
        assert_eq!(users.len(), 40);
        let snap = metrics.snapshot();
        assert_eq!(snap.writes_ok, 40);
        assert_eq!(snap.write_failures, 0);
    }

    #[tokio::test]
    async fn test_unparseable_item_is_skipped() {
        let (queue, receiver) = intake_queue(8);
        let store = Arc::new(RecordingStore::default());
        let metrics = PipelineMetrics::new();
        let pool = WorkerPool::spawn(receiver, store.clone(), metrics.clone(), keys(), &config(2, 2));

        queue.try_enqueue(item("bad", "{not json")).unwrap();
        queue.try_enqueue(item("good", r#"{"name":"n"}"#)).unwrap();
        drop(queue);
        pool.join(Duration::from_secs(5)).await;

        let records = store.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, "good");
        let snap = metrics.snapshot();
        assert_eq!(snap.parse_failures, 1);
        assert_eq!(snap.writes_ok, 1);
    }

    #[tokio::test]
    async fn test_write_failures_are_counted() {
        let (queue, receiver) = intake_queue(8);
        let store = Arc::new(RecordingStore {
            fail: true,
            ..Default::default()
        });
        let metrics = PipelineMetrics::new();
        let pool = WorkerPool::spawn(receiver, store.clone(), metrics.clone(), keys(), &config(2, 2));

        for n in 0..3 {
            queue.try_enqueue(item(&format!("u{n}"), "{}")).unwrap();
        }
        drop(queue);
        pool.join(Duration::from_secs(5)).await;

        let snap = metrics.snapshot();
        assert_eq!(snap.write_failures, 3);
        assert_eq!(snap.writes_ok, 0);
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_flight_writes_are_bounded() {
        let (queue, receiver) = intake_queue(32);
        let store = Arc::new(RecordingStore {
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let metrics = PipelineMetrics::new();
        let pool = WorkerPool::spawn(receiver, store.clone(), metrics, keys(), &config(8, 3));

        for n in 0..24 {
            queue.try_enqueue(item(&format!("u{n}"), "{}")).unwrap();
        }
        drop(queue);
        pool.join(Duration::from_secs(5)).await;

        assert_eq!(store.records.lock().unwrap().len(), 24);
        assert!(store.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_join_times_out_while_queue_open() {
        let (queue, receiver) = intake_queue(4);
        let store = Arc::new(RecordingStore::default());
        let pool = WorkerPool::spawn(receiver, store, PipelineMetrics::new(), keys(), &config(2, 2));

        let unfinished = pool.join(Duration::from_millis(50)).await;
        assert_eq!(unfinished, 2);
        drop(queue);
    }
}
