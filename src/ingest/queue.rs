use crate::types::RawIntakeItem;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Why an item could not be placed on the queue. The item is handed back.
#[derive(Debug)]
pub enum EnqueueError {
    Full(RawIntakeItem),
    Closed(RawIntakeItem),
}

/// Producer side of the bounded intake queue. Cheap to clone; the queue
/// closes once every producer handle has been dropped.
#[derive(Clone)]
pub struct IntakeQueue {
    tx: mpsc::Sender<RawIntakeItem>,
    capacity: usize,
}

/// Consumer side, shared by all workers. Items are claimed one at a time in
/// the order they were accepted.
#[derive(Clone)]
pub struct IntakeReceiver {
    rx: Arc<Mutex<mpsc::Receiver<RawIntakeItem>>>,
}

/// Create a bounded FIFO queue with room for `capacity` items.
pub fn intake_queue(capacity: usize) -> (IntakeQueue, IntakeReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        IntakeQueue { tx, capacity },
        IntakeReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

impl IntakeQueue {
    /// Non-blocking enqueue. A full queue rejects the item instead of
    /// suspending the caller.
    pub fn try_enqueue(&self, item: RawIntakeItem) -> Result<(), EnqueueError> {
        self.tx.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(item) => EnqueueError::Full(item),
            mpsc::error::TrySendError::Closed(item) => EnqueueError::Closed(item),
        })
    }

    /// Items currently waiting for a worker.
    pub fn len(&self) -> usize {
        self.capacity.saturating_sub(self.tx.capacity())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl IntakeReceiver {
    /// Wait for the next item. Returns `None` once all producers are gone and
    /// the buffer has been drained.
    pub async fn claim(&self) -> Option<RawIntakeItem> {
        self.rx.lock().await.recv().await
    }
}
