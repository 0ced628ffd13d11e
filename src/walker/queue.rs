//! Work queue with backpressure support
//!
//! A bounded queue of [`WorkItem`]s shared by the worker pool. When the
//! queue is full, producers process the item inline instead of blocking.
//!
//! Completion is tracked with an in-flight counter rather than by looking
//! at queue emptiness: the counter is incremented before an item is
//! enqueued and only decremented once that item's children have been
//! enqueued, so it cannot reach zero while any work is still reachable.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::fs::Metadata;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One path to compare, with the `lstat` result from each side
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Path relative to both roots, always starting with `/`
    pub path: PathBuf,

    /// Left-side status, `None` if the entry does not exist there
    pub left: Option<Metadata>,

    /// Right-side status, `None` if the entry does not exist there
    pub right: Option<Metadata>,
}

impl WorkItem {
    pub fn new(path: PathBuf, left: Option<Metadata>, right: Option<Metadata>) -> Self {
        Self { path, left, right }
    }

    /// The synthetic root item
    pub fn root(left: Metadata, right: Metadata) -> Self {
        Self {
            path: PathBuf::from("/"),
            left: Some(left),
            right: Some(right),
        }
    }

    pub fn is_root(&self) -> bool {
        self.path.as_os_str() == "/"
    }
}

/// Statistics for the work queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total items enqueued
    pub enqueued: AtomicU64,

    /// Total items dequeued
    pub dequeued: AtomicU64,
}

impl QueueStats {
    /// Get queue throughput (dequeued items)
    pub fn throughput(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Get number of items that made it into the channel
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }
}

/// Bounded work queue with an in-flight counter
pub struct WorkQueue {
    sender: Sender<WorkItem>,
    receiver: Receiver<WorkItem>,
    in_flight: Arc<AtomicUsize>,
    stats: Arc<QueueStats>,
}

impl WorkQueue {
    /// Create a new work queue with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);

        Self {
            sender,
            receiver,
            in_flight: Arc::new(AtomicUsize::new(0)),
            stats: Arc::new(QueueStats::default()),
        }
    }

    /// Get a sender for this queue (clone for each worker)
    pub fn sender(&self) -> WorkQueueSender {
        WorkQueueSender {
            sender: self.sender.clone(),
            in_flight: Arc::clone(&self.in_flight),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Get a receiver for this queue (clone for each worker)
    pub fn receiver(&self) -> WorkQueueReceiver {
        WorkQueueReceiver {
            receiver: self.receiver.clone(),
            in_flight: Arc::clone(&self.in_flight),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Get queue statistics
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }

    /// Items queued or being processed
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Seed the queue with the root item
    pub fn seed(&self, item: WorkItem) -> Result<(), WorkItem> {
        match self.sender().try_send(item) {
            Ok(None) => Ok(()),
            Ok(Some(item)) | Err(item) => Err(item),
        }
    }

    /// All work done: nothing queued and nothing being processed
    pub fn is_complete(&self) -> bool {
        self.in_flight() == 0
    }
}

/// Handle for sending items to the queue
#[derive(Clone)]
pub struct WorkQueueSender {
    sender: Sender<WorkItem>,
    in_flight: Arc<AtomicUsize>,
    stats: Arc<QueueStats>,
}

impl WorkQueueSender {
    /// Try to enqueue an item without blocking
    ///
    /// Returns `Ok(None)` when queued, `Ok(Some(item))` when the queue is
    /// full (the caller should process it inline), and `Err(item)` when the
    /// queue is disconnected.
    pub fn try_send(&self, item: WorkItem) -> Result<Option<WorkItem>, WorkItem> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        match self.sender.try_send(item) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(TrySendError::Full(item)) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(Some(item))
            }
            Err(TrySendError::Disconnected(item)) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Err(item)
            }
        }
    }
}

/// Handle for receiving items from the queue
#[derive(Clone)]
pub struct WorkQueueReceiver {
    receiver: Receiver<WorkItem>,
    in_flight: Arc<AtomicUsize>,
    stats: Arc<QueueStats>,
}

impl WorkQueueReceiver {
    /// Receive with timeout
    pub fn recv_timeout(&self, timeout: Duration) -> Option<WorkItem> {
        match self.receiver.recv_timeout(timeout) {
            Ok(item) => {
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                Some(item)
            }
            Err(_) => None,
        }
    }

    /// All work done: nothing queued and nothing being processed
    pub fn is_complete(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) == 0
    }

    /// Mark one dequeued item as finished
    pub fn complete(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// RAII guard that marks a dequeued item finished when dropped
///
/// Hold it until every child of the item has been enqueued.
pub struct WorkGuard<'a> {
    receiver: &'a WorkQueueReceiver,
}

impl<'a> WorkGuard<'a> {
    pub fn new(receiver: &'a WorkQueueReceiver) -> Self {
        Self { receiver }
    }
}

impl<'a> Drop for WorkGuard<'a> {
    fn drop(&mut self) {
        self.receiver.complete();
    }
}
