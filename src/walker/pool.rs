//! Worker pool schedule
//!
//! A fixed set of named threads pull [`WorkItem`]s from one bounded
//! queue, run the paired step, and push the resulting children back.
//!
//! ```text
//!            ┌──────────────────────────┐
//!            │   WorkQueue (bounded)    │◄──────────────┐
//!            │   + in-flight counter    │               │ children
//!            └────────────┬─────────────┘               │
//!                         │                             │
//!       ┌─────────────────┼─────────────────┐           │
//!  ┌────▼─────┐     ┌─────▼────┐      ┌─────▼────┐      │
//!  │ differ-0 │     │ differ-1 │ ...  │ differ-N │──────┘
//!  └────┬─────┘     └─────┬────┘      └─────┬────┘
//!       └─────────────────┼─────────────────┘
//!                         ▼
//!            left tree (Mutex)   right tree (Mutex)
//! ```
//!
//! Workers exit when the in-flight counter reaches zero. The first fatal
//! error raises the shutdown flag and is returned once every worker has
//! been joined.

use crate::error::{DiffError, Result, WorkerError};
use crate::walker::paired::PairedWalker;
use crate::walker::queue::{WorkGuard, WorkItem, WorkQueue, WorkQueueReceiver, WorkQueueSender};
use crate::walker::Schedule;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Default number of workers
pub const DEFAULT_WORKERS: usize = 4;

/// Default queue capacity (items)
///
/// The channel preallocates every slot, so this stays modest; overflow is
/// processed inline rather than dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16 * 1024;

/// How long an idle worker waits before re-checking for completion
const IDLE_POLL: Duration = Duration::from_millis(5);

/// Bounded worker pool sharing one work queue
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
    queue_capacity: usize,
}

impl WorkerPool {
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        Self {
            workers: workers.max(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS, DEFAULT_QUEUE_CAPACITY)
    }
}

/// First fatal error plus the flag that stops every worker
struct Failure {
    shutdown: AtomicBool,
    first: Mutex<Option<DiffError>>,
}

impl Failure {
    fn new() -> Self {
        Self {
            shutdown: AtomicBool::new(false),
            first: Mutex::new(None),
        }
    }

    fn record(&self, err: DiffError) {
        let mut slot = self.first.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
        self.shutdown.store(true, Ordering::SeqCst);
    }

    fn is_set(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

impl Schedule for WorkerPool {
    fn drive(&self, walker: &PairedWalker, root: WorkItem) -> Result<()> {
        let queue = WorkQueue::new(self.queue_capacity);
        queue
            .seed(root)
            .map_err(|_| DiffError::Worker(WorkerError::QueueSendFailed))?;

        let failure = Failure::new();

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.workers);

            for id in 0..self.workers {
                let rx = queue.receiver();
                let tx = queue.sender();
                let failure = &failure;

                let spawned = thread::Builder::new()
                    .name(format!("differ-{id}"))
                    .spawn_scoped(scope, move || worker_loop(id, walker, rx, tx, failure));

                match spawned {
                    Ok(handle) => handles.push((id, handle)),
                    Err(e) => {
                        failure.record(
                            WorkerError::InitFailed {
                                id,
                                reason: e.to_string(),
                            }
                            .into(),
                        );
                        break;
                    }
                }
            }

            debug!(count = handles.len(), "Workers spawned");

            for (id, handle) in handles {
                if let Err(payload) = handle.join() {
                    let message = panic_message(payload.as_ref());
                    warn!(worker = id, message = %message, "Worker panicked");
                    failure.record(WorkerError::Panicked { id, message }.into());
                }
            }
        });

        let stats = queue.stats();
        debug!(
            enqueued = stats.enqueued(),
            dequeued = stats.throughput(),
            inline = walker.stats().summary().inline_processed,
            "Worker pool drained"
        );

        match failure.first.into_inner() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "worker-pool"
    }
}

/// Main worker loop
fn worker_loop(
    id: usize,
    walker: &PairedWalker,
    rx: WorkQueueReceiver,
    tx: WorkQueueSender,
    failure: &Failure,
) {
    debug!(worker = id, "Worker starting");
    let mut processed = 0u64;

    while !failure.is_set() {
        let item = match rx.recv_timeout(IDLE_POLL) {
            Some(item) => item,
            None => {
                if rx.is_complete() {
                    break;
                }
                continue;
            }
        };

        // Held until the item's children are queued
        let _guard = WorkGuard::new(&rx);

        if let Err(e) = process(walker, &tx, &item) {
            debug!(
                worker = id,
                path = %item.path.display(),
                error = %e,
                "Worker stopping on error"
            );
            failure.record(e);
            break;
        }
        processed += 1;
    }

    debug!(worker = id, processed, "Worker shutting down");
}

/// Run one item and queue its children, processing inline when full
fn process(walker: &PairedWalker, tx: &WorkQueueSender, item: &WorkItem) -> Result<()> {
    for child in walker.visit(item)? {
        match tx.try_send(child) {
            Ok(None) => {}
            Ok(Some(child)) => {
                walker.stats().record_inline();
                trace!(path = %child.path.display(), "Backpressure - processing inline");
                process(walker, tx, &child)?;
            }
            Err(_) => return Err(WorkerError::QueueSendFailed.into()),
        }
    }
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Worker thread panicked".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::DEFAULT_BUFFER_SIZE;
    use std::fs;
    use std::path::Path;

    #[test]
    fn test_pool_defaults() {
        let pool = WorkerPool::default();
        assert_eq!(pool.workers(), DEFAULT_WORKERS);
        assert_eq!(pool.queue_capacity(), DEFAULT_QUEUE_CAPACITY);
        assert_eq!(WorkerPool::new(0, 0).workers(), 1);
    }

    #[test]
    fn test_tiny_queue_processes_inline() {
        let left = tempfile::tempdir().unwrap();
        let right = tempfile::tempdir().unwrap();
        for i in 0..20 {
            let dir = right.path().join(format!("d{i:02}"));
            fs::create_dir(&dir).unwrap();
            fs::write(dir.join("f"), b"x").unwrap();
        }

        let walker = PairedWalker::new(left.path(), right.path(), DEFAULT_BUFFER_SIZE);
        let root = walker.root_item().unwrap();
        WorkerPool::new(1, 1).drive(&walker, root).unwrap();

        assert!(walker.stats().summary().inline_processed > 0);
        let (left_tree, right_tree) = walker.into_trees();
        assert!(left_tree.is_empty());
        assert_eq!(right_tree.len(), 41);
        assert!(right_tree.lookup(Path::new("/d19/f")).is_some());
    }

    #[test]
    fn test_error_stops_pool() {
        let left = tempfile::tempdir().unwrap();
        let right = tempfile::tempdir().unwrap();
        fs::write(left.path().join("sub"), b"a file").unwrap();

        let walker = PairedWalker::new(left.path(), right.path(), DEFAULT_BUFFER_SIZE);

        // Item claims /sub is a directory, so listing it fails with ENOTDIR
        let dir_meta = fs::symlink_metadata(left.path()).unwrap();
        let item = WorkItem::new("/sub".into(), Some(dir_meta), None);

        let err = WorkerPool::new(3, 16).drive(&walker, item).unwrap_err();
        assert!(matches!(err, DiffError::Io { op: "open directory", .. }));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7u32);
        assert_eq!(panic_message(payload.as_ref()), "Worker thread panicked");
    }
}
