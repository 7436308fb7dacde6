//! Subscription registry and notification dispatch.

use dashmap::DashMap;
use futures::future::BoxFuture;
use knowledge_core::{KnowledgeItem, SubscriptionFilter};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Monotonically increasing subscription identifier.
pub type SubscriptionId = u64;

/// Async notification handler invoked with each matching item.
///
/// Handler failures are logged and skipped; they never affect other
/// subscribers or the publisher.
pub type KnowledgeHandler =
    Arc<dyn Fn(KnowledgeItem) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Summary row for a registered subscription.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionInfo {
    pub subscription_id: SubscriptionId,
    pub filter: Option<&'static str>,
}

/// Bounded notification queue feeding one subscriber's worker task.
///
/// Publishers push without blocking; on overflow the oldest undelivered
/// notification is dropped and counted (at-most-once delivery with loss
/// signalled).
struct DispatchQueue {
    pending: Mutex<VecDeque<KnowledgeItem>>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
    closed: AtomicBool,
}

impl DispatchQueue {
    fn new(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity,
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    fn push(&self, item: KnowledgeItem) {
        {
            let mut pending = self.pending.lock();
            if pending.len() >= self.capacity {
                pending.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            pending.push_back(item);
        }
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<KnowledgeItem> {
        self.pending.lock().pop_front()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

struct SubscriptionEntry {
    filter: Option<SubscriptionFilter>,
    queue: Arc<DispatchQueue>,
    worker: JoinHandle<()>,
}

/// Registry of (filter, handler) subscriptions with per-subscriber
/// dispatch workers.
///
/// The registry has its own lock; registering and unregistering never
/// block publishers. Enqueueing happens in commit order from the
/// repository's write path, and each worker delivers its queue
/// sequentially, so a single subscriber observes notifications in commit
/// order. No ordering holds across subscribers.
pub struct SubscriptionRegistry {
    subscriptions: DashMap<SubscriptionId, SubscriptionEntry>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl SubscriptionRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscriptions: DashMap::new(),
            next_id: AtomicU64::new(0),
            queue_capacity,
        }
    }

    /// Register a handler; `None` subscribes to every item.
    pub fn subscribe(
        &self,
        filter: Option<SubscriptionFilter>,
        handler: KnowledgeHandler,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::new(DispatchQueue::new(self.queue_capacity));
        let worker = tokio::spawn(Self::run_worker(id, queue.clone(), handler));

        self.subscriptions.insert(
            id,
            SubscriptionEntry {
                filter,
                queue,
                worker,
            },
        );

        debug!(subscription_id = id, "Added subscription");
        id
    }

    /// Remove a subscription. Idempotent: unknown IDs return false.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        if let Some((_, entry)) = self.subscriptions.remove(&id) {
            // The worker drains what is already queued, then exits
            entry.queue.close();
            debug!(subscription_id = id, "Removed subscription");
            true
        } else {
            false
        }
    }

    /// Enqueue an item to every subscription whose filter matches.
    ///
    /// Bounded-queue push only; never waits on a handler.
    pub fn notify(&self, item: &KnowledgeItem) {
        for entry in self.subscriptions.iter() {
            let matches = entry
                .filter
                .as_ref()
                .is_none_or(|filter| filter.matches(item));
            if matches {
                entry.queue.push(item.clone());
            }
        }
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Summaries of every live subscription.
    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        let mut infos: Vec<SubscriptionInfo> = self
            .subscriptions
            .iter()
            .map(|entry| SubscriptionInfo {
                subscription_id: *entry.key(),
                filter: entry.filter.as_ref().map(SubscriptionFilter::kind),
            })
            .collect();
        infos.sort_by_key(|info| info.subscription_id);
        infos
    }

    /// Notifications dropped on queue overflow for one subscription.
    pub fn dropped(&self, id: SubscriptionId) -> Option<u64> {
        self.subscriptions
            .get(&id)
            .map(|entry| entry.queue.dropped.load(Ordering::Relaxed))
    }

    /// Close every subscription and wait for the workers to drain their
    /// queues.
    pub async fn shutdown(&self) {
        let ids: Vec<SubscriptionId> = self
            .subscriptions
            .iter()
            .map(|entry| *entry.key())
            .collect();

        let mut workers = Vec::new();
        for id in ids {
            if let Some((_, entry)) = self.subscriptions.remove(&id) {
                entry.queue.close();
                workers.push(entry.worker);
            }
        }

        for worker in workers {
            if let Err(e) = worker.await {
                if !e.is_cancelled() {
                    warn!("Subscription worker failed during shutdown: {e}");
                }
            }
        }
    }

    async fn run_worker(id: SubscriptionId, queue: Arc<DispatchQueue>, handler: KnowledgeHandler) {
        loop {
            let Some(item) = queue.pop() else {
                if queue.is_closed() {
                    break;
                }
                queue.notify.notified().await;
                continue;
            };

            // One spawn per delivery isolates handler panics from the
            // worker, so later notifications still go out
            let future = handler(item);
            match tokio::spawn(future).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(subscription_id = id, "Error in subscription handler: {e}");
                }
                Err(e) if e.is_panic() => {
                    warn!(subscription_id = id, "Subscription handler panicked");
                }
                Err(_) => break,
            }
        }
    }
}
