//! `Queue` trait and the in-process bounded priority queue implementation.

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{QueueError, Result};
use crate::item::QueueItem;

/// The 100ms ceiling on how long `dequeue` will sleep before re-checking a
/// scheduled item, matching the spec's periodic-revisit tick.
const SCHEDULE_REVISIT_TICK: Duration = Duration::from_millis(100);

/// A queue of [`QueueItem`]s. Implementations may be in-process (the only
/// one provided here) or back onto an external broker; the pipeline only
/// depends on this trait.
#[async_trait]
pub trait Queue: Send + Sync {
    async fn enqueue(&self, item: QueueItem) -> Result<()>;

    /// Block until an item is ready for delivery, honoring `ScheduledAt`
    /// gating. Returns `Err(QueueError::Closed)` once the queue has been
    /// closed and drained. Callers needing external cancellation should
    /// race this future against their own cancellation signal with
    /// `tokio::select!`.
    async fn dequeue(&self) -> Result<QueueItem>;

    fn close(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded, in-process priority queue backed by a `BinaryHeap` under a
/// `parking_lot::Mutex`, with a `tokio::sync::Notify` for wakeups and a
/// periodic tick to revisit not-yet-ready scheduled items.
pub struct InMemoryQueue {
    heap: Mutex<BinaryHeap<QueueItem>>,
    capacity: usize,
    closed: AtomicBool,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            capacity,
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(AtomicOrdering::Acquire)
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn enqueue(&self, item: QueueItem) -> Result<()> {
        if self.is_closed() {
            return Err(QueueError::closed());
        }

        {
            let mut heap = self.heap.lock();
            if heap.len() >= self.capacity {
                return Err(QueueError::full(self.capacity));
            }
            heap.push(item);
        }

        metrics::counter!("dispatchkit_queue_enqueue_total").increment(1);
        metrics::gauge!("dispatchkit_queue_size").set(self.len() as f64);
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self) -> Result<QueueItem> {
        loop {
            if self.is_closed() {
                let mut heap = self.heap.lock();
                let now = Utc::now();
                if let Some(top) = heap.peek() {
                    if top.is_ready(now) {
                        let item = heap.pop().expect("peeked item must be present");
                        metrics::counter!("dispatchkit_queue_dequeue_total").increment(1);
                        return Ok(item);
                    }
                }
                return Err(QueueError::closed());
            }

            let notified = self.notify.notified();
            {
                let mut heap = self.heap.lock();
                let now = Utc::now();
                if let Some(top) = heap.peek() {
                    if top.is_ready(now) {
                        let item = heap.pop().expect("peeked item must be present");
                        metrics::counter!("dispatchkit_queue_dequeue_total").increment(1);
                        metrics::gauge!("dispatchkit_queue_size").set(self.len() as f64);
                        return Ok(item);
                    }
                }
            }

            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep(SCHEDULE_REVISIT_TICK) => {}
            }
        }
    }

    fn close(&self) {
        self.closed.store(true, AtomicOrdering::Release);
        self.notify.notify_waiters();
    }

    fn len(&self) -> usize {
        self.heap.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::{ChannelType, GenericMessage};
    use std::sync::Arc as StdArc;

    fn mk_item(id: &str, priority: i32) -> QueueItem {
        let mut it = QueueItem::new(
            id,
            "test",
            StdArc::new(GenericMessage::new(ChannelType::Webhook, serde_json::json!({"k": "v"}))),
        );
        it.priority = priority;
        it
    }

    #[tokio::test]
    async fn enqueue_rejects_when_full() {
        let q = InMemoryQueue::new(1);
        q.enqueue(mk_item("a", 0)).await.unwrap();
        let err = q.enqueue(mk_item("b", 0)).await.unwrap_err();
        assert_eq!(err.code(), 3000);
    }

    #[tokio::test]
    async fn dequeue_returns_lowest_priority_first() {
        let q = InMemoryQueue::new(10);
        q.enqueue(mk_item("high-number", 5)).await.unwrap();
        q.enqueue(mk_item("low-number", 1)).await.unwrap();

        let first = q.dequeue().await.unwrap();
        assert_eq!(first.id, "low-number");
        let second = q.dequeue().await.unwrap();
        assert_eq!(second.id, "high-number");
    }

    #[tokio::test]
    async fn dequeue_gates_on_scheduled_at() {
        let q = InMemoryQueue::new(10);
        let mut item = mk_item("delayed", 0);
        item.scheduled_at = Some(Utc::now() + chrono::Duration::milliseconds(150));
        q.enqueue(item).await.unwrap();

        let start = tokio::time::Instant::now();
        let got = q.dequeue().await.unwrap();
        assert_eq!(got.id, "delayed");
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn close_drains_ready_items_then_errors() {
        let q = InMemoryQueue::new(10);
        q.enqueue(mk_item("a", 0)).await.unwrap();
        q.close();

        assert_eq!(q.dequeue().await.unwrap().id, "a");
        assert!(matches!(q.dequeue().await, Err(QueueError::Closed { .. })));
        assert!(matches!(q.enqueue(mk_item("b", 0)).await, Err(QueueError::Closed { .. })));
    }
}
