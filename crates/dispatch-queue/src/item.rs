//! The unit of async work: a message plus its serialized send options.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dispatch_core::{Callback, Message};

/// A queued send: a message bound to a provider, with enough metadata to
/// reconstruct the original `SendOptions` on the consumer side (see
/// `dispatch_core::options::SendOptions::METADATA_KEY`).
pub struct QueueItem {
    pub id: String,
    pub provider: String,
    pub message: Arc<dyn Message>,
    /// Lower values dequeue first.
    pub priority: i32,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub callback: Option<Callback>,
}

impl QueueItem {
    pub fn new(id: impl Into<String>, provider: impl Into<String>, message: Arc<dyn Message>) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            message,
            priority: 0,
            scheduled_at: None,
            metadata: HashMap::new(),
            created_at: Utc::now(),
            callback: None,
        }
    }

    /// Whether this item is eligible for delivery right now.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        match self.scheduled_at {
            None => true,
            Some(at) => now >= at,
        }
    }
}

impl std::fmt::Debug for QueueItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueItem")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("priority", &self.priority)
            .field("scheduled_at", &self.scheduled_at)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Ordering contract: smaller `priority` first; ties broken by earlier
/// `created_at`; any remaining tie broken by `id` for a total order.
/// Reversed so a max-heap (`BinaryHeap`) pops the item that should be
/// dequeued first.
impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.created_at.cmp(&self.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueItem {}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::{ChannelType, GenericMessage};

    fn item(id: &str, priority: i32, created_at: DateTime<Utc>) -> QueueItem {
        let mut it = QueueItem::new(
            id,
            "test",
            Arc::new(GenericMessage::new(ChannelType::Webhook, serde_json::json!({"k": "v"}))),
        );
        it.priority = priority;
        it.created_at = created_at;
        it
    }

    #[test]
    fn lower_priority_sorts_first_in_a_max_heap() {
        use std::collections::BinaryHeap;
        let t = Utc::now();
        let mut heap = BinaryHeap::new();
        heap.push(item("a", 5, t));
        heap.push(item("b", 1, t));
        heap.push(item("c", 3, t));

        assert_eq!(heap.pop().unwrap().id, "b");
        assert_eq!(heap.pop().unwrap().id, "c");
        assert_eq!(heap.pop().unwrap().id, "a");
    }

    #[test]
    fn ties_broken_by_earlier_created_at() {
        use std::collections::BinaryHeap;
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(1);
        let mut heap = BinaryHeap::new();
        heap.push(item("later", 1, t1));
        heap.push(item("earlier", 1, t0));

        assert_eq!(heap.pop().unwrap().id, "earlier");
        assert_eq!(heap.pop().unwrap().id, "later");
    }

    #[test]
    fn is_ready_reflects_scheduled_at() {
        let now = Utc::now();
        let mut it = item("x", 0, now);
        assert!(it.is_ready(now));

        it.scheduled_at = Some(now + chrono::Duration::seconds(10));
        assert!(!it.is_ready(now));
        assert!(it.is_ready(now + chrono::Duration::seconds(11)));
    }
}
