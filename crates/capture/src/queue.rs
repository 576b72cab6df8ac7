use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Stale,
}

#[derive(Debug, Clone)]
pub struct QueuedClassification {
    pub id: Uuid,
    pub text: String,
    pub context: String,
    pub status: ClassificationStatus,
}

/// Bounded FIFO classification queue: when full, the oldest
/// pending item is dropped and marked stale rather than blocking the
/// producer.
pub struct ClassificationQueue {
    capacity: usize,
    order: VecDeque<Uuid>,
    items: HashMap<Uuid, QueuedClassification>,
    enabled: bool,
}

impl ClassificationQueue {
    pub fn new(capacity: usize, enabled: bool) -> Self {
        Self { capacity, order: VecDeque::with_capacity(capacity), items: HashMap::new(), enabled }
    }

    /// Returns `Uuid::nil()` when the queue is disabled: enqueue is a
    /// no-op returning an empty id.
    pub fn enqueue(&mut self, text: impl Into<String>, context: impl Into<String>) -> Uuid {
        if !self.enabled {
            return Uuid::nil();
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                if let Some(item) = self.items.get_mut(&oldest) {
                    item.status = ClassificationStatus::Stale;
                }
            }
        }
        let id = Uuid::new_v4();
        self.items.insert(id, QueuedClassification { id, text: text.into(), context: context.into(), status: ClassificationStatus::Pending });
        self.order.push_back(id);
        id
    }

    /// Pops the next pending item for the background worker to process.
    pub fn next_pending(&mut self) -> Option<Uuid> {
        let id = self.order.iter().find(|id| {
            matches!(self.items.get(id).map(|i| i.status), Some(ClassificationStatus::Pending))
        })?;
        let id = *id;
        if let Some(item) = self.items.get_mut(&id) {
            item.status = ClassificationStatus::Processing;
        }
        Some(id)
    }

    pub fn complete(&mut self, id: Uuid, succeeded: bool) {
        if let Some(item) = self.items.get_mut(&id) {
            item.status = if succeeded { ClassificationStatus::Completed } else { ClassificationStatus::Failed };
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&QueuedClassification> {
        self.items.get(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_queue_returns_nil_id() {
        let mut queue = ClassificationQueue::new(4, false);
        assert_eq!(queue.enqueue("text", "ctx"), Uuid::nil());
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_drops_oldest_as_stale() {
        let mut queue = ClassificationQueue::new(2, true);
        let first = queue.enqueue("a", "ctx");
        queue.enqueue("b", "ctx");
        queue.enqueue("c", "ctx");
        assert_eq!(queue.get(first).unwrap().status, ClassificationStatus::Stale);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn next_pending_transitions_to_processing() {
        let mut queue = ClassificationQueue::new(4, true);
        let id = queue.enqueue("a", "ctx");
        let popped = queue.next_pending().unwrap();
        assert_eq!(popped, id);
        assert_eq!(queue.get(id).unwrap().status, ClassificationStatus::Processing);
        assert!(queue.next_pending().is_none());
    }
}
