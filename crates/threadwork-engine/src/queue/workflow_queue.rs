//! Priority-ordered pending workflow items: tracks running/completed/
//! failed state and the bespoke retry-with-priority-decrement policy.
//!
//! This is deliberately not the teacher's [`crate::driver`]-adjacent
//! exponential-backoff retry: the source spec's queue retries on a fixed
//! priority decrement with no time delay, capped at three attempts, so
//! the algorithm here is bespoke. Only the surrounding conventions
//! (stats accessors, `thiserror` error enum) are borrowed.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::event::SystemEvent;

pub const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// A runtime wrapping of `(workflow name, event, priority, status)`.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: u64,
    pub workflow_name: String,
    pub event: SystemEvent,
    pub priority: i32,
    pub enqueued_at: DateTime<Utc>,
    pub status: QueueStatus,
    pub retry_count: u32,
}

/// The fields a caller supplies when enqueuing; the queue assigns `id`
/// and `status`.
pub struct NewQueueItem {
    pub workflow_name: String,
    pub event: SystemEvent,
    pub priority: i32,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("unknown queue item id: {0}")]
    UnknownId(u64),

    #[error("queue item {0} is not currently running")]
    NotRunning(u64),
}

#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Priority-descending, FIFO-within-priority pending queue with a
/// separate running map and bespoke retry policy.
///
/// Implemented as a stable insertion-sort-style scan over a `VecDeque`
/// rather than a binary heap: a heap does not guarantee FIFO ordering
/// among equal-priority items, which the spec requires.
pub struct WorkflowQueue {
    pending: VecDeque<QueueItem>,
    running: HashMap<u64, QueueItem>,
    terminal: HashMap<u64, QueueItem>,
    next_id: AtomicU64,
}

impl Default for WorkflowQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowQueue {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            running: HashMap::new(),
            terminal: HashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn insert_by_priority(&mut self, item: QueueItem) {
        // Scan from the back: insert after the last item whose priority
        // is >= this item's priority, which preserves FIFO within a
        // priority band whether the item is fresh or a retry.
        let position = self
            .pending
            .iter()
            .rposition(|existing| existing.priority >= item.priority)
            .map(|idx| idx + 1)
            .unwrap_or(0);
        self.pending.insert(position, item);
    }

    #[tracing::instrument(skip(self, new_item), fields(workflow = %new_item.workflow_name, priority = new_item.priority))]
    pub fn enqueue(&mut self, new_item: NewQueueItem) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let item = QueueItem {
            id,
            workflow_name: new_item.workflow_name,
            event: new_item.event,
            priority: new_item.priority,
            enqueued_at: Utc::now(),
            status: QueueStatus::Pending,
            retry_count: 0,
        };
        self.insert_by_priority(item);
        id
    }

    /// Removes and returns the highest-priority pending item, marking it
    /// running.
    pub fn dequeue(&mut self) -> Option<QueueItem> {
        let mut item = self.pending.pop_front()?;
        item.status = QueueStatus::Running;
        self.running.insert(item.id, item.clone());
        Some(item)
    }

    pub fn mark_completed(&mut self, id: u64, success: bool) -> Result<(), QueueError> {
        let mut item = self
            .running
            .remove(&id)
            .ok_or(QueueError::NotRunning(id))?;
        item.status = if success {
            QueueStatus::Completed
        } else {
            QueueStatus::Failed
        };
        self.terminal.insert(id, item);
        Ok(())
    }

    /// Re-enqueues a failed item with `priority = max(0, priority - 1)`
    /// and `retry_count += 1`, as long as `retry_count < MAX_RETRIES`.
    /// Otherwise marks it terminally failed and returns `false`.
    #[tracing::instrument(skip(self))]
    pub fn retry(&mut self, id: u64) -> Result<bool, QueueError> {
        let mut item = self
            .running
            .remove(&id)
            .ok_or(QueueError::UnknownId(id))?;

        if item.retry_count >= MAX_RETRIES {
            item.status = QueueStatus::Failed;
            self.terminal.insert(id, item);
            return Ok(false);
        }

        item.priority = (item.priority - 1).max(0);
        item.retry_count += 1;
        item.status = QueueStatus::Pending;
        item.enqueued_at = Utc::now();
        self.insert_by_priority(item);
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.running.clear();
        self.terminal.clear();
    }

    pub fn size(&self) -> usize {
        self.pending.len()
    }

    pub fn running_size(&self) -> usize {
        self.running.len()
    }

    pub fn get_pending(&self) -> Vec<&QueueItem> {
        self.pending.iter().collect()
    }

    pub fn get_running(&self) -> Vec<&QueueItem> {
        self.running.values().collect()
    }

    pub fn get_stats(&self) -> QueueStats {
        QueueStats {
            pending: self.pending.len(),
            running: self.running.len(),
            completed: self
                .terminal
                .values()
                .filter(|i| i.status == QueueStatus::Completed)
                .count(),
            failed: self
                .terminal
                .values()
                .filter(|i| i.status == QueueStatus::Failed)
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DataArrivedPayload;
    use serde_json::json;

    fn event() -> SystemEvent {
        SystemEvent::DataArrived(DataArrivedPayload {
            source: "test".into(),
            content: json!({}),
            format: None,
            pond_entry_id: "p".into(),
            timestamp: Utc::now(),
        })
    }

    fn item(name: &str, priority: i32) -> NewQueueItem {
        NewQueueItem {
            workflow_name: name.into(),
            event: event(),
            priority,
        }
    }

    #[test]
    fn priority_descending_fifo_within_priority() {
        let mut queue = WorkflowQueue::new();
        queue.enqueue(item("low", 10));
        queue.enqueue(item("high", 100));
        queue.enqueue(item("mid-a", 50));
        queue.enqueue(item("mid-b", 50));

        let order: Vec<String> = std::iter::from_fn(|| queue.dequeue())
            .map(|i| i.workflow_name)
            .collect();
        assert_eq!(order, vec!["high", "mid-a", "mid-b", "low"]);
    }

    #[test]
    fn mark_completed_removes_from_running() {
        let mut queue = WorkflowQueue::new();
        let id = queue.enqueue(item("w", 0));
        queue.dequeue();
        assert_eq!(queue.running_size(), 1);
        queue.mark_completed(id, true).unwrap();
        assert_eq!(queue.running_size(), 0);
        assert_eq!(queue.get_stats().completed, 1);
    }

    #[test]
    fn scenario_c_retry_decrement_and_exhaustion() {
        let mut queue = WorkflowQueue::new();
        let id = queue.enqueue(item("flaky", 50));

        let mut priorities_seen = Vec::new();
        for _ in 0..4 {
            let dequeued = queue.dequeue().unwrap();
            assert_eq!(dequeued.id, id);
            priorities_seen.push(dequeued.priority);
            let can_retry = queue.retry(id).unwrap();
            if !can_retry {
                break;
            }
        }

        assert_eq!(priorities_seen, vec![50, 49, 48, 47]);
        assert_eq!(queue.get_stats().failed, 1);
        // The item is now terminal, not running: a further retry errors.
        assert!(queue.retry(id).is_err());
    }

    #[test]
    fn retry_never_goes_below_zero_priority() {
        let mut queue = WorkflowQueue::new();
        let id = queue.enqueue(item("w", 1));
        queue.dequeue();
        assert!(queue.retry(id).unwrap());
        let dequeued = queue.dequeue().unwrap();
        assert_eq!(dequeued.priority, 0);
        assert!(queue.retry(id).unwrap());
        let dequeued = queue.dequeue().unwrap();
        assert_eq!(dequeued.priority, 0);
    }

    #[test]
    fn retry_exhaustion_returns_false_and_terminal() {
        let mut queue = WorkflowQueue::new();
        let id = queue.enqueue(item("w", 5));
        for _ in 0..MAX_RETRIES {
            queue.dequeue();
            assert!(queue.retry(id).unwrap());
        }
        queue.dequeue();
        assert!(!queue.retry(id).unwrap());
        // A further retry call on the now-terminal id errors: it is no
        // longer in the running map.
        assert!(queue.retry(id).is_err());
    }

    #[test]
    fn empty_queue_dequeue_is_none() {
        let mut queue = WorkflowQueue::new();
        assert!(queue.dequeue().is_none());
    }
}
