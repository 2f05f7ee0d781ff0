//! Shared priority task queue
//!
//! Thread-safe queue shared by the manager and its background dispatcher.
//! Ordering invariant: higher priority scores dequeue first; within a
//! priority band, arrival order is preserved (FIFO).

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use troupe_core::{EntityId, Task, TaskPriority, TaskStatus};

/// Poll interval for timed dequeues.
const DEQUEUE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Snapshot of queue counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub size: usize,
    pub total_processed: u64,
}

/// Thread-safe priority queue of tasks.
#[derive(Debug, Default)]
pub struct TaskQueue {
    inner: Mutex<VecDeque<Task>>,
    total_processed: AtomicU64,
}

impl TaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned mutex only means another thread panicked mid-operation;
    // every critical section here leaves the deque ordered, so recovering
    // the inner value is safe.
    fn locked(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueue a task, stamping `enqueued_at` and resetting it to pending.
    /// The task is inserted behind every task of equal or higher priority.
    pub fn enqueue(&self, mut task: Task) {
        task.mark_enqueued();
        let score = task.priority.score();
        let mut queue = self.locked();
        let position = queue
            .iter()
            .position(|t| t.priority.score() < score)
            .unwrap_or(queue.len());
        queue.insert(position, task);
    }

    /// Enqueue a task at an explicit priority.
    pub fn enqueue_with_priority(&self, mut task: Task, priority: TaskPriority) {
        task.priority = priority;
        self.enqueue(task);
    }

    /// Pop the head without waiting.
    pub fn try_dequeue(&self) -> Option<Task> {
        self.locked().pop_front()
    }

    /// Pop the head, polling at a fixed 100ms interval until a task is
    /// available or the timeout elapses.
    pub fn dequeue(&self, timeout: Duration) -> Option<Task> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(task) = self.try_dequeue() {
                return Some(task);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            std::thread::sleep(DEQUEUE_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Clone the head without removing it.
    pub fn peek(&self) -> Option<Task> {
        self.locked().front().cloned()
    }

    /// Number of queued tasks.
    pub fn size(&self) -> usize {
        self.locked().len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.locked().is_empty()
    }

    /// Drop every queued task.
    pub fn clear(&self) {
        self.locked().clear();
    }

    /// Remove a queued task by id, returning it if present.
    pub fn remove_task(&self, id: EntityId) -> Option<Task> {
        let mut queue = self.locked();
        let position = queue.iter().position(|t| t.id == id)?;
        queue.remove(position)
    }

    /// Snapshot of queued tasks with the given status.
    pub fn tasks_by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.locked()
            .iter()
            .filter(|t| t.status == status)
            .cloned()
            .collect()
    }

    /// Snapshot of queued tasks with the given priority.
    pub fn tasks_by_priority(&self, priority: TaskPriority) -> Vec<Task> {
        self.locked()
            .iter()
            .filter(|t| t.priority == priority)
            .cloned()
            .collect()
    }

    /// Record that a previously dequeued task finished processing.
    /// Stats only - dequeue already removed the task from the queue.
    pub fn mark_processed(&self, id: EntityId) {
        self.total_processed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(task_id = %id, "task processed");
    }

    /// Total number of tasks ever marked processed.
    pub fn total_processed(&self) -> u64 {
        self.total_processed.load(Ordering::Relaxed)
    }

    /// Counters for status reporting.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            size: self.size(),
            total_processed: self.total_processed(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn task(description: &str, priority: TaskPriority) -> Task {
        Task::new(description).with_priority(priority)
    }

    #[test]
    fn test_priority_ordering() {
        let queue = TaskQueue::new();
        queue.enqueue(task("a", TaskPriority::Normal));
        queue.enqueue(task("b", TaskPriority::High));
        queue.enqueue(task("c", TaskPriority::Normal));

        assert_eq!(queue.try_dequeue().unwrap().description, "b");
        assert_eq!(queue.try_dequeue().unwrap().description, "a");
        assert_eq!(queue.try_dequeue().unwrap().description, "c");
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn test_fifo_within_priority_band() {
        let queue = TaskQueue::new();
        for i in 0..5 {
            queue.enqueue(task(&format!("t{}", i), TaskPriority::Normal));
        }
        for i in 0..5 {
            assert_eq!(queue.try_dequeue().unwrap().description, format!("t{}", i));
        }
    }

    #[test]
    fn test_critical_jumps_the_line() {
        let queue = TaskQueue::new();
        queue.enqueue(task("normal", TaskPriority::Normal));
        queue.enqueue(task("low", TaskPriority::Low));
        queue.enqueue(task("critical", TaskPriority::Critical));

        assert_eq!(queue.try_dequeue().unwrap().description, "critical");
        assert_eq!(queue.try_dequeue().unwrap().description, "normal");
        assert_eq!(queue.try_dequeue().unwrap().description, "low");
    }

    #[test]
    fn test_enqueue_stamps_pending_and_timestamp() {
        let queue = TaskQueue::new();
        queue.enqueue(task("a", TaskPriority::Normal));
        let t = queue.peek().unwrap();
        assert_eq!(t.status, TaskStatus::Pending);
        assert!(t.enqueued_at.is_some());
    }

    #[test]
    fn test_peek_does_not_remove() {
        let queue = TaskQueue::new();
        queue.enqueue(task("a", TaskPriority::Normal));
        assert!(queue.peek().is_some());
        assert_eq!(queue.size(), 1);
    }

    #[test]
    fn test_dequeue_timeout_on_empty() {
        let queue = TaskQueue::new();
        let started = Instant::now();
        let result = queue.dequeue(Duration::from_millis(120));
        assert!(result.is_none());
        assert!(started.elapsed() >= Duration::from_millis(120));
    }

    #[test]
    fn test_dequeue_sees_concurrent_producer() {
        let queue = Arc::new(TaskQueue::new());
        let producer = Arc::clone(&queue);

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            producer.enqueue(Task::new("late arrival"));
        });

        let received = queue.dequeue(Duration::from_secs(2));
        handle.join().unwrap();
        assert_eq!(received.unwrap().description, "late arrival");
    }

    #[test]
    fn test_remove_task_by_id() {
        let queue = TaskQueue::new();
        let t = Task::new("target");
        let id = t.id;
        queue.enqueue(t);
        queue.enqueue(Task::new("other"));

        let removed = queue.remove_task(id).unwrap();
        assert_eq!(removed.description, "target");
        assert_eq!(queue.size(), 1);
        assert!(queue.remove_task(id).is_none());
    }

    #[test]
    fn test_filters_and_clear() {
        let queue = TaskQueue::new();
        queue.enqueue(task("a", TaskPriority::High));
        queue.enqueue(task("b", TaskPriority::Normal));

        assert_eq!(queue.tasks_by_priority(TaskPriority::High).len(), 1);
        assert_eq!(queue.tasks_by_status(TaskStatus::Pending).len(), 2);

        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_mark_processed_counts_without_touching_queue() {
        let queue = TaskQueue::new();
        let t = Task::new("work");
        let id = t.id;
        queue.enqueue(t);

        let dequeued = queue.try_dequeue().unwrap();
        queue.mark_processed(dequeued.id);
        queue.mark_processed(id);

        assert_eq!(queue.total_processed(), 2);
        assert_eq!(queue.stats().size, 0);
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
