//! Task Queue.
//!
//! Process-wide singleton (one [`TaskQueue`], cloned and shared via `Arc`
//! internally) holding four partitions: `pending` (priority-ordered),
//! `running`, bounded `completed`, bounded `failed`. Every mutation goes
//! through `&self` methods guarded by an internal [`tokio::sync::Mutex`] —
//! a single-writer handle shared the way the other process-wide singletons
//! in this crate are, implemented directly as a lock rather than a
//! message-passing actor since the operation set is small and uniform.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::task::{now_ms, Priority, Task, TaskResult, TaskStatus};

const RETENTION: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingKey {
    priority_rank: u8,
    created_at: u64,
    task_id: String,
}

impl Ord for PendingKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the lowest rank/oldest
        // creation time pops first.
        other
            .priority_rank
            .cmp(&self.priority_rank)
            .then_with(|| other.created_at.cmp(&self.created_at))
    }
}

impl PartialOrd for PendingKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Inner {
    pending_heap: BinaryHeap<PendingKey>,
    pending_tasks: HashMap<String, Task>,
    running: HashMap<String, Task>,
    completed: VecDeque<Task>,
    failed: VecDeque<Task>,
}

/// Snapshot counts for `status()`.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

/// All tasks by partition, for `list_all()`.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub pending: Vec<Task>,
    pub running: Vec<Task>,
    pub completed: Vec<Task>,
    pub failed: Vec<Task>,
}

#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<Mutex<Inner>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                pending_heap: BinaryHeap::new(),
                pending_tasks: HashMap::new(),
                running: HashMap::new(),
                completed: VecDeque::new(),
                failed: VecDeque::new(),
            })),
        }
    }

    /// Add a new task to the `pending` partition.
    pub async fn enqueue(&self, task: Task) {
        let mut inner = self.inner.lock().await;
        inner.pending_heap.push(PendingKey {
            priority_rank: task.priority.rank(),
            created_at: task.created_at,
            task_id: task.id.clone(),
        });
        inner.pending_tasks.insert(task.id.clone(), task);
    }

    /// Pop the highest-priority, oldest pending task without starting it.
    pub async fn dequeue_next(&self) -> Option<Task> {
        let mut inner = self.inner.lock().await;
        loop {
            let key = inner.pending_heap.pop()?;
            // The task may have been cancelled/reprioritized out from under
            // the heap entry; skip stale keys rather than returning ghosts.
            match inner.pending_tasks.get(&key.task_id) {
                Some(task) if task.priority.rank() == key.priority_rank => {
                    return Some(task.clone())
                }
                _ => continue,
            }
        }
    }

    /// Move `id` from `pending` to `running`, stamped with the current time.
    pub async fn start(&self, id: &str) -> Option<Task> {
        let mut inner = self.inner.lock().await;
        let task = inner.pending_tasks.remove(id)?;
        let started = task.set_started(now_ms());
        inner.running.insert(id.to_string(), started.clone());
        Some(started)
    }

    /// Move `id` from `running` to `completed`, recording `result`.
    pub async fn complete(&self, id: &str, result: TaskResult) -> Option<Task> {
        let mut inner = self.inner.lock().await;
        let task = inner.running.remove(id)?;
        // A cancelled task's completion is ignored.
        if task.status == TaskStatus::Cancelled {
            return None;
        }
        let provider = result.provider;
        let done = task.set_result(provider, result).set_completed(now_ms());
        push_bounded(&mut inner.completed, done.clone());
        Some(done)
    }

    /// Move `id` from `running` to `failed`, recording `reason`.
    pub async fn fail(&self, id: &str, reason: impl Into<String>) -> Option<Task> {
        let mut inner = self.inner.lock().await;
        let task = inner.running.remove(id)?;
        if task.status == TaskStatus::Cancelled {
            return None;
        }
        let reason = reason.into();
        let failed = task.set_failed(now_ms());
        let mut failed = failed;
        failed.results.push(TaskResult {
            provider: failed
                .assigned_to
                .iter()
                .next()
                .copied()
                .unwrap_or(crate::provider::ProviderId::Local),
            content: String::new(),
            succeeded: false,
            error: Some(reason),
        });
        push_bounded(&mut inner.failed, failed.clone());
        Some(failed)
    }

    /// Cancel a task wherever it currently sits. Returns `true` if found.
    pub async fn cancel(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        if let Some(task) = inner.pending_tasks.get_mut(id) {
            *task = task.set_cancelled();
            return true;
        }
        if let Some(task) = inner.running.get_mut(id) {
            *task = task.set_cancelled();
            return true;
        }
        false
    }

    /// Change the priority of a still-`pending` task. No-op (returns
    /// `false`) for a task that's already running or terminal.
    pub async fn update_priority(&self, id: &str, priority: Priority) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.pending_tasks.get_mut(id) {
            Some(task) => {
                task.priority = priority;
                inner.pending_heap.push(PendingKey {
                    priority_rank: priority.rank(),
                    created_at: task.created_at,
                    task_id: id.to_string(),
                });
                true
            }
            None => false,
        }
    }

    /// Look up a task by id in any partition.
    pub async fn get_task(&self, id: &str) -> Option<Task> {
        let inner = self.inner.lock().await;
        inner
            .pending_tasks
            .get(id)
            .or_else(|| inner.running.get(id))
            .cloned()
            .or_else(|| inner.completed.iter().find(|t| t.id == id).cloned())
            .or_else(|| inner.failed.iter().find(|t| t.id == id).cloned())
    }

    /// All tasks across all four partitions.
    pub async fn list_all(&self) -> QueueSnapshot {
        let inner = self.inner.lock().await;
        QueueSnapshot {
            pending: inner.pending_tasks.values().cloned().collect(),
            running: inner.running.values().cloned().collect(),
            completed: inner.completed.iter().cloned().collect(),
            failed: inner.failed.iter().cloned().collect(),
        }
    }

    /// Partition counts.
    pub async fn status(&self) -> QueueCounts {
        let inner = self.inner.lock().await;
        QueueCounts {
            pending: inner.pending_tasks.len(),
            running: inner.running.len(),
            completed: inner.completed.len(),
            failed: inner.failed.len(),
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn push_bounded(deque: &mut VecDeque<Task>, task: Task) {
    deque.push_back(task);
    while deque.len() > RETENTION {
        deque.pop_front();
    }
}
