//! Task Model.
//!
//! A [`Task`] is a record, not an actor: construction and "mutation" both
//! go through free functions/methods that return a new, updated `Task`.
//! Ownership and serialization of the actual mutable copy belongs to the
//! [`crate::queue::TaskQueue`] — nothing outside it holds a `&mut Task`.

use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::ProviderId;

/// Relative scheduling priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Priority {
    /// Lower rank sorts first in the pending min-heap.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Per-provider outcome of a completed or failed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub provider: ProviderId,
    pub content: String,
    pub succeeded: bool,
    pub error: Option<String>,
}

/// Milliseconds since the Unix epoch. Passed in by the caller rather than
/// read from the system clock inside `Task` methods, so task mutation stays
/// a pure function of its inputs and is trivially testable.
pub type TimestampMs = u64;

pub fn now_ms() -> TimestampMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Construction options for [`Task::new`].
#[derive(Debug, Clone, Default)]
pub struct TaskOpts {
    pub priority: Priority,
    pub assigned_to: BTreeSet<ProviderId>,
}

/// A unit of work routed to one or more providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub assigned_to: BTreeSet<ProviderId>,
    pub created_at: TimestampMs,
    pub started_at: Option<TimestampMs>,
    pub completed_at: Option<TimestampMs>,
    pub results: Vec<TaskResult>,
}

impl Task {
    /// Create a new, `pending` task with a fresh id.
    ///
    /// `assigned_to` may be empty at construction time — the Allocator
    /// fills it in before the task reaches the Queue; the invariant that
    /// a dispatched task has a non-empty set is enforced there, not here.
    pub fn new(description: impl Into<String>, opts: TaskOpts) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            description: description.into(),
            priority: opts.priority,
            status: TaskStatus::Pending,
            assigned_to: opts.assigned_to,
            created_at: now_ms(),
            started_at: None,
            completed_at: None,
            results: Vec::new(),
        }
    }

    /// Return a copy of this task assigned to `providers`.
    pub fn assign_to(&self, providers: impl IntoIterator<Item = ProviderId>) -> Task {
        let mut next = self.clone();
        next.assigned_to = providers.into_iter().collect();
        next
    }

    /// Return a copy of this task with `status` set.
    pub fn set_status(&self, status: TaskStatus) -> Task {
        let mut next = self.clone();
        next.status = status;
        next
    }

    /// Return a copy marked `running`, started at `ts`.
    pub fn set_started(&self, ts: TimestampMs) -> Task {
        let mut next = self.clone();
        next.status = TaskStatus::Running;
        next.started_at = Some(ts);
        next
    }

    /// Return a copy marked `completed` at `ts`. `ts` must be `>= started_at`;
    /// callers that violate this get a task whose `elapsed_time` is `None`
    /// rather than a negative duration.
    pub fn set_completed(&self, ts: TimestampMs) -> Task {
        let mut next = self.clone();
        next.status = TaskStatus::Completed;
        next.completed_at = Some(ts);
        next
    }

    /// Return a copy marked `failed` at `ts`.
    pub fn set_failed(&self, ts: TimestampMs) -> Task {
        let mut next = self.clone();
        next.status = TaskStatus::Failed;
        next.completed_at = Some(ts);
        next
    }

    /// Return a copy marked `cancelled`.
    pub fn set_cancelled(&self) -> Task {
        let mut next = self.clone();
        next.status = TaskStatus::Cancelled;
        next
    }

    /// Return a copy with `result` appended for `provider`.
    pub fn set_result(&self, provider: ProviderId, result: TaskResult) -> Task {
        let mut next = self.clone();
        next.results.retain(|r| r.provider != provider);
        next.results.push(result);
        next
    }

    /// `now - started_at` in milliseconds, or `None` if not started, or if
    /// `now` precedes `started_at` (clock skew / bad input).
    pub fn elapsed_time(&self, now: TimestampMs) -> Option<u64> {
        self.started_at.and_then(|start| now.checked_sub(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_pending() {
        let task = Task::new("fix the bug", TaskOpts::default());
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.started_at.is_none());
        assert!(!task.id.is_empty());
    }

    #[test]
    fn test_assign_to_is_functional() {
        let task = Task::new("x", TaskOpts::default());
        let assigned = task.assign_to([ProviderId::OpenAi, ProviderId::Anthropic]);
        assert!(task.assigned_to.is_empty());
        assert_eq!(assigned.assigned_to.len(), 2);
    }

    #[test]
    fn test_lifecycle_transitions() {
        let task = Task::new("x", TaskOpts::default());
        let started = task.set_started(100);
        assert_eq!(started.status, TaskStatus::Running);
        assert_eq!(started.started_at, Some(100));

        let completed = started.set_completed(250);
        assert_eq!(completed.status, TaskStatus::Completed);
        assert_eq!(completed.elapsed_time(250), Some(150));
    }

    #[test]
    fn test_elapsed_time_none_when_not_started() {
        let task = Task::new("x", TaskOpts::default());
        assert_eq!(task.elapsed_time(1000), None);
    }

    #[test]
    fn test_elapsed_time_none_on_clock_skew() {
        let task = Task::new("x", TaskOpts::default()).set_started(1000);
        assert_eq!(task.elapsed_time(500), None);
    }

    #[test]
    fn test_set_result_replaces_same_provider() {
        let task = Task::new("x", TaskOpts::default());
        let r1 = TaskResult {
            provider: ProviderId::OpenAi,
            content: "first".into(),
            succeeded: true,
            error: None,
        };
        let r2 = TaskResult {
            provider: ProviderId::OpenAi,
            content: "second".into(),
            succeeded: true,
            error: None,
        };
        let t = task.set_result(ProviderId::OpenAi, r1).set_result(ProviderId::OpenAi, r2);
        assert_eq!(t.results.len(), 1);
        assert_eq!(t.results[0].content, "second");
    }

    #[test]
    fn test_priority_rank_ordering() {
        assert!(Priority::High.rank() < Priority::Normal.rank());
        assert!(Priority::Normal.rank() < Priority::Low.rank());
    }
}
