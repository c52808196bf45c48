//! Task Tracker.
//!
//! Holds per-task progress/ETA records and per-provider rolling statistics.
//! Like [`crate::queue::TaskQueue`], implemented as a clonable handle around
//! a single internal lock rather than a message-passing actor.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::provider::ProviderId;
use crate::task::now_ms;

/// Live per-task tracking record.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingRecord {
    pub task_id: String,
    pub provider: ProviderId,
    pub started_at: u64,
    pub tokens_used: u32,
    pub progress: f64,
    pub estimated_completion_ms: Option<u64>,
    pub last_update: u64,
}

/// Rolling per-provider statistics.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProviderStats {
    pub active_tasks: u32,
    pub completed_tasks: u32,
    pub failed_tasks: u32,
    pub total_tokens: u64,
    pub avg_completion_ms: f64,
}

/// Aggregate stats across all providers.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct GlobalStats {
    pub active_tasks: u32,
    pub completed_tasks: u32,
    pub failed_tasks: u32,
    pub total_tokens: u64,
}

struct Inner {
    records: HashMap<String, TrackingRecord>,
    stats: HashMap<ProviderId, ProviderStats>,
}

#[derive(Clone)]
pub struct TaskTracker {
    inner: Arc<Mutex<Inner>>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                records: HashMap::new(),
                stats: HashMap::new(),
            })),
        }
    }

    /// Begin tracking `task_id` against `provider`.
    pub async fn start(&self, task_id: &str, provider: ProviderId) {
        let mut inner = self.inner.lock().await;
        let now = now_ms();
        inner.records.insert(
            task_id.to_string(),
            TrackingRecord {
                task_id: task_id.to_string(),
                provider,
                started_at: now,
                tokens_used: 0,
                progress: 0.0,
                estimated_completion_ms: None,
                last_update: now,
            },
        );
        inner.stats.entry(provider).or_default().active_tasks += 1;
    }

    /// Update progress/token usage for a running task. Recomputes ETA:
    /// `remaining_ms = elapsed_ms / progress - elapsed_ms` when
    /// `progress > 0`, else `None`.
    pub async fn update(&self, task_id: &str, tokens_used: Option<u32>, progress: Option<f64>) {
        let mut inner = self.inner.lock().await;
        let now = now_ms();
        if let Some(record) = inner.records.get_mut(task_id) {
            if let Some(tokens) = tokens_used {
                record.tokens_used = tokens;
            }
            if let Some(p) = progress {
                record.progress = p.clamp(0.0, 1.0);
            }
            record.last_update = now;

            let elapsed = now.saturating_sub(record.started_at) as f64;
            record.estimated_completion_ms = if record.progress > 0.0 {
                Some(((elapsed / record.progress) - elapsed).max(0.0) as u64)
            } else {
                None
            };
        }
    }

    /// Mark `task_id` complete, folding its duration into the provider's
    /// rolling average: `avg' = (avg*(n-1) + t) / n`.
    pub async fn complete(&self, task_id: &str) {
        let mut inner = self.inner.lock().await;
        let Some(record) = inner.records.remove(task_id) else {
            return;
        };
        let duration = now_ms().saturating_sub(record.started_at) as f64;
        let tokens = record.tokens_used as u64;
        let stats = inner.stats.entry(record.provider).or_default();
        stats.active_tasks = stats.active_tasks.saturating_sub(1);
        stats.completed_tasks += 1;
        stats.total_tokens += tokens;
        let n = stats.completed_tasks as f64;
        stats.avg_completion_ms = (stats.avg_completion_ms * (n - 1.0) + duration) / n;
    }

    /// Mark `task_id` failed; no average-duration update (only completed
    /// tasks feed `avg_completion_ms`).
    pub async fn fail(&self, task_id: &str) {
        let mut inner = self.inner.lock().await;
        let Some(record) = inner.records.remove(task_id) else {
            return;
        };
        let stats = inner.stats.entry(record.provider).or_default();
        stats.active_tasks = stats.active_tasks.saturating_sub(1);
        stats.failed_tasks += 1;
    }

    pub async fn get(&self, task_id: &str) -> Option<TrackingRecord> {
        self.inner.lock().await.records.get(task_id).cloned()
    }

    pub async fn list_all(&self) -> Vec<TrackingRecord> {
        self.inner.lock().await.records.values().cloned().collect()
    }

    pub async fn provider_stats(&self, provider: ProviderId) -> ProviderStats {
        self.inner
            .lock()
            .await
            .stats
            .get(&provider)
            .copied()
            .unwrap_or_default()
    }

    pub async fn all_provider_stats(&self) -> HashMap<ProviderId, ProviderStats> {
        self.inner.lock().await.stats.clone()
    }

    pub async fn global_stats(&self) -> GlobalStats {
        let inner = self.inner.lock().await;
        inner.stats.values().fold(GlobalStats::default(), |mut acc, s| {
            acc.active_tasks += s.active_tasks;
            acc.completed_tasks += s.completed_tasks;
            acc.failed_tasks += s.failed_tasks;
            acc.total_tokens += s.total_tokens;
            acc
        })
    }
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_and_get() {
        let tracker = TaskTracker::new();
        tracker.start("t1", ProviderId::OpenAi).await;
        let record = tracker.get("t1").await.unwrap();
        assert_eq!(record.provider, ProviderId::OpenAi);
        assert_eq!(record.progress, 0.0);
    }

    #[tokio::test]
    async fn test_update_computes_eta() {
        let tracker = TaskTracker::new();
        tracker.start("t1", ProviderId::OpenAi).await;
        tracker.update("t1", Some(50), Some(0.5)).await;
        let record = tracker.get("t1").await.unwrap();
        assert!(record.estimated_completion_ms.is_some());
        assert_eq!(record.tokens_used, 50);
    }

    #[tokio::test]
    async fn test_update_no_eta_at_zero_progress() {
        let tracker = TaskTracker::new();
        tracker.start("t1", ProviderId::OpenAi).await;
        tracker.update("t1", Some(5), Some(0.0)).await;
        let record = tracker.get("t1").await.unwrap();
        assert!(record.estimated_completion_ms.is_none());
    }

    #[tokio::test]
    async fn test_complete_updates_rolling_average() {
        let tracker = TaskTracker::new();
        tracker.start("t1", ProviderId::OpenAi).await;
        tracker.complete("t1").await;
        tracker.start("t2", ProviderId::OpenAi).await;
        tracker.complete("t2").await;

        let stats = tracker.provider_stats(ProviderId::OpenAi).await;
        assert_eq!(stats.completed_tasks, 2);
        assert_eq!(stats.active_tasks, 0);
    }

    #[tokio::test]
    async fn test_fail_does_not_touch_average() {
        let tracker = TaskTracker::new();
        tracker.start("t1", ProviderId::OpenAi).await;
        tracker.fail("t1").await;

        let stats = tracker.provider_stats(ProviderId::OpenAi).await;
        assert_eq!(stats.failed_tasks, 1);
        assert_eq!(stats.completed_tasks, 0);
        assert_eq!(stats.avg_completion_ms, 0.0);
    }

    #[tokio::test]
    async fn test_global_stats_aggregates_providers() {
        let tracker = TaskTracker::new();
        tracker.start("t1", ProviderId::OpenAi).await;
        tracker.complete("t1").await;
        tracker.start("t2", ProviderId::Anthropic).await;
        tracker.fail("t2").await;

        let global = tracker.global_stats().await;
        assert_eq!(global.completed_tasks, 1);
        assert_eq!(global.failed_tasks, 1);
    }
}
