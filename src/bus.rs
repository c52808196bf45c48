//! Event Bus.
//!
//! Topic-keyed publish/subscribe used to decouple workers (publishers) from
//! the Live Display and the Pattern Learner (subscribers). Topics are plain
//! strings (`"agent:openai"`, `"task:<id>"`, `"router"`); a subscriber picks
//! the granularity it wants by choosing which topics to subscribe to.
//!
//! Generalizes the single-callback [`crate::events::EventHandler`] model
//! from one global callback to many independent, multi-consumer topic
//! channels via [`tokio::sync::broadcast`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

use crate::provider::ProviderId;

/// Capacity of each topic's broadcast channel. A slow subscriber that falls
/// behind by more than this many events starts missing the oldest ones
/// (`broadcast::error::RecvError::Lagged`), which is the Live Display's
/// problem to handle by resyncing from the Task Tracker, not the Bus's.
const TOPIC_CAPACITY: usize = 256;

/// Every event the orchestration system emits onto the bus.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TaskQueued { task_id: String },
    TaskAssigned { task_id: String, provider: ProviderId },
    AgentStarted { task_id: String, provider: ProviderId },
    AgentToken { task_id: String, provider: ProviderId, token: String },
    AgentCompleted { task_id: String, provider: ProviderId, duration_ms: u64 },
    AgentFailed { task_id: String, provider: ProviderId, reason: String },
    AgentRetrying { task_id: String, provider: ProviderId, attempt: u32, delay_ms: u64 },
    ConflictDetected { task_id: String, providers: Vec<ProviderId> },
    MergeResolved { task_id: String, strategy: String },
    RouterDeadlineExceeded { task_id: String },
}

impl Event {
    /// The task identifier this event concerns, if any — used to build the
    /// `task:<id>` topic.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Event::TaskQueued { task_id }
            | Event::TaskAssigned { task_id, .. }
            | Event::AgentStarted { task_id, .. }
            | Event::AgentToken { task_id, .. }
            | Event::AgentCompleted { task_id, .. }
            | Event::AgentFailed { task_id, .. }
            | Event::AgentRetrying { task_id, .. }
            | Event::ConflictDetected { task_id, .. }
            | Event::MergeResolved { task_id, .. }
            | Event::RouterDeadlineExceeded { task_id } => Some(task_id),
        }
    }

    /// The provider this event concerns, if any — used to build the
    /// `agent:<provider>` topic.
    pub fn provider(&self) -> Option<ProviderId> {
        match self {
            Event::TaskAssigned { provider, .. }
            | Event::AgentStarted { provider, .. }
            | Event::AgentToken { provider, .. }
            | Event::AgentCompleted { provider, .. }
            | Event::AgentFailed { provider, .. }
            | Event::AgentRetrying { provider, .. } => Some(*provider),
            _ => None,
        }
    }
}

/// Topic-keyed publish/subscribe bus.
///
/// Cloning an [`EventBus`] is cheap and shares the same topic table (it
/// wraps an `Arc` internally); hand clones to every worker and the
/// display loop rather than threading a reference around.
#[derive(Clone)]
pub struct EventBus {
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<Event>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Publish `event` to `topic`. A no-op (not an error) if nobody has
    /// subscribed to that topic yet — publishers don't need to know whether
    /// anyone is listening.
    pub async fn publish(&self, topic: &str, event: Event) {
        let topics = self.topics.read().await;
        if let Some(sender) = topics.get(topic) {
            // Err means no receivers; that's fine, drop silently.
            let _ = sender.send(event);
        }
    }

    /// Publish `event` to every topic it's naturally addressed to:
    /// `agent:<provider>` (if it names one), `task:<id>` (if it names one),
    /// and the catch-all `"*"` topic.
    pub async fn publish_routed(&self, event: Event) {
        if let Some(provider) = event.provider() {
            self.publish(&format!("agent:{}", provider), event.clone()).await;
        }
        if let Some(task_id) = event.task_id() {
            self.publish(&format!("task:{}", task_id), event.clone()).await;
        }
        self.publish("*", event).await;
    }

    /// Subscribe to `topic`, creating it if it doesn't exist yet.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<Event> {
        let mut topics = self.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
