//! Router.
//!
//! Strategy-driven fan-out over a task's assigned providers: `all` (every
//! provider in parallel), `sequential` (feed each result into the next
//! call's context), `dialectical` (thesis → antithesis → synthesis).
//!
//! `all` is the one strategy where fan-out must become genuine
//! concurrency rather than a sequential chain: spawned tasks report back
//! over a channel, gated by a semaphore.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::adapter::AdapterRequest;
use crate::bus::{Event, EventBus};
use crate::context::{build_enhanced_prompt, build_system_prompt, PreviousResult, PromptContext};
use crate::error::PipelineError;
use crate::provider::ProviderId;
use crate::worker::AgentWorker;

/// Routing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    All,
    Sequential,
    Dialectical,
}

/// Per-provider outcome of a single routed call.
#[derive(Debug, Clone)]
pub enum ProviderOutcome {
    Succeeded { content: String },
    Failed { error: String },
}

/// Result of `Strategy::All` / `Strategy::Sequential`.
#[derive(Debug, Clone, Default)]
pub struct RouteResult {
    pub outcomes: HashMap<ProviderId, ProviderOutcome>,
}

/// Result of `Strategy::Dialectical`.
#[derive(Debug, Clone, Default)]
pub struct DialecticalResult {
    pub thesis: HashMap<ProviderId, ProviderOutcome>,
    pub antithesis: HashMap<ProviderId, Vec<(ProviderId, ProviderOutcome)>>,
    pub synthesis: HashMap<ProviderId, ProviderOutcome>,
}

/// Deadline and cancel signal shared by every spawned child call.
#[derive(Clone)]
pub struct RouteDeadline {
    pub timeout: Duration,
    pub cancel: Arc<AtomicBool>,
}

impl RouteDeadline {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancel.store(true, std::sync::atomic::Ordering::Relaxed);
    }
}

/// Fan-out concurrency cap for `Strategy::All`, matching the DAG
/// orchestrator pattern's semaphore-gated spawn.
const MAX_CONCURRENT_CALLS: usize = 16;

/// Router: strategy-driven fan-out over a set of [`AgentWorker`]s.
#[derive(Clone)]
pub struct Router {
    bus: EventBus,
}

impl Router {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    async fn call_one(
        worker: &AgentWorker,
        task_id: &str,
        prompt: &str,
        context: &PromptContext,
        deadline: &RouteDeadline,
    ) -> ProviderOutcome {
        let system_prompt = build_system_prompt(context);
        let enhanced = build_enhanced_prompt(prompt, context);
        let request = AdapterRequest::new(enhanced).with_system_prompt(system_prompt);

        let call = worker.execute(task_id, request);
        match timeout(deadline.timeout, call).await {
            Ok(Ok(outcome)) => ProviderOutcome::Succeeded { content: outcome.content },
            Ok(Err(err)) => ProviderOutcome::Failed { error: err.to_string() },
            Err(_) => ProviderOutcome::Failed { error: PipelineError::Cancelled.to_string() },
        }
    }

    /// `all` — fan out to every worker in parallel, collecting whichever
    /// results arrive before the deadline. `context` (the `-c/--context`
    /// file's relevant files and any seed previous-results) is shared
    /// read-only across every spawned call.
    pub async fn route_all(
        &self,
        task_id: &str,
        prompt: &str,
        workers: &[AgentWorker],
        context: PromptContext,
        deadline: RouteDeadline,
    ) -> RouteResult {
        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_CALLS));
        let mut handles = Vec::new();

        for worker in workers {
            let worker = worker.clone();
            let permit = Arc::clone(&semaphore);
            let task_id = task_id.to_string();
            let prompt = prompt.to_string();
            let context = context.clone();
            let deadline = deadline.clone();
            let bus = self.bus.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit.acquire_owned().await;
                let provider = worker.provider();
                let outcome = Self::call_one(&worker, &task_id, &prompt, &context, &deadline).await;
                if deadline.cancel.load(std::sync::atomic::Ordering::Relaxed) {
                    bus.publish_routed(Event::RouterDeadlineExceeded { task_id: task_id.clone() }).await;
                }
                (provider, outcome)
            }));
        }

        let mut outcomes = HashMap::new();
        for handle in handles {
            if let Ok((provider, outcome)) = handle.await {
                outcomes.insert(provider, outcome);
            }
        }

        RouteResult { outcomes }
    }

    /// `sequential` — call providers in order, feeding each result forward
    /// as the next call's `previous_results`, seeded with `context`.
    pub async fn route_sequential(
        &self,
        task_id: &str,
        prompt: &str,
        workers: &[AgentWorker],
        context: PromptContext,
        deadline: RouteDeadline,
    ) -> RouteResult {
        let mut outcomes = HashMap::new();
        let mut context = context;

        for worker in workers {
            if deadline.cancel.load(std::sync::atomic::Ordering::Relaxed) {
                break;
            }
            let provider = worker.provider();
            let outcome = Self::call_one(worker, task_id, prompt, &context, &deadline).await;

            if let ProviderOutcome::Succeeded { ref content } = outcome {
                context.previous_results.push(PreviousResult {
                    provider: provider.to_string(),
                    content: content.clone(),
                });
            }
            outcomes.insert(provider, outcome);
        }

        RouteResult { outcomes }
    }

    /// `dialectical` — thesis (`all`), then antithesis (each answer
    /// critiqued by every other provider), then synthesis (critiques fed
    /// back to the original author for a final answer). `context` seeds
    /// every phase.
    pub async fn route_dialectical(
        &self,
        task_id: &str,
        prompt: &str,
        workers: &[AgentWorker],
        context: PromptContext,
        deadline: RouteDeadline,
    ) -> DialecticalResult {
        let thesis = self.route_all(task_id, prompt, workers, context.clone(), deadline.clone()).await.outcomes;

        let mut antithesis: HashMap<ProviderId, Vec<(ProviderId, ProviderOutcome)>> = HashMap::new();
        for (author, outcome) in &thesis {
            let ProviderOutcome::Succeeded { content } = outcome else {
                continue;
            };
            let critique_prompt = format!("Critique the following answer:\n\n{}", content);
            let mut critiques = Vec::new();
            for critic in workers.iter().filter(|w| w.provider() != *author) {
                let critique = Self::call_one(critic, task_id, &critique_prompt, &context, &deadline).await;
                critiques.push((critic.provider(), critique));
            }
            antithesis.insert(*author, critiques);
        }

        let mut synthesis = HashMap::new();
        for worker in workers {
            let author = worker.provider();
            let Some(critiques) = antithesis.get(&author) else {
                continue;
            };
            let aggregated = critiques
                .iter()
                .filter_map(|(provider, outcome)| match outcome {
                    ProviderOutcome::Succeeded { content } => Some(format!("{}: {}", provider, content)),
                    ProviderOutcome::Failed { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            let synthesis_prompt = format!(
                "Revise your original answer to \"{}\" given this feedback:\n\n{}",
                prompt, aggregated
            );
            let outcome = Self::call_one(worker, task_id, &synthesis_prompt, &context, &deadline).await;
            synthesis.insert(author, outcome);
        }

        DialecticalResult { thesis, antithesis, synthesis }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MockAdapter;
    use crate::provider::ProviderConfig;

    fn worker(id: ProviderId, response: &str) -> AgentWorker {
        let config = Arc::new(ProviderConfig::new(id, "mock-model"));
        AgentWorker::new(config, Arc::new(MockAdapter::fixed(response)), EventBus::new())
    }

    #[tokio::test]
    async fn test_route_all_collects_every_provider() {
        let router = Router::new(EventBus::new());
        let workers = vec![worker(ProviderId::OpenAi, "a"), worker(ProviderId::Anthropic, "b")];
        let result = router
            .route_all("t1", "do a thing", &workers, PromptContext::default(), RouteDeadline::new(Duration::from_secs(5)))
            .await;
        assert_eq!(result.outcomes.len(), 2);
        assert!(matches!(result.outcomes[&ProviderId::OpenAi], ProviderOutcome::Succeeded { .. }));
    }

    #[tokio::test]
    async fn test_route_sequential_forwards_previous_results() {
        let router = Router::new(EventBus::new());
        let workers = vec![worker(ProviderId::OpenAi, "first"), worker(ProviderId::Anthropic, "second")];
        let result = router
            .route_sequential("t1", "do a thing", &workers, PromptContext::default(), RouteDeadline::new(Duration::from_secs(5)))
            .await;
        assert_eq!(result.outcomes.len(), 2);
    }

    #[tokio::test]
    async fn test_route_dialectical_produces_three_phases() {
        let router = Router::new(EventBus::new());
        let workers = vec![worker(ProviderId::OpenAi, "first"), worker(ProviderId::Anthropic, "second")];
        let result = router
            .route_dialectical(
                "t1",
                "do a thing",
                &workers,
                PromptContext::default(),
                RouteDeadline::new(Duration::from_secs(5)),
            )
            .await;
        assert_eq!(result.thesis.len(), 2);
        assert_eq!(result.antithesis.len(), 2);
        assert_eq!(result.synthesis.len(), 2);
    }

    #[test]
    fn test_strategy_serde_snake_case() {
        let s = serde_json::to_string(&Strategy::Dialectical).unwrap();
        assert_eq!(s, "\"dialectical\"");
    }
}
