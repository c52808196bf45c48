//! End-to-end scenario tests exercising the public crate API: a task
//! fanned out across mock providers, through the Router, with results fed
//! into the Merge Engine or the Task Queue.

use std::sync::Arc;
use std::time::Duration;

use multi_agent_coder::adapter::MockAdapter;
use multi_agent_coder::bus::{Event, EventBus};
use multi_agent_coder::context::PromptContext;
use multi_agent_coder::error::ErrorKind;
use multi_agent_coder::merge::{FileVariant, MergeEngine, ResolutionStrategy};
use multi_agent_coder::provider::{ProviderConfig, ProviderId};
use multi_agent_coder::router::{ProviderOutcome, RouteDeadline, Router, Strategy};
use multi_agent_coder::supervisor::AgentSupervisor;
use multi_agent_coder::worker::AgentWorker;

fn worker_with(id: ProviderId, adapter: MockAdapter, bus: EventBus) -> AgentWorker {
    let config = Arc::new(ProviderConfig::new(id, "mock-model"));
    AgentWorker::new(config, Arc::new(adapter), bus)
}

/// Two providers, one streaming multiple chunks, fanned out via `all`: both
/// succeed and the streaming provider's bus tokens concatenate to its
/// reported content (checked directly at the worker level, since `all`
/// drives the non-streaming call path — see DESIGN.md's "Streaming through
/// the Router" note).
#[tokio::test]
async fn scenario_dual_provider_streaming_fan_out() {
    let bus = EventBus::new();
    let mut token_sub = bus.subscribe("agent:openai").await;

    let streaming_adapter = MockAdapter::fixed("unused").with_stream_chunks(vec!["def ", "hello", "()"]);
    let streaming_worker = worker_with(ProviderId::OpenAi, streaming_adapter, bus.clone());
    let streamed = streaming_worker
        .execute_streaming("t1", multi_agent_coder::adapter::AdapterRequest::new("hi"), &mut |_| {})
        .await
        .unwrap();
    assert_eq!(streamed.content, "def hello()");

    let mut seen = String::new();
    while let Ok(event) = token_sub.try_recv() {
        if let Event::AgentToken { token, .. } = event {
            seen.push_str(&token);
        }
    }
    assert_eq!(seen, streamed.content);

    let router = Router::new(bus.clone());
    let workers = vec![
        worker_with(ProviderId::OpenAi, MockAdapter::fixed("from openai"), bus.clone()),
        worker_with(ProviderId::Anthropic, MockAdapter::fixed("from anthropic"), bus.clone()),
    ];
    let result = router
        .route_all("t1", "write a hello world", &workers, PromptContext::default(), RouteDeadline::new(Duration::from_secs(5)))
        .await;

    assert_eq!(result.outcomes.len(), 2);
    assert!(matches!(
        result.outcomes[&ProviderId::OpenAi],
        ProviderOutcome::Succeeded { ref content } if content == "from openai"
    ));
    assert!(matches!(
        result.outcomes[&ProviderId::Anthropic],
        ProviderOutcome::Succeeded { ref content } if content == "from anthropic"
    ));
}

/// `all` over one healthy and one authentication-failing provider: the
/// healthy one still succeeds, the failing one surfaces as `Failed` with an
/// authentication-classified reason.
#[tokio::test]
async fn scenario_mixed_success_and_auth_failure() {
    let bus = EventBus::new();
    let router = Router::new(bus.clone());
    let workers = vec![
        worker_with(ProviderId::OpenAi, MockAdapter::fixed("ok"), bus.clone()),
        worker_with(
            ProviderId::Anthropic,
            MockAdapter::fixed("unused").with_failing_completion(ErrorKind::AuthenticationError),
            bus.clone(),
        ),
    ];

    let result = router
        .route_all("t1", "write a function", &workers, PromptContext::default(), RouteDeadline::new(Duration::from_secs(5)))
        .await;

    assert!(matches!(
        result.outcomes[&ProviderId::OpenAi],
        ProviderOutcome::Succeeded { ref content } if content == "ok"
    ));
    match &result.outcomes[&ProviderId::Anthropic] {
        ProviderOutcome::Failed { error } => {
            assert!(error.contains(ErrorKind::AuthenticationError.reason()));
        }
        other => panic!("expected Anthropic to fail, got {other:?}"),
    }
}

/// A provider whose credentials never validate drops out of
/// `healthy_workers`; when every configured provider fails, the app-level
/// health check fails too (the CLI maps this to exit code 2).
#[tokio::test]
async fn scenario_unreachable_provider_marks_unhealthy() {
    let bus = EventBus::new();
    let entries: Vec<(Arc<ProviderConfig>, Arc<dyn multi_agent_coder::adapter::ProviderAdapter>)> = vec![(
        Arc::new(ProviderConfig::new(ProviderId::Local, "llama3.2")),
        Arc::new(MockAdapter::fixed("unused").with_failing_credentials())
            as Arc<dyn multi_agent_coder::adapter::ProviderAdapter>,
    )];
    let mut supervisor = AgentSupervisor::start(entries, bus);

    let results = supervisor.check_all_providers().await;
    assert!(results[&ProviderId::Local].is_err());
    assert!(supervisor.healthy_workers().is_empty());

    let any_healthy = results.values().any(|r| r.is_ok());
    assert!(!any_healthy, "every configured provider should have failed validation");
}

/// Two Python variants of the same file with one overlapping function
/// (`greet`) and one distinct function each (`bye` vs. `wave`): the
/// semantic strategy's merged output keeps all three, each exactly once.
#[tokio::test]
async fn scenario_semantic_merge_of_overlapping_python_variants() {
    let variant_a = FileVariant {
        provider: ProviderId::OpenAi,
        path: "foo.py".to_string(),
        content: Some(
            "def greet(name):\n    print(name)\n\ndef bye():\n    print('bye')\n".to_string(),
        ),
    };
    let variant_b = FileVariant {
        provider: ProviderId::Anthropic,
        path: "foo.py".to_string(),
        content: Some(
            "def greet(name):\n    print(name)\n\ndef wave():\n    print('wave')\n".to_string(),
        ),
    };

    let mut variants_by_path = std::collections::HashMap::new();
    variants_by_path.insert("foo.py".to_string(), vec![variant_a, variant_b]);

    let engine = MergeEngine::new(
        multi_agent_coder::cache::AnalysisCache::new(),
        multi_agent_coder::learner::PatternLearner::new(),
    );
    let outcome = engine.merge(variants_by_path, ResolutionStrategy::Semantic).await;

    let merged = outcome.merged.get("foo.py").expect("foo.py should have merged content");
    assert_eq!(merged.matches("def bye").count(), 1);
    assert_eq!(merged.matches("def wave").count(), 1);
    assert_eq!(merged.matches("def greet").count(), 1);
    assert!(outcome.unresolved.is_empty());
}

/// `dialectical` over three providers produces all three phases, one
/// entry per provider in each.
#[tokio::test]
async fn scenario_dialectical_three_phases_over_three_providers() {
    let bus = EventBus::new();
    let router = Router::new(bus.clone());
    let workers = vec![
        worker_with(ProviderId::OpenAi, MockAdapter::fixed("answer a"), bus.clone()),
        worker_with(ProviderId::Anthropic, MockAdapter::fixed("answer b"), bus.clone()),
        worker_with(ProviderId::DeepSeek, MockAdapter::fixed("answer c"), bus.clone()),
    ];

    let result = router
        .route_dialectical(
            "t1",
            "implement a stack",
            &workers,
            PromptContext::default(),
            RouteDeadline::new(Duration::from_secs(5)),
        )
        .await;

    assert_eq!(result.thesis.len(), 3);
    assert_eq!(result.antithesis.len(), 3);
    assert_eq!(result.synthesis.len(), 3);
    for critiques in result.antithesis.values() {
        // Each author is critiqued by the other two providers.
        assert_eq!(critiques.len(), 2);
    }
}

/// The task queue pops strictly by priority rank regardless of enqueue
/// order, oldest-first within the same rank.
#[tokio::test]
async fn scenario_task_queue_priority_ordering() {
    use multi_agent_coder::queue::TaskQueue;
    use multi_agent_coder::task::{Priority, Task, TaskOpts};

    let queue = TaskQueue::new();
    queue.enqueue(Task::new("low prio", TaskOpts { priority: Priority::Low, assigned_to: Default::default() })).await;
    queue
        .enqueue(Task::new(
            "normal prio",
            TaskOpts { priority: Priority::Normal, assigned_to: Default::default() },
        ))
        .await;
    queue.enqueue(Task::new("high prio", TaskOpts { priority: Priority::High, assigned_to: Default::default() })).await;

    let first = queue.dequeue_next().await.unwrap();
    assert_eq!(first.priority, Priority::High);
    assert_eq!(first.description, "high prio");

    let second = queue.dequeue_next().await.unwrap();
    assert_eq!(second.priority, Priority::Normal);

    let third = queue.dequeue_next().await.unwrap();
    assert_eq!(third.priority, Priority::Low);
}
