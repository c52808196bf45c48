//! # Multi-Agent Coder
//!
//! Concurrent orchestration across heterogeneous LLM coding backends —
//! OpenAI, Anthropic, DeepSeek, Perplexity, OCI Generative AI, and a local
//! Ollama server. A prompt is fanned out to every configured provider
//! under a chosen [`router::Strategy`], streamed back token-by-token over
//! the [`bus::EventBus`], and — when more than one provider answers —
//! reconciled by the [`merge::MergeEngine`] into one merged result.
//!
//! ## Core components
//!
//! - **[`provider::ProviderId`] / [`provider::ProviderConfig`]** — stable
//!   provider identity and its immutable per-process configuration.
//! - **[`adapter::ProviderAdapter`]** — the uniform contract every backend
//!   implements (`complete`, `complete_streaming`, `validate_credentials`).
//! - **[`worker::AgentWorker`]** — one stateful worker per provider, retried
//!   and rate-limited by [`retry_engine`].
//! - **[`supervisor::AgentSupervisor`]** — owns every worker, tracks health.
//! - **[`router::Router`]** — strategy-driven fan-out (`all`, `sequential`,
//!   `dialectical`).
//! - **[`queue::TaskQueue`] / [`tracker::TaskTracker`] / [`allocator`]** —
//!   task lifecycle, assignment, and progress.
//! - **[`merge::MergeEngine`]** — conflict detection and resolution across
//!   provider outputs, informed by [`learner::PatternLearner`] and cached
//!   by [`cache::AnalysisCache`].
//! - **[`bus::EventBus`]** — topic-keyed pub/sub feeding [`display::LiveDisplay`].
//!
//! ## Quick start
//!
//! ```no_run
//! use multi_agent_coder::cli::App;
//! use multi_agent_coder::config::Configuration;
//! use multi_agent_coder::router::Strategy;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Configuration::from_json(r#"{
//!         "providers": { "local": { "model": "llama3.2" } }
//!     }"#)?;
//!     let app = App::build(&config, None);
//!     let results = app.run("task-1", "write a hello world in Rust", Strategy::All, None).await;
//!     for (provider, content) in results {
//!         println!("[{}] {}", provider, content);
//!     }
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod allocator;
pub mod bus;
pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod display;
pub mod error;
pub mod events;
pub mod learner;
pub mod merge;
pub mod output_parser;
pub mod parsing;
pub mod provider;
pub mod queue;
pub mod retry_engine;
pub mod router;
pub mod session;
pub mod streaming;
pub mod supervisor;
pub mod task;
pub mod token;
pub mod tracker;
pub mod worker;

pub use bus::{Event, EventBus};
pub use error::{PipelineError, Result};
pub use provider::{ProviderConfig, ProviderId};
pub use router::{Router, Strategy};
pub use streaming::StreamingDecoder;
pub use supervisor::AgentSupervisor;
pub use worker::AgentWorker;
