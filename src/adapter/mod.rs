//! Provider Adapters.
//!
//! [`ProviderAdapter`] is the uniform contract every backend implements:
//! `complete`, `complete_streaming`, `validate_credentials`, `name`.
//!
//! ```text
//! AgentWorker ──► AdapterRequest ──► ProviderAdapter::complete() ──► AdapterResponse
//!                                            │
//!            ┌────────────┬────────────┬─────┴──────┬───────────┬───────────┐
//!         OpenAi      Anthropic     DeepSeek    Perplexity      Oci        Local
//!     /v1/chat/compl  /v1/messages   (openai-compatible wire)  genai     /api/generate
//! ```

pub mod anthropic;
pub mod local;
pub mod mock;
pub mod oci;
pub mod openai_compat;
pub mod sse;

pub use anthropic::AnthropicAdapter;
pub use local::LocalAdapter;
pub use mock::MockAdapter;
pub use oci::OciAdapter;
pub use openai_compat::OpenAiCompatAdapter;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;
use crate::provider::ProviderConfig;

/// A single message in a chat-style conversation.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A normalized, provider-agnostic request. [`crate::worker::AgentWorker`]
/// builds this from a task and the Context Formatter's output.
#[derive(Debug, Clone)]
pub struct AdapterRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
}

impl AdapterRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            messages: Vec::new(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

/// Token usage reported by (or estimated for) a completed call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A normalized response: the assistant text plus usage for cost accounting.
#[derive(Debug, Clone)]
pub struct AdapterResponse {
    pub content: String,
    pub usage: Usage,
}

/// Abstraction over LLM providers.
///
/// Implementors translate [`AdapterRequest`]/[`AdapterResponse`] to and
/// from the provider's HTTP wire format. Object-safe; used as
/// `Arc<dyn ProviderAdapter>` by [`crate::worker::AgentWorker`].
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Execute a non-streaming call.
    async fn complete(
        &self,
        client: &Client,
        config: &ProviderConfig,
        request: &AdapterRequest,
    ) -> Result<AdapterResponse>;

    /// Execute a streaming call, invoking `on_token` for each text delta as
    /// it arrives. Returns the same normalized response as [`Self::complete`]
    /// once the stream ends.
    async fn complete_streaming(
        &self,
        client: &Client,
        config: &ProviderConfig,
        request: &AdapterRequest,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<AdapterResponse>;

    /// Verify this provider is reachable and its credentials are valid,
    /// without performing a full completion. Returns a configuration error
    /// for a structurally invalid config (e.g. OCI missing
    /// `compartment_id`) before any HTTP call is attempted.
    async fn validate_credentials(&self, client: &Client, config: &ProviderConfig) -> Result<()>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Parse an HTTP `Retry-After` header value as a duration. Shared across
/// every adapter rather than duplicated, per the retry-engine consolidation
/// noted in the grounding ledger.
pub fn parse_retry_after(value: &str) -> Option<std::time::Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(std::time::Duration::from_secs)
}
