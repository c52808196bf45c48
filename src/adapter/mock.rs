//! Mock adapter for tests — returns pre-configured responses in order,
//! cycling once exhausted. Implements the full `ProviderAdapter` contract,
//! including `validate_credentials`.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::Client;

use super::{AdapterRequest, AdapterResponse, ProviderAdapter, Usage};
use crate::error::{ErrorKind, PipelineError, Result};
use crate::provider::ProviderConfig;

/// A test adapter that returns canned responses in order.
#[derive(Debug)]
pub struct MockAdapter {
    responses: Vec<String>,
    index: AtomicUsize,
    fail_credentials: bool,
    stream_chunks: Option<Vec<String>>,
    fail_completion: Option<ErrorKind>,
}

impl MockAdapter {
    /// Create a mock adapter with the given canned responses.
    pub fn new(responses: Vec<String>) -> Self {
        assert!(!responses.is_empty(), "MockAdapter requires at least one response");
        Self {
            responses,
            index: AtomicUsize::new(0),
            fail_credentials: false,
            stream_chunks: None,
            fail_completion: None,
        }
    }

    /// Create a mock that always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Make `validate_credentials` return `AuthenticationError`.
    pub fn with_failing_credentials(mut self) -> Self {
        self.fail_credentials = true;
        self
    }

    /// Make `complete` and `complete_streaming` return a classified error
    /// instead of a canned response.
    pub fn with_failing_completion(mut self, kind: ErrorKind) -> Self {
        self.fail_completion = Some(kind);
        self
    }

    /// Make `complete_streaming` emit `chunks` as separate tokens instead
    /// of one token for the whole response. The non-streaming `complete`
    /// path is unaffected.
    pub fn with_stream_chunks(mut self, chunks: Vec<impl Into<String>>) -> Self {
        self.stream_chunks = Some(chunks.into_iter().map(Into::into).collect());
        self
    }

    fn next_response(&self) -> String {
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.responses.len();
        self.responses[idx].clone()
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::fixed("mock response")
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    async fn complete(
        &self,
        _client: &Client,
        _config: &ProviderConfig,
        _request: &AdapterRequest,
    ) -> Result<AdapterResponse> {
        if let Some(kind) = self.fail_completion {
            return Err(PipelineError::classified(kind));
        }
        let content = self.next_response();
        let usage = Usage {
            input_tokens: crate::token::estimate_tokens(&_request.prompt),
            output_tokens: crate::token::estimate_tokens(&content),
        };
        Ok(AdapterResponse { content, usage })
    }

    async fn complete_streaming(
        &self,
        _client: &Client,
        _config: &ProviderConfig,
        _request: &AdapterRequest,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<AdapterResponse> {
        if let Some(kind) = self.fail_completion {
            return Err(PipelineError::classified(kind));
        }
        let content = match &self.stream_chunks {
            Some(chunks) => {
                let mut joined = String::new();
                for chunk in chunks {
                    on_token(chunk.clone());
                    joined.push_str(chunk);
                }
                joined
            }
            None => {
                let content = self.next_response();
                on_token(content.clone());
                content
            }
        };
        let usage = Usage {
            input_tokens: crate::token::estimate_tokens(&_request.prompt),
            output_tokens: crate::token::estimate_tokens(&content),
        };
        Ok(AdapterResponse { content, usage })
    }

    async fn validate_credentials(&self, _client: &Client, _config: &ProviderConfig) -> Result<()> {
        if self.fail_credentials {
            Err(PipelineError::classified(ErrorKind::AuthenticationError))
        } else {
            Ok(())
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
