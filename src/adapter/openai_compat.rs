//! Adapter for the OpenAI-compatible chat-completions wire shape.
//!
//! Covers OpenAI, DeepSeek, and Perplexity — all three speak
//! `/v1/chat/completions` with an SSE streaming mode and a bearer token.
//! Perplexity additionally returns a `citations` array that this adapter
//! appends to the content as a numbered list.
//!
//! Generalized from a single fixed endpoint to a per-`ProviderId` default
//! base URL plus the citation post-processing step.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};

use super::sse::SseDecoder;
use super::{parse_retry_after, AdapterRequest, AdapterResponse, ChatMessage, ProviderAdapter, Role, Usage};
use crate::error::{ErrorKind, PipelineError, Result};
use crate::provider::ProviderConfig;
use crate::provider::ProviderId;

/// Default base URL per provider, used when `config.endpoint` is unset.
fn default_base_url(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::OpenAi => "https://api.openai.com",
        ProviderId::DeepSeek => "https://api.deepseek.com",
        ProviderId::Perplexity => "https://api.perplexity.ai",
        _ => "",
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiCompatAdapter {
    provider: ProviderId,
}

impl OpenAiCompatAdapter {
    pub fn new(provider: ProviderId) -> Self {
        Self { provider }
    }

    fn base_url(&self, config: &ProviderConfig) -> String {
        config
            .endpoint
            .clone()
            .unwrap_or_else(|| default_base_url(self.provider).to_string())
    }

    fn build_messages(request: &AdapterRequest) -> Vec<Value> {
        let mut messages = Vec::new();
        if let Some(ref sys) = request.system_prompt {
            if !sys.is_empty() {
                messages.push(json!({"role": "system", "content": sys}));
            }
        }
        for msg in &request.messages {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(json!({"role": role, "content": msg.content}));
        }
        if request.messages.is_empty() {
            messages.push(json!({"role": "user", "content": request.prompt}));
        }
        messages
    }

    fn build_body(&self, config: &ProviderConfig, request: &AdapterRequest, stream: bool) -> Value {
        json!({
            "model": config.model,
            "messages": Self::build_messages(request),
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
            "stream": stream,
        })
    }

    async fn auth_header(&self, config: &ProviderConfig) -> Result<Option<String>> {
        match config.resolve_credential()? {
            Some(key) => Ok(Some(format!("Bearer {}", key))),
            None => Ok(None),
        }
    }

    fn extract_usage(json_resp: &Value) -> Usage {
        let usage = json_resp.get("usage");
        Usage {
            input_tokens: usage
                .and_then(|u| u.get("prompt_tokens"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            output_tokens: usage
                .and_then(|u| u.get("completion_tokens"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
        }
    }

    /// Perplexity appends a numbered citation list after the main content
    /// when the response includes a non-empty `citations` array.
    fn append_citations(content: String, json_resp: &Value) -> String {
        let citations = json_resp.get("citations").and_then(|c| c.as_array());
        match citations {
            Some(list) if !list.is_empty() => {
                let numbered = list
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| v.as_str().map(|s| format!("{}. {}", i + 1, s)))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("{}\n\nSources:\n{}", content, numbered)
            }
            _ => content,
        }
    }

    fn classify_http_error(status: u16, body: String, retry_after: Option<std::time::Duration>) -> PipelineError {
        PipelineError::HttpError {
            status,
            body,
            retry_after,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatAdapter {
    async fn complete(
        &self,
        client: &Client,
        config: &ProviderConfig,
        request: &AdapterRequest,
    ) -> Result<AdapterResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url(config).trim_end_matches('/'));
        let body = self.build_body(config, request, false);

        let mut req = client.post(&url).json(&body);
        if let Some(auth) = self.auth_header(config).await? {
            req = req.header("Authorization", auth);
        }

        let resp = req.send().await.map_err(PipelineError::Request)?;
        let status = resp.status().as_u16();

        if !resp.status().is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let text = resp.text().await.unwrap_or_default();
            return Err(Self::classify_http_error(status, text, retry_after));
        }

        let json_resp: Value = resp.json().await?;
        let content = json_resp
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| PipelineError::classified(ErrorKind::NoContentInResponse))?
            .to_string();

        let content = Self::append_citations(content, &json_resp);

        Ok(AdapterResponse {
            content,
            usage: Self::extract_usage(&json_resp),
        })
    }

    async fn complete_streaming(
        &self,
        client: &Client,
        config: &ProviderConfig,
        request: &AdapterRequest,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<AdapterResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url(config).trim_end_matches('/'));
        let body = self.build_body(config, request, true);

        let mut req = client.post(&url).json(&body);
        if let Some(auth) = self.auth_header(config).await? {
            req = req.header("Authorization", auth);
        }

        let resp = req.send().await.map_err(PipelineError::Request)?;
        let status = resp.status().as_u16();

        if !resp.status().is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let text = resp.text().await.unwrap_or_default();
            return Err(Self::classify_http_error(status, text, retry_after));
        }

        let mut stream = resp.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut accumulated = String::new();
        let mut last_json = Value::Null;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(PipelineError::Request)?;
            for json_val in decoder.decode(&chunk) {
                if let Some(content) = json_val
                    .get("choices")
                    .and_then(|c| c.get(0))
                    .and_then(|c| c.get("delta"))
                    .and_then(|d| d.get("content"))
                    .and_then(|v| v.as_str())
                {
                    if !content.is_empty() {
                        accumulated.push_str(content);
                        on_token(content.to_string());
                    }
                }
                last_json = json_val;
            }
        }
        for json_val in decoder.flush() {
            if let Some(content) = json_val
                .get("choices")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("delta"))
                .and_then(|d| d.get("content"))
                .and_then(|v| v.as_str())
            {
                if !content.is_empty() {
                    accumulated.push_str(content);
                    on_token(content.to_string());
                }
            }
            last_json = json_val;
        }

        let accumulated = Self::append_citations(accumulated, &last_json);

        Ok(AdapterResponse {
            content: accumulated,
            usage: Self::extract_usage(&last_json),
        })
    }

    async fn validate_credentials(&self, client: &Client, config: &ProviderConfig) -> Result<()> {
        let probe = AdapterRequest::new("ping");
        self.complete(client, config, &probe).await.map(|_| ())
    }

    fn name(&self) -> &'static str {
        match self.provider {
            ProviderId::OpenAi => "openai",
            ProviderId::DeepSeek => "deepseek",
            ProviderId::Perplexity => "perplexity",
            _ => "openai-compat",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProviderConfig {
        ProviderConfig::new(ProviderId::OpenAi, "gpt-4o")
    }

    fn request() -> AdapterRequest {
        AdapterRequest::new("hello").with_system_prompt("be nice")
    }

    #[test]
    fn test_build_messages_includes_system_and_user() {
        let adapter = OpenAiCompatAdapter::new(ProviderId::OpenAi);
        let body = adapter.build_body(&config(), &request(), false);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "hello");
    }

    #[test]
    fn test_default_base_urls() {
        assert_eq!(default_base_url(ProviderId::OpenAi), "https://api.openai.com");
        assert_eq!(default_base_url(ProviderId::DeepSeek), "https://api.deepseek.com");
        assert_eq!(default_base_url(ProviderId::Perplexity), "https://api.perplexity.ai");
    }

    #[test]
    fn test_append_citations_formats_numbered_list() {
        let resp = json!({"citations": ["https://a.example", "https://b.example"]});
        let content = OpenAiCompatAdapter::append_citations("answer".into(), &resp);
        assert!(content.contains("1. https://a.example"));
        assert!(content.contains("2. https://b.example"));
    }

    #[test]
    fn test_append_citations_noop_when_absent() {
        let resp = json!({});
        let content = OpenAiCompatAdapter::append_citations("answer".into(), &resp);
        assert_eq!(content, "answer");
    }

    #[test]
    fn test_extract_usage() {
        let resp = json!({"usage": {"prompt_tokens": 10, "completion_tokens": 20}});
        let usage = OpenAiCompatAdapter::extract_usage(&resp);
        assert_eq!(usage.input_tokens, 10);
        assert_eq!(usage.output_tokens, 20);
    }

    #[test]
    fn test_name_per_provider() {
        assert_eq!(OpenAiCompatAdapter::new(ProviderId::OpenAi).name(), "openai");
        assert_eq!(OpenAiCompatAdapter::new(ProviderId::DeepSeek).name(), "deepseek");
        assert_eq!(OpenAiCompatAdapter::new(ProviderId::Perplexity).name(), "perplexity");
    }
}
