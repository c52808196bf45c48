//! Anthropic adapter — Messages API (`/v1/messages`).
//!
//! Shares [`super::openai_compat::OpenAiCompatAdapter`]'s request/response/SSE
//! skeleton, adjusted for Anthropic's distinct auth headers (`x-api-key` +
//! `anthropic-version`, not `Authorization: Bearer`), its `system` field
//! being top-level rather than a first message, and its SSE event shape
//! (`content_block_delta` with `delta.text`, not `choices[0].delta.content`).
//!
//! Streaming is implemented, not stubbed — the existing SSE decoder
//! handles this event shape unchanged.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};

use super::sse::SseDecoder;
use super::{parse_retry_after, AdapterRequest, AdapterResponse, ChatMessage, ProviderAdapter, Role, Usage};
use crate::error::{ErrorKind, PipelineError, Result};
use crate::provider::ProviderConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Default)]
pub struct AnthropicAdapter;

impl AnthropicAdapter {
    pub fn new() -> Self {
        Self
    }

    fn base_url(config: &ProviderConfig) -> String {
        config
            .endpoint
            .clone()
            .unwrap_or_else(|| "https://api.anthropic.com".to_string())
    }

    fn build_messages(request: &AdapterRequest) -> Vec<Value> {
        let mut messages = Vec::new();
        for msg in &request.messages {
            let role = match msg.role {
                Role::System => continue, // system goes in the top-level `system` field
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

    fn build_body(config: &ProviderConfig, request: &AdapterRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": config.model,
            "messages": Self::build_messages(request),
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
            "stream": stream,
        });
        if let Some(ref sys) = request.system_prompt {
            if !sys.is_empty() {
                body["system"] = json!(sys);
            }
        }
        body
    }

    fn extract_usage(json_resp: &Value) -> Usage {
        let usage = json_resp.get("usage");
        Usage {
            input_tokens: usage.and_then(|u| u.get("input_tokens")).and_then(|v| v.as_u64()).unwrap_or(0) as u32,
            output_tokens: usage.and_then(|u| u.get("output_tokens")).and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    async fn complete(
        &self,
        client: &Client,
        config: &ProviderConfig,
        request: &AdapterRequest,
    ) -> Result<AdapterResponse> {
        let url = format!("{}/v1/messages", Self::base_url(config).trim_end_matches('/'));
        let body = Self::build_body(config, request, false);

        let mut req = client
            .post(&url)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        if let Some(key) = config.resolve_credential()? {
            req = req.header("x-api-key", key);
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
            return Err(PipelineError::HttpError { status, body: text, retry_after });
        }

        let json_resp: Value = resp.json().await?;
        let content = json_resp
            .get("content")
            .and_then(|c| c.get(0))
            .and_then(|block| block.get("text"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| PipelineError::classified(ErrorKind::NoContentInResponse))?
            .to_string();

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
        let url = format!("{}/v1/messages", Self::base_url(config).trim_end_matches('/'));
        let body = Self::build_body(config, request, true);

        let mut req = client
            .post(&url)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        if let Some(key) = config.resolve_credential()? {
            req = req.header("x-api-key", key);
        }

        let resp = req.send().await.map_err(PipelineError::Request)?;
        let status = resp.status().as_u16();

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::HttpError { status, body: text, retry_after: None });
        }

        let mut stream = resp.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut accumulated = String::new();
        let mut usage = Usage::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(PipelineError::Request)?;
            for json_val in decoder.decode(&chunk) {
                Self::fold_event(&json_val, &mut accumulated, &mut usage, on_token);
            }
        }
        for json_val in decoder.flush() {
            Self::fold_event(&json_val, &mut accumulated, &mut usage, on_token);
        }

        Ok(AdapterResponse { content: accumulated, usage })
    }

    async fn validate_credentials(&self, client: &Client, config: &ProviderConfig) -> Result<()> {
        let probe = AdapterRequest::new("ping");
        self.complete(client, config, &probe).await.map(|_| ())
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

impl AnthropicAdapter {
    /// Fold one decoded SSE event into the running accumulator, per the
    /// Messages API's streaming shape: `content_block_delta` events carry
    /// `delta.text`; `message_delta` carries cumulative `usage.output_tokens`.
    fn fold_event(
        json_val: &Value,
        accumulated: &mut String,
        usage: &mut Usage,
        on_token: &mut (dyn FnMut(String) + Send),
    ) {
        match json_val.get("type").and_then(|t| t.as_str()) {
            Some("content_block_delta") => {
                if let Some(text) = json_val
                    .get("delta")
                    .and_then(|d| d.get("text"))
                    .and_then(|v| v.as_str())
                {
                    if !text.is_empty() {
                        accumulated.push_str(text);
                        on_token(text.to_string());
                    }
                }
            }
            Some("message_delta") => {
                if let Some(output) = json_val
                    .get("usage")
                    .and_then(|u| u.get("output_tokens"))
                    .and_then(|v| v.as_u64())
                {
                    usage.output_tokens = output as u32;
                }
            }
            Some("message_start") => {
                if let Some(input) = json_val
                    .get("message")
                    .and_then(|m| m.get("usage"))
                    .and_then(|u| u.get("input_tokens"))
                    .and_then(|v| v.as_u64())
                {
                    usage.input_tokens = input as u32;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    fn config() -> ProviderConfig {
        ProviderConfig::new(ProviderId::Anthropic, "claude-3-5-sonnet-latest")
    }

    #[test]
    fn test_system_prompt_is_top_level_not_a_message() {
        let request = AdapterRequest::new("hi").with_system_prompt("be terse");
        let body = AnthropicAdapter::build_body(&config(), &request, false);
        assert_eq!(body["system"], "be terse");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn test_fold_content_block_delta() {
        let mut accumulated = String::new();
        let mut usage = Usage::default();
        let mut tokens = Vec::new();
        let event = json!({"type": "content_block_delta", "delta": {"text": "hi there"}});
        AnthropicAdapter::fold_event(&event, &mut accumulated, &mut usage, &mut |t| tokens.push(t));
        assert_eq!(accumulated, "hi there");
        assert_eq!(tokens, vec!["hi there".to_string()]);
    }

    #[test]
    fn test_fold_message_start_captures_input_tokens() {
        let mut accumulated = String::new();
        let mut usage = Usage::default();
        let event = json!({"type": "message_start", "message": {"usage": {"input_tokens": 42}}});
        AnthropicAdapter::fold_event(&event, &mut accumulated, &mut usage, &mut |_| {});
        assert_eq!(usage.input_tokens, 42);
    }

    #[test]
    fn test_extract_usage() {
        let resp = json!({"usage": {"input_tokens": 5, "output_tokens": 9}});
        let usage = AnthropicAdapter::extract_usage(&resp);
        assert_eq!(usage.input_tokens, 5);
        assert_eq!(usage.output_tokens, 9);
    }
}
