//! Local adapter — Ollama's native API.
//!
//! `/api/generate` (prompt-only) / `/api/chat` (system prompt or history),
//! NDJSON streaming via [`crate::streaming::StreamingDecoder`]. Runs a
//! health probe (`GET /api/tags`) ahead of every `validate_credentials`
//! call, reporting `ServerUnreachable` on failure.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};

use super::{parse_retry_after, AdapterRequest, AdapterResponse, ChatMessage, ProviderAdapter, Role, Usage};
use crate::error::{ErrorKind, PipelineError, Result};
use crate::provider::ProviderConfig;
use crate::streaming::StreamingDecoder;

#[derive(Debug, Clone, Default)]
pub struct LocalAdapter;

impl LocalAdapter {
    pub fn new() -> Self {
        Self
    }

    fn base_url(config: &ProviderConfig) -> String {
        config
            .endpoint
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string())
    }

    fn use_chat(request: &AdapterRequest) -> bool {
        request.system_prompt.as_ref().is_some_and(|s| !s.is_empty()) || !request.messages.is_empty()
    }

    fn build_options(config: &ProviderConfig) -> Value {
        json!({
            "temperature": config.temperature,
            "num_predict": config.max_tokens,
        })
    }

    fn build_generate_body(config: &ProviderConfig, request: &AdapterRequest, stream: bool) -> Value {
        json!({
            "model": config.model,
            "prompt": request.prompt,
            "stream": stream,
            "options": Self::build_options(config),
        })
    }

    fn build_chat_body(config: &ProviderConfig, request: &AdapterRequest, stream: bool) -> Value {
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
        json!({
            "model": config.model,
            "messages": messages,
            "stream": stream,
            "options": Self::build_options(config),
        })
    }

    async fn send_request(client: &Client, url: &str, body: &Value) -> Result<(Value, u16)> {
        let resp = client.post(url).json(body).send().await.map_err(|_| {
            PipelineError::classified(ErrorKind::ServerUnreachable)
        })?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::HttpError {
                status,
                body: text,
                retry_after,
            });
        }
        let json_resp: Value = resp.json().await?;
        Ok((json_resp, status))
    }

    fn extract_usage(json_resp: &Value) -> Usage {
        Usage {
            input_tokens: json_resp
                .get("prompt_eval_count")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            output_tokens: json_resp.get("eval_count").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        }
    }
}

/// Record whether a `<think>` block was found and stripped.
fn log_think_diagnostics(thinking: Option<String>) {
    let diagnostics = crate::diagnostics::ParseDiagnostics {
        strategy: Some("strip_think_tags"),
        repaired: thinking.is_some(),
        ..Default::default()
    };
    tracing::debug!(?diagnostics, "local adapter post-processed response");
}

#[async_trait]
impl ProviderAdapter for LocalAdapter {
    async fn complete(
        &self,
        client: &Client,
        config: &ProviderConfig,
        request: &AdapterRequest,
    ) -> Result<AdapterResponse> {
        let base = Self::base_url(config);
        let base = base.trim_end_matches('/');

        if Self::use_chat(request) {
            let url = format!("{}/api/chat", base);
            let body = Self::build_chat_body(config, request, false);
            let (json_resp, _status) = Self::send_request(client, &url, &body).await?;
            let content = json_resp
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(|v| v.as_str())
                .unwrap_or("");
            // Locally served reasoning models (e.g. deepseek-r1) emit a
            // <think> block ahead of the answer; strip it from the
            // non-streaming result.
            let (thinking, content) = crate::parsing::extract_thinking(content);
            log_think_diagnostics(thinking);
            Ok(AdapterResponse {
                content,
                usage: Self::extract_usage(&json_resp),
            })
        } else {
            let url = format!("{}/api/generate", base);
            let body = Self::build_generate_body(config, request, false);
            let (json_resp, _status) = Self::send_request(client, &url, &body).await?;
            let content = json_resp
                .get("response")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            let (thinking, content) = crate::parsing::extract_thinking(content);
            log_think_diagnostics(thinking);
            Ok(AdapterResponse {
                content,
                usage: Self::extract_usage(&json_resp),
            })
        }
    }

    async fn complete_streaming(
        &self,
        client: &Client,
        config: &ProviderConfig,
        request: &AdapterRequest,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<AdapterResponse> {
        let base = Self::base_url(config);
        let base = base.trim_end_matches('/');
        let use_chat = Self::use_chat(request);

        let (url, body) = if use_chat {
            (format!("{}/api/chat", base), Self::build_chat_body(config, request, true))
        } else {
            (format!("{}/api/generate", base), Self::build_generate_body(config, request, true))
        };

        let resp = client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|_| PipelineError::classified(ErrorKind::ServerUnreachable))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::HttpError {
                status,
                body: text,
                retry_after: None,
            });
        }

        let mut stream = resp.bytes_stream();
        let mut decoder = StreamingDecoder::new();
        let mut accumulated = String::new();
        let mut usage = Usage::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(PipelineError::Request)?;
            for json_val in decoder.decode(&chunk) {
                let token_str = if use_chat {
                    json_val.get("message").and_then(|m| m.get("content")).and_then(|c| c.as_str())
                } else {
                    json_val.get("response").and_then(|r| r.as_str())
                };
                if let Some(t) = token_str {
                    if !t.is_empty() {
                        accumulated.push_str(t);
                        on_token(t.to_string());
                    }
                }
                if json_val.get("done").and_then(|v| v.as_bool()) == Some(true) {
                    usage = Self::extract_usage(&json_val);
                }
            }
        }
        if let Some(json_val) = decoder.flush() {
            let token_str = if use_chat {
                json_val.get("message").and_then(|m| m.get("content")).and_then(|c| c.as_str())
            } else {
                json_val.get("response").and_then(|r| r.as_str())
            };
            if let Some(t) = token_str {
                if !t.is_empty() {
                    accumulated.push_str(t);
                    on_token(t.to_string());
                }
            }
            if json_val.get("done").and_then(|v| v.as_bool()) == Some(true) {
                usage = Self::extract_usage(&json_val);
            }
        }

        Ok(AdapterResponse {
            content: accumulated,
            usage,
        })
    }

    async fn validate_credentials(&self, client: &Client, config: &ProviderConfig) -> Result<()> {
        let base = Self::base_url(config);
        let url = format!("{}/api/tags", base.trim_end_matches('/'));
        client
            .get(&url)
            .send()
            .await
            .map_err(|_| PipelineError::classified(ErrorKind::ServerUnreachable))?
            .error_for_status()
            .map_err(|_| PipelineError::classified(ErrorKind::ServerUnreachable))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    fn config() -> ProviderConfig {
        ProviderConfig::new(ProviderId::Local, "llama3.2")
    }

    #[test]
    fn test_use_chat_requires_system_prompt_or_history() {
        let plain = AdapterRequest::new("hi");
        assert!(!LocalAdapter::use_chat(&plain));

        let with_system = AdapterRequest::new("hi").with_system_prompt("be nice");
        assert!(LocalAdapter::use_chat(&with_system));
    }

    #[test]
    fn test_generate_body_shape() {
        let body = LocalAdapter::build_generate_body(&config(), &AdapterRequest::new("hi"), false);
        assert_eq!(body["model"], "llama3.2");
        assert_eq!(body["prompt"], "hi");
        assert_eq!(body["options"]["temperature"], 0.7);
    }

    #[test]
    fn test_chat_body_shape() {
        let request = AdapterRequest::new("hi").with_system_prompt("be nice");
        let body = LocalAdapter::build_chat_body(&config(), &request, false);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
    }

    #[test]
    fn test_extract_usage_from_done_payload() {
        let resp = json!({"prompt_eval_count": 5, "eval_count": 12, "done": true});
        let usage = LocalAdapter::extract_usage(&resp);
        assert_eq!(usage.input_tokens, 5);
        assert_eq!(usage.output_tokens, 12);
    }

    #[tokio::test]
    async fn test_validate_credentials_unreachable_classified() {
        let adapter = LocalAdapter::new();
        let client = Client::new();
        let mut bad_config = config();
        bad_config.endpoint = Some("http://127.0.0.1:1".to_string());
        let result = adapter.validate_credentials(&client, &bad_config).await;
        assert!(matches!(
            result.unwrap_err().kind(),
            ErrorKind::ServerUnreachable
        ));
    }
}
