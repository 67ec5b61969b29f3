// ABOUTME: HTTP client for an OpenAI-style chat completions gateway with SSE streaming.
// ABOUTME: Also provides the structured JSON generator the planner calls.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::time::Duration;

use super::planner::StructuredGenerator;
use super::types::ChatMessage;
use crate::config::GatewayConfig;
use crate::error::{OrchestratorError, Result};

/// One parsed server-sent event payload.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Content(String),
    Error { status: u16, message: String },
    Finished,
}

/// Plain chat completion: a conversation in, the assistant's reply out.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String>;
}

/// Client for `<base_url>/chat/completions`.
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GatewayClient {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                OrchestratorError::Config(format!("Failed to create HTTP client: {}", e))
            })?;

        let api_key = config.api_key();
        if api_key.is_none() {
            log::warn!(
                "[Gateway] {} is not set, requests will be sent without authorization",
                config.api_key_env
            );
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Build the request body for the chat completions endpoint.
    pub fn build_request_body(
        model: &str,
        messages: &[ChatMessage],
        response_format: Option<&serde_json::Value>,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": true
        });

        if let Some(format) = response_format {
            body["response_format"] = format.clone();
        }

        body
    }

    /// Parse a single SSE data line.
    pub fn parse_sse_data(data: &str) -> Vec<StreamEvent> {
        let parsed: serde_json::Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(_) => return Vec::new(),
        };

        let mut events = Vec::new();

        // Wrapped error status from the gateway
        if let Some(status) = parsed.get("status").and_then(|s| s.as_u64()) {
            if status >= 400 {
                let message = parsed
                    .pointer("/body/error/message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Gateway API error")
                    .to_string();
                events.push(StreamEvent::Error {
                    status: u16::try_from(status).unwrap_or(500),
                    message,
                });
                return events;
            }
        }

        let content = parsed
            .pointer("/delta/content")
            .or_else(|| parsed.pointer("/choices/0/delta/content"))
            .and_then(|v| v.as_str());

        if let Some(text) = content {
            if !text.is_empty() {
                events.push(StreamEvent::Content(text.to_string()));
            }
        }

        let finish_reason = parsed
            .pointer("/choices/0/finish_reason")
            .and_then(|v| v.as_str());

        if let Some("stop") = finish_reason {
            events.push(StreamEvent::Finished);
        }

        events
    }

    /// Send a conversation and return the full assistant reply.
    pub async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        response_format: Option<&serde_json::Value>,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_request_body(model, messages, response_format);

        log::debug!(
            "[Gateway] POST {} model={} messages={}",
            url,
            model,
            messages.len()
        );

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(serde_json::to_string(&body)?);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                OrchestratorError::Transport(format!("request to {} timed out", url))
            } else {
                OrchestratorError::from(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response.text().await.unwrap_or_default();
            log::error!("[Gateway] HTTP {} from {}", status, url);
            return Err(OrchestratorError::Gateway {
                status: status.as_u16(),
                message: body_text.chars().take(200).collect(),
            });
        }

        Self::collect_stream(response.bytes_stream()).await
    }

    /// Read the SSE stream to the end and accumulate content deltas.
    ///
    /// Bytes are buffered until a full line arrives, so multi-byte characters
    /// split across chunks decode intact.
    async fn collect_stream<S, B, E>(stream: S) -> Result<String>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
    {
        let mut stream = std::pin::pin!(stream);
        let mut buffer: Vec<u8> = Vec::new();
        let mut accumulated = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| OrchestratorError::Stream(e.to_string()))?;
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=newline_pos).collect();
                let line = String::from_utf8_lossy(&raw).trim().to_string();

                if line.is_empty() || line.starts_with(':') {
                    continue;
                }

                let Some(data) = line.strip_prefix("data:").map(str::trim) else {
                    continue;
                };
                if data == "[DONE]" {
                    return Ok(accumulated);
                }

                for event in Self::parse_sse_data(data) {
                    match event {
                        StreamEvent::Content(text) => accumulated.push_str(&text),
                        StreamEvent::Error { status, message } => {
                            return Err(OrchestratorError::Gateway { status, message });
                        }
                        StreamEvent::Finished => return Ok(accumulated),
                    }
                }
            }
        }

        // Stream ended without [DONE]
        Ok(accumulated)
    }
}

#[async_trait]
impl ChatCompletion for GatewayClient {
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        self.complete(model, messages, None).await
    }
}

// =============================================================================
// Structured Generation
// =============================================================================

/// Planner collaborator backed by the gateway's JSON-schema response format.
pub struct GatewayGenerator {
    client: std::sync::Arc<GatewayClient>,
    model: String,
}

impl GatewayGenerator {
    pub fn new(client: std::sync::Arc<GatewayClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl StructuredGenerator for GatewayGenerator {
    async fn generate_structured(
        &self,
        system_instruction: &str,
        user_instruction: &str,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let messages = [
            ChatMessage::system(system_instruction),
            ChatMessage::user(user_instruction),
        ];
        let response_format = serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": "execution_plan",
                "schema": schema
            }
        });

        let text = self
            .client
            .complete(&self.model, &messages, Some(&response_format))
            .await?;

        parse_json_reply(&text)
    }
}

/// Parse a model reply as JSON, tolerating a surrounding markdown code fence.
pub fn parse_json_reply(text: &str) -> Result<serde_json::Value> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(unfenced.trim()).map_err(OrchestratorError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Request Body
    // =========================================================================

    #[test]
    fn builds_streaming_request_body() {
        let messages = vec![
            ChatMessage::system("You are helpful."),
            ChatMessage::user("Hello world"),
        ];
        let body = GatewayClient::build_request_body("anthropic/claude-sonnet-4", &messages, None);

        assert_eq!(body["model"], "anthropic/claude-sonnet-4");
        assert_eq!(body["stream"], true);
        let sent = body["messages"].as_array().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["role"], "system");
        assert_eq!(sent[1]["content"], "Hello world");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn builds_request_with_response_format() {
        let format = serde_json::json!({"type": "json_schema"});
        let body = GatewayClient::build_request_body("m", &[], Some(&format));
        assert_eq!(body["response_format"]["type"], "json_schema");
    }

    // =========================================================================
    // SSE Parsing
    // =========================================================================

    #[test]
    fn parses_content_sse_data() {
        let data = r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        assert_eq!(
            GatewayClient::parse_sse_data(data),
            vec![StreamEvent::Content("Hello".to_string())]
        );
    }

    #[test]
    fn parses_content_from_delta_shorthand() {
        let data = r#"{"delta":{"content":"World"}}"#;
        assert_eq!(
            GatewayClient::parse_sse_data(data),
            vec![StreamEvent::Content("World".to_string())]
        );
    }

    #[test]
    fn parses_finish_stop() {
        let data = r#"{"choices":[{"delta":{"content":""},"finish_reason":"stop"}]}"#;
        assert_eq!(GatewayClient::parse_sse_data(data), vec![StreamEvent::Finished]);
    }

    #[test]
    fn parses_gateway_error_response() {
        let data = r#"{"status":402,"body":{"error":{"message":"Insufficient credits"}},"cost":"0"}"#;
        assert_eq!(
            GatewayClient::parse_sse_data(data),
            vec![StreamEvent::Error {
                status: 402,
                message: "Insufficient credits".to_string()
            }]
        );
    }

    #[test]
    fn out_of_range_status_maps_to_server_error() {
        let data = r#"{"status":70000,"body":{"error":{"message":"bad"}}}"#;
        assert_eq!(
            GatewayClient::parse_sse_data(data),
            vec![StreamEvent::Error {
                status: 500,
                message: "bad".to_string()
            }]
        );
    }

    #[test]
    fn ignores_invalid_json() {
        assert!(GatewayClient::parse_sse_data("not json at all").is_empty());
    }

    // =========================================================================
    // Stream Collection
    // =========================================================================

    fn chunks(parts: Vec<Vec<u8>>) -> impl Stream<Item = std::result::Result<Vec<u8>, String>> {
        futures::stream::iter(parts.into_iter().map(Ok))
    }

    #[tokio::test]
    async fn accumulates_content_until_done() {
        let body = concat!(
            ": keep-alive\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n",
        );
        let reply = GatewayClient::collect_stream(chunks(vec![body.as_bytes().to_vec()]))
            .await
            .unwrap();
        assert_eq!(reply, "Hello");
    }

    #[tokio::test]
    async fn multibyte_character_split_across_chunks_decodes_intact() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"caf\u{e9}\"}}]}\n".as_bytes();
        // Split inside the two-byte encoding of 'é'
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let parts = vec![
            line[..split].to_vec(),
            line[split..].to_vec(),
            b"data: [DONE]\n".to_vec(),
        ];

        let reply = GatewayClient::collect_stream(chunks(parts)).await.unwrap();
        assert_eq!(reply, "caf\u{e9}");
    }

    #[tokio::test]
    async fn wrapped_error_in_stream_is_gateway_error() {
        let body = "data: {\"status\":402,\"body\":{\"error\":{\"message\":\"Insufficient credits\"}}}\n";
        let err = GatewayClient::collect_stream(chunks(vec![body.as_bytes().to_vec()]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Gateway { status: 402, .. }));
    }

    #[tokio::test]
    async fn chunk_error_is_stream_error() {
        let parts = futures::stream::iter(vec![Err::<Vec<u8>, String>("reset".to_string())]);
        let err = GatewayClient::collect_stream(parts).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Stream(m) if m == "reset"));
    }

    // =========================================================================
    // JSON Replies
    // =========================================================================

    #[test]
    fn parses_plain_json_reply() {
        let value = parse_json_reply(r#"{"steps": [], "reasoning": "none"}"#).unwrap();
        assert_eq!(value["reasoning"], "none");
    }

    #[test]
    fn parses_fenced_json_reply() {
        let value = parse_json_reply("```json\n{\"steps\": []}\n```").unwrap();
        assert!(value["steps"].as_array().unwrap().is_empty());
    }

    #[test]
    fn rejects_prose_reply() {
        assert!(matches!(
            parse_json_reply("Sure! Here is your plan."),
            Err(OrchestratorError::Parse(_))
        ));
    }

    #[test]
    fn client_trims_trailing_slash() {
        let config = GatewayConfig {
            base_url: "https://example.com/v1/".to_string(),
            ..GatewayConfig::default()
        };
        let client = GatewayClient::new(&config).unwrap();
        assert_eq!(client.base_url, "https://example.com/v1");
    }
}
