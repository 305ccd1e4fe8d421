//! Ollama chat backend
//!
//! Non-streaming calls retry transient failures with exponential backoff.
//! Streaming reads the NDJSON chat stream and forwards tokens over an mpsc
//! channel; a dropped receiver cancels generation and the partial text is
//! returned.

use std::time::Duration;

use async_trait::async_trait;
use docqa_core::{LanguageModel, Message, Result};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};
use unicode_segmentation::UnicodeSegmentation;

use crate::LlmError;

/// Backend configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub endpoint: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout: Duration,
    /// Retry attempts for transient failures
    pub max_retries: u32,
    /// Initial backoff, doubled each retry
    pub initial_backoff: Duration,
    /// How long Ollama keeps the model loaded between calls
    pub keep_alive: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: docqa_config::constants::llm::MODEL.to_string(),
            endpoint: docqa_config::constants::endpoints::OLLAMA_DEFAULT.to_string(),
            temperature: docqa_config::constants::llm::TEMPERATURE,
            max_tokens: docqa_config::constants::llm::MAX_TOKENS,
            timeout: Duration::from_secs(docqa_config::constants::llm::TIMEOUT_SECS),
            max_retries: docqa_config::constants::llm::MAX_RETRIES,
            initial_backoff: Duration::from_millis(100),
            keep_alive: "5m".to_string(),
        }
    }
}

impl From<docqa_config::LlmSettings> for LlmConfig {
    fn from(s: docqa_config::LlmSettings) -> Self {
        Self {
            model: s.model,
            endpoint: s.endpoint,
            temperature: s.temperature,
            max_tokens: s.max_tokens,
            timeout: Duration::from_secs(s.timeout_secs),
            max_retries: s.max_retries,
            ..Default::default()
        }
    }
}

/// Ollama chat API client
#[derive(Clone)]
pub struct OllamaBackend {
    client: Client,
    config: LlmConfig,
}

impl OllamaBackend {
    pub fn new(config: LlmConfig) -> std::result::Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("building http client: {e}")))?;
        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.endpoint, path)
    }

    fn build_request(&self, messages: &[Message], stream: bool) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(OllamaMessage::from).collect(),
            stream,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens as i32,
            },
            keep_alive: self.config.keep_alive.clone(),
            think: false,
        }
    }

    async fn execute(
        &self,
        request: &OllamaChatRequest,
    ) -> std::result::Result<OllamaChatResponse, LlmError> {
        let response = self
            .client
            .post(self.api_url("/chat"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            // 5xx is transient, 4xx is a caller error
            if status.is_server_error() {
                return Err(LlmError::Network(format!("server error {status}: {body}")));
            }
            return Err(LlmError::Api(body));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }

    fn is_retryable(error: &LlmError) -> bool {
        matches!(error, LlmError::Network(_) | LlmError::Timeout)
    }
}

#[async_trait]
impl LanguageModel for OllamaBackend {
    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let request = self.build_request(messages, false);

        let mut last_error = None;
        let mut backoff = self.config.initial_backoff;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                warn!(
                    ?backoff,
                    attempt,
                    max = self.config.max_retries,
                    "llm request failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            match self.execute(&request).await {
                Ok(response) => {
                    debug!(
                        tokens = response.eval_count.unwrap_or(0),
                        "completion finished"
                    );
                    return Ok(response.message.content);
                },
                Err(e) if Self::is_retryable(&e) => last_error = Some(e),
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::Network("max retries exceeded".to_string()))
            .into())
    }

    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn complete_stream(
        &self,
        messages: &[Message],
        tx: mpsc::Sender<String>,
    ) -> Result<String> {
        let request = self.build_request(messages, true);

        let response = self
            .client
            .post(self.api_url("/chat"))
            .json(&request)
            .send()
            .await
            .map_err(LlmError::from)?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(body).into());
        }

        let mut full_response = String::new();
        let mut stream = response.bytes_stream();
        let mut buffer = NdjsonBuffer::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(LlmError::from)?;

            for parsed in buffer.push(&chunk) {
                full_response.push_str(&parsed.message.content);

                if tx.send(parsed.message.content).await.is_err() {
                    debug!("receiver dropped, cancelling generation");
                    return Ok(full_response);
                }

                if parsed.done {
                    return Ok(full_response);
                }
            }
        }

        if let Some(parsed) = buffer.finish() {
            full_response.push_str(&parsed.message.content);
            let _ = tx.send(parsed.message.content).await;
        }

        Ok(full_response)
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.config.endpoint))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    /// Grapheme-based estimate, ~4 graphemes per token
    fn estimate_tokens(&self, text: &str) -> usize {
        text.graphemes(true).count().max(1) / 4
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
    keep_alive: String,
    /// Disable extended thinking for models like qwen3
    think: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

impl From<&Message> for OllamaMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.to_string(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: i32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OllamaStreamChunk {
    message: OllamaMessage,
    done: bool,
}

/// Reassembles NDJSON objects that straddle HTTP chunk boundaries
#[derive(Default)]
struct NdjsonBuffer {
    pending: String,
}

impl NdjsonBuffer {
    /// Append raw bytes and parse every newline-terminated object
    fn push(&mut self, bytes: &[u8]) -> Vec<OllamaStreamChunk> {
        self.pending.push_str(&String::from_utf8_lossy(bytes));

        let mut parsed = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(chunk) => parsed.push(chunk),
                Err(e) => warn!(error = %e, "skipping malformed stream line"),
            }
        }
        parsed
    }

    /// Parse a trailing object the stream ended without terminating
    fn finish(self) -> Option<OllamaStreamChunk> {
        let line = self.pending.trim();
        if line.is_empty() {
            return None;
        }
        serde_json::from_str(line).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::Role;

    #[test]
    fn test_config_defaults() {
        let config = LlmConfig::default();
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.keep_alive, "5m");
    }

    #[test]
    fn test_message_conversion() {
        let msg = Message {
            role: Role::Assistant,
            content: "Hello".to_string(),
        };
        let converted = OllamaMessage::from(&msg);
        assert_eq!(converted.role, "assistant");
        assert_eq!(converted.content, "Hello");
    }

    #[test]
    fn test_request_serialization() {
        let backend = OllamaBackend::new(LlmConfig::default()).unwrap();
        let request = backend.build_request(&[Message::user("hi")], true);

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"stream\":true"));
        assert!(json.contains("keep_alive"));
        assert!(json.contains("\"think\":false"));
    }

    #[test]
    fn test_token_estimate_uses_graphemes() {
        let backend = OllamaBackend::new(LlmConfig::default()).unwrap();
        assert_eq!(backend.estimate_tokens("abcdefgh"), 2);
        assert!(backend.estimate_tokens("") <= 1);
    }

    #[test]
    fn test_stream_object_split_across_chunks_is_reassembled() {
        let mut buffer = NdjsonBuffer::default();
        let first = r#"{"message":{"role":"assistant","cont"#;
        let second = "ent\":\"hello\"},\"done\":false}\n";

        assert!(buffer.push(first.as_bytes()).is_empty());
        let parsed = buffer.push(second.as_bytes());
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].message.content, "hello");
        assert!(!parsed[0].done);
    }

    #[test]
    fn test_stream_multiple_objects_in_one_chunk() {
        let mut buffer = NdjsonBuffer::default();
        let chunk = concat!(
            "{\"message\":{\"role\":\"assistant\",\"content\":\"a\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"b\"},\"done\":true}\n",
        );
        let parsed = buffer.push(chunk.as_bytes());
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].message.content, "a");
        assert!(parsed[1].done);
    }

    #[test]
    fn test_stream_trailing_object_without_newline() {
        let mut buffer = NdjsonBuffer::default();
        let leftover = r#"{"message":{"role":"assistant","content":"end"},"done":true}"#;
        assert!(buffer.push(leftover.as_bytes()).is_empty());

        let last = buffer.finish().unwrap();
        assert_eq!(last.message.content, "end");
        assert!(last.done);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(OllamaBackend::is_retryable(&LlmError::Timeout));
        assert!(OllamaBackend::is_retryable(&LlmError::Network("x".into())));
        assert!(!OllamaBackend::is_retryable(&LlmError::Api("x".into())));
    }
}
