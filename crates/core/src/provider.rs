//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider knows how to send a conversation to an LLM and get a response
//! back, either as a complete reply or as a channel of text chunks. The
//! cancellable streaming contract the session engine relies on is built on top
//! of `open_stream` in [`crate::stream`].
//!
//! Implementations: OpenAI-compatible (incl. local inference servers), Anthropic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::ProviderError;
use crate::tokens::estimate_tokens;
use crate::turn::Turn;

/// A request to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to use (e.g., "claude-sonnet-4-20250514", "gpt-4o")
    pub model: String,

    /// System prompt with the rendered context block already appended
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system_prompt: String,

    /// Conversation turns, oldest first
    pub turns: Vec<Turn>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>, turns: Vec<Turn>) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            turns,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The generated text
    pub text: String,

    /// Total tokens reported by the backend, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,

    /// Which model actually responded
    pub model: String,
}

/// A single unit of streamed output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Text delta (empty on the terminal chunk)
    #[serde(default)]
    pub text: String,

    /// Whether this is the terminal chunk
    #[serde(default)]
    pub done: bool,
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
        }
    }

    pub fn done() -> Self {
        Self {
            text: String::new(),
            done: true,
        }
    }
}

/// Receiving end of a backend stream.
pub type ChunkReceiver = mpsc::Receiver<Result<StreamChunk, ProviderError>>;

/// The core Provider trait.
///
/// The session engine calls `chat()` or drives `open_stream()` through
/// [`crate::stream::stream`] without knowing which backend is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic", "ollama").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Send a request and get a channel of response chunks.
    ///
    /// Backends send text deltas in arrival order and may finish with a
    /// `done` chunk; closing the channel also ends the stream. Dropping the
    /// receiver must stop the backend's reader.
    ///
    /// Default implementation calls `chat()` and sends the reply as one chunk.
    async fn open_stream(&self, request: ChatRequest) -> Result<ChunkReceiver, ProviderError> {
        let response = self.chat(request).await?;
        let (tx, rx) = mpsc::channel(2);
        let _ = tx.send(Ok(StreamChunk::text(response.text))).await;
        let _ = tx.send(Ok(StreamChunk::done())).await;
        Ok(rx)
    }

    /// Approximate token count for `text`.
    ///
    /// Backends without a counting endpoint use the 4-chars-per-token heuristic.
    fn count_tokens(&self, text: &str) -> usize {
        estimate_tokens(text)
    }

    /// Ping the backend. Errors mean "unreachable".
    async fn ping(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }

    /// Health check: can we reach the provider? Never fails.
    async fn check_health(&self) -> bool {
        match self.ping().await {
            Ok(healthy) => healthy,
            Err(e) => {
                debug!(provider = %self.name(), error = %e, "Health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
            let last = request.turns.last().map(|t| t.content.clone()).unwrap_or_default();
            Ok(ChatResponse {
                text: last,
                tokens_used: None,
                model: request.model,
            })
        }

        async fn ping(&self) -> Result<bool, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }
    }

    #[test]
    fn chat_request_defaults() {
        let req = ChatRequest::new("gpt-4o", "", vec![]);
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.max_tokens.is_none());
    }

    #[tokio::test]
    async fn default_stream_wraps_chat() {
        let provider = EchoProvider;
        let request = ChatRequest::new("m", "", vec![Turn::user("ping")]);
        let mut rx = provider.open_stream(request).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().unwrap(), StreamChunk::text("ping"));
        assert_eq!(rx.recv().await.unwrap().unwrap(), StreamChunk::done());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn health_check_swallows_errors() {
        assert!(!EchoProvider.check_health().await);
    }

    #[test]
    fn count_tokens_is_heuristic() {
        assert_eq!(EchoProvider.count_tokens("12345678"), 2);
    }
}
