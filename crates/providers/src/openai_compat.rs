//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, llama.cpp, Together AI,
//! Groq, DeepSeek, and any server exposing `/chat/completions`.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Image segments as `image_url` content parts
//! - Health checks via `/models`

use async_trait::async_trait;
use futures::StreamExt;
use parley_core::error::ProviderError;
use parley_core::provider::*;
use parley_core::turn::{Role, Turn};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::wire::{self, SseBuffer};

/// An OpenAI-compatible LLM provider.
///
/// This handles the vast majority of LLM backends since most expose
/// an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: wire::build_client(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert a request into OpenAI `messages`: the system prompt first,
    /// then every turn in order.
    fn to_api_messages(request: &ChatRequest) -> Vec<serde_json::Value> {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(serde_json::json!({
                "role": "system",
                "content": request.system_prompt,
            }));
        }
        messages.extend(request.turns.iter().map(Self::to_api_message));
        messages
    }

    fn to_api_message(turn: &Turn) -> serde_json::Value {
        let role = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        let text = wire::turn_text(turn);
        let images: Vec<_> = wire::turn_images(turn).collect();

        if images.is_empty() {
            return serde_json::json!({ "role": role, "content": text });
        }

        let mut parts = vec![serde_json::json!({ "type": "text", "text": text })];
        parts.extend(images.into_iter().map(|(media_type, data)| {
            serde_json::json!({
                "type": "image_url",
                "image_url": { "url": format!("data:{media_type};base64,{data}") },
            })
        }));
        serde_json::json!({ "role": role, "content": parts })
    }

    fn request_body(request: &ChatRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(request),
            "temperature": request.temperature,
            "stream": stream,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        if self.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.api_key)
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request, false);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .post(&url)
            .timeout(wire::REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(wire::transport_error)?;
        let response = wire::check_status(&self.name, response).await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice =
            api_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::ApiError {
                    status_code: 200,
                    message: "No choices in response".into(),
                })?;

        Ok(ChatResponse {
            text: choice.message.content.unwrap_or_default(),
            tokens_used: api_response.usage.map(|u| u.total_tokens),
            model: api_response.model.unwrap_or(request.model),
        })
    }

    async fn open_stream(&self, request: ChatRequest) -> Result<ChunkReceiver, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request, true);

        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self
            .post(&url)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(wire::transport_error)?;
        let response = wire::check_status(&self.name, response).await?;

        let (tx, rx) = mpsc::channel(64);
        let provider_name = self.name.clone();

        // Read the SSE byte stream until [DONE], EOF, or the receiver goes away
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut sse = SseBuffer::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for data in sse.push(&bytes) {
                    if data == "[DONE]" {
                        let _ = tx.send(Ok(StreamChunk::done())).await;
                        return;
                    }

                    let text = match parse_stream_data(&data) {
                        Ok(StreamData::Text(text)) => text,
                        Ok(StreamData::Empty) => continue,
                        Ok(StreamData::Failed(error)) => {
                            debug!(provider = %provider_name, error = %error, "Stream reported an error");
                            let _ = tx.send(Err(error)).await;
                            return;
                        }
                        Err(e) => {
                            trace!(
                                provider = %provider_name,
                                data = %data,
                                error = %e,
                                "Ignoring unparseable SSE chunk"
                            );
                            continue;
                        }
                    };

                    if tx.send(Ok(StreamChunk::text(text))).await.is_err() {
                        debug!(provider = %provider_name, "Stream receiver dropped");
                        return;
                    }
                }
            }

            // Stream ended without [DONE]
            let _ = tx.send(Ok(StreamChunk::done())).await;
        });

        Ok(rx)
    }

    async fn ping(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let mut builder = self.client.get(&url).timeout(wire::REQUEST_TIMEOUT);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }
        let response = builder.send().await.map_err(wire::transport_error)?;
        Ok(response.status().is_success())
    }
}

/// What one SSE payload carries.
#[derive(Debug)]
enum StreamData {
    Text(String),
    /// Role headers, finish markers, usage-only chunks
    Empty,
    /// An `{"error": {...}}` payload sent mid-stream
    Failed(ProviderError),
}

fn parse_stream_data(data: &str) -> Result<StreamData, serde_json::Error> {
    let parsed: StreamResponse = serde_json::from_str(data)?;
    if let Some(error) = parsed.error {
        return Ok(StreamData::Failed(error.into_provider_error()));
    }
    Ok(parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|c| !c.is_empty())
        .map_or(StreamData::Empty, StreamData::Text))
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    total_tokens: u32,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamError>,
}

/// Error object some servers emit in place of a delta.
#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    message: Option<String>,
    /// Numeric status on OpenRouter, a string slug on OpenAI
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl StreamError {
    fn into_provider_error(self) -> ProviderError {
        let message = self
            .message
            .unwrap_or_else(|| "provider reported an error".to_string());
        match self.code.as_ref().and_then(|c| c.as_u64()) {
            Some(429) => ProviderError::RateLimited {
                retry_after_secs: wire::DEFAULT_RETRY_AFTER_SECS,
            },
            Some(code) => ProviderError::ApiError {
                status_code: u16::try_from(code).unwrap_or(500),
                message,
            },
            None => ProviderError::StreamInterrupted(message),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}
