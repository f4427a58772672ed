//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly (not an OpenAI-compatible proxy).
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Image segments as base64 `image` content blocks
//! - Streaming via SSE with `content_block_delta` events

use async_trait::async_trait;
use futures::StreamExt;
use parley_core::error::ProviderError;
use parley_core::provider::*;
use parley_core::turn::{Role, Turn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::wire::{self, SseBuffer};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: wire::build_client(),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// System prompt plus the text of any system turns in the history.
    /// Anthropic takes the system prompt as a top-level field, not a message.
    fn system_text(request: &ChatRequest) -> Option<String> {
        let parts: Vec<String> = std::iter::once(request.system_prompt.clone())
            .chain(
                request
                    .turns
                    .iter()
                    .filter(|t| t.role == Role::System)
                    .map(wire::turn_text),
            )
            .filter(|p| !p.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    /// Convert turns to Anthropic messages.
    ///
    /// The Messages API expects the conversation to open with a user turn,
    /// so leading assistant turns left over from history trimming are dropped.
    fn to_api_messages(turns: &[Turn]) -> Vec<AnthropicMessage> {
        let mut result: Vec<AnthropicMessage> = Vec::new();

        for turn in turns {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => continue, // handled separately
            };
            if result.is_empty() && role == "assistant" {
                debug!("Dropping leading assistant turn");
                continue;
            }

            let text = wire::turn_text(turn);
            let images: Vec<_> = wire::turn_images(turn).collect();

            let content = if images.is_empty() {
                AnthropicContent::Text(text)
            } else {
                let mut blocks: Vec<ContentBlock> = images
                    .into_iter()
                    .map(|(media_type, data)| ContentBlock::Image {
                        source: ImageSource {
                            r#type: "base64".into(),
                            media_type: media_type.into(),
                            data: data.into(),
                        },
                    })
                    .collect();
                if !text.is_empty() {
                    blocks.push(ContentBlock::Text { text });
                }
                AnthropicContent::Blocks(blocks)
            };

            result.push(AnthropicMessage {
                role: role.into(),
                content,
            });
        }

        result
    }

    fn request_body(request: &ChatRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.turns),
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": request.temperature,
        });
        if let Some(system) = Self::system_text(request) {
            body["system"] = serde_json::json!(system);
        }
        if stream {
            body["stream"] = serde_json::json!(true);
        }
        body
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }

    /// Join the text blocks of a complete response.
    fn response_text(resp: &AnthropicResponse) -> String {
        resp.content
            .iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text.as_str()),
                ResponseContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let url = format!("{}/messages", self.base_url);
        let body = Self::request_body(&request, false);

        debug!(provider = "anthropic", model = %request.model, "Sending completion request");

        let response = self
            .post(&url)
            .timeout(wire::REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(wire::transport_error)?;
        let response = wire::check_status(&self.name, response).await?;

        let api_resp: AnthropicResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse Anthropic response: {e}"),
            })?;

        Ok(ChatResponse {
            text: Self::response_text(&api_resp),
            tokens_used: Some(api_resp.usage.input_tokens + api_resp.usage.output_tokens),
            model: api_resp.model,
        })
    }

    async fn open_stream(&self, request: ChatRequest) -> Result<ChunkReceiver, ProviderError> {
        let url = format!("{}/messages", self.base_url);
        let body = Self::request_body(&request, true);

        debug!(provider = "anthropic", model = %request.model, "Sending streaming request");

        let response = self
            .post(&url)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(wire::transport_error)?;
        let response = wire::check_status(&self.name, response).await?;

        let (tx, rx) = mpsc::channel(64);

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
                    match parse_stream_event(&data) {
                        StreamEvent::Text(text) => {
                            if tx.send(Ok(StreamChunk::text(text))).await.is_err() {
                                debug!(provider = "anthropic", "Stream receiver dropped");
                                return;
                            }
                        }
                        StreamEvent::Stop => {
                            let _ = tx.send(Ok(StreamChunk::done())).await;
                            return;
                        }
                        StreamEvent::Error(message) => {
                            let _ = tx
                                .send(Err(ProviderError::StreamInterrupted(message)))
                                .await;
                            return;
                        }
                        StreamEvent::Ignored => {
                            trace!(data = %data, "Ignoring Anthropic SSE event");
                        }
                    }
                }
            }

            // Stream ended without message_stop
            let _ = tx.send(Ok(StreamChunk::done())).await;
        });

        Ok(rx)
    }

    async fn ping(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(wire::REQUEST_TIMEOUT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await
            .map_err(wire::transport_error)?;
        Ok(response.status().is_success())
    }
}

/// What a single SSE payload means for the stream.
#[derive(Debug, PartialEq, Eq)]
enum StreamEvent {
    Text(String),
    Stop,
    Error(String),
    Ignored,
}

fn parse_stream_event(data: &str) -> StreamEvent {
    let event: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(_) => return StreamEvent::Ignored,
    };

    match event["type"].as_str().unwrap_or("") {
        "content_block_delta" => {
            let delta = &event["delta"];
            match (delta["type"].as_str(), delta["text"].as_str()) {
                (Some("text_delta"), Some(text)) if !text.is_empty() => {
                    StreamEvent::Text(text.to_string())
                }
                _ => StreamEvent::Ignored,
            }
        }
        "message_stop" => StreamEvent::Stop,
        "error" => StreamEvent::Error(
            event["error"]["message"]
                .as_str()
                .unwrap_or("unknown stream error")
                .to_string(),
        ),
        _ => StreamEvent::Ignored,
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image { source: ImageSource },
}

#[derive(Debug, Serialize, Deserialize)]
struct ImageSource {
    r#type: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<ResponseContentBlock>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
