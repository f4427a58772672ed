//! Cancellable streaming on top of [`Provider::open_stream`].
//!
//! A single call moves through
//! `Idle → Requesting → Streaming → {Completed | Cancelled | Errored}`.
//! Completed and Cancelled both resolve with the assembled text and always
//! deliver exactly one terminal `done` chunk to the callback. Errored returns
//! the provider's error and delivers no terminal chunk.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ProviderError;
use crate::provider::{ChatRequest, Provider, StreamChunk};

/// Lifecycle of one streaming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Cancelled,
    Errored,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Completed | StreamState::Cancelled | StreamState::Errored
        )
    }
}

/// Result of a stream that was not errored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Concatenation of every delivered chunk
    pub text: String,
    /// `Completed` or `Cancelled`
    pub state: StreamState,
}

impl StreamOutcome {
    pub fn was_cancelled(&self) -> bool {
        self.state == StreamState::Cancelled
    }
}

struct StreamCall<'a> {
    provider: &'a str,
    state: StreamState,
}

impl StreamCall<'_> {
    fn advance(&mut self, next: StreamState) {
        debug!(provider = %self.provider, from = ?self.state, to = ?next, "Stream state");
        self.state = next;
    }
}

/// Stream a reply from `provider`, forwarding chunks to `on_chunk`.
///
/// `cancel` is checked before every chunk is delivered; once it is observed no
/// further text chunks are forwarded, the backend receiver is dropped and the
/// call resolves with whatever text had been assembled.
pub async fn stream<F>(
    provider: &dyn Provider,
    request: ChatRequest,
    cancel: &CancellationToken,
    mut on_chunk: F,
) -> Result<StreamOutcome, ProviderError>
where
    F: FnMut(&StreamChunk) + Send,
{
    let mut call = StreamCall {
        provider: provider.name(),
        state: StreamState::Idle,
    };
    call.advance(StreamState::Requesting);

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        opened = provider.open_stream(request) => Some(opened),
    };

    let mut rx = match opened {
        None => {
            call.advance(StreamState::Cancelled);
            on_chunk(&StreamChunk::done());
            return Ok(StreamOutcome {
                text: String::new(),
                state: StreamState::Cancelled,
            });
        }
        Some(Err(e)) => {
            call.advance(StreamState::Errored);
            return Err(e);
        }
        Some(Ok(rx)) => rx,
    };

    call.advance(StreamState::Streaming);
    let mut text = String::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            item = rx.recv() => Some(item),
        };

        match next {
            None => {
                drop(rx);
                call.advance(StreamState::Cancelled);
                on_chunk(&StreamChunk::done());
                return Ok(StreamOutcome {
                    text,
                    state: StreamState::Cancelled,
                });
            }
            // Backend closed the channel without an explicit done chunk.
            Some(None) => break,
            Some(Some(Ok(chunk))) => {
                if !chunk.text.is_empty() {
                    text.push_str(&chunk.text);
                    on_chunk(&StreamChunk::text(chunk.text));
                }
                if chunk.done {
                    break;
                }
            }
            Some(Some(Err(e))) => {
                call.advance(StreamState::Errored);
                return Err(e);
            }
        }
    }

    call.advance(StreamState::Completed);
    on_chunk(&StreamChunk::done());
    Ok(StreamOutcome {
        text,
        state: StreamState::Completed,
    })
}
