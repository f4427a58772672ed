//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley terminal chat
//! engine. Every collaborator the session engine talks to is a trait here;
//! implementations live in their respective crates:
//! - `Provider` → `parley-providers`
//! - `FileSource`, `CommandRunner` → `parley-tools`
//! - `SessionStore` → `parley-store`

pub mod error;
pub mod provider;
pub mod session;
pub mod stream;
pub mod tokens;
pub mod turn;
pub mod workspace;

// Re-export key types at crate root for ergonomics
pub use error::{ProviderError, StoreError, ToolError};
pub use provider::{ChatRequest, ChatResponse, ChunkReceiver, Provider, StreamChunk};
pub use session::{Session, SessionId, SessionStore};
pub use stream::{StreamOutcome, StreamState, stream};
pub use turn::{Role, Segment, Turn};
pub use workspace::{CommandOutput, CommandRunner, FileContent, FileSource};

pub use tokio_util::sync::CancellationToken;
