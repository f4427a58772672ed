//! LLM Provider implementations for Parley.
//!
//! All providers implement the `parley_core::Provider` trait.
//! `build_from_config` selects the backend named in configuration.

pub mod anthropic;
pub mod openai_compat;
pub mod router;
mod wire;

pub use anthropic::AnthropicProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_from_config, build_provider, default_base_url, requires_api_key};
