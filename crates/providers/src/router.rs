//! Provider selection: builds the backend named in configuration.

use std::sync::Arc;

use parley_config::AppConfig;
use parley_core::error::ProviderError;
use parley_core::provider::Provider;
use tracing::debug;

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Backends that run locally and accept requests without a key.
const LOCAL_PROVIDERS: &[&str] = &["ollama", "vllm", "llamacpp", "llama.cpp", "lmstudio"];

/// Build a single provider by name.
///
/// Fails with `NotConfigured` when the name is neither well known nor given
/// an `api_url`, or when a hosted backend has no API key.
pub fn build_provider(config: &AppConfig, name: &str) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider_config = config.providers.get(name);
    let api_url = provider_config.and_then(|p| p.api_url.clone());

    let base_url = api_url
        .clone()
        .or_else(|| default_base_url(name))
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "unknown provider '{name}' (set [providers.{name}].api_url to use it)"
            ))
        })?;

    let api_key = config.api_key_for(name).unwrap_or_default();
    if api_key.is_empty() && requires_api_key(name, &base_url) {
        return Err(ProviderError::NotConfigured(format!(
            "no API key for '{name}' (set PARLEY_API_KEY, the vendor key variable, or api_key in config.toml)"
        )));
    }

    debug!(provider = %name, base_url = %base_url, "Building provider");

    let provider: Arc<dyn Provider> = if name == "anthropic" {
        let mut p = AnthropicProvider::new(&api_key);
        if api_url.is_some() {
            p = p.with_base_url(&base_url);
        }
        Arc::new(p)
    } else {
        Arc::new(OpenAiCompatProvider::new(name, &base_url, &api_key))
    };

    Ok(provider)
}

/// Build the provider selected by `default_provider`.
///
/// Only that backend is constructed, so a broken entry for some other
/// provider in `[providers]` never blocks startup.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider = build_provider(config, &config.default_provider)?;
    debug!(provider = %provider.name(), "Selected provider");
    Ok(provider)
}

/// Whether a backend needs an API key to be usable.
pub fn requires_api_key(name: &str, base_url: &str) -> bool {
    if LOCAL_PROVIDERS.contains(&name) {
        return false;
    }
    let host = base_url
        .split("://")
        .nth(1)
        .unwrap_or(base_url)
        .split(['/', ':'])
        .next()
        .unwrap_or_default();
    !matches!(host, "localhost" | "127.0.0.1" | "0.0.0.0")
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "anthropic" => "https://api.anthropic.com/v1",
        "openai" => "https://api.openai.com/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "fireworks" => "https://api.fireworks.ai/inference/v1",
        "ollama" => "http://localhost:11434/v1",
        "vllm" => "http://localhost:8000/v1",
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1",
        "lmstudio" => "http://localhost:1234/v1",
        _ => return None,
    };
    Some(url.to_string())
}
