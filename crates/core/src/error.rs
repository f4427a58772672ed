//! Error types for the Parley domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{tool_name} failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("{tool_name} timed out after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("{tool_name} produced more than {limit_bytes} bytes of output")]
    OutputLimit { tool_name: String, limit_bytes: usize },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt session file {path}: {reason}")]
    Corrupt { path: String, reason: String },
}
