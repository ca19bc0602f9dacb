//! Proxy error types.
//!
//! None of these ever reach a player: the client logs them and delivers an
//! empty answer instead.

use thiserror::Error;

/// Errors that can occur during a proxy exchange.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// HTTP request failed.
    #[error("proxy request failed: {0}")]
    RequestFailed(String),

    /// Request timed out.
    #[error("proxy request timed out after {0}ms")]
    Timeout(u64),

    /// Could not connect to the proxy.
    #[error("proxy connection failed: {0}")]
    Connect(String),

    /// Proxy is disabled by configuration.
    #[error("proxy unavailable: {0}")]
    Unavailable(String),

    /// Response body could not be read or parsed.
    #[error("failed to parse proxy response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProxyError::Timeout(0)
        } else if err.is_connect() {
            ProxyError::Connect(err.to_string())
        } else if err.is_decode() {
            ProxyError::Parse(err.to_string())
        } else {
            ProxyError::RequestFailed(err.to_string())
        }
    }
}
