//! Error types for the Feishu MCP server.

use thiserror::Error;

/// Primary error type for all operations.
#[derive(Error, Debug)]
pub enum FeishuError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Port {port} is already in use. Ensure no other instance is running or wait for it to release the port.")]
    PortConflict { port: u16 },

    #[error("Authorization timed out after {seconds} seconds")]
    AuthorizationTimeout { seconds: u64 },

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Feishu API error [{code}]: {message}")]
    Business { code: i64, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl FeishuError {
    /// Create an API error from an HTTP status and response body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether this error came out of the authorization flow.
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            Self::PortConflict { .. }
                | Self::AuthorizationTimeout { .. }
                | Self::AuthorizationFailed(_)
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, FeishuError>;
