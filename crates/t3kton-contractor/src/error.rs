//! Error types for Contractor access.

use thiserror::Error;

pub type ContractorResult<T> = Result<T, ContractorError>;

#[derive(Debug, Error)]
pub enum ContractorError {
    #[error("Invalid locator '{0}'")]
    InvalidLocator(String),

    #[error("Object not found: {uri}")]
    NotFound { uri: String },

    #[error("{verb} {uri} failed with status {status}: {message}")]
    Status {
        verb: String,
        uri: String,
        status: u16,
        message: String,
    },

    #[error("HTTP request to {uri} failed: {source}")]
    Http {
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode response from {uri}: {message}")]
    Decode { uri: String, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ContractorError {
    pub fn not_found(uri: impl Into<String>) -> Self {
        Self::NotFound { uri: uri.into() }
    }

    pub fn decode(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            uri: uri.into(),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for failures that may clear up on their own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { .. } | Self::Transport(_) | Self::Auth(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::InvalidLocator(_) | Self::NotFound { .. } | Self::Decode { .. } => false,
        }
    }
}
