//! Error types for the money mentor bot

use thiserror::Error;

use crate::transport::TransportError;

pub const THROTTLED_TEXT: &str = "❌ Too many requests! Please wait a moment.";
pub const VALIDATION_TEXT: &str = "❌ Message too long or empty. Limit: 2000 characters.";
pub const TRANSIENT_ERROR_TEXT: &str = "Temporary error. Please retry.";

/// Result type alias for bot operations
pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Error, Debug)]
pub enum BotError {

    // =============================
    // Interaction Errors
    // =============================

    /// Free text rejected before it reaches the store (empty or oversized).
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limit exceeded: {0}")]
    Throttled(String),

    // =============================
    // Collaborator Errors
    // =============================

    /// Timeout, non-2xx or malformed payload from a market-data source.
    #[error("Upstream fetch error: {0}")]
    Upstream(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Document delivery error: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BotError {
    /// Short text safe to show to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            BotError::Validation(_) => VALIDATION_TEXT,
            BotError::Throttled(_) => THROTTLED_TEXT,
            _ => TRANSIENT_ERROR_TEXT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_converts() {
        let err: BotError = TransportError::Failed("boom".to_string()).into();
        assert!(matches!(err, BotError::Transport(_)));
        assert_eq!(err.user_message(), TRANSIENT_ERROR_TEXT);
    }

    #[test]
    fn test_validation_message_mentions_limit() {
        let err = BotError::Validation("too long".to_string());
        assert!(err.user_message().contains("2000"));
    }
}
