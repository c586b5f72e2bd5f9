//! Protocol Error Types

use thiserror::Error;

/// Result type for econet-protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Protocol layer errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    /// Slug not present in the parameter map
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// Value not representable in the declared type
    #[error("Encode error: {0}")]
    Encode(String),

    /// Bytes not decodable as the declared type
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Connection error: {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Parameter map or driver configuration problems
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Config(format!("JSON error: {}", err))
    }
}

// Helper methods for creating errors
impl ProtocolError {
    pub fn encode(msg: impl Into<String>) -> Self {
        ProtocolError::Encode(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        ProtocolError::Decode(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        ProtocolError::Timeout(msg.into())
    }

    pub fn connection(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        ProtocolError::Connection {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        ProtocolError::InvalidFrame(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        ProtocolError::Config(msg.into())
    }
}
