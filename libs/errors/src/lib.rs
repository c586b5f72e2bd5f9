//! Unified error handling for the ecoNET boiler link
//!
//! Service-level error type. The protocol crate keeps its own narrow
//! `ProtocolError`; everything that reaches the service boundary is folded
//! into `EconetError` so `main` and the CLI deal with a single type.

use econet_protocol::ProtocolError;
use thiserror::Error;

// ============================================================================
// EconetError - Main error type
// ============================================================================

/// Main error type for the boiler link service
#[derive(Debug, Error)]
pub enum EconetError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Parameter map error: {0}")]
    ParameterMap(String),

    // ======================================
    // Parameter Errors
    // ======================================
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Cannot encode value for {slug}: {reason}")]
    Encode { slug: String, reason: String },

    #[error("Cannot decode value: {0}")]
    Decode(String),

    // ======================================
    // Protocol & Communication Errors
    // ======================================
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection failed: {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("Timeout waiting for response from {0}")]
    Timeout(String),

    #[error("Parameter unavailable: {0}")]
    Unavailable(String),

    // ======================================
    // File Errors
    // ======================================
    #[error("File not found: {0}")]
    FileNotFound(String),

    // ======================================
    // Service Errors
    // ======================================
    #[error("Service startup failed: {0}")]
    StartupFailed(String),
}

/// Result type alias using EconetError
pub type EconetResult<T> = Result<T, EconetError>;

impl EconetError {
    /// Stable error code for logs and CLI exit messages
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::ParameterMap(_) => "PARAMETER_MAP_ERROR",
            Self::UnknownParameter(_) => "UNKNOWN_PARAMETER",
            Self::Encode { .. } => "ENCODE_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::ConnectionFailed { .. } => "CONNECTION_FAILED",
            Self::Timeout(_) => "TIMEOUT",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::FileNotFound(_) => "FILE_NOT_FOUND",
            Self::StartupFailed(_) => "STARTUP_FAILED",
        }
    }
}

// Conversion traits for common error types
impl From<ProtocolError> for EconetError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnknownParameter(slug) => Self::UnknownParameter(slug),
            ProtocolError::Encode(reason) => Self::Encode {
                slug: String::new(),
                reason,
            },
            ProtocolError::Decode(reason) => Self::Decode(reason),
            ProtocolError::Timeout(msg) => Self::Timeout(msg),
            ProtocolError::Connection { endpoint, reason } => {
                Self::ConnectionFailed { endpoint, reason }
            },
            ProtocolError::InvalidFrame(msg) => Self::Protocol(msg),
            ProtocolError::Config(msg) => Self::ParameterMap(msg),
        }
    }
}

impl From<figment::Error> for EconetError {
    fn from(err: figment::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::EconetError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::EconetError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! invalid_config {
    ($field:expr, $reason:expr) => {
        $crate::EconetError::InvalidConfig {
            field: $field.to_string(),
            reason: $reason.to_string(),
        }
    };
}
