//! Layered error definitions
//!
//! Categorized by source: config / source / sync / encode

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Source Errors =====
    /// Video source could not be opened (fatal, never retried)
    #[error("failed to open source '{source_name}': {message}")]
    SourceOpen {
        source_name: String,
        message: String,
    },

    /// Frame could not be decoded from an open source (fatal)
    #[error("failed to decode frame from '{source_name}': {message}")]
    Decode {
        source_name: String,
        message: String,
    },

    /// Locator does not name a known source kind
    #[error("unsupported source locator: {locator}")]
    UnsupportedLocator { locator: String },

    // ===== Sync Errors =====
    /// Source index outside the configured set
    #[error("source index {index} out of range (have {count} sources)")]
    InvalidSourceIndex { index: usize, count: usize },

    // ===== Encode Errors =====
    /// Debug image encode failure
    #[error("image encode error: {message}")]
    Encode { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create source open error
    pub fn source_open(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceOpen {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create decode error
    pub fn decode(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}
