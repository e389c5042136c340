//! Error types for the mailout system

use mailout_types::ParseRefError;
use std::fmt;
use thiserror::Error;

/// Remote step of the campaign dispatch chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStep {
    Create,
    UpdateActivity,
    Schedule,
}

impl fmt::Display for DispatchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchStep::Create => "create campaign",
            DispatchStep::UpdateActivity => "update campaign activity",
            DispatchStep::Schedule => "schedule campaign activity",
        };
        f.write_str(name)
    }
}

/// Main error type for all mailout operations
#[derive(Error, Debug)]
pub enum MailoutError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A referenced connection is missing or no connections exist
    #[error("{0}")]
    Configuration(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Finding or creating a contact list failed
    #[error("Contact list resolution failed: {0}")]
    Resolution(String),

    #[error("Campaign step '{step}' failed: {message}")]
    DispatchStep {
        step: DispatchStep,
        message: String,
    },

    #[error("{field}: {message}")]
    Validation {
        field: String,
        message: String,
    },

    /// Provider rejected a request; message is the aggregated error text
    #[error("{0}")]
    Api(String),

    #[error(transparent)]
    InvalidListRef(#[from] ParseRefError),
}

impl MailoutError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        MailoutError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing_connection(connection_id: &str) -> Self {
        MailoutError::Configuration(format!("Unknown connection '{}'.", connection_id))
    }
}

/// Result type for mailout operations
pub type Result<T> = std::result::Result<T, MailoutError>;
