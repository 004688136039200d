//! Error types for ingest services

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Rate limited ({scope}), retry after {retry_after_secs}s")]
    RateLimited { scope: String, retry_after_secs: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::MissingFields(_) => 400,
            Self::NotFound(_) => 404,
            Self::PayloadTooLarge { .. } => 413,
            Self::RateLimited { .. } => 429,
            _ => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::MissingFields(_) => "MISSING_FIELDS",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Storage(_) => "STORAGE_FAILURE",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to hand back to a caller. Server-side failures never leak
    /// their underlying cause.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::NotFound(msg) => msg.clone(),
            Self::PayloadTooLarge { limit } => format!("Payload too large (limit {} bytes)", limit),
            Self::MissingFields(_) => "Missing required fields".to_string(),
            Self::RateLimited { .. } => "Too many requests, please try again later".to_string(),
            Self::Storage(_) => "Database operation failed".to_string(),
            Self::Config(_) | Self::Network(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Network(err.to_string())
    }
}
