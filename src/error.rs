use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaintError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("{0}")]
    Auth(String),
    #[error("Rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: i64 },
    #[error("{message}")]
    Provider {
        status: u16,
        message: String,
        details: Option<Value>,
    },
    #[error("Network error: {0}")]
    Network(String),
    #[error("{message}")]
    Gateway { status: u16, message: String },
    #[error("Rate limit store error: {0}")]
    Store(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Session has been shut down")]
    SessionClosed,
    #[error("Selection error: index {index} is outside a history of {len}")]
    Selection { index: usize, len: usize },
}

impl PaintError {
    /// HTTP status this failure is reported with.
    pub fn status(&self) -> u16 {
        match self {
            PaintError::Validation(_) => 400,
            PaintError::Auth(_) => 401,
            PaintError::RateLimited { .. } => 429,
            PaintError::Provider { status, .. } | PaintError::Gateway { status, .. } => *status,
            PaintError::Selection { .. } => 400,
            PaintError::Network(_)
            | PaintError::Store(_)
            | PaintError::Config(_)
            | PaintError::Serialization(_)
            | PaintError::Io(_)
            | PaintError::SessionClosed => 500,
        }
    }

    pub fn provider(status: Option<u16>, message: impl Into<String>, details: Option<Value>) -> Self {
        PaintError::Provider {
            status: status.unwrap_or(500),
            message: message.into(),
            details,
        }
    }
}

impl From<serde_json::Error> for PaintError {
    fn from(e: serde_json::Error) -> Self {
        PaintError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for PaintError {
    fn from(e: std::io::Error) -> Self {
        PaintError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PaintError>;
