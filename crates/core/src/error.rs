use thiserror::Error;

pub type AffiliateResult<T> = Result<T, AffiliateError>;

#[derive(Error, Debug)]
pub enum AffiliateError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Key-value store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AffiliateError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn store(msg: impl std::fmt::Display) -> Self {
        Self::Store(msg.to_string())
    }

    /// Whether the error was caused by the caller rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound(_))
    }
}
