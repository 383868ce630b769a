use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Bad or missing weighting profile. Callers must not proceed to score.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed ground-truth record or request; nothing was stored.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("vault lock poisoned")]
    LockPoisoned,
}

impl CoreError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn insufficient_data(message: impl Into<String>) -> Self {
        Self::InsufficientData(message.into())
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Recoverable errors come with a flagged partial result elsewhere in the API.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InsufficientData(_))
    }
}
