use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("validation failed for group {identity_key}: {reason}")]
    Validation {
        identity_key: String,
        reason: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage error: {0}")]
    Storage(#[from] chronique_core::ChroniqueError),

    #[error("a batch merge is already running")]
    BatchInFlight,
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
