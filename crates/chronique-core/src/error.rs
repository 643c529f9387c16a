use thiserror::Error;

/// All errors that can occur in chronique-core.
#[derive(Debug, Error)]
pub enum ChroniqueError {
    #[error("Book not found: {0}")]
    BookNotFound(String),

    #[error("Author not found: {0}")]
    AuthorNotFound(String),

    #[error("Resolution entry not found: {0}")]
    ResolutionNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ChroniqueError>;
