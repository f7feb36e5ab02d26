use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Content service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid response from content service: {0}")]
    InvalidResponse(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Content source configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
