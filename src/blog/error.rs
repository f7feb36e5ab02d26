use crate::content::ContentError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlogError {
    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Content source unavailable: {0}")]
    SourceUnavailable(#[source] ContentError),

    #[error("Invalid pagination cursor: {0}")]
    InvalidCursor(String),
}

impl From<ContentError> for BlogError {
    fn from(error: ContentError) -> Self {
        match error {
            ContentError::NotFound(uid) => BlogError::NotFound(uid),
            ContentError::InvalidCursor(cursor) => BlogError::InvalidCursor(cursor),
            other => BlogError::SourceUnavailable(other),
        }
    }
}
