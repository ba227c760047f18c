use thiserror::Error;

/// Errors related to form definitions.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("form context is empty")]
    EmptyContext,

    #[error("invalid frontmatter: {0}")]
    InvalidFrontmatter(String),

    #[error("field '{0}' has no type")]
    MissingFieldType(String),
}

/// Errors related to session lifecycle.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,

    #[error("session expired")]
    Expired,
}
