use thiserror::Error;

use crate::BookId;

/// Failures surfaced to the user through the notice path.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("library storage is unavailable: {0}")]
    StorageUnavailable(String),

    #[error("book not found: {0}")]
    BookNotFound(BookId),

    #[error("could not import {name}: {reason}")]
    ParseFailure { name: String, reason: String },

    #[error("a theme named \"{0}\" already exists")]
    DuplicateThemeName(String),

    #[error("name must not be empty")]
    EmptyName,

    #[error("built-in theme \"{0}\" cannot be deleted")]
    BuiltinTheme(String),

    #[error("invalid colour: {0}")]
    InvalidColor(String),

    #[error("could not render book: {0}")]
    RenderFailure(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl LibraryError {
    /// Whether the library list should be reloaded after this failure.
    pub fn needs_refresh(&self) -> bool {
        matches!(self, LibraryError::BookNotFound(_))
    }
}
