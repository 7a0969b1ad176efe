//! Error types for engine operations.

use crate::catalog::{ResourceKind, UnknownName};
use crate::territory::AllocError;
use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Everything an engine operation can reject or fail with.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("Username already exists")]
    UsernameTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    /// A referenced record does not exist ("Country", "Resources", ...).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The territory is missing or belongs to another nation.
    #[error("Invalid territory")]
    ForeignTerritory,

    #[error("Insufficient {}", .0.label())]
    Insufficient(ResourceKind),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Technology already researched: {0}")]
    AlreadyResearched(String),

    /// Territory allocation failed; retrying the signup may succeed.
    #[error(transparent)]
    Allocation(#[from] AllocError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl GameError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        GameError::InvalidInput(msg.into())
    }
}

impl From<rusqlite::Error> for GameError {
    fn from(e: rusqlite::Error) -> Self {
        GameError::Storage(e.into())
    }
}

impl From<serde_json::Error> for GameError {
    fn from(e: serde_json::Error) -> Self {
        GameError::Storage(e.into())
    }
}

impl From<UnknownName> for GameError {
    fn from(e: UnknownName) -> Self {
        GameError::InvalidInput(e.to_string())
    }
}
