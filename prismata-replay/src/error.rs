use prismata_core::GameError;
use thiserror::Error;

/// Errors raised while loading or interpreting a replay.
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("Malformed replay JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used by batch tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or unexpected input.
    Data,
    /// A command the current game state cannot explain.
    InvalidState,
    /// A known gap in replay support.
    NotImplemented,
}

impl ReplayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReplayError::Game(GameError::Data { .. }) => ErrorKind::Data,
            ReplayError::Game(GameError::InvalidState { .. }) => ErrorKind::InvalidState,
            ReplayError::Game(GameError::NotImplemented(_)) => ErrorKind::NotImplemented,
            ReplayError::Json(_) | ReplayError::Io(_) => ErrorKind::Data,
        }
    }
}
