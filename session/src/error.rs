use database::DatabaseError;
use thiserror::Error;
use types::GameError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Database(DatabaseError),
}

impl From<GameError> for SessionError {
    fn from(e: GameError) -> Self {
        match e {
            GameError::InvalidState { .. } => SessionError::InvalidState(e.to_string()),
            GameError::NotInGame(_)
            | GameError::SelfKill(_)
            | GameError::SurvivorCount { .. }
            | GameError::Invalid(_) => SessionError::ValidationFailed(e.to_string()),
        }
    }
}

impl From<DatabaseError> for SessionError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::GameNotFound(_)
            | DatabaseError::PlayerNotFound(_)
            | DatabaseError::DeckNotFound(_) => SessionError::NotFound(e.to_string()),
            DatabaseError::Invalid(_) => SessionError::ValidationFailed(e.to_string()),
            DatabaseError::Conflict { .. } => SessionError::Conflict(e.to_string()),
            other => SessionError::Database(other),
        }
    }
}
