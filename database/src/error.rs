use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query execution error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Player not found: {0}")]
    PlayerNotFound(Uuid),

    #[error("Deck not found: {0}")]
    DeckNotFound(Uuid),

    #[error("Game not found: {0}")]
    GameNotFound(Uuid),

    #[error("Game {game_id} was modified concurrently (expected revision {expected_revision})")]
    Conflict { game_id: Uuid, expected_revision: u64 },

    #[error("Malformed stored data: {0}")]
    Invalid(String),

    #[error("UUID parsing error: {0}")]
    UuidParsing(#[from] uuid::Error),
}

impl From<types::GameError> for DatabaseError {
    fn from(e: types::GameError) -> Self {
        DatabaseError::Invalid(e.to_string())
    }
}
