use thiserror::Error;
use uuid::Uuid;

use crate::game::GameStatus;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Game {game_id} is {status}, cannot {operation}")]
    InvalidState {
        game_id: Uuid,
        status: GameStatus,
        operation: &'static str,
    },

    #[error("Player {0} is not part of this game")]
    NotInGame(Uuid),

    #[error("A player cannot kill themselves ({0})")]
    SelfKill(Uuid),

    #[error("Cannot finish the game: {survivors} survivors remain (exactly 1 required)")]
    SurvivorCount { survivors: usize },

    #[error("Invalid game: {0}")]
    Invalid(String),
}
