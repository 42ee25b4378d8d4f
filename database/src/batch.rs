use std::collections::HashMap;

use types::{Game, GameStatus, LeaderboardIncrement};
use uuid::Uuid;

use crate::DatabaseError;

/// Everything a finalization writes: the finished game and one leaderboard
/// increment per participant. Stores apply it as a single unit.
#[derive(Debug, Clone)]
pub struct FinalizationBatch {
    pub game: Game,
    pub increments: Vec<LeaderboardIncrement>,
}

impl FinalizationBatch {
    pub fn new(game: Game, names: &HashMap<Uuid, String>) -> Result<Self, DatabaseError> {
        if game.status != GameStatus::Finished {
            return Err(DatabaseError::Invalid(format!(
                "game {} is {}, only finished games can be committed",
                game.id, game.status
            )));
        }
        let increments = LeaderboardIncrement::for_finished_game(&game, names)?;
        Ok(Self { game, increments })
    }

    pub fn total_points(&self) -> u64 {
        self.increments.iter().map(|i| i.delta_points).sum()
    }

    pub fn into_game(self) -> Game {
        self.game
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use types::KillEvent;

    #[test]
    fn test_batch_requires_a_finished_game() {
        let ids: Vec<_> = (0..2).map(|_| Uuid::new_v4()).collect();
        let mut game = Game::new(ids.clone(), HashMap::new(), None, Utc::now()).unwrap();
        assert!(FinalizationBatch::new(game.clone(), &HashMap::new()).is_err());

        game.add_kill(KillEvent::new(ids[0], ids[1], ids[1], Utc::now()))
            .unwrap();
        game.finalize(Utc::now()).unwrap();
        let batch = FinalizationBatch::new(game, &HashMap::new()).unwrap();

        assert_eq!(batch.increments.len(), 2);
        // 4 for the kill, 1 + 2 placement
        assert_eq!(batch.total_points(), 7);
        assert!(batch.increments.iter().all(|i| i.delta_games == 1));
    }
}
