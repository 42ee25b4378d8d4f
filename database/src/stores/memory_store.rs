use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use types::{leaderboard, Deck, Game, GameStatus, LeaderboardEntry, LeaderboardIncrement, Player};
use uuid::Uuid;

use super::{GameStore, LeaderboardStore, RosterStore};
use crate::{DatabaseError, FinalizationBatch};

#[derive(Default)]
struct MemoryState {
    players: HashMap<Uuid, Player>,
    decks: HashMap<Uuid, Deck>,
    games: HashMap<Uuid, Game>,
    leaderboard: HashMap<Uuid, LeaderboardEntry>,
}

impl MemoryState {
    fn check_revision(&self, game: &Game) -> Result<(), DatabaseError> {
        let stored = self
            .games
            .get(&game.id)
            .ok_or(DatabaseError::GameNotFound(game.id))?;
        if stored.revision != game.revision {
            return Err(DatabaseError::Conflict {
                game_id: game.id,
                expected_revision: game.revision,
            });
        }
        Ok(())
    }

    fn put_game(&mut self, game: &Game) -> u64 {
        let mut stored = game.clone();
        stored.revision += 1;
        let revision = stored.revision;
        self.games.insert(game.id, stored);
        revision
    }

    fn increment_many(&mut self, increments: &[LeaderboardIncrement]) {
        for increment in increments {
            let existing = self.leaderboard.remove(&increment.player_id);
            self.leaderboard
                .insert(increment.player_id, increment.apply_to(existing));
        }
    }
}

/// Process-local store with the same contract as the SQLite one. All writes
/// happen under one lock, so a finalization is applied whole or not at all.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RosterStore for MemoryStore {
    async fn insert_player(&self, player: &Player) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        if state.players.contains_key(&player.id) {
            return Err(DatabaseError::Query(format!("player {} already exists", player.id)));
        }
        state.players.insert(player.id, player.clone());
        Ok(())
    }

    async fn get_player(&self, player_id: Uuid) -> Result<Player, DatabaseError> {
        self.state
            .read()
            .await
            .players
            .get(&player_id)
            .cloned()
            .ok_or(DatabaseError::PlayerNotFound(player_id))
    }

    async fn list_players(&self) -> Result<Vec<Player>, DatabaseError> {
        let mut players: Vec<_> = self.state.read().await.players.values().cloned().collect();
        players.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(players)
    }

    async fn archive_player(
        &self,
        player_id: Uuid,
        archived_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        let player = state
            .players
            .get_mut(&player_id)
            .ok_or(DatabaseError::PlayerNotFound(player_id))?;
        player.archived_at = Some(archived_at);
        Ok(())
    }

    async fn insert_deck(&self, deck: &Deck) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        if state.decks.contains_key(&deck.id) {
            return Err(DatabaseError::Query(format!("deck {} already exists", deck.id)));
        }
        state.decks.insert(deck.id, deck.clone());
        Ok(())
    }

    async fn get_deck(&self, deck_id: Uuid) -> Result<Deck, DatabaseError> {
        self.state
            .read()
            .await
            .decks
            .get(&deck_id)
            .cloned()
            .ok_or(DatabaseError::DeckNotFound(deck_id))
    }

    async fn list_decks(&self) -> Result<Vec<Deck>, DatabaseError> {
        let mut decks: Vec<_> = self.state.read().await.decks.values().cloned().collect();
        decks.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(decks)
    }

    async fn archive_deck(
        &self,
        deck_id: Uuid,
        archived_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        let deck = state
            .decks
            .get_mut(&deck_id)
            .ok_or(DatabaseError::DeckNotFound(deck_id))?;
        deck.archived_at = Some(archived_at);
        Ok(())
    }
}

#[async_trait::async_trait]
impl GameStore for MemoryStore {
    async fn insert_game(&self, game: &Game) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        if state.games.contains_key(&game.id) {
            return Err(DatabaseError::Query(format!("game {} already exists", game.id)));
        }
        state.games.insert(game.id, game.clone());
        Ok(())
    }

    async fn get_game(&self, game_id: Uuid) -> Result<Game, DatabaseError> {
        self.state
            .read()
            .await
            .games
            .get(&game_id)
            .cloned()
            .ok_or(DatabaseError::GameNotFound(game_id))
    }

    async fn list_games(
        &self,
        status: GameStatus,
        limit: Option<usize>,
    ) -> Result<Vec<Game>, DatabaseError> {
        let mut games: Vec<_> = self
            .state
            .read()
            .await
            .games
            .values()
            .filter(|g| g.status == status)
            .cloned()
            .collect();
        match status {
            GameStatus::Active => {
                games.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)))
            }
            GameStatus::Finished => {
                games.sort_by(|a, b| b.ended_at.cmp(&a.ended_at).then(a.id.cmp(&b.id)))
            }
        }
        if let Some(limit) = limit {
            games.truncate(limit);
        }
        Ok(games)
    }

    async fn update_game(&self, game: &mut Game) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        state.check_revision(game)?;
        game.revision = state.put_game(game);
        Ok(())
    }

    async fn commit_finalization(
        &self,
        batch: &mut FinalizationBatch,
    ) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        state.check_revision(&batch.game)?;

        batch.game.revision = state.put_game(&batch.game);
        state.increment_many(&batch.increments);
        tracing::info!(
            game_id = %batch.game.id,
            players = batch.increments.len(),
            points = batch.total_points(),
            "finalization committed"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl LeaderboardStore for MemoryStore {
    async fn list_leaderboard(&self) -> Result<Vec<LeaderboardEntry>, DatabaseError> {
        let mut entries: Vec<_> = self
            .state
            .read()
            .await
            .leaderboard
            .values()
            .cloned()
            .collect();
        leaderboard::rank(&mut entries);
        Ok(entries)
    }

    async fn get_leaderboard_entry(
        &self,
        player_id: Uuid,
    ) -> Result<Option<LeaderboardEntry>, DatabaseError> {
        Ok(self.state.read().await.leaderboard.get(&player_id).cloned())
    }

    async fn increment_many(
        &self,
        increments: &[LeaderboardIncrement],
    ) -> Result<(), DatabaseError> {
        self.state.write().await.increment_many(increments);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::KillEvent;

    #[tokio::test]
    async fn test_stale_finalization_leaves_everything_untouched() {
        let store = MemoryStore::new();
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let mut game = Game::new(ids.clone(), HashMap::new(), None, Utc::now()).unwrap();
        store.insert_game(&game).await.unwrap();

        // someone else writes first
        let mut other = game.clone();
        store.update_game(&mut other).await.unwrap();

        game.add_kill(KillEvent::new(ids[0], ids[1], ids[0], Utc::now()))
            .unwrap();
        game.finalize(Utc::now()).unwrap();
        let mut batch = FinalizationBatch::new(game.clone(), &HashMap::new()).unwrap();

        assert!(matches!(
            store.commit_finalization(&mut batch).await,
            Err(DatabaseError::Conflict { .. })
        ));
        assert!(store.list_leaderboard().await.unwrap().is_empty());
        assert!(store.get_game(game.id).await.unwrap().is_active());
    }
}
