use chrono::{DateTime, Utc};
use types::{Deck, Game, GameStatus, LeaderboardEntry, LeaderboardIncrement, Player};
use uuid::Uuid;

use crate::{DatabaseError, FinalizationBatch};

#[async_trait::async_trait]
pub trait RosterStore: Send + Sync {
    async fn insert_player(&self, player: &Player) -> Result<(), DatabaseError>;

    async fn get_player(&self, player_id: Uuid) -> Result<Player, DatabaseError>;

    /// Every player, archived ones included, ordered by name.
    async fn list_players(&self) -> Result<Vec<Player>, DatabaseError>;

    async fn archive_player(
        &self,
        player_id: Uuid,
        archived_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    async fn insert_deck(&self, deck: &Deck) -> Result<(), DatabaseError>;

    async fn get_deck(&self, deck_id: Uuid) -> Result<Deck, DatabaseError>;

    /// Every deck, archived ones included, ordered by name.
    async fn list_decks(&self) -> Result<Vec<Deck>, DatabaseError>;

    async fn archive_deck(
        &self,
        deck_id: Uuid,
        archived_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;
}

#[async_trait::async_trait]
pub trait GameStore: Send + Sync {
    async fn insert_game(&self, game: &Game) -> Result<(), DatabaseError>;

    async fn get_game(&self, game_id: Uuid) -> Result<Game, DatabaseError>;

    /// Active games newest created first, finished games newest ended first.
    async fn list_games(
        &self,
        status: GameStatus,
        limit: Option<usize>,
    ) -> Result<Vec<Game>, DatabaseError>;

    /// Overwrites the stored game if its revision still equals
    /// `game.revision`, then bumps `game.revision`. A stale revision yields
    /// `DatabaseError::Conflict` and writes nothing.
    async fn update_game(&self, game: &mut Game) -> Result<(), DatabaseError>;

    /// Writes the finished game and applies every leaderboard increment, all
    /// or nothing, under the same revision check as `update_game`.
    async fn commit_finalization(&self, batch: &mut FinalizationBatch)
        -> Result<(), DatabaseError>;
}

#[async_trait::async_trait]
pub trait LeaderboardStore: Send + Sync {
    /// Ranked best first.
    async fn list_leaderboard(&self) -> Result<Vec<LeaderboardEntry>, DatabaseError>;

    async fn get_leaderboard_entry(
        &self,
        player_id: Uuid,
    ) -> Result<Option<LeaderboardEntry>, DatabaseError>;

    /// Adds every increment to its player's row, creating missing rows, all
    /// or nothing. `commit_finalization` applies its increments through the
    /// same path inside its own write.
    async fn increment_many(&self, increments: &[LeaderboardIncrement])
        -> Result<(), DatabaseError>;
}

pub trait Store: RosterStore + GameStore + LeaderboardStore {}

impl<T: RosterStore + GameStore + LeaderboardStore> Store for T {}
