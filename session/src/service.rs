use std::collections::HashMap;

use chrono::Utc;
use database::{FinalizationBatch, Store};
use types::{leaderboard, Deck, Game, GameStatus, KillEvent, LeaderboardEntry, Player};
use uuid::Uuid;

use crate::{
    access::{AccessCode, AccessPolicy},
    locks::GameLocks,
    report::{GameSummary, GameView, NameBook},
    SessionError,
};

/// Drives games against a store: roster upkeep, kill recording, undo and
/// finalization. Every game mutation holds that game's lock for its whole
/// read-modify-write cycle.
pub struct AssassinService<S: Store> {
    store: S,
    access: AccessPolicy,
    locks: GameLocks,
    history_limit: usize,
}

fn validate_name(kind: &str, name: &str) -> Result<(), SessionError> {
    if name.trim().is_empty() {
        return Err(SessionError::ValidationFailed(format!(
            "{kind} name must not be empty"
        )));
    }
    Ok(())
}

impl<S: Store> AssassinService<S> {
    pub fn new(store: S, access: AccessPolicy) -> Self {
        Self {
            store,
            access,
            locks: GameLocks::new(),
            history_limit: 50,
        }
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn register_player(
        &self,
        code: &AccessCode,
        name: &str,
    ) -> Result<Player, SessionError> {
        self.access.check(code, "register a player")?;
        validate_name("Player", name)?;
        let player = Player::new(name, Utc::now());
        self.store.insert_player(&player).await?;
        log::info!("Registered player {} ({})", player.name, player.id);
        Ok(player)
    }

    /// Active players ordered by name.
    pub async fn list_players(&self) -> Result<Vec<Player>, SessionError> {
        let mut players = self.store.list_players().await?;
        players.retain(|p| !p.is_archived());
        Ok(players)
    }

    pub async fn archive_player(
        &self,
        code: &AccessCode,
        player_id: Uuid,
    ) -> Result<Player, SessionError> {
        self.access.check(code, "archive a player")?;
        let mut player = self.store.get_player(player_id).await?;
        if player.is_archived() {
            return Err(SessionError::InvalidState(format!(
                "player {} is already archived",
                player.name
            )));
        }
        let now = Utc::now();
        self.store.archive_player(player_id, now).await?;
        player.archived_at = Some(now);
        log::info!("Archived player {} ({})", player.name, player.id);
        Ok(player)
    }

    /// Always fails; players can only be archived.
    pub async fn delete_player(
        &self,
        code: &AccessCode,
        player_id: Uuid,
    ) -> Result<(), SessionError> {
        self.access.check(code, "delete a player")?;
        Err(SessionError::Unsupported(format!(
            "deleting players is disabled, archive {player_id} instead"
        )))
    }

    pub async fn register_deck(&self, code: &AccessCode, name: &str) -> Result<Deck, SessionError> {
        self.access.check(code, "register a deck")?;
        validate_name("Deck", name)?;
        let deck = Deck::new(name, Utc::now());
        self.store.insert_deck(&deck).await?;
        log::info!("Registered deck {} ({})", deck.name, deck.id);
        Ok(deck)
    }

    /// Active decks ordered by name.
    pub async fn list_decks(&self) -> Result<Vec<Deck>, SessionError> {
        let mut decks = self.store.list_decks().await?;
        decks.retain(|d| !d.is_archived());
        Ok(decks)
    }

    pub async fn archive_deck(&self, code: &AccessCode, deck_id: Uuid) -> Result<Deck, SessionError> {
        self.access.check(code, "archive a deck")?;
        let mut deck = self.store.get_deck(deck_id).await?;
        if deck.is_archived() {
            return Err(SessionError::InvalidState(format!(
                "deck {} is already archived",
                deck.name
            )));
        }
        let now = Utc::now();
        self.store.archive_deck(deck_id, now).await?;
        deck.archived_at = Some(now);
        log::info!("Archived deck {} ({})", deck.name, deck.id);
        Ok(deck)
    }

    pub async fn delete_deck(&self, code: &AccessCode, deck_id: Uuid) -> Result<(), SessionError> {
        self.access.check(code, "delete a deck")?;
        Err(SessionError::Unsupported(format!(
            "deleting decks is disabled, archive {deck_id} instead"
        )))
    }

    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, SessionError> {
        Ok(self.store.list_leaderboard().await?)
    }

    /// Current top of the leaderboard.
    pub async fn leader(&self) -> Result<Option<Uuid>, SessionError> {
        let entries = self.store.list_leaderboard().await?;
        Ok(leaderboard::leader(&entries))
    }

    pub async fn create_game(
        &self,
        code: &AccessCode,
        player_ids: Vec<Uuid>,
        deck_by_player_id: HashMap<Uuid, Uuid>,
    ) -> Result<Game, SessionError> {
        self.access.check(code, "start a game")?;
        for &player_id in &player_ids {
            let player = self.store.get_player(player_id).await?;
            if player.is_archived() {
                return Err(SessionError::ValidationFailed(format!(
                    "player {} is archived",
                    player.name
                )));
            }
        }
        for &deck_id in deck_by_player_id.values() {
            let deck = self.store.get_deck(deck_id).await?;
            if deck.is_archived() {
                return Err(SessionError::ValidationFailed(format!(
                    "deck {} is archived",
                    deck.name
                )));
            }
        }

        let leader_at_start = self.leader().await?;
        let game = Game::new(player_ids, deck_by_player_id, leader_at_start, Utc::now())?;
        self.store.insert_game(&game).await?;
        log::info!(
            "Started game {} with {} players, leader at start {:?}",
            game.id,
            game.player_ids.len(),
            game.leader_at_start
        );
        Ok(game)
    }

    pub async fn get_game(&self, game_id: Uuid) -> Result<Game, SessionError> {
        Ok(self.store.get_game(game_id).await?)
    }

    pub async fn add_kill(
        &self,
        code: &AccessCode,
        game_id: Uuid,
        killer: Uuid,
        victim: Uuid,
        target: Uuid,
    ) -> Result<Game, SessionError> {
        self.access.check(code, "record a kill")?;
        let _guard = self.locks.lock(game_id).await;

        let mut game = self.store.get_game(game_id).await?;
        let eliminated = game.add_kill(KillEvent::new(killer, victim, target, Utc::now()))?;
        self.store.update_game(&mut game).await?;
        log::info!(
            "Game {game_id}: {killer} killed {victim} (target {target}, eliminated: {eliminated}), {} alive",
            game.alive_players().len()
        );
        Ok(game)
    }

    /// Removes the most recent kill. Returns the game and the removed kill,
    /// `None` when the log was already empty.
    pub async fn undo_last_kill(
        &self,
        code: &AccessCode,
        game_id: Uuid,
    ) -> Result<(Game, Option<KillEvent>), SessionError> {
        self.access.check(code, "undo a kill")?;
        let _guard = self.locks.lock(game_id).await;

        let mut game = self.store.get_game(game_id).await?;
        let removed = game.undo_last_kill()?;
        if removed.is_some() {
            self.store.update_game(&mut game).await?;
            log::info!("Game {game_id}: undid last kill, {} kills left", game.kills.len());
        }
        Ok((game, removed))
    }

    /// Finishes the game and credits every participant on the leaderboard in
    /// one atomic write.
    pub async fn finalize(&self, code: &AccessCode, game_id: Uuid) -> Result<Game, SessionError> {
        self.access.check(code, "finish a game")?;
        let _guard = self.locks.lock(game_id).await;

        let mut game = self.store.get_game(game_id).await?;
        game.finalize(Utc::now())?;

        let names = self.name_book().await?;
        let mut batch = FinalizationBatch::new(game, &names.players)?;
        self.store.commit_finalization(&mut batch).await?;
        let game = batch.into_game();
        log::info!(
            "Game {game_id} finished, winner {:?}, placements {:?}",
            game.winner,
            game.placements
        );
        Ok(game)
    }

    pub async fn game_view(&self, game_id: Uuid) -> Result<GameView, SessionError> {
        let game = self.store.get_game(game_id).await?;
        let names = self.name_book().await?;
        let view = GameView::new(&game, &names);
        log::debug!("Scores for game {game_id}: {:?}", view.scores);
        Ok(view)
    }

    pub async fn list_active_games(&self) -> Result<Vec<GameSummary>, SessionError> {
        self.summaries(GameStatus::Active, None).await
    }

    /// Finished games, newest first, capped at `limit` or the configured
    /// history limit.
    pub async fn list_finished_games(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<GameSummary>, SessionError> {
        self.summaries(GameStatus::Finished, Some(limit.unwrap_or(self.history_limit)))
            .await
    }

    async fn summaries(
        &self,
        status: GameStatus,
        limit: Option<usize>,
    ) -> Result<Vec<GameSummary>, SessionError> {
        let games = self.store.list_games(status, limit).await?;
        let names = self.name_book().await?;
        Ok(games
            .iter()
            .map(|game| GameSummary::new(game, &names))
            .collect())
    }

    /// Names of every player and deck, archived ones included.
    async fn name_book(&self) -> Result<NameBook, SessionError> {
        let players = self.store.list_players().await?;
        let decks = self.store.list_decks().await?;
        Ok(NameBook {
            players: players.into_iter().map(|p| (p.id, p.name)).collect(),
            decks: decks.into_iter().map(|d| (d.id, d.name)).collect(),
        })
    }
}
