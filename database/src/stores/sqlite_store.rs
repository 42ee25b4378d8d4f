use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use types::{leaderboard, Deck, Game, GameStatus, LeaderboardEntry, LeaderboardIncrement, Player};
use uuid::Uuid;

use super::{GameStore, LeaderboardStore, RosterStore};
use crate::retry::BoxedAttempt;
use crate::{retry_with_backoff, DatabaseConfig, DatabaseError, FinalizationBatch, GameDocument};

const CONNECT_RETRIES: usize = 3;

pub struct SqliteStore {
    pool: SqlitePool,
}

fn query_error(e: sqlx::Error) -> DatabaseError {
    DatabaseError::Query(e.to_string())
}

fn player_from_row(row: &SqliteRow) -> Result<Player, DatabaseError> {
    let id: String = row.try_get("id").map_err(query_error)?;
    Ok(Player {
        id: Uuid::parse_str(&id)?,
        name: row.try_get("name").map_err(query_error)?,
        created_at: row.try_get("created_at").map_err(query_error)?,
        archived_at: row.try_get("archived_at").map_err(query_error)?,
    })
}

fn deck_from_row(row: &SqliteRow) -> Result<Deck, DatabaseError> {
    let id: String = row.try_get("id").map_err(query_error)?;
    Ok(Deck {
        id: Uuid::parse_str(&id)?,
        name: row.try_get("name").map_err(query_error)?,
        created_at: row.try_get("created_at").map_err(query_error)?,
        archived_at: row.try_get("archived_at").map_err(query_error)?,
    })
}

fn game_from_row(row: &SqliteRow) -> Result<Game, DatabaseError> {
    let row_id: String = row.try_get("id").map_err(query_error)?;
    let row_id = Uuid::parse_str(&row_id)?;
    let document: String = row.try_get("document").map_err(query_error)?;
    let revision: i64 = row.try_get("revision").map_err(query_error)?;
    let mut doc: GameDocument = serde_json::from_str(&document)
        .map_err(|e| DatabaseError::Invalid(format!("game document: {e}")))?;
    doc.revision = u64::try_from(revision)
        .map_err(|_| DatabaseError::Invalid(format!("negative revision {revision}")))?;
    let game = Game::try_from(doc)?;
    if game.id != row_id {
        return Err(DatabaseError::Invalid(format!(
            "row {row_id} holds the document of game {}",
            game.id
        )));
    }
    Ok(game)
}

fn entry_from_row(row: &SqliteRow) -> Result<LeaderboardEntry, DatabaseError> {
    let player_id: String = row.try_get("player_id").map_err(query_error)?;
    let total_points: i64 = row.try_get("total_points").map_err(query_error)?;
    let games_played: i64 = row.try_get("games_played").map_err(query_error)?;
    Ok(LeaderboardEntry {
        player_id: Uuid::parse_str(&player_id)?,
        player_name: row.try_get("player_name").map_err(query_error)?,
        total_points: u64::try_from(total_points)
            .map_err(|_| DatabaseError::Invalid(format!("negative total {total_points}")))?,
        games_played: u64::try_from(games_played)
            .map_err(|_| DatabaseError::Invalid(format!("negative game count {games_played}")))?,
        updated_at: row.try_get("updated_at").map_err(query_error)?,
    })
}

/// Compare-and-swap write of a game. Returns the new revision.
async fn write_game(conn: &mut SqliteConnection, game: &Game) -> Result<u64, DatabaseError> {
    let new_revision = game.revision + 1;
    let mut doc = GameDocument::from(game);
    doc.revision = new_revision;
    let document = serde_json::to_string(&doc)?;
    let game_id = game.id.to_string();

    let result = sqlx::query(
        "UPDATE games SET status = ?, revision = ?, ended_at = ?, document = ? WHERE id = ? AND revision = ?",
    )
    .bind(game.status.to_string())
    .bind(new_revision as i64)
    .bind(game.ended_at)
    .bind(document)
    .bind(&game_id)
    .bind(game.revision as i64)
    .execute(&mut *conn)
    .await
    .map_err(query_error)?;

    if result.rows_affected() == 0 {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM games WHERE id = ?")
            .bind(&game_id)
            .fetch_one(&mut *conn)
            .await
            .map_err(query_error)?;
        return Err(if exists == 0 {
            DatabaseError::GameNotFound(game.id)
        } else {
            DatabaseError::Conflict {
                game_id: game.id,
                expected_revision: game.revision,
            }
        });
    }
    Ok(new_revision)
}

async fn increment_rows(
    conn: &mut SqliteConnection,
    increments: &[LeaderboardIncrement],
) -> Result<(), DatabaseError> {
    for increment in increments {
        sqlx::query(
            "INSERT INTO leaderboard (player_id, player_name, total_points, games_played, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (player_id) DO UPDATE SET
                 player_name = excluded.player_name,
                 total_points = leaderboard.total_points + excluded.total_points,
                 games_played = leaderboard.games_played + excluded.games_played,
                 updated_at = excluded.updated_at",
        )
        .bind(increment.player_id.to_string())
        .bind(&increment.player_name)
        .bind(increment.delta_points as i64)
        .bind(increment.delta_games as i64)
        .bind(increment.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(query_error)?;
    }
    Ok(())
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens the pool, retrying transient failures, and brings the schema
    /// up to date.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let config = config.clone();
        let attempt = move || -> BoxedAttempt<SqlitePool, sqlx::Error> {
            let config = config.clone();
            Box::pin(async move { config.create_pool().await })
        };
        let pool = retry_with_backoff("connect", attempt, CONNECT_RETRIES, Duration::from_millis(200))
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        let store = Self::new(pool);
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl RosterStore for SqliteStore {
    async fn insert_player(&self, player: &Player) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO players (id, name, created_at, archived_at) VALUES (?, ?, ?, ?)")
            .bind(player.id.to_string())
            .bind(&player.name)
            .bind(player.created_at)
            .bind(player.archived_at)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn get_player(&self, player_id: Uuid) -> Result<Player, DatabaseError> {
        let row = sqlx::query("SELECT id, name, created_at, archived_at FROM players WHERE id = ?")
            .bind(player_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;
        match row {
            Some(r) => player_from_row(&r),
            None => Err(DatabaseError::PlayerNotFound(player_id)),
        }
    }

    async fn list_players(&self) -> Result<Vec<Player>, DatabaseError> {
        let rows = sqlx::query("SELECT id, name, created_at, archived_at FROM players ORDER BY name, id")
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;
        rows.iter().map(player_from_row).collect()
    }

    async fn archive_player(
        &self,
        player_id: Uuid,
        archived_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE players SET archived_at = ? WHERE id = ?")
            .bind(archived_at)
            .bind(player_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(query_error)?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::PlayerNotFound(player_id));
        }
        Ok(())
    }

    async fn insert_deck(&self, deck: &Deck) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO decks (id, name, created_at, archived_at) VALUES (?, ?, ?, ?)")
            .bind(deck.id.to_string())
            .bind(&deck.name)
            .bind(deck.created_at)
            .bind(deck.archived_at)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn get_deck(&self, deck_id: Uuid) -> Result<Deck, DatabaseError> {
        let row = sqlx::query("SELECT id, name, created_at, archived_at FROM decks WHERE id = ?")
            .bind(deck_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;
        match row {
            Some(r) => deck_from_row(&r),
            None => Err(DatabaseError::DeckNotFound(deck_id)),
        }
    }

    async fn list_decks(&self) -> Result<Vec<Deck>, DatabaseError> {
        let rows = sqlx::query("SELECT id, name, created_at, archived_at FROM decks ORDER BY name, id")
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;
        rows.iter().map(deck_from_row).collect()
    }

    async fn archive_deck(
        &self,
        deck_id: Uuid,
        archived_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE decks SET archived_at = ? WHERE id = ?")
            .bind(archived_at)
            .bind(deck_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(query_error)?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::DeckNotFound(deck_id));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl GameStore for SqliteStore {
    async fn insert_game(&self, game: &Game) -> Result<(), DatabaseError> {
        let document = serde_json::to_string(&GameDocument::from(game))?;
        sqlx::query(
            "INSERT INTO games (id, status, revision, created_at, ended_at, document) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(game.id.to_string())
        .bind(game.status.to_string())
        .bind(game.revision as i64)
        .bind(game.created_at)
        .bind(game.ended_at)
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn get_game(&self, game_id: Uuid) -> Result<Game, DatabaseError> {
        let row = sqlx::query("SELECT id, revision, document FROM games WHERE id = ?")
            .bind(game_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;
        match row {
            Some(r) => game_from_row(&r),
            None => Err(DatabaseError::GameNotFound(game_id)),
        }
    }

    async fn list_games(
        &self,
        status: GameStatus,
        limit: Option<usize>,
    ) -> Result<Vec<Game>, DatabaseError> {
        let sql = match status {
            GameStatus::Active => {
                "SELECT id, revision, document FROM games WHERE status = ? ORDER BY created_at DESC, id LIMIT ?"
            }
            GameStatus::Finished => {
                "SELECT id, revision, document FROM games WHERE status = ? ORDER BY ended_at DESC, id LIMIT ?"
            }
        };
        // a negative LIMIT means no limit in SQLite
        let limit = limit.map_or(-1, |l| l as i64);
        let rows = sqlx::query(sql)
            .bind(status.to_string())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;
        rows.iter().map(game_from_row).collect()
    }

    async fn update_game(&self, game: &mut Game) -> Result<(), DatabaseError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        game.revision = write_game(&mut *conn, game).await?;
        Ok(())
    }

    async fn commit_finalization(
        &self,
        batch: &mut FinalizationBatch,
    ) -> Result<(), DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;

        let new_revision = write_game(&mut *tx, &batch.game).await?;
        increment_rows(&mut *tx, &batch.increments).await?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;
        batch.game.revision = new_revision;
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
impl LeaderboardStore for SqliteStore {
    async fn list_leaderboard(&self) -> Result<Vec<LeaderboardEntry>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT player_id, player_name, total_points, games_played, updated_at FROM leaderboard",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;
        let mut entries = rows
            .iter()
            .map(entry_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        leaderboard::rank(&mut entries);
        Ok(entries)
    }

    async fn get_leaderboard_entry(
        &self,
        player_id: Uuid,
    ) -> Result<Option<LeaderboardEntry>, DatabaseError> {
        let row = sqlx::query(
            "SELECT player_id, player_name, total_points, games_played, updated_at FROM leaderboard WHERE player_id = ?",
        )
        .bind(player_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;
        row.as_ref().map(entry_from_row).transpose()
    }

    async fn increment_many(
        &self,
        increments: &[LeaderboardIncrement],
    ) -> Result<(), DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;
        increment_rows(&mut *tx, increments).await?;
        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use types::KillEvent;

    async fn store() -> SqliteStore {
        let config = DatabaseConfig::from_cli_or_env_or_yaml(Some("sqlite::memory:".into()), None);
        SqliteStore::connect(&config).await.unwrap()
    }

    #[tokio::test]
    async fn test_players_are_listed_by_name() {
        let store = store().await;
        for name in ["Zoe", "Adam", "Mia"] {
            store.insert_player(&Player::new(name, Utc::now())).await.unwrap();
        }
        let names: Vec<_> = store
            .list_players()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Adam", "Mia", "Zoe"]);
    }

    #[tokio::test]
    async fn test_archive_unknown_deck_is_not_found() {
        let store = store().await;
        let missing = Uuid::new_v4();
        assert!(matches!(
            store.archive_deck(missing, Utc::now()).await,
            Err(DatabaseError::DeckNotFound(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn test_update_game_checks_revision() {
        let store = store().await;
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let game = Game::new(ids.clone(), HashMap::new(), None, Utc::now()).unwrap();
        store.insert_game(&game).await.unwrap();

        let mut first = store.get_game(game.id).await.unwrap();
        let mut second = first.clone();

        first
            .add_kill(KillEvent::new(ids[0], ids[1], ids[1], Utc::now()))
            .unwrap();
        store.update_game(&mut first).await.unwrap();
        assert_eq!(first.revision, 1);

        second
            .add_kill(KillEvent::new(ids[1], ids[0], ids[0], Utc::now()))
            .unwrap();
        assert!(matches!(
            store.update_game(&mut second).await,
            Err(DatabaseError::Conflict { expected_revision: 0, .. })
        ));

        let stored = store.get_game(game.id).await.unwrap();
        assert_eq!(stored.placements, vec![ids[1]]);
        assert_eq!(stored.revision, 1);
    }

    #[tokio::test]
    async fn test_malformed_document_is_rejected_on_read() {
        let store = store().await;
        let game_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO games (id, status, revision, created_at, ended_at, document) VALUES (?, 'active', 0, ?, NULL, ?)",
        )
        .bind(game_id.to_string())
        .bind(Utc::now())
        .bind(r#"{"id": "nope", "status": "active"}"#)
        .execute(store.pool())
        .await
        .unwrap();

        assert!(matches!(
            store.get_game(game_id).await,
            Err(DatabaseError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_document_under_another_game_id_is_rejected() {
        let store = store().await;
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let game = Game::new(ids, HashMap::new(), None, Utc::now()).unwrap();
        store.insert_game(&game).await.unwrap();

        let copy_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO games (id, status, revision, created_at, ended_at, document)
             SELECT ?, status, revision, created_at, ended_at, document FROM games WHERE id = ?",
        )
        .bind(copy_id.to_string())
        .bind(game.id.to_string())
        .execute(store.pool())
        .await
        .unwrap();

        assert!(matches!(
            store.get_game(copy_id).await,
            Err(DatabaseError::Invalid(msg)) if msg.contains(&game.id.to_string())
        ));
        assert_eq!(store.get_game(game.id).await.unwrap().id, game.id);
    }
}
