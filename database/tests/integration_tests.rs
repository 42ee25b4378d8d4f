//! Contract tests run against both store implementations.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use database::{
    DatabaseConfig, DatabaseError, FinalizationBatch, GameStore, LeaderboardStore, MemoryStore,
    SqliteStore, Store,
};
use types::{Game, GameStatus, KillEvent, LeaderboardIncrement, Player};
use uuid::Uuid;

async fn sqlite_store() -> SqliteStore {
    let config = DatabaseConfig::from_cli_or_env_or_yaml(Some("sqlite::memory:".into()), None);
    SqliteStore::connect(&config)
        .await
        .expect("Failed to open in-memory database")
}

async fn register(store: &dyn Store, names: &[&str]) -> Vec<Player> {
    let mut players = Vec::new();
    for name in names {
        let player = Player::new(name, Utc::now());
        store.insert_player(&player).await.expect("Failed to insert player");
        players.push(player);
    }
    players
}

/// A, B, C: A kills B revealing A, C kills A revealing A.
async fn play_three_player_game(store: &dyn Store, players: &[Player]) -> Game {
    let ids: Vec<_> = players.iter().map(|p| p.id).collect();
    let mut game = Game::new(ids.clone(), HashMap::new(), None, Utc::now()).unwrap();
    store.insert_game(&game).await.expect("Failed to insert game");

    game.add_kill(KillEvent::new(ids[0], ids[1], ids[0], Utc::now()))
        .unwrap();
    store.update_game(&mut game).await.unwrap();
    game.add_kill(KillEvent::new(ids[2], ids[0], ids[0], Utc::now()))
        .unwrap();
    store.update_game(&mut game).await.unwrap();

    game.finalize(Utc::now()).unwrap();
    let names: HashMap<_, _> = players.iter().map(|p| (p.id, p.name.clone())).collect();
    let mut batch = FinalizationBatch::new(game, &names).unwrap();
    store
        .commit_finalization(&mut batch)
        .await
        .expect("Failed to commit finalization");
    batch.into_game()
}

async fn finalization_updates_game_and_leaderboard(store: &dyn Store) {
    let players = register(store, &["A", "B", "C"]).await;
    let game = play_three_player_game(store, &players).await;
    assert_eq!(game.revision, 3);

    let stored = store.get_game(game.id).await.unwrap();
    assert_eq!(stored.status, GameStatus::Finished);
    assert_eq!(
        stored.placements,
        vec![players[1].id, players[0].id, players[2].id]
    );
    assert_eq!(stored.winner, Some(players[2].id));
    assert!(stored.ended_at.is_some());

    let board = store.list_leaderboard().await.unwrap();
    let rows: Vec<_> = board
        .iter()
        .map(|e| (e.player_name.as_str(), e.total_points, e.games_played))
        .collect();
    assert_eq!(rows, vec![("C", 7, 1), ("A", 4, 1), ("B", 1, 1)]);

    // a second game accumulates
    play_three_player_game(store, &players).await;
    let c = store
        .get_leaderboard_entry(players[2].id)
        .await
        .unwrap()
        .expect("C should be on the board");
    assert_eq!((c.total_points, c.games_played), (14, 2));
}

async fn finished_games_are_listed_newest_first(store: &dyn Store) {
    let players = register(store, &["A", "B", "C"]).await;
    let first = play_three_player_game(store, &players).await;
    let second = play_three_player_game(store, &players).await;

    let active = Game::new(
        vec![players[0].id, players[1].id],
        HashMap::new(),
        None,
        Utc::now() + Duration::seconds(1),
    )
    .unwrap();
    store.insert_game(&active).await.unwrap();

    let finished = store.list_games(GameStatus::Finished, None).await.unwrap();
    let ids: Vec<_> = finished.iter().map(|g| g.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let limited = store
        .list_games(GameStatus::Finished, Some(1))
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);

    let active_games = store.list_games(GameStatus::Active, None).await.unwrap();
    assert_eq!(active_games.len(), 1);
    assert_eq!(active_games[0].id, active.id);
}

async fn missing_game_is_not_found(store: &dyn Store) {
    let missing = Uuid::new_v4();
    assert!(matches!(
        store.get_game(missing).await,
        Err(DatabaseError::GameNotFound(id)) if id == missing
    ));
}

async fn archived_players_stay_resolvable(store: &dyn Store) {
    let players = register(store, &["A"]).await;
    store
        .archive_player(players[0].id, Utc::now())
        .await
        .unwrap();
    let player = store.get_player(players[0].id).await.unwrap();
    assert!(player.is_archived());
    assert_eq!(store.list_players().await.unwrap().len(), 1);
}

async fn increments_create_and_accumulate_rows(store: &dyn Store) {
    let players = register(store, &["A", "B"]).await;
    let increment = |player: &Player, points| LeaderboardIncrement {
        player_id: player.id,
        player_name: player.name.clone(),
        delta_points: points,
        delta_games: 1,
        updated_at: Utc::now(),
    };

    store
        .increment_many(&[increment(&players[0], 3), increment(&players[1], 5)])
        .await
        .unwrap();
    store
        .increment_many(&[increment(&players[0], 4)])
        .await
        .unwrap();

    let rows: Vec<_> = store
        .list_leaderboard()
        .await
        .unwrap()
        .iter()
        .map(|e| (e.player_name.clone(), e.total_points, e.games_played))
        .collect();
    assert_eq!(
        rows,
        vec![("A".to_string(), 7, 2), ("B".to_string(), 5, 1)]
    );
}

#[tokio::test]
async fn test_memory_store_contract() {
    finalization_updates_game_and_leaderboard(&MemoryStore::new()).await;
    finished_games_are_listed_newest_first(&MemoryStore::new()).await;
    missing_game_is_not_found(&MemoryStore::new()).await;
    archived_players_stay_resolvable(&MemoryStore::new()).await;
    increments_create_and_accumulate_rows(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_store_contract() {
    finalization_updates_game_and_leaderboard(&sqlite_store().await).await;
    finished_games_are_listed_newest_first(&sqlite_store().await).await;
    missing_game_is_not_found(&sqlite_store().await).await;
    archived_players_stay_resolvable(&sqlite_store().await).await;
    increments_create_and_accumulate_rows(&sqlite_store().await).await;
}

#[tokio::test]
async fn test_sqlite_stale_finalization_rolls_back() {
    let store = sqlite_store().await;
    let players = register(&store, &["A", "B"]).await;
    let ids: Vec<_> = players.iter().map(|p| p.id).collect();
    let mut game = Game::new(ids.clone(), HashMap::new(), None, Utc::now()).unwrap();
    store.insert_game(&game).await.unwrap();

    let mut concurrent = game.clone();
    store.update_game(&mut concurrent).await.unwrap();

    game.add_kill(KillEvent::new(ids[0], ids[1], ids[1], Utc::now()))
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
