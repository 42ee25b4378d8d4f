use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = HashMap<Uuid, Arc<AsyncMutex<()>>>;

/// One async mutex per game, so read-modify-write cycles on the same game
/// run one at a time while different games proceed in parallel. An entry
/// lives only while someone holds or waits for it.
#[derive(Default)]
pub struct GameLocks {
    locks: Mutex<LockMap>,
}

/// Held for the duration of one game mutation.
pub struct GameGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a GameLocks,
    game_id: Uuid,
}

impl GameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn lock(&self, game_id: Uuid) -> GameGuard<'_> {
        let lock = self.map().entry(game_id).or_default().clone();
        GameGuard {
            guard: Some(lock.lock_owned().await),
            locks: self,
            game_id,
        }
    }

    /// Number of games with a live lock entry.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for GameGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.locks.map();
        // the map's own handle is the last one: no holder, no waiter
        if map
            .get(&self.game_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.game_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_game_is_serialized() {
        let locks = GameLocks::new();
        let game_id = Uuid::new_v4();
        let guard = locks.lock(game_id).await;

        let blocked = tokio::time::timeout(Duration::from_millis(20), locks.lock(game_id)).await;
        assert!(blocked.is_err());

        drop(guard);
        assert!(
            tokio::time::timeout(Duration::from_millis(20), locks.lock(game_id))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_released_entries_are_evicted() {
        let locks = GameLocks::new();
        let game_id = Uuid::new_v4();

        let guard = locks.lock(game_id).await;
        assert_eq!(locks.len(), 1);
        drop(guard);
        assert!(locks.is_empty());

        for _ in 0..3 {
            let _guard = locks.lock(Uuid::new_v4()).await;
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_entry_survives_while_someone_waits() {
        let locks = Arc::new(GameLocks::new());
        let game_id = Uuid::new_v4();
        let guard = locks.lock(game_id).await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock(game_id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);
        assert!(tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .is_ok());
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_games_do_not_block() {
        let locks = GameLocks::new();
        let _first = locks.lock(Uuid::new_v4()).await;
        let second = tokio::time::timeout(Duration::from_millis(20), locks.lock(Uuid::new_v4())).await;
        assert!(second.is_ok());
    }
}
