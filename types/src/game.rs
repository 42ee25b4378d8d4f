use std::{collections::HashMap, collections::HashSet, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    elimination::{elimination_order, survivors},
    error::GameError,
    scoring::{compute_scores, Scores},
    KillEvent,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Active,
    Finished,
}

impl Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameStatus::Active => write!(f, "active"),
            GameStatus::Finished => write!(f, "finished"),
        }
    }
}

impl FromStr for GameStatus {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(GameStatus::Active),
            "finished" => Ok(GameStatus::Finished),
            other => Err(GameError::Invalid(format!("unknown status {other:?}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Game {
    pub id: Uuid,
    pub status: GameStatus,
    /// Seat order, fixed at creation.
    pub player_ids: Vec<Uuid>,
    pub deck_by_player_id: HashMap<Uuid, Uuid>,
    pub kills: Vec<KillEvent>,
    /// Dead players in death order; the winner is appended once finished.
    pub placements: Vec<Uuid>,
    pub leader_at_start: Option<Uuid>,
    pub final_scores: Option<Scores>,
    pub winner: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Bumped by the store on every successful write.
    pub revision: u64,
}

impl Game {
    pub fn new(
        player_ids: Vec<Uuid>,
        deck_by_player_id: HashMap<Uuid, Uuid>,
        leader_at_start: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, GameError> {
        if player_ids.len() < 2 {
            return Err(GameError::Invalid(format!(
                "a game needs at least 2 players, got {}",
                player_ids.len()
            )));
        }
        if !player_ids.iter().all_unique() {
            return Err(GameError::Invalid("a player is listed twice".to_string()));
        }
        if let Some(outsider) = deck_by_player_id
            .keys()
            .find(|id| !player_ids.contains(id))
        {
            return Err(GameError::NotInGame(*outsider));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            status: GameStatus::Active,
            player_ids,
            deck_by_player_id,
            kills: Vec::new(),
            placements: Vec::new(),
            leader_at_start,
            final_scores: None,
            winner: None,
            created_at,
            ended_at: None,
            revision: 0,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == GameStatus::Active
    }

    fn ensure_active(&self, operation: &'static str) -> Result<(), GameError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(GameError::InvalidState {
                game_id: self.id,
                status: self.status,
                operation,
            })
        }
    }

    fn ensure_in_game(&self, player_id: Uuid) -> Result<(), GameError> {
        if self.player_ids.contains(&player_id) {
            Ok(())
        } else {
            Err(GameError::NotInGame(player_id))
        }
    }

    /// Dead players in death order, recomputed from the kill log.
    pub fn dead_players(&self) -> Vec<Uuid> {
        elimination_order(&self.player_ids, &self.kills)
    }

    /// Players still standing, in seat order. The winner of a finished game
    /// is the only one left.
    pub fn alive_players(&self) -> Vec<Uuid> {
        survivors(&self.player_ids, &self.dead_players())
    }

    /// Appends a kill and refreshes placements. Returns whether the victim
    /// was still alive; a kill on a dead victim is kept in the log but
    /// changes no placement.
    pub fn add_kill(&mut self, kill: KillEvent) -> Result<bool, GameError> {
        self.ensure_active("record a kill")?;
        self.ensure_in_game(kill.killer)?;
        self.ensure_in_game(kill.victim)?;
        self.ensure_in_game(kill.target)?;
        if kill.killer == kill.victim {
            return Err(GameError::SelfKill(kill.killer));
        }

        let was_alive = !self.placements.contains(&kill.victim);
        if !was_alive {
            log::warn!(
                "Game {}: {} killed {} who was already dead",
                self.id,
                kill.killer,
                kill.victim
            );
        }
        self.kills.push(kill);
        self.placements = self.dead_players();
        Ok(was_alive)
    }

    /// Pops the most recent kill, if any, and recomputes placements from the
    /// remaining log.
    pub fn undo_last_kill(&mut self) -> Result<Option<KillEvent>, GameError> {
        self.ensure_active("undo a kill")?;
        let removed = self.kills.pop();
        self.placements = self.dead_players();
        Ok(removed)
    }

    /// Live scores while the game runs, final scores once it is over.
    pub fn scores(&self) -> Scores {
        match &self.final_scores {
            Some(scores) => scores.clone(),
            None => compute_scores(
                &self.player_ids,
                &self.kills,
                &self.placements,
                self.leader_at_start,
            ),
        }
    }

    /// Closes the game: appends the lone survivor to the placements and
    /// computes the final scores. Fails without touching the game unless
    /// exactly one player is alive.
    pub fn finalize(&mut self, ended_at: DateTime<Utc>) -> Result<Uuid, GameError> {
        self.ensure_active("finish the game")?;
        let dead = self.dead_players();
        let alive = survivors(&self.player_ids, &dead);
        let &[winner] = alive.as_slice() else {
            return Err(GameError::SurvivorCount {
                survivors: alive.len(),
            });
        };

        let mut placements = dead;
        placements.push(winner);
        let scores = compute_scores(
            &self.player_ids,
            &self.kills,
            &placements,
            self.leader_at_start,
        );

        self.placements = placements;
        self.final_scores = Some(scores);
        self.winner = Some(winner);
        self.ended_at = Some(ended_at);
        self.status = GameStatus::Finished;
        log::info!("Game {} finished, winner {winner}", self.id);
        Ok(winner)
    }

    /// Checks the invariants that tie the stored fields together.
    pub fn validate(&self) -> Result<(), GameError> {
        if self.player_ids.len() < 2 {
            return Err(GameError::Invalid("fewer than 2 players".to_string()));
        }
        if !self.player_ids.iter().all_unique() {
            return Err(GameError::Invalid("duplicate player".to_string()));
        }
        let seats: HashSet<&Uuid> = self.player_ids.iter().collect();
        if let Some(id) = self.deck_by_player_id.keys().find(|id| !seats.contains(id)) {
            return Err(GameError::NotInGame(*id));
        }
        for kill in &self.kills {
            for id in [kill.killer, kill.victim, kill.target] {
                if !seats.contains(&id) {
                    return Err(GameError::NotInGame(id));
                }
            }
        }

        let dead = self.dead_players();
        match self.status {
            GameStatus::Active => {
                if self.placements != dead {
                    return Err(GameError::Invalid(
                        "placements disagree with the kill log".to_string(),
                    ));
                }
                if self.winner.is_some() || self.final_scores.is_some() || self.ended_at.is_some()
                {
                    return Err(GameError::Invalid(
                        "an active game carries final results".to_string(),
                    ));
                }
            }
            GameStatus::Finished => {
                let alive = survivors(&self.player_ids, &dead);
                let &[winner] = alive.as_slice() else {
                    return Err(GameError::SurvivorCount {
                        survivors: alive.len(),
                    });
                };
                if self.winner != Some(winner) {
                    return Err(GameError::Invalid(format!(
                        "winner should be {winner}, found {:?}",
                        self.winner
                    )));
                }
                if self.placements.len() != self.player_ids.len()
                    || self.placements[..dead.len()] != dead[..]
                    || self.placements.last() != Some(&winner)
                {
                    return Err(GameError::Invalid(
                        "placements disagree with the kill log".to_string(),
                    ));
                }
                if self.final_scores.is_none() || self.ended_at.is_none() {
                    return Err(GameError::Invalid(
                        "a finished game has no final results".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_game(n: usize) -> (Game, Vec<Uuid>) {
        let ids: Vec<_> = (0..n).map(|_| Uuid::new_v4()).collect();
        let game = Game::new(ids.clone(), HashMap::new(), None, Utc::now()).unwrap();
        (game, ids)
    }

    fn kill(killer: Uuid, victim: Uuid, target: Uuid) -> KillEvent {
        KillEvent::new(killer, victim, target, Utc::now())
    }

    #[test]
    fn test_new_game_requires_two_distinct_players() {
        let a = Uuid::new_v4();
        assert!(Game::new(vec![a], HashMap::new(), None, Utc::now()).is_err());
        assert!(Game::new(vec![a, a], HashMap::new(), None, Utc::now()).is_err());
    }

    #[test]
    fn test_deck_must_belong_to_a_participant() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let decks = HashMap::from([(c, Uuid::new_v4())]);
        assert_eq!(
            Game::new(vec![a, b], decks, None, Utc::now()),
            Err(GameError::NotInGame(c))
        );
    }

    #[test]
    fn test_add_kill_updates_placements() {
        let (mut game, ids) = new_game(3);
        assert!(game.add_kill(kill(ids[0], ids[1], ids[0])).unwrap());
        assert_eq!(game.placements, vec![ids[1]]);
        assert_eq!(game.alive_players(), vec![ids[0], ids[2]]);
    }

    #[test]
    fn test_kill_on_dead_victim_is_logged_but_not_placed() {
        let (mut game, ids) = new_game(3);
        game.add_kill(kill(ids[0], ids[1], ids[0])).unwrap();
        assert!(!game.add_kill(kill(ids[2], ids[1], ids[1])).unwrap());
        assert_eq!(game.kills.len(), 2);
        assert_eq!(game.placements, vec![ids[1]]);
    }

    #[test]
    fn test_add_kill_rejects_bad_input() {
        let (mut game, ids) = new_game(2);
        let stranger = Uuid::new_v4();
        assert_eq!(
            game.add_kill(kill(ids[0], ids[0], ids[0])),
            Err(GameError::SelfKill(ids[0]))
        );
        assert_eq!(
            game.add_kill(kill(ids[0], stranger, ids[0])),
            Err(GameError::NotInGame(stranger))
        );
        assert_eq!(
            game.add_kill(kill(ids[0], ids[1], stranger)),
            Err(GameError::NotInGame(stranger))
        );
        assert!(game.kills.is_empty());
    }

    #[test]
    fn test_undo_restores_previous_state() {
        let (mut game, ids) = new_game(4);
        game.add_kill(kill(ids[0], ids[1], ids[1])).unwrap();
        let placements_before = game.placements.clone();
        let scores_before = game.scores();

        let added = kill(ids[2], ids[3], ids[2]);
        game.add_kill(added).unwrap();
        assert_eq!(game.undo_last_kill().unwrap(), Some(added));

        assert_eq!(game.placements, placements_before);
        assert_eq!(game.scores(), scores_before);
    }

    #[test]
    fn test_undo_on_empty_log_is_a_noop() {
        let (mut game, _) = new_game(2);
        assert_eq!(game.undo_last_kill().unwrap(), None);
        assert!(game.placements.is_empty());
    }

    #[test]
    fn test_finalize_requires_exactly_one_survivor() {
        let (mut game, ids) = new_game(3);
        game.add_kill(kill(ids[0], ids[1], ids[0])).unwrap();
        let err = game.finalize(Utc::now()).unwrap_err();
        assert_eq!(err, GameError::SurvivorCount { survivors: 2 });
        assert!(err.to_string().contains('2'));
        assert!(game.is_active());
        assert_eq!(game.placements, vec![ids[1]]);

        game.add_kill(kill(ids[2], ids[0], ids[1])).unwrap();
        game.add_kill(kill(ids[0], ids[2], ids[0])).unwrap();
        assert_eq!(
            game.finalize(Utc::now()),
            Err(GameError::SurvivorCount { survivors: 0 })
        );
        assert!(game.is_active());
    }

    #[test]
    fn test_finalize_appends_survivor_and_scores() {
        let (mut game, ids) = new_game(3);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        game.add_kill(kill(a, b, a)).unwrap();
        game.add_kill(kill(c, a, a)).unwrap();

        let winner = game.finalize(Utc::now()).unwrap();

        assert_eq!(winner, c);
        assert_eq!(game.status, GameStatus::Finished);
        assert_eq!(game.placements, vec![b, a, c]);
        let scores = game.scores();
        assert_eq!(scores.total(a), 4);
        assert_eq!(scores.total(b), 1);
        assert_eq!(scores.total(c), 7);
        assert_eq!(game.alive_players(), vec![c]);
        game.validate().unwrap();
    }

    #[test]
    fn test_finished_game_rejects_mutation() {
        let (mut game, ids) = new_game(2);
        game.add_kill(kill(ids[0], ids[1], ids[1])).unwrap();
        game.finalize(Utc::now()).unwrap();

        assert!(matches!(
            game.add_kill(kill(ids[1], ids[0], ids[0])),
            Err(GameError::InvalidState { .. })
        ));
        assert!(matches!(
            game.undo_last_kill(),
            Err(GameError::InvalidState { .. })
        ));
        assert!(matches!(
            game.finalize(Utc::now()),
            Err(GameError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_validate_catches_tampered_placements() {
        let (mut game, ids) = new_game(3);
        game.add_kill(kill(ids[0], ids[1], ids[0])).unwrap();
        game.validate().unwrap();

        game.placements = vec![ids[2]];
        assert!(game.validate().is_err());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("active".parse::<GameStatus>().unwrap(), GameStatus::Active);
        assert_eq!(
            "finished".parse::<GameStatus>().unwrap(),
            GameStatus::Finished
        );
        assert!("paused".parse::<GameStatus>().is_err());
    }
}
