use std::{cmp::Ordering, collections::HashMap, fmt::Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::GameError, game::Game};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub player_id: Uuid,
    pub player_name: String,
    pub total_points: u64,
    pub games_played: u64,
    pub updated_at: DateTime<Utc>,
}

impl LeaderboardEntry {
    pub fn average_points(&self) -> Option<f64> {
        (self.games_played > 0).then(|| self.total_points as f64 / self.games_played as f64)
    }

    fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .total_points
            .cmp(&self.total_points)
            .then(other.games_played.cmp(&self.games_played))
            .then_with(|| self.player_name.cmp(&other.player_name))
            .then(self.player_id.cmp(&other.player_id))
    }
}

impl Display for LeaderboardEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let average = self
            .average_points()
            .map_or_else(|| "-".to_string(), |avg| format!("{avg:.2}"));
        write!(
            f,
            "{}: {} pts in {} games (avg {average})",
            self.player_name, self.total_points, self.games_played
        )
    }
}

/// Sorts entries best first: points, then games played, then name.
pub fn rank(entries: &mut [LeaderboardEntry]) {
    entries.sort_by(LeaderboardEntry::rank_cmp);
}

/// The player at the top of the board, if anyone has played yet.
pub fn leader(entries: &[LeaderboardEntry]) -> Option<Uuid> {
    entries
        .iter()
        .min_by(|a, b| a.rank_cmp(b))
        .map(|entry| entry.player_id)
}

/// One additive update to a leaderboard row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardIncrement {
    pub player_id: Uuid,
    pub player_name: String,
    pub delta_points: u64,
    pub delta_games: u64,
    pub updated_at: DateTime<Utc>,
}

impl LeaderboardIncrement {
    /// One increment per participant of a finished game, zero scores
    /// included, in seat order.
    pub fn for_finished_game(
        game: &Game,
        names: &HashMap<Uuid, String>,
    ) -> Result<Vec<Self>, GameError> {
        let (Some(scores), Some(updated_at)) = (&game.final_scores, game.ended_at) else {
            return Err(GameError::InvalidState {
                game_id: game.id,
                status: game.status,
                operation: "award leaderboard points",
            });
        };

        Ok(game
            .player_ids
            .iter()
            .map(|&player_id| Self {
                player_id,
                player_name: names
                    .get(&player_id)
                    .cloned()
                    .unwrap_or_else(|| player_id.to_string()),
                delta_points: scores.total(player_id) as u64,
                delta_games: 1,
                updated_at,
            })
            .collect())
    }

    pub fn apply_to(&self, entry: Option<LeaderboardEntry>) -> LeaderboardEntry {
        match entry {
            Some(existing) => LeaderboardEntry {
                player_id: existing.player_id,
                player_name: self.player_name.clone(),
                total_points: existing.total_points + self.delta_points,
                games_played: existing.games_played + self.delta_games,
                updated_at: self.updated_at,
            },
            None => LeaderboardEntry {
                player_id: self.player_id,
                player_name: self.player_name.clone(),
                total_points: self.delta_points,
                games_played: self.delta_games,
                updated_at: self.updated_at,
            },
        }
    }
}
