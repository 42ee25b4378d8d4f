use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use types::{compute_scores, Game, GameStatus, KillEvent};
use uuid::Uuid;

use crate::DatabaseError;

/// A game as it sits in the store. Every field is optional or defaulted so
/// that a malformed document is rejected with a message naming the field
/// instead of failing somewhere inside the scoring code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDocument {
    pub id: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub player_ids: Vec<String>,
    #[serde(default)]
    pub deck_by_player_id: HashMap<String, String>,
    #[serde(default)]
    pub kills: Vec<KillDocument>,
    #[serde(default)]
    pub placements: Vec<String>,
    pub leader_player_id_at_start: Option<String>,
    #[serde(default)]
    pub scores_by_player_id: HashMap<String, i64>,
    #[serde(default)]
    pub points_awarded_by_player_id: HashMap<String, i64>,
    pub winner_player_id: Option<String>,
    /// Epoch milliseconds.
    pub created_at: Option<i64>,
    pub ended_at: Option<i64>,
    #[serde(default)]
    pub revision: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillDocument {
    pub killer_player_id: Option<String>,
    pub victim_player_id: Option<String>,
    pub target_player_id: Option<String>,
    pub created_at: Option<i64>,
}

fn parse_id(field: &str, value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value)
        .map_err(|e| DatabaseError::Invalid(format!("{field}: {value:?} is not a valid id ({e})")))
}

fn required<'a, T>(field: &str, value: &'a Option<T>) -> Result<&'a T, DatabaseError> {
    value
        .as_ref()
        .ok_or_else(|| DatabaseError::Invalid(format!("{field} is missing")))
}

fn parse_millis(field: &str, millis: i64) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| DatabaseError::Invalid(format!("{field}: {millis} is out of range")))
}

impl TryFrom<&KillDocument> for KillEvent {
    type Error = DatabaseError;

    fn try_from(doc: &KillDocument) -> Result<Self, Self::Error> {
        Ok(KillEvent {
            killer: parse_id("killerPlayerId", required("killerPlayerId", &doc.killer_player_id)?)?,
            victim: parse_id("victimPlayerId", required("victimPlayerId", &doc.victim_player_id)?)?,
            target: parse_id("targetPlayerId", required("targetPlayerId", &doc.target_player_id)?)?,
            created_at: parse_millis("kill createdAt", *required("kill createdAt", &doc.created_at)?)?,
        })
    }
}

impl From<&KillEvent> for KillDocument {
    fn from(kill: &KillEvent) -> Self {
        Self {
            killer_player_id: Some(kill.killer.to_string()),
            victim_player_id: Some(kill.victim.to_string()),
            target_player_id: Some(kill.target.to_string()),
            created_at: Some(kill.created_at.timestamp_millis()),
        }
    }
}

impl From<&Game> for GameDocument {
    fn from(game: &Game) -> Self {
        let totals: HashMap<String, i64> = game
            .final_scores
            .as_ref()
            .map(|scores| {
                scores
                    .totals()
                    .into_iter()
                    .map(|(player_id, total)| (player_id.to_string(), total as i64))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: Some(game.id.to_string()),
            status: Some(game.status.to_string()),
            player_ids: game.player_ids.iter().map(Uuid::to_string).collect(),
            deck_by_player_id: game
                .deck_by_player_id
                .iter()
                .map(|(player, deck)| (player.to_string(), deck.to_string()))
                .collect(),
            kills: game.kills.iter().map(KillDocument::from).collect(),
            placements: game.placements.iter().map(Uuid::to_string).collect(),
            leader_player_id_at_start: game.leader_at_start.map(|id| id.to_string()),
            scores_by_player_id: totals.clone(),
            points_awarded_by_player_id: totals,
            winner_player_id: game.winner.map(|id| id.to_string()),
            created_at: Some(game.created_at.timestamp_millis()),
            ended_at: game.ended_at.map(|at| at.timestamp_millis()),
            revision: game.revision,
        }
    }
}

impl TryFrom<GameDocument> for Game {
    type Error = DatabaseError;

    fn try_from(doc: GameDocument) -> Result<Self, Self::Error> {
        let id = parse_id("id", required("id", &doc.id)?)?;
        let status: GameStatus = required("status", &doc.status)?.parse()?;
        let player_ids = doc
            .player_ids
            .iter()
            .map(|p| parse_id("playerIds", p))
            .collect::<Result<Vec<_>, _>>()?;
        let deck_by_player_id = doc
            .deck_by_player_id
            .iter()
            .map(|(player, deck)| {
                Ok((
                    parse_id("deckByPlayerId key", player)?,
                    parse_id("deckByPlayerId value", deck)?,
                ))
            })
            .collect::<Result<HashMap<_, _>, DatabaseError>>()?;
        let kills = doc
            .kills
            .iter()
            .map(KillEvent::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let placements = doc
            .placements
            .iter()
            .map(|p| parse_id("placements", p))
            .collect::<Result<Vec<_>, _>>()?;
        let leader_at_start = doc
            .leader_player_id_at_start
            .as_deref()
            .map(|p| parse_id("leaderPlayerIdAtStart", p))
            .transpose()?;
        let winner = doc
            .winner_player_id
            .as_deref()
            .map(|p| parse_id("winnerPlayerId", p))
            .transpose()?;
        let created_at = parse_millis("createdAt", *required("createdAt", &doc.created_at)?)?;
        let ended_at = doc
            .ended_at
            .map(|ms| parse_millis("endedAt", ms))
            .transpose()?;

        // scores are derived data: recompute them and make sure the stored
        // totals agree
        let final_scores = match status {
            GameStatus::Active => None,
            GameStatus::Finished => {
                let scores = compute_scores(&player_ids, &kills, &placements, leader_at_start);
                for (player, stored) in &doc.scores_by_player_id {
                    let player_id = parse_id("scoresByPlayerId key", player)?;
                    let expected = scores.total(player_id) as i64;
                    if *stored != expected {
                        return Err(DatabaseError::Invalid(format!(
                            "scoresByPlayerId[{player}] is {stored}, kill log gives {expected}"
                        )));
                    }
                }
                Some(scores)
            }
        };

        let game = Game {
            id,
            status,
            player_ids,
            deck_by_player_id,
            kills,
            placements,
            leader_at_start,
            final_scores,
            winner,
            created_at,
            ended_at,
            revision: doc.revision,
        };
        game.validate()?;
        Ok(game)
    }
}
