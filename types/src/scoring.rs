use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::KillEvent;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub kill_points: u32,
    pub leader_bonus: u32,
    pub placement_points: u32,
    pub total: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PlayerScore {
    pub player_id: Uuid,
    pub breakdown: ScoreBreakdown,
}

/// Per-player breakdowns for one game, in the game's seat order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scores {
    entries: Vec<PlayerScore>,
    index: HashMap<Uuid, usize>,
}

impl Scores {
    fn zeroed(player_ids: &[Uuid]) -> Self {
        let mut scores = Self::default();
        for &player_id in player_ids {
            if scores.index.contains_key(&player_id) {
                continue;
            }
            scores.index.insert(player_id, scores.entries.len());
            scores.entries.push(PlayerScore {
                player_id,
                breakdown: ScoreBreakdown::default(),
            });
        }
        scores
    }

    fn entry_mut(&mut self, player_id: Uuid) -> Option<&mut ScoreBreakdown> {
        let idx = *self.index.get(&player_id)?;
        Some(&mut self.entries[idx].breakdown)
    }

    pub fn get(&self, player_id: Uuid) -> Option<&ScoreBreakdown> {
        self.index
            .get(&player_id)
            .map(|&idx| &self.entries[idx].breakdown)
    }

    pub fn total(&self, player_id: Uuid) -> u32 {
        self.get(player_id).map_or(0, |b| b.total)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerScore> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn totals(&self) -> HashMap<Uuid, u32> {
        self.entries
            .iter()
            .map(|s| (s.player_id, s.breakdown.total))
            .collect()
    }
}

/// Scores every player of a game from its kill log and placements.
///
/// `placements` may be partial (the dead so far) for a live preview, or the
/// full order with the survivor last once the game is over. Players that do
/// not belong to `player_ids` earn nothing.
pub fn compute_scores(
    player_ids: &[Uuid],
    kills: &[KillEvent],
    placements: &[Uuid],
    leader_at_start: Option<Uuid>,
) -> Scores {
    let mut scores = Scores::zeroed(player_ids);

    for kill in kills {
        let Some(killer) = scores.entry_mut(kill.killer) else {
            log::warn!("Kill credited to {} who is not in the game", kill.killer);
            continue;
        };
        killer.kill_points += kill.kill_points();
        if leader_at_start == Some(kill.victim) {
            killer.leader_bonus += 1;
        }
    }

    for (idx, &player_id) in placements.iter().enumerate() {
        if let Some(entry) = scores.entry_mut(player_id) {
            entry.placement_points += idx as u32 + 1;
        }
    }

    for entry in &mut scores.entries {
        let b = &mut entry.breakdown;
        b.total = b.kill_points + b.leader_bonus + b.placement_points;
    }

    scores
}
