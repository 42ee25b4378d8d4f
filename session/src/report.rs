use std::{collections::HashMap, fmt::Display};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use types::{Game, GameStatus, ScoreBreakdown};
use uuid::Uuid;

/// Id to display name, falling back to the id for unknown entries.
#[derive(Debug, Clone, Default)]
pub struct NameBook {
    pub players: HashMap<Uuid, String>,
    pub decks: HashMap<Uuid, String>,
}

impl NameBook {
    pub fn player(&self, id: Uuid) -> String {
        self.players
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    pub fn deck(&self, id: Uuid) -> String {
        self.decks.get(&id).cloned().unwrap_or_else(|| id.to_string())
    }

    fn named(&self, id: Uuid) -> NamedPlayer {
        NamedPlayer {
            id,
            name: self.player(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedPlayer {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct KillLine {
    pub killer: String,
    pub victim: String,
    pub target: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ScoreLine {
    pub player: NamedPlayer,
    pub deck: Option<String>,
    pub breakdown: ScoreBreakdown,
}

/// Everything a client needs to render one game.
#[derive(Debug, Clone)]
pub struct GameView {
    pub game_id: Uuid,
    pub status: GameStatus,
    pub alive: Vec<NamedPlayer>,
    /// Death order.
    pub dead: Vec<NamedPlayer>,
    pub kills: Vec<KillLine>,
    /// Preview while active, final once finished.
    pub scores: Vec<ScoreLine>,
    pub leader_at_start: Option<NamedPlayer>,
    pub winner: Option<NamedPlayer>,
    pub can_finish: bool,
}

impl GameView {
    pub fn new(game: &Game, names: &NameBook) -> Self {
        let alive = game.alive_players();
        let scores = game.scores();
        Self {
            game_id: game.id,
            status: game.status,
            can_finish: game.is_active() && alive.len() == 1,
            alive: alive.into_iter().map(|id| names.named(id)).collect(),
            dead: game
                .dead_players()
                .into_iter()
                .map(|id| names.named(id))
                .collect(),
            kills: game
                .kills
                .iter()
                .map(|kill| KillLine {
                    killer: names.player(kill.killer),
                    victim: names.player(kill.victim),
                    target: names.player(kill.target),
                    created_at: kill.created_at,
                })
                .collect(),
            scores: scores
                .iter()
                .map(|score| ScoreLine {
                    player: names.named(score.player_id),
                    deck: game
                        .deck_by_player_id
                        .get(&score.player_id)
                        .map(|&deck| names.deck(deck)),
                    breakdown: score.breakdown,
                })
                .collect(),
            leader_at_start: game.leader_at_start.map(|id| names.named(id)),
            winner: game.winner.map(|id| names.named(id)),
        }
    }
}

impl Display for GameView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Game {} ({})", self.game_id, self.status)?;
        if let Some(leader) = &self.leader_at_start {
            writeln!(f, "Leader at start: {}", leader.name)?;
        }
        writeln!(f, "Alive: {}", self.alive.iter().map(|p| &p.name).join(", "))?;
        writeln!(f, "Dead: {}", self.dead.iter().map(|p| &p.name).join(", "))?;
        writeln!(f, "Kills:")?;
        for (idx, kill) in self.kills.iter().enumerate() {
            writeln!(
                f,
                "  {}. {} killed {} (revealed target: {})",
                idx + 1,
                kill.killer,
                kill.victim,
                kill.target
            )?;
        }
        writeln!(f, "Scores (kills / placement / leader bonus / total):")?;
        for line in &self.scores {
            let b = line.breakdown;
            writeln!(
                f,
                "  {} [{}]: {} / {} / {} / {}",
                line.player.name,
                line.deck.as_deref().unwrap_or("-"),
                b.kill_points,
                b.placement_points,
                b.leader_bonus,
                b.total
            )?;
        }
        match &self.winner {
            Some(winner) => write!(f, "Winner: {}", winner.name),
            None if self.can_finish => write!(f, "One survivor left, the game can be finished"),
            None => write!(
                f,
                "{} survivors left, exactly 1 is needed to finish",
                self.alive.len()
            ),
        }
    }
}

/// One row of the game history.
#[derive(Debug, Clone)]
pub struct GameSummary {
    pub game_id: Uuid,
    pub status: GameStatus,
    pub players: Vec<String>,
    pub winner: Option<String>,
    pub winner_points: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl GameSummary {
    pub fn new(game: &Game, names: &NameBook) -> Self {
        Self {
            game_id: game.id,
            status: game.status,
            players: game.player_ids.iter().map(|&id| names.player(id)).collect(),
            winner: game.winner.map(|id| names.player(id)),
            winner_points: game
                .winner
                .zip(game.final_scores.as_ref())
                .map(|(id, scores)| scores.total(id)),
            created_at: game.created_at,
            ended_at: game.ended_at,
        }
    }
}

impl Display for GameSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.game_id,
            self.status,
            self.players.join(", ")
        )?;
        if let (Some(winner), Some(points)) = (&self.winner, self.winner_points) {
            write!(f, " - winner {winner} ({points} pts)")?;
        }
        Ok(())
    }
}
