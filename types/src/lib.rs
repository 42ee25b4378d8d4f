pub mod elimination;
pub mod error;
pub mod game;
pub mod kill;
pub mod leaderboard;
pub mod player;
pub mod scoring;

pub use elimination::{elimination_order, survivors};
pub use error::GameError;
pub use game::{Game, GameStatus};
pub use kill::KillEvent;
pub use leaderboard::{LeaderboardEntry, LeaderboardIncrement};
pub use player::{Deck, Player};
pub use scoring::{compute_scores, PlayerScore, ScoreBreakdown, Scores};
