use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One recorded elimination. `target` is the player the killer revealed as
/// their assigned target when claiming the kill.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillEvent {
    #[serde(rename = "killerPlayerId")]
    pub killer: Uuid,
    #[serde(rename = "victimPlayerId")]
    pub victim: Uuid,
    #[serde(rename = "targetPlayerId")]
    pub target: Uuid,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl KillEvent {
    pub fn new(killer: Uuid, victim: Uuid, target: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            killer,
            victim,
            target,
            created_at,
        }
    }

    /// Points credited to the killer for this kill, leader bonus excluded.
    pub fn kill_points(&self) -> u32 {
        if self.target == self.killer {
            2
        } else if self.target == self.victim {
            4
        } else {
            1
        }
    }
}
