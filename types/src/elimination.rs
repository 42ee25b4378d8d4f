use std::collections::HashSet;

use uuid::Uuid;

use crate::KillEvent;

/// Players in death order, derived from the whole kill log.
///
/// A kill whose victim is already dead is skipped. Survivors are not part of
/// the result. This is always a full recomputation, which is what keeps
/// placements correct after an undo.
pub fn elimination_order(player_ids: &[Uuid], kills: &[KillEvent]) -> Vec<Uuid> {
    let mut alive: HashSet<Uuid> = player_ids.iter().copied().collect();
    let mut order = Vec::new();
    for kill in kills {
        if alive.remove(&kill.victim) {
            order.push(kill.victim);
        }
    }
    order
}

/// Players not yet eliminated, in seat order.
pub fn survivors(player_ids: &[Uuid], eliminated: &[Uuid]) -> Vec<Uuid> {
    let dead: HashSet<&Uuid> = eliminated.iter().collect();
    player_ids
        .iter()
        .filter(|id| !dead.contains(id))
        .copied()
        .collect()
}
