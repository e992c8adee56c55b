//! Per-game Top 10 ranking.
//!
//! The ranking is kept sorted by score, highest first. A new score only
//! displaces an entry whose score it strictly beats, so among equal scores
//! the one recorded first stays ahead.

use soroban_sdk::{contracttype, Address, Vec};

/// Number of entries kept per game.
pub const MAX_RANKING_ENTRIES: u32 = 10;

/// Reward weight of each ranking slot, best first.
pub const RANK_WEIGHTS: [u32; MAX_RANKING_ENTRIES as usize] = [5, 5, 4, 4, 3, 3, 2, 2, 1, 1];

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeaderboardEntry {
    pub address: Address,
    pub score: u32,
}

/// Insert `entry` into `ranking`, returning the slot it landed in, or `None`
/// when the score did not make the cut.
pub(crate) fn insert(ranking: &mut Vec<LeaderboardEntry>, entry: LeaderboardEntry) -> Option<u32> {
    // First slot holding a strictly lower score
    let mut insert_at: Option<u32> = None;
    for i in 0..ranking.len() {
        if let Some(current) = ranking.get(i) {
            if entry.score > current.score {
                insert_at = Some(i);
                break;
            }
        }
    }

    let slot = match insert_at {
        Some(i) => i,
        None if ranking.len() < MAX_RANKING_ENTRIES => ranking.len(),
        None => return None,
    };

    ranking.insert(slot, entry);

    while ranking.len() > MAX_RANKING_ENTRIES {
        ranking.pop_back();
    }

    Some(slot)
}

/// Weight of every slot `player` holds, and the weight of all occupied slots.
pub(crate) fn reward_weight(ranking: &Vec<LeaderboardEntry>, player: &Address) -> (u32, u32) {
    let mut weight = 0;
    let mut total = 0;
    for (i, entry) in ranking.iter().enumerate() {
        let slot_weight = RANK_WEIGHTS.get(i).copied().unwrap_or(0);
        total += slot_weight;
        if entry.address == *player {
            weight += slot_weight;
        }
    }
    (weight, total)
}
