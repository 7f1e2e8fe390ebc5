use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use eggdash_core::player::PlayerId;
use eggdash_core::session::{ScoreEntry, SessionRecord, WinEntry};

/// One row of a round's ranking. `rank` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedScore {
    pub rank: usize,
    pub player_id: PlayerId,
    pub name: String,
    pub score: u32,
    pub timestamp: u64,
}

/// Cumulative wins for one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinStanding {
    pub player_id: PlayerId,
    pub name: String,
    pub wins: u32,
}

/// What the results screen shows after a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResults {
    pub round: u32,
    pub ranking: Vec<RankedScore>,
    pub wins: Vec<WinStanding>,
}

impl SessionResults {
    pub fn from_record(record: &SessionRecord) -> Self {
        Self {
            round: record.round,
            ranking: rank_scores(&record.scores),
            wins: win_table(&record.wins),
        }
    }

    /// Top of the ranking, if anyone scored.
    pub fn winner(&self) -> Option<&RankedScore> {
        self.ranking.first()
    }

    pub fn wins_for(&self, player_id: &str) -> u32 {
        self.wins
            .iter()
            .find(|w| w.player_id == player_id)
            .map_or(0, |w| w.wins)
    }
}

/// Score descending. Equal scores go to whoever submitted first, then by id
/// so the order is total.
pub fn rank_scores(scores: &BTreeMap<PlayerId, ScoreEntry>) -> Vec<RankedScore> {
    let mut rows: Vec<(&PlayerId, &ScoreEntry)> = scores.iter().collect();
    rows.sort_by(|(a_id, a), (b_id, b)| {
        b.score
            .cmp(&a.score)
            .then(a.timestamp.cmp(&b.timestamp))
            .then(a_id.cmp(b_id))
    });
    rows.into_iter()
        .enumerate()
        .map(|(i, (id, entry))| RankedScore {
            rank: i + 1,
            player_id: id.clone(),
            name: entry.name.clone(),
            score: entry.score,
            timestamp: entry.timestamp,
        })
        .collect()
}

/// Wins descending, then name.
pub fn win_table(wins: &BTreeMap<PlayerId, WinEntry>) -> Vec<WinStanding> {
    let mut table: Vec<WinStanding> = wins
        .iter()
        .map(|(id, w)| WinStanding {
            player_id: id.clone(),
            name: w.name.clone(),
            wins: w.wins,
        })
        .collect();
    table.sort_by(|a, b| b.wins.cmp(&a.wins).then_with(|| a.name.cmp(&b.name)));
    table
}
