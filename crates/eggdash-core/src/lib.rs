pub mod player;
pub mod session;
pub mod store;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use std::collections::BTreeMap;

    use crate::player::{PlayerEntry, PlayerId};
    use crate::session::{ScoreEntry, SessionRecord, SessionStatus};

    /// Player ids `p1..=pn`.
    pub fn make_player_ids(n: usize) -> Vec<PlayerId> {
        (1..=n).map(|i| format!("p{i}")).collect()
    }

    /// A roster of `n` players named `Player1..`; the first is ready, the rest
    /// carry `others_ready`.
    pub fn make_roster(n: usize, others_ready: bool) -> BTreeMap<PlayerId, PlayerEntry> {
        make_player_ids(n)
            .into_iter()
            .enumerate()
            .map(|(i, id)| {
                let entry = PlayerEntry::new(format!("Player{}", i + 1), i == 0 || others_ready);
                (id, entry)
            })
            .collect()
    }

    /// A score entry for `name`.
    pub fn make_score(name: &str, score: u32, timestamp: u64) -> ScoreEntry {
        ScoreEntry {
            name: name.to_string(),
            score,
            timestamp,
        }
    }

    /// A session record hosted by `p1` with an all-ready roster of `n` players.
    pub fn make_session(n: usize, status: SessionStatus) -> SessionRecord {
        SessionRecord {
            status,
            host: "p1".to_string(),
            players: make_roster(n, true),
            ..SessionRecord::default()
        }
    }
}
