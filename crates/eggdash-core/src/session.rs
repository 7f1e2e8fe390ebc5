use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::player::{PlayerEntry, PlayerId, RosterPlayer, unknown_name};

/// Root path under which all session records live.
pub const SESSIONS_ROOT: &str = "sessions";

/// Root path of the global single-player leaderboard.
pub const LEADERBOARD_ROOT: &str = "leaderboard";

/// Length of a generated session id.
pub const SESSION_ID_LEN: usize = 8;

const SESSION_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Lifecycle of a shared session record.
///
/// `Waiting -> InProgress -> Finished`, and `Finished -> Waiting` on restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Waiting,
    InProgress,
    Finished,
}

impl SessionStatus {
    /// Whether moving from `self` to `next` is a legal status transition.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Waiting, SessionStatus::InProgress)
                | (SessionStatus::InProgress, SessionStatus::Finished)
                | (SessionStatus::Finished, SessionStatus::Waiting)
        )
    }
}

/// A submitted final score for one player in the current round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    #[serde(default = "unknown_name")]
    pub name: String,
    #[serde(default)]
    pub score: u32,
    /// Server-assigned arrival time, used to order ties.
    #[serde(default)]
    pub timestamp: u64,
}

/// Cumulative round wins for one player across restarts of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinEntry {
    #[serde(default = "unknown_name")]
    pub name: String,
    #[serde(default)]
    pub wins: u32,
}

/// One line of session chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub sender_id: PlayerId,
    #[serde(default = "unknown_name")]
    pub sender_name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: u64,
}

/// The session record stored at `sessions/{id}`.
///
/// The chat log lives under the same path (`chat`) but is not part of this
/// type; it is read and appended on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub host: PlayerId,
    #[serde(default)]
    pub start_time: Option<u64>,
    #[serde(default)]
    pub end_time: Option<u64>,
    /// Incremented on every restart; keys the once-per-round guards.
    #[serde(default)]
    pub round: u32,
    /// The last round whose winner has been credited in `wins`.
    #[serde(default)]
    pub awarded_round: Option<u32>,
    #[serde(default)]
    pub players: BTreeMap<PlayerId, PlayerEntry>,
    #[serde(default)]
    pub scores: BTreeMap<PlayerId, ScoreEntry>,
    #[serde(default)]
    pub wins: BTreeMap<PlayerId, WinEntry>,
}

impl SessionRecord {
    /// A fresh record for a session hosted by `host`.
    pub fn new(host: PlayerId) -> Self {
        Self {
            host,
            ..Self::default()
        }
    }

    /// Whether every rostered player has a submitted score.
    pub fn all_scores_submitted(&self) -> bool {
        !self.players.is_empty()
            && self
                .players
                .keys()
                .all(|player_id| self.scores.contains_key(player_id))
    }

    /// Whether this round's winner has already been credited.
    pub fn round_awarded(&self) -> bool {
        self.awarded_round == Some(self.round)
    }

    /// Roster entries with ids, in id order.
    pub fn roster(&self) -> Vec<RosterPlayer> {
        roster_from_map(&self.players)
    }
}

/// Flatten a roster map into entries carrying their ids.
pub fn roster_from_map(players: &BTreeMap<PlayerId, PlayerEntry>) -> Vec<RosterPlayer> {
    players
        .iter()
        .map(|(id, entry)| RosterPlayer {
            id: id.clone(),
            name: entry.name.clone(),
            ready: entry.ready,
        })
        .collect()
}

/// Generate a random lowercase base-36 session id.
pub fn generate_session_id() -> String {
    let mut rng = rand::rng();
    (0..SESSION_ID_LEN)
        .map(|_| {
            let idx = rng.random_range(0..SESSION_ID_CHARSET.len());
            SESSION_ID_CHARSET[idx] as char
        })
        .collect()
}

/// Check that a user-supplied session id has the generated shape.
pub fn is_valid_session_id(id: &str) -> bool {
    id.len() == SESSION_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

pub fn session_path(session_id: &str) -> String {
    format!("{SESSIONS_ROOT}/{session_id}")
}

pub fn status_path(session_id: &str) -> String {
    format!("{SESSIONS_ROOT}/{session_id}/status")
}

pub fn players_path(session_id: &str) -> String {
    format!("{SESSIONS_ROOT}/{session_id}/players")
}

pub fn player_path(session_id: &str, player_id: &str) -> String {
    format!("{SESSIONS_ROOT}/{session_id}/players/{player_id}")
}

pub fn chat_path(session_id: &str) -> String {
    format!("{SESSIONS_ROOT}/{session_id}/chat")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&SessionStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let back: SessionStatus = serde_json::from_str("\"finished\"").unwrap();
        assert_eq!(back, SessionStatus::Finished);
    }

    #[test]
    fn legal_transitions() {
        use SessionStatus::*;
        assert!(Waiting.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Finished));
        assert!(Finished.can_transition_to(Waiting));
        assert!(!Waiting.can_transition_to(Finished));
        assert!(!InProgress.can_transition_to(Waiting));
        assert!(!Finished.can_transition_to(InProgress));
    }

    #[test]
    fn generated_ids_are_valid() {
        for _ in 0..100 {
            let id = generate_session_id();
            assert!(is_valid_session_id(&id), "invalid session id: {id}");
        }
        assert!(!is_valid_session_id("ABCDEFGH"));
        assert!(!is_valid_session_id("abc"));
    }

    #[test]
    fn record_decodes_from_sparse_json() {
        let json = serde_json::json!({
            "status": "waiting",
            "host": "p1",
            "players": { "p1": { "name": "Hop", "ready": true }, "p2": {} },
        });
        let record: SessionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.host, "p1");
        assert_eq!(record.start_time, None);
        assert_eq!(record.players.len(), 2);
        assert_eq!(record.players["p2"].name, "Unknown");
        assert!(!record.players["p2"].ready);
        assert!(record.scores.is_empty());
    }

    #[test]
    fn all_scores_submitted_tracks_roster() {
        let mut record = SessionRecord::new("p1".into());
        assert!(!record.all_scores_submitted());
        record.players.insert("p1".into(), PlayerEntry::new("A", true));
        record.players.insert("p2".into(), PlayerEntry::new("B", true));
        record.scores.insert(
            "p1".into(),
            ScoreEntry {
                name: "A".into(),
                score: 3,
                timestamp: 1,
            },
        );
        assert!(!record.all_scores_submitted());
        record.scores.insert(
            "p2".into(),
            ScoreEntry {
                name: "B".into(),
                score: 4,
                timestamp: 2,
            },
        );
        assert!(record.all_scores_submitted());
    }

    #[test]
    fn paths_nest_under_session() {
        assert_eq!(session_path("abc"), "sessions/abc");
        assert_eq!(player_path("abc", "p1"), "sessions/abc/players/p1");
        assert_eq!(chat_path("abc"), "sessions/abc/chat");
        assert_eq!(status_path("abc"), "sessions/abc/status");
    }
}
