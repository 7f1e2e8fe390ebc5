use serde::{Deserialize, Serialize};

/// Unique identifier for a player. Stable across sessions on the same client.
pub type PlayerId = String;

/// Display name used when a stored record carries no name.
pub const UNKNOWN_PLAYER_NAME: &str = "Unknown";

pub(crate) fn unknown_name() -> String {
    UNKNOWN_PLAYER_NAME.to_string()
}

/// A roster entry in a multiplayer session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEntry {
    #[serde(default = "unknown_name")]
    pub name: String,
    #[serde(default)]
    pub ready: bool,
}

impl PlayerEntry {
    pub fn new(name: impl Into<String>, ready: bool) -> Self {
        let name = name.into();
        let name = if name.trim().is_empty() {
            unknown_name()
        } else {
            name
        };
        Self { name, ready }
    }
}

/// A roster entry paired with its id, in roster order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterPlayer {
    pub id: PlayerId,
    pub name: String,
    pub ready: bool,
}
