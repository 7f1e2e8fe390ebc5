use std::collections::BTreeMap;

use eggdash_core::player::{PlayerEntry, PlayerId};

/// Whether the host may start the round, and if not, why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartReadiness {
    Ready,
    NeedMorePlayers { have: usize, need: usize },
    /// Players who have not flagged ready, in id order.
    WaitingForReady { pending: Vec<PlayerId> },
}

impl StartReadiness {
    /// At least `min_players` are rostered and every one of them is ready.
    pub fn evaluate(players: &BTreeMap<PlayerId, PlayerEntry>, min_players: usize) -> Self {
        if players.len() < min_players {
            return Self::NeedMorePlayers {
                have: players.len(),
                need: min_players,
            };
        }
        let pending: Vec<PlayerId> = players
            .iter()
            .filter(|(_, p)| !p.ready)
            .map(|(id, _)| id.clone())
            .collect();
        if pending.is_empty() {
            Self::Ready
        } else {
            Self::WaitingForReady { pending }
        }
    }

    pub fn can_start(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Start-button caption.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Ready => "Start Game (All Ready!)",
            Self::NeedMorePlayers { .. } => "Waiting for Players...",
            Self::WaitingForReady { .. } => "Waiting for Ready...",
        }
    }
}

impl std::fmt::Display for StartReadiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reason())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eggdash_core::test_helpers::make_roster;

    #[test]
    fn single_player_cannot_start() {
        let roster = make_roster(1, true);
        let r = StartReadiness::evaluate(&roster, 2);
        assert_eq!(r, StartReadiness::NeedMorePlayers { have: 1, need: 2 });
        assert!(!r.can_start());
        assert_eq!(r.reason(), "Waiting for Players...");
    }

    #[test]
    fn unready_players_listed() {
        let roster = make_roster(3, false);
        let r = StartReadiness::evaluate(&roster, 2);
        assert_eq!(
            r,
            StartReadiness::WaitingForReady {
                pending: vec!["p2".to_string(), "p3".to_string()]
            }
        );
        assert_eq!(r.to_string(), "Waiting for Ready...");
    }

    #[test]
    fn all_ready_can_start() {
        let roster = make_roster(2, true);
        let r = StartReadiness::evaluate(&roster, 2);
        assert!(r.can_start());
        assert_eq!(r.reason(), "Start Game (All Ready!)");
    }

    #[test]
    fn empty_roster_needs_players() {
        let r = StartReadiness::evaluate(&BTreeMap::new(), 2);
        assert_eq!(r, StartReadiness::NeedMorePlayers { have: 0, need: 2 });
    }
}
