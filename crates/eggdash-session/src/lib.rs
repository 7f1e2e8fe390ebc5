//! Multiplayer sessions for eggdash over a shared real-time [`Store`].
//!
//! [`Store`]: eggdash_core::store::Store

pub mod config;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod leaderboard;
pub mod memory_store;
pub mod readiness;
pub mod results;

pub use config::SessionConfig;
pub use coordinator::{SessionCoordinator, SessionEvent, award_round_winner, new_player_id};
pub use driver::{MultiplayerClient, RoundTiming, SoloOutcome, play_solo, run_round};
pub use error::SessionError;
pub use leaderboard::Leaderboard;
pub use memory_store::MemoryStore;
pub use readiness::StartReadiness;
pub use results::{RankedScore, SessionResults, WinStanding};
