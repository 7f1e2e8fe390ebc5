//! Single-screen egg hunt.
//!
//! A player steers a bunny around a fixed arena of trees, picking up waves of
//! eggs before the round clock runs out. [`GameState`] is the whole game; a
//! driver feeds it input once per frame and a timer tick once per second, and
//! renders from [`GameState::snapshot`].

pub mod config;
pub mod entity;
pub mod geometry;
pub mod input;
pub mod layout;
pub mod scoring;
pub mod state;

pub use config::HuntConfig;
pub use entity::{Collectible, CollectibleKind, Facing, Obstacle, Player};
pub use geometry::Rect;
pub use input::{Direction, KeyboardState, TouchStick};
pub use state::{GameEvent, GamePhase, GameSnapshot, GameState};
