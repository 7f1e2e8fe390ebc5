use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::scoring;

/// Which way the player sprite faces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

/// The player-controlled character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Pixels moved per frame on each active axis. Only ever increases.
    pub speed: f32,
    pub facing: Facing,
    /// Walk-cycle counter, advanced on frames with movement input.
    pub animation: u32,
}

impl Player {
    pub fn new(x: f32, y: f32, width: f32, height: f32, speed: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            speed,
            facing: Facing::Right,
            animation: 0,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// A static tree blocking movement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub bounds: Rect,
}

/// Collectible egg kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectibleKind {
    Normal,
    Golden,
    Rainbow,
    Thunder,
}

impl CollectibleKind {
    /// Score awarded on pickup.
    pub fn points(self) -> u32 {
        match self {
            CollectibleKind::Normal => scoring::NORMAL_POINTS,
            CollectibleKind::Golden => scoring::GOLDEN_POINTS,
            CollectibleKind::Rainbow => scoring::RAINBOW_POINTS,
            CollectibleKind::Thunder => scoring::THUNDER_POINTS,
        }
    }

    /// Whether pickup permanently boosts player speed.
    pub fn boosts_speed(self) -> bool {
        matches!(self, CollectibleKind::Thunder)
    }
}

/// Cosmetic variation for drawing. Renderers ignore it for special kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cosmetic {
    pub color: u8,
    pub pattern: u8,
}

/// An egg waiting to be picked up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collectible {
    pub bounds: Rect,
    pub kind: CollectibleKind,
    pub cosmetic: Cosmetic,
}
