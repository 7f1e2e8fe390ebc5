use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Normalized per-frame movement request. When opposing flags are both set,
/// `right` and `down` win.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Direction {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl Direction {
    pub const NONE: Direction = Direction {
        left: false,
        right: false,
        up: false,
        down: false,
    };

    pub const LEFT: Direction = Direction {
        left: true,
        ..Self::NONE
    };

    pub const RIGHT: Direction = Direction {
        right: true,
        ..Self::NONE
    };

    pub const UP: Direction = Direction {
        up: true,
        ..Self::NONE
    };

    pub const DOWN: Direction = Direction {
        down: true,
        ..Self::NONE
    };

    /// Whether any direction is held.
    pub fn is_active(&self) -> bool {
        self.left || self.right || self.up || self.down
    }

    pub fn is_horizontal(&self) -> bool {
        self.left || self.right
    }

    /// Union of two inputs, e.g. keyboard plus touch.
    pub fn merge(self, other: Direction) -> Direction {
        Direction {
            left: self.left || other.left,
            right: self.right || other.right,
            up: self.up || other.up,
            down: self.down || other.down,
        }
    }
}

/// Held-key tracker fed by raw `KeyboardEvent.code` strings.
#[derive(Debug, Clone, Default)]
pub struct KeyboardState {
    keys_down: HashSet<String>,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_key_down(&mut self, code: &str) {
        self.keys_down.insert(code.to_string());
    }

    pub fn on_key_up(&mut self, code: &str) {
        self.keys_down.remove(code);
    }

    /// Drop every held key (window blur, round end).
    pub fn release_all(&mut self) {
        self.keys_down.clear();
    }

    pub fn is_key_down(&self, code: &str) -> bool {
        self.keys_down.contains(code)
    }

    /// Arrow keys and WASD both steer.
    pub fn direction(&self) -> Direction {
        let any = |codes: &[&str]| codes.iter().any(|c| self.is_key_down(c));
        Direction {
            left: any(&["ArrowLeft", "KeyA"]),
            right: any(&["ArrowRight", "KeyD"]),
            up: any(&["ArrowUp", "KeyW"]),
            down: any(&["ArrowDown", "KeyS"]),
        }
    }
}

/// Default drag radius for the on-screen stick, in CSS pixels.
pub const DEFAULT_STICK_RADIUS: f32 = 50.0;
/// Default per-axis dead zone, in CSS pixels.
pub const DEFAULT_DEAD_ZONE: f32 = 10.0;

/// Virtual joystick for touch input. The knob offset is clamped to
/// `max_radius` and each axis must exceed `dead_zone` to register.
#[derive(Debug, Clone, PartialEq)]
pub struct TouchStick {
    pub max_radius: f32,
    pub dead_zone: f32,
    origin: Option<(f32, f32)>,
    offset: (f32, f32),
}

impl Default for TouchStick {
    fn default() -> Self {
        Self::new(DEFAULT_STICK_RADIUS, DEFAULT_DEAD_ZONE)
    }
}

impl TouchStick {
    pub fn new(max_radius: f32, dead_zone: f32) -> Self {
        Self {
            max_radius,
            dead_zone,
            origin: None,
            offset: (0.0, 0.0),
        }
    }

    pub fn on_touch_start(&mut self, x: f32, y: f32) {
        self.origin = Some((x, y));
        self.offset = (0.0, 0.0);
    }

    /// Ignored unless a touch is in progress.
    pub fn on_touch_move(&mut self, x: f32, y: f32) {
        let Some((ox, oy)) = self.origin else {
            return;
        };
        let (dx, dy) = (x - ox, y - oy);
        let dist = (dx * dx + dy * dy).sqrt();
        self.offset = if dist > self.max_radius && dist > 0.0 {
            let scale = self.max_radius / dist;
            (dx * scale, dy * scale)
        } else {
            (dx, dy)
        };
    }

    pub fn on_touch_end(&mut self) {
        self.origin = None;
        self.offset = (0.0, 0.0);
    }

    pub fn is_touching(&self) -> bool {
        self.origin.is_some()
    }

    /// Clamped knob offset from the touch origin.
    pub fn offset(&self) -> (f32, f32) {
        self.offset
    }

    pub fn direction(&self) -> Direction {
        let (dx, dy) = self.offset;
        Direction {
            left: dx < -self.dead_zone,
            right: dx > self.dead_zone,
            up: dy < -self.dead_zone,
            down: dy > self.dead_zone,
        }
    }
}
