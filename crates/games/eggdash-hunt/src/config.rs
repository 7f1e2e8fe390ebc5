use serde::{Deserialize, Serialize};

/// Data-driven tuning for the egg hunt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuntConfig {
    /// Arena width in pixels.
    pub arena_width: f32,
    /// Arena height in pixels.
    pub arena_height: f32,
    pub player_width: f32,
    pub player_height: f32,
    /// Starting movement per frame, in pixels.
    pub player_speed: f32,
    /// Half-size of the square kept clear of obstacles around the player start.
    pub player_buffer: f32,
    /// Number of obstacles placed at arena setup.
    pub obstacle_count: usize,
    pub obstacle_width: f32,
    pub obstacle_height: f32,
    /// Two obstacles closer than this on both axes count as overlapping.
    pub obstacle_buffer: f32,
    /// Candidate positions tried per obstacle before it is dropped.
    pub obstacle_attempts: u32,
    /// Collectibles per spawn wave.
    pub collectibles_per_wave: usize,
    pub collectible_width: f32,
    pub collectible_height: f32,
    /// Candidate positions tried across a whole wave before it is retried.
    pub collectible_attempt_budget: u32,
    /// Obstacles are never shrunk below this count.
    pub min_obstacles: usize,
    /// Obstacles removed each time a wave fails to place.
    pub obstacle_shrink_step: usize,
    /// Placement passes allowed once the obstacle floor is reached.
    pub wave_retry_limit: u32,
    pub golden_chance: f64,
    pub rainbow_chance: f64,
    pub thunder_chance: f64,
    /// Permanent speed multiplier applied by each Thunder pickup.
    pub thunder_speed_multiplier: f32,
    /// Round length in seconds.
    pub round_secs: u32,
    /// Labels shown for each countdown step, in order.
    pub countdown_labels: Vec<String>,
    /// Seconds each countdown label is shown.
    pub countdown_step_secs: f32,
    /// Animation counter wraps at this value.
    pub animation_period: u32,
    /// Cosmetic colours available to normal collectibles.
    pub collectible_colors: u8,
    /// Cosmetic patterns available to normal collectibles.
    pub collectible_patterns: u8,
}

impl Default for HuntConfig {
    fn default() -> Self {
        Self {
            arena_width: 640.0,
            arena_height: 480.0,
            player_width: 40.0,
            player_height: 50.0,
            player_speed: 4.0,
            player_buffer: 100.0,
            obstacle_count: 8,
            obstacle_width: 40.0,
            obstacle_height: 60.0,
            obstacle_buffer: 60.0,
            obstacle_attempts: 1000,
            collectibles_per_wave: 5,
            collectible_width: 30.0,
            collectible_height: 35.0,
            collectible_attempt_budget: 50,
            min_obstacles: 2,
            obstacle_shrink_step: 2,
            wave_retry_limit: 16,
            golden_chance: 0.2,
            rainbow_chance: 0.1,
            thunder_chance: 0.15,
            thunder_speed_multiplier: 1.25,
            round_secs: 60,
            countdown_labels: vec!["Ready...".into(), "Set...".into(), "GO!".into()],
            countdown_step_secs: 0.8,
            animation_period: 30,
            collectible_colors: 5,
            collectible_patterns: 3,
        }
    }
}

impl HuntConfig {
    /// Top-left corner where the player spawns.
    pub fn player_start(&self) -> (f32, f32) {
        (self.arena_width / 2.0, self.arena_height / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_classic_arena() {
        let cfg = HuntConfig::default();
        assert_eq!(cfg.arena_width, 640.0);
        assert_eq!(cfg.arena_height, 480.0);
        assert_eq!(cfg.obstacle_count, 8);
        assert_eq!(cfg.collectibles_per_wave, 5);
        assert_eq!(cfg.countdown_labels.len(), 3);
        assert_eq!(cfg.player_start(), (320.0, 240.0));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: HuntConfig = toml::from_str(
            r#"
round_secs = 30
player_speed = 6.0
"#,
        )
        .unwrap();
        assert_eq!(cfg.round_secs, 30);
        assert_eq!(cfg.player_speed, 6.0);
        assert_eq!(cfg.obstacle_count, 8);
        assert_eq!(cfg.thunder_speed_multiplier, 1.25);
    }
}
