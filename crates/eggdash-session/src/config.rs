use serde::{Deserialize, Serialize};

use eggdash_hunt::HuntConfig;

/// Session-layer configuration, loaded from `eggdash.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Players required before the host may start.
    pub min_players: usize,
    /// Frames per second driven by the round loop.
    pub frame_rate: f32,
    /// Period of the round clock, in milliseconds.
    pub timer_period_ms: u64,
    /// Entries kept on the global leaderboard.
    pub leaderboard_size: usize,
    /// Chat messages are truncated to this many characters.
    pub chat_max_len: usize,
    /// Buffered session events per client.
    pub event_channel_capacity: usize,
    pub hunt: HuntConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            frame_rate: 60.0,
            timer_period_ms: 1000,
            leaderboard_size: 10,
            chat_max_len: 500,
            event_channel_capacity: 256,
            hunt: HuntConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Validate configuration, logging each problem. Returns `false` if any
    /// value is unusable.
    pub fn validate(&self) -> bool {
        let mut ok = true;
        if self.min_players == 0 {
            tracing::error!("min_players must be > 0");
            ok = false;
        }
        if self.min_players == 1 {
            tracing::warn!("min_players is 1, sessions can start without opponents");
        }
        if self.frame_rate.is_nan() || self.frame_rate <= 0.0 {
            tracing::error!(frame_rate = self.frame_rate, "frame_rate must be > 0");
            ok = false;
        }
        if self.timer_period_ms == 0 {
            tracing::error!("timer_period_ms must be > 0");
            ok = false;
        }
        if self.leaderboard_size == 0 {
            tracing::error!("leaderboard_size must be > 0");
            ok = false;
        }
        if self.chat_max_len == 0 {
            tracing::error!("chat_max_len must be > 0");
            ok = false;
        }
        if self.event_channel_capacity == 0 {
            tracing::error!("event_channel_capacity must be > 0");
            ok = false;
        }
        if self.hunt.round_secs == 0 {
            tracing::error!("hunt.round_secs must be > 0");
            ok = false;
        }
        for (name, chance) in [
            ("golden_chance", self.hunt.golden_chance),
            ("rainbow_chance", self.hunt.rainbow_chance),
            ("thunder_chance", self.hunt.thunder_chance),
        ] {
            if !chance.is_finite() {
                tracing::warn!(name, chance, "Non-finite chance, the special never spawns");
            } else if !(0.0..=1.0).contains(&chance) {
                tracing::warn!(name, chance, "Chance outside [0, 1] will be clamped");
            }
        }
        ok
    }

    /// Load config from `EGGDASH_CONFIG` or `eggdash.toml` if present, then
    /// apply `EGGDASH_*` env var overrides.
    pub fn load() -> Self {
        let path = std::env::var("EGGDASH_CONFIG")
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "eggdash.toml".to_string());
        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<SessionConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "Loaded configuration");
                    cfg
                },
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Failed to parse config, using defaults");
                    SessionConfig::default()
                },
            },
            Err(_) => {
                tracing::info!(path = %path, "No config file found, using defaults");
                SessionConfig::default()
            },
        };
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Some(n) = env_parse::<usize>("EGGDASH_MIN_PLAYERS") {
            self.min_players = n;
        }
        if let Some(n) = env_parse::<f32>("EGGDASH_FRAME_RATE") {
            self.frame_rate = n;
        }
        if let Some(n) = env_parse::<u64>("EGGDASH_TIMER_PERIOD_MS") {
            self.timer_period_ms = n;
        }
        if let Some(n) = env_parse::<usize>("EGGDASH_LEADERBOARD_SIZE") {
            self.leaderboard_size = n;
        }
        if let Some(n) = env_parse::<usize>("EGGDASH_CHAT_MAX_LEN") {
            self.chat_max_len = n;
        }
        if let Some(n) = env_parse::<u32>("EGGDASH_ROUND_SECS") {
            self.hunt.round_secs = n;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.min_players, 2);
        assert_eq!(cfg.frame_rate, 60.0);
        assert_eq!(cfg.timer_period_ms, 1000);
        assert_eq!(cfg.leaderboard_size, 10);
        assert_eq!(cfg.chat_max_len, 500);
        assert_eq!(cfg.hunt.round_secs, 60);
    }

    #[test]
    fn default_config_validates() {
        assert!(SessionConfig::default().validate());
    }

    #[test]
    fn zero_values_rejected() {
        let cfg = SessionConfig {
            min_players: 0,
            ..SessionConfig::default()
        };
        assert!(!cfg.validate());

        let cfg = SessionConfig {
            frame_rate: 0.0,
            ..SessionConfig::default()
        };
        assert!(!cfg.validate());
    }

    #[test]
    fn parse_toml_with_hunt_section() {
        let toml_str = r#"
min_players = 3
frame_rate = 30.0

[hunt]
round_secs = 45
obstacle_count = 6
"#;
        let cfg: SessionConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.min_players, 3);
        assert_eq!(cfg.frame_rate, 30.0);
        assert_eq!(cfg.hunt.round_secs, 45);
        assert_eq!(cfg.hunt.obstacle_count, 6);
        assert_eq!(cfg.hunt.collectibles_per_wave, 5);
        assert_eq!(cfg.leaderboard_size, 10);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg: SessionConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, SessionConfig::default());
    }
}
