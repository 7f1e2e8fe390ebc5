//! The per-frame game state machine.
//!
//! `Idle -> Countdown -> Playing -> Ended`, with `restart()` going back
//! through `Idle` into a fresh countdown. Movement and pickups run in
//! [`GameState::tick`]; the round clock only advances in
//! [`GameState::timer_tick`], which the driver calls at 1 Hz.

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::config::HuntConfig;
use crate::entity::{Collectible, CollectibleKind, Facing, Obstacle, Player};
use crate::geometry::Rect;
use crate::input::Direction;
use crate::layout;
use crate::scoring;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    #[default]
    Idle,
    Countdown,
    Playing,
    Ended,
}

/// Progress through the pre-round countdown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Countdown {
    step: usize,
    elapsed: f32,
}

impl Countdown {
    /// Index of the label currently shown.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Seconds spent on the current step.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Advance by `dt` seconds. Returns the steps entered during this call
    /// and whether the whole sequence has finished.
    fn advance(&mut self, dt: f32, step_secs: f32, steps: usize) -> (Vec<usize>, bool) {
        if step_secs <= 0.0 {
            self.step = steps;
            return (Vec::new(), true);
        }
        self.elapsed += dt.max(0.0);
        let mut entered = Vec::new();
        while self.elapsed >= step_secs {
            self.elapsed -= step_secs;
            self.step += 1;
            if self.step >= steps {
                return (entered, true);
            }
            entered.push(self.step);
        }
        (entered, false)
    }
}

/// Side effects of a state transition, for renderers and the session layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    PhaseChanged(GamePhase),
    CountdownStep { step: usize, label: String },
    CollectibleConsumed { kind: CollectibleKind },
    ScoreChanged { score: u32 },
    SpeedBoosted { speed: f32 },
    WaveSpawned { count: usize },
    ObstaclesReduced { remaining: usize },
    GameEnded { final_score: u32 },
}

/// Owned, read-only view of the game for drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub phase: GamePhase,
    pub arena_width: f32,
    pub arena_height: f32,
    pub player: Player,
    pub obstacles: Vec<Obstacle>,
    pub collectibles: Vec<Collectible>,
    pub score: u32,
    pub time_left: u32,
    pub countdown_label: Option<String>,
}

pub struct GameState {
    config: HuntConfig,
    rng: StdRng,
    arena: Rect,
    phase: GamePhase,
    countdown: Countdown,
    player: Player,
    obstacles: Vec<Obstacle>,
    collectibles: Vec<Collectible>,
    score: u32,
    time_left: u32,
}

impl GameState {
    /// Fresh game in `Idle` with obstacles already placed. The same seed and
    /// config always produce the same layouts.
    pub fn new(config: HuntConfig, seed: u64) -> Self {
        let arena = layout::arena_bounds(&config);
        let mut state = Self {
            rng: StdRng::seed_from_u64(seed),
            arena,
            phase: GamePhase::Idle,
            countdown: Countdown::default(),
            player: spawn_player(&config),
            obstacles: Vec::new(),
            collectibles: Vec::new(),
            score: 0,
            time_left: config.round_secs,
            config,
        };
        state.place_obstacles();
        state
    }

    fn place_obstacles(&mut self) {
        self.obstacles = layout::place_obstacles(
            &self.arena,
            self.config.player_start(),
            self.config.obstacle_count,
            &self.config,
            &mut self.rng,
        );
    }

    /// Begin the countdown. Ignored outside `Idle`.
    pub fn start(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if self.phase != GamePhase::Idle {
            return events;
        }

        self.countdown = Countdown::default();
        if self.config.countdown_labels.is_empty() {
            self.begin_playing(&mut events);
            return events;
        }

        self.phase = GamePhase::Countdown;
        events.push(GameEvent::PhaseChanged(GamePhase::Countdown));
        events.push(GameEvent::CountdownStep {
            step: 0,
            label: self.config.countdown_labels[0].clone(),
        });
        events
    }

    /// Advance one frame. `dt` (seconds) drives the countdown; movement is a
    /// fixed `speed` pixels per frame.
    pub fn tick(&mut self, direction: Direction, dt: f32) -> Vec<GameEvent> {
        let mut events = Vec::new();
        match self.phase {
            GamePhase::Countdown => self.advance_countdown(dt, &mut events),
            GamePhase::Playing => {
                self.move_player(direction);
                self.collect(&mut events);
            },
            GamePhase::Idle | GamePhase::Ended => {},
        }
        events
    }

    fn advance_countdown(&mut self, dt: f32, events: &mut Vec<GameEvent>) {
        let labels = &self.config.countdown_labels;
        let (entered, finished) =
            self.countdown
                .advance(dt, self.config.countdown_step_secs, labels.len());
        for step in entered {
            events.push(GameEvent::CountdownStep {
                step,
                label: labels[step].clone(),
            });
        }
        if finished {
            self.begin_playing(events);
        }
    }

    fn begin_playing(&mut self, events: &mut Vec<GameEvent>) {
        self.phase = GamePhase::Playing;
        self.time_left = self.config.round_secs;
        events.push(GameEvent::PhaseChanged(GamePhase::Playing));
        tracing::debug!(time_left = self.time_left, "Round started");
        self.spawn_wave(events);
    }

    /// All-or-nothing move: if the clamped candidate box overlaps any
    /// obstacle the player stays put on both axes.
    fn move_player(&mut self, direction: Direction) {
        let player = &self.player;
        let max_x = (self.arena.right() - player.width).max(self.arena.x);
        let max_y = (self.arena.bottom() - player.height).max(self.arena.y);

        let mut new_x = player.x;
        let mut new_y = player.y;
        let mut facing = player.facing;
        if direction.left {
            new_x = (player.x - player.speed).max(self.arena.x);
            facing = Facing::Left;
        }
        if direction.right {
            new_x = (player.x + player.speed).min(max_x);
            facing = Facing::Right;
        }
        if direction.up {
            new_y = (player.y - player.speed).max(self.arena.y);
        }
        if direction.down {
            new_y = (player.y + player.speed).min(max_y);
        }

        let candidate = player.bounds().at(new_x, new_y);
        let blocked = self.obstacles.iter().any(|o| candidate.intersects(&o.bounds));

        let player = &mut self.player;
        player.facing = facing;
        if !blocked {
            player.x = new_x;
            player.y = new_y;
        }
        if direction.is_active() {
            player.animation = (player.animation + 1) % self.config.animation_period.max(1);
        }
    }

    fn collect(&mut self, events: &mut Vec<GameEvent>) {
        let bounds = self.player.bounds();
        let mut picked = Vec::new();
        self.collectibles.retain(|c| {
            if c.bounds.intersects(&bounds) {
                picked.push(c.kind);
                false
            } else {
                true
            }
        });

        for &kind in &picked {
            events.push(GameEvent::CollectibleConsumed { kind });
            if kind.boosts_speed() {
                self.player.speed *= self.config.thunder_speed_multiplier;
                events.push(GameEvent::SpeedBoosted {
                    speed: self.player.speed,
                });
            }
        }
        if !picked.is_empty() {
            self.score += scoring::score_pickups(&picked);
            events.push(GameEvent::ScoreChanged { score: self.score });
        }

        if self.collectibles.is_empty() {
            self.spawn_wave(events);
        }
    }

    fn spawn_wave(&mut self, events: &mut Vec<GameEvent>) {
        let keep_clear = self.player.bounds();
        let wave = layout::spawn_wave(
            &self.arena,
            &mut self.obstacles,
            Some(&keep_clear),
            &self.config,
            &mut self.rng,
        );
        if wave.obstacles_removed > 0 {
            events.push(GameEvent::ObstaclesReduced {
                remaining: self.obstacles.len(),
            });
        }
        self.collectibles = wave.collectibles;
        if !self.collectibles.is_empty() {
            events.push(GameEvent::WaveSpawned {
                count: self.collectibles.len(),
            });
        }
    }

    /// One second of round time. Only counts down while `Playing`; reaching
    /// zero ends the game.
    pub fn timer_tick(&mut self) -> Vec<GameEvent> {
        if self.phase != GamePhase::Playing {
            return Vec::new();
        }
        self.time_left = self.time_left.saturating_sub(1);
        if self.time_left == 0 {
            return self.end();
        }
        Vec::new()
    }

    /// Transition to `Ended`. Returns no events if already ended or not yet
    /// started.
    pub fn end(&mut self) -> Vec<GameEvent> {
        if matches!(self.phase, GamePhase::Ended | GamePhase::Idle) {
            return Vec::new();
        }
        self.phase = GamePhase::Ended;
        tracing::debug!(score = self.score, "Round ended");
        vec![
            GameEvent::PhaseChanged(GamePhase::Ended),
            GameEvent::GameEnded {
                final_score: self.score,
            },
        ]
    }

    /// Back to `Idle` with a new arena, from any phase.
    pub fn reset(&mut self) {
        self.phase = GamePhase::Idle;
        self.countdown = Countdown::default();
        self.player = spawn_player(&self.config);
        self.collectibles.clear();
        self.score = 0;
        self.time_left = self.config.round_secs;
        self.place_obstacles();
    }

    /// `reset()` followed by `start()`.
    pub fn restart(&mut self) -> Vec<GameEvent> {
        self.reset();
        self.start()
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            phase: self.phase,
            arena_width: self.arena.width,
            arena_height: self.arena.height,
            player: self.player.clone(),
            obstacles: self.obstacles.clone(),
            collectibles: self.collectibles.clone(),
            score: self.score,
            time_left: self.time_left,
            countdown_label: self.countdown_label().map(str::to_string),
        }
    }

    pub fn countdown_label(&self) -> Option<&str> {
        if self.phase != GamePhase::Countdown {
            return None;
        }
        self.config
            .countdown_labels
            .get(self.countdown.step())
            .map(String::as_str)
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn is_ended(&self) -> bool {
        self.phase == GamePhase::Ended
    }

    /// The score once the round has ended.
    pub fn final_score(&self) -> Option<u32> {
        self.is_ended().then_some(self.score)
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn collectibles(&self) -> &[Collectible] {
        &self.collectibles
    }

    pub fn config(&self) -> &HuntConfig {
        &self.config
    }
}

fn spawn_player(config: &HuntConfig) -> Player {
    let (x, y) = config.player_start();
    Player::new(
        x,
        y,
        config.player_width,
        config.player_height,
        config.player_speed,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Cosmetic;

    const STEP: f32 = 0.8;

    fn playing_state() -> GameState {
        let mut state = GameState::new(HuntConfig::default(), 42);
        state.start();
        for _ in 0..3 {
            state.tick(Direction::NONE, STEP);
        }
        assert_eq!(state.phase(), GamePhase::Playing);
        state
    }

    /// Playing state with a controlled layout: no obstacles, the player at
    /// `(x, y)`, and one collectible parked in the far corner so no wave
    /// respawns during the test.
    fn open_arena_at(x: f32, y: f32) -> GameState {
        let mut state = playing_state();
        state.obstacles.clear();
        state.player.x = x;
        state.player.y = y;
        state.collectibles = vec![collectible(600.0, 0.0, CollectibleKind::Normal)];
        state
    }

    fn collectible(x: f32, y: f32, kind: CollectibleKind) -> Collectible {
        Collectible {
            bounds: Rect::new(x, y, 30.0, 35.0),
            kind,
            cosmetic: Cosmetic::default(),
        }
    }

    fn obstacle(x: f32, y: f32) -> Obstacle {
        Obstacle {
            bounds: Rect::new(x, y, 40.0, 60.0),
        }
    }

    #[test]
    fn new_game_is_idle_with_obstacles() {
        let state = GameState::new(HuntConfig::default(), 1);
        assert_eq!(state.phase(), GamePhase::Idle);
        assert_eq!(state.obstacles().len(), 8);
        assert!(state.collectibles().is_empty());
        assert_eq!(state.time_left(), 60);
        assert_eq!(state.final_score(), None);
    }

    #[test]
    fn same_seed_same_layout() {
        let a = GameState::new(HuntConfig::default(), 99);
        let b = GameState::new(HuntConfig::default(), 99);
        assert_eq!(a.obstacles(), b.obstacles());
    }

    #[test]
    fn countdown_walks_labels_then_plays() {
        let mut state = GameState::new(HuntConfig::default(), 3);
        let events = state.start();
        assert_eq!(state.phase(), GamePhase::Countdown);
        assert_eq!(state.countdown_label(), Some("Ready..."));
        assert!(events.contains(&GameEvent::PhaseChanged(GamePhase::Countdown)));

        let events = state.tick(Direction::NONE, STEP);
        assert_eq!(
            events,
            vec![GameEvent::CountdownStep {
                step: 1,
                label: "Set...".into()
            }]
        );
        state.tick(Direction::NONE, STEP);
        assert_eq!(state.countdown_label(), Some("GO!"));

        let events = state.tick(Direction::NONE, STEP);
        assert_eq!(state.phase(), GamePhase::Playing);
        assert!(events.contains(&GameEvent::PhaseChanged(GamePhase::Playing)));
        assert!(events.contains(&GameEvent::WaveSpawned { count: 5 }));
        assert_eq!(state.collectibles().len(), 5);
    }

    #[test]
    fn countdown_ignores_input() {
        let mut state = GameState::new(HuntConfig::default(), 3);
        state.start();
        let before = state.player().clone();
        for _ in 0..10 {
            state.tick(Direction::RIGHT.merge(Direction::DOWN), 0.1);
        }
        assert_eq!(state.phase(), GamePhase::Countdown);
        assert_eq!(state.player(), &before);
    }

    #[test]
    fn start_ignored_outside_idle() {
        let mut state = playing_state();
        assert!(state.start().is_empty());
        assert_eq!(state.phase(), GamePhase::Playing);
    }

    #[test]
    fn empty_countdown_starts_immediately() {
        let config = HuntConfig {
            countdown_labels: Vec::new(),
            ..HuntConfig::default()
        };
        let mut state = GameState::new(config, 5);
        state.start();
        assert_eq!(state.phase(), GamePhase::Playing);
    }

    #[test]
    fn edge_touching_obstacle_does_not_block() {
        let mut state = open_arena_at(100.0, 100.0);
        // Obstacle's left edge sits 4px past the player's right edge.
        state.obstacles = vec![obstacle(144.0, 100.0)];

        state.tick(Direction::RIGHT, 0.016);
        assert_eq!(state.player().x, 104.0);

        // Next step would overlap: rejected, position unchanged.
        state.tick(Direction::RIGHT, 0.016);
        assert_eq!(state.player().x, 104.0);
        assert_eq!(state.player().y, 100.0);
    }

    #[test]
    fn overlapping_obstacle_blocks_and_touching_sides_slide() {
        let mut state = open_arena_at(60.0, 100.0);
        state.obstacles = vec![obstacle(100.0, 100.0)];

        state.tick(Direction::RIGHT, 0.016);
        assert_eq!((state.player().x, state.player().y), (60.0, 100.0));

        // Sliding along the shared edge is not a collision.
        state.tick(Direction::DOWN, 0.016);
        assert_eq!((state.player().x, state.player().y), (60.0, 104.0));

        state.tick(Direction::LEFT, 0.016);
        assert_eq!(state.player().x, 56.0);
    }

    #[test]
    fn blocked_axis_rejects_whole_diagonal_move() {
        let mut state = open_arena_at(60.0, 100.0);
        state.obstacles = vec![obstacle(100.0, 100.0)];
        state.tick(Direction::RIGHT.merge(Direction::DOWN), 0.016);
        assert_eq!((state.player().x, state.player().y), (60.0, 100.0));
    }

    #[test]
    fn diagonal_moves_full_speed_on_both_axes() {
        let mut state = open_arena_at(200.0, 200.0);
        state.tick(Direction::LEFT.merge(Direction::UP), 0.016);
        assert_eq!((state.player().x, state.player().y), (196.0, 196.0));
    }

    #[test]
    fn movement_clamps_to_arena() {
        let mut state = open_arena_at(2.0, 2.0);
        state.collectibles = vec![collectible(300.0, 300.0, CollectibleKind::Normal)];
        state.tick(Direction::LEFT.merge(Direction::UP), 0.016);
        assert_eq!((state.player().x, state.player().y), (0.0, 0.0));

        state.player.x = 598.0;
        state.player.y = 428.0;
        state.tick(Direction::RIGHT.merge(Direction::DOWN), 0.016);
        assert_eq!((state.player().x, state.player().y), (600.0, 430.0));
    }

    #[test]
    fn idle_input_changes_nothing() {
        let mut state = open_arena_at(200.0, 200.0);
        let before = state.snapshot();
        for _ in 0..600 {
            let events = state.tick(Direction::NONE, 1.0 / 60.0);
            assert!(events.is_empty());
        }
        let after = state.snapshot();
        assert_eq!(after.player, before.player);
        assert_eq!(after.score, before.score);
        assert_eq!(after.time_left, 60);
    }

    #[test]
    fn facing_follows_horizontal_input_only() {
        let mut state = open_arena_at(200.0, 200.0);
        state.tick(Direction::LEFT, 0.016);
        assert_eq!(state.player().facing, Facing::Left);
        state.tick(Direction::UP, 0.016);
        assert_eq!(state.player().facing, Facing::Left);
        state.tick(Direction::DOWN, 0.016);
        assert_eq!(state.player().facing, Facing::Left);
        state.tick(Direction::RIGHT, 0.016);
        assert_eq!(state.player().facing, Facing::Right);
    }

    #[test]
    fn animation_wraps_and_pauses_without_input() {
        let mut state = open_arena_at(200.0, 200.0);
        for _ in 0..31 {
            // Left then right keeps the player near its start.
            state.tick(Direction::LEFT, 0.016);
            state.tick(Direction::RIGHT, 0.016);
        }
        assert_eq!(state.player().animation, 62 % 30);
        let frozen = state.player().animation;
        state.tick(Direction::NONE, 0.016);
        assert_eq!(state.player().animation, frozen);
    }

    #[test]
    fn two_thunder_pickups_compound_speed() {
        let mut state = open_arena_at(200.0, 200.0);
        state.collectibles = vec![
            collectible(205.0, 205.0, CollectibleKind::Thunder),
            collectible(210.0, 210.0, CollectibleKind::Thunder),
            collectible(600.0, 0.0, CollectibleKind::Normal),
        ];
        let events = state.tick(Direction::NONE, 0.016);

        assert_eq!(state.player().speed, 4.0 * 1.25 * 1.25);
        assert_eq!(state.score(), 2);
        let boosts = events
            .iter()
            .filter(|e| matches!(e, GameEvent::SpeedBoosted { .. }))
            .count();
        assert_eq!(boosts, 2);
        assert!(events.contains(&GameEvent::ScoreChanged { score: 2 }));
        assert_eq!(state.collectibles().len(), 1);
    }

    #[test]
    fn pickups_score_by_kind() {
        let mut state = open_arena_at(200.0, 200.0);
        state.collectibles = vec![
            collectible(200.0, 200.0, CollectibleKind::Golden),
            collectible(205.0, 200.0, CollectibleKind::Rainbow),
            collectible(210.0, 200.0, CollectibleKind::Normal),
            collectible(600.0, 0.0, CollectibleKind::Normal),
        ];
        state.tick(Direction::NONE, 0.016);
        assert_eq!(state.score(), 16);
        assert_eq!(state.player().speed, 4.0);
    }

    #[test]
    fn clearing_wave_respawns_same_tick_away_from_player() {
        let mut state = open_arena_at(200.0, 200.0);
        state.collectibles = vec![collectible(200.0, 200.0, CollectibleKind::Normal)];
        let events = state.tick(Direction::NONE, 0.016);

        assert_eq!(state.score(), 1);
        assert!(events.contains(&GameEvent::WaveSpawned { count: 5 }));
        let player = state.player().bounds();
        assert!(state.collectibles().iter().all(|c| !c.bounds.intersects(&player)));
    }

    #[test]
    fn timer_only_counts_while_playing() {
        let mut state = GameState::new(HuntConfig::default(), 8);
        assert!(state.timer_tick().is_empty());
        assert_eq!(state.time_left(), 60);

        state.start();
        state.timer_tick();
        assert_eq!(state.time_left(), 60);
    }

    #[test]
    fn timer_expiry_ends_once() {
        let mut state = open_arena_at(200.0, 200.0);
        state.score = 7;
        let mut ended = 0;
        for _ in 0..59 {
            assert!(state.timer_tick().is_empty());
        }
        assert_eq!(state.time_left(), 1);

        for _ in 0..5 {
            for event in state.timer_tick() {
                if let GameEvent::GameEnded { final_score } = event {
                    assert_eq!(final_score, 7);
                    ended += 1;
                }
            }
        }
        assert_eq!(ended, 1);
        assert!(state.is_ended());
        assert_eq!(state.final_score(), Some(7));
        assert!(state.end().is_empty());
    }

    #[test]
    fn ended_game_ignores_ticks() {
        let mut state = open_arena_at(200.0, 200.0);
        state.end();
        let before = state.snapshot();
        assert!(state.tick(Direction::LEFT, 0.016).is_empty());
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn restart_resets_round() {
        let mut state = open_arena_at(200.0, 200.0);
        state.score = 12;
        state.player.speed = 9.0;
        state.end();

        let events = state.restart();
        assert_eq!(state.phase(), GamePhase::Countdown);
        assert!(events.contains(&GameEvent::PhaseChanged(GamePhase::Countdown)));
        assert_eq!(state.score(), 0);
        assert_eq!(state.time_left(), 60);
        assert_eq!(state.player().speed, 4.0);
        assert_eq!((state.player().x, state.player().y), (320.0, 240.0));
        assert!(state.collectibles().is_empty());
        assert_eq!(state.obstacles().len(), 8);
    }

    #[test]
    fn reset_returns_to_idle_from_any_phase() {
        let mut state = playing_state();
        state.reset();
        assert_eq!(state.phase(), GamePhase::Idle);
        assert_eq!(state.countdown_label(), None);
    }

    #[test]
    fn snapshot_serializes() {
        let state = playing_state();
        let snapshot = state.snapshot();
        assert_eq!(snapshot.phase, GamePhase::Playing);
        assert_eq!(snapshot.arena_width, 640.0);
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: GameSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.score, snapshot.score);
        assert_eq!(back.collectibles.len(), snapshot.collectibles.len());
    }
}
