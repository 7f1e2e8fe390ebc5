//! Drives a [`GameState`] in real time and ties it to a multiplayer session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

use eggdash_core::player::PlayerId;
use eggdash_core::session::SessionStatus;
use eggdash_core::store::Store;
use eggdash_hunt::{Direction, GameEvent, GamePhase, GameState};

use crate::config::SessionConfig;
use crate::coordinator::{SessionCoordinator, SessionEvent};
use crate::error::SessionError;
use crate::leaderboard::Leaderboard;
use crate::results::SessionResults;

const FALLBACK_FRAME_RATE: f32 = 60.0;

/// Frame and clock periods for one round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundTiming {
    pub frame_period: Duration,
    pub timer_period: Duration,
}

impl RoundTiming {
    pub fn from_config(config: &SessionConfig) -> Self {
        let rate = if config.frame_rate.is_finite() && config.frame_rate > 0.0 {
            config.frame_rate
        } else {
            tracing::warn!(
                frame_rate = config.frame_rate,
                "Unusable frame rate, falling back to {FALLBACK_FRAME_RATE}"
            );
            FALLBACK_FRAME_RATE
        };
        Self {
            frame_period: Duration::from_secs_f32(1.0 / rate),
            timer_period: Duration::from_millis(config.timer_period_ms.max(1)),
        }
    }
}

impl Default for RoundTiming {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// Run one round to completion and return the final score.
///
/// Frames and clock ticks are handled by one task, so a tick never overlaps
/// a frame. The clock starts when the countdown finishes. Input is sampled
/// from `input` once per frame.
pub async fn run_round(
    game: &mut GameState,
    input: &watch::Receiver<Direction>,
    timing: RoundTiming,
    sink: Option<&mpsc::UnboundedSender<GameEvent>>,
) -> u32 {
    let mut frame = tokio::time::interval(timing.frame_period);
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut clock = tokio::time::interval_at(
        Instant::now() + timing.timer_period,
        timing.timer_period,
    );
    clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

    if game.phase() == GamePhase::Idle {
        let events = game.start();
        if entered_play(&events) {
            clock.reset();
        }
        forward(sink, events);
    }

    let dt = timing.frame_period.as_secs_f32();
    while !game.is_ended() {
        tokio::select! {
            biased;
            _ = clock.tick() => {
                forward(sink, game.timer_tick());
            }
            _ = frame.tick() => {
                let direction = *input.borrow();
                let events = game.tick(direction, dt);
                if entered_play(&events) {
                    clock.reset();
                }
                forward(sink, events);
            }
        }
    }

    let score = game.final_score().unwrap_or_else(|| game.score());
    tracing::debug!(score, "Round loop finished");
    score
}

fn entered_play(events: &[GameEvent]) -> bool {
    events
        .iter()
        .any(|e| matches!(e, GameEvent::PhaseChanged(GamePhase::Playing)))
}

fn forward(sink: Option<&mpsc::UnboundedSender<GameEvent>>, events: Vec<GameEvent>) {
    let Some(sink) = sink else {
        return;
    };
    for event in events {
        // A dropped sink just means nobody is watching.
        let _ = sink.send(event);
    }
}

/// How a single-player round went on the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoloOutcome {
    pub score: u32,
    pub qualified: bool,
    /// Leaderboard key of the submitted entry. `None` if the score did not
    /// qualify or the name was blank.
    pub entry: Option<String>,
}

/// Play one single-player round, then record the score on `leaderboard` if
/// it makes the table.
pub async fn play_solo(
    game: &mut GameState,
    input: &watch::Receiver<Direction>,
    timing: RoundTiming,
    leaderboard: &Leaderboard,
    name: &str,
) -> Result<SoloOutcome, SessionError> {
    if game.phase() != GamePhase::Idle {
        game.reset();
    }
    let score = run_round(game, input, timing, None).await;
    let qualified = leaderboard.qualifies(score).await?;
    let entry = if qualified {
        leaderboard.submit(name, score).await?
    } else {
        None
    };
    tracing::info!(score, qualified, "Solo round finished");
    Ok(SoloOutcome {
        score,
        qualified,
        entry,
    })
}

/// One player's client: a session coordinator plus the local game it drives.
pub struct MultiplayerClient {
    coordinator: SessionCoordinator,
    events: mpsc::Receiver<SessionEvent>,
    game: GameState,
    timing: RoundTiming,
    game_events: Option<mpsc::UnboundedSender<GameEvent>>,
}

impl MultiplayerClient {
    pub fn new(
        store: Arc<dyn Store>,
        config: SessionConfig,
        player_id: PlayerId,
        name: &str,
        seed: u64,
    ) -> Self {
        let timing = RoundTiming::from_config(&config);
        let game = GameState::new(config.hunt.clone(), seed);
        let (coordinator, events) = SessionCoordinator::new(store, config, player_id, name);
        Self {
            coordinator,
            events,
            game,
            timing,
            game_events: None,
        }
    }

    /// Forward the local game's events to `sink` during rounds.
    pub fn with_game_events(mut self, sink: mpsc::UnboundedSender<GameEvent>) -> Self {
        self.game_events = Some(sink);
        self
    }

    pub fn coordinator(&self) -> &SessionCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut SessionCoordinator {
        &mut self.coordinator
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    /// Wait for the host to start, play the round locally, submit the score,
    /// and return the results once every player has finished.
    pub async fn play_next_round(
        &mut self,
        input: &watch::Receiver<Direction>,
    ) -> Result<SessionResults, SessionError> {
        let mut played = false;
        loop {
            let Some(event) = self.events.recv().await else {
                return Err(SessionError::NotInSession);
            };
            match event {
                SessionEvent::StatusChanged(SessionStatus::InProgress) if !played => {
                    if self.game.phase() != GamePhase::Idle {
                        self.game.reset();
                    }
                    let score =
                        run_round(&mut self.game, input, self.timing, self.game_events.as_ref())
                            .await;
                    self.coordinator.submit_score(score).await?;
                    played = true;
                },
                SessionEvent::StatusChanged(SessionStatus::Waiting) => {
                    if self.game.phase() != GamePhase::Idle {
                        self.game.reset();
                    }
                },
                SessionEvent::Results(results) if played => return Ok(results),
                SessionEvent::SessionClosed => {
                    let id = self.coordinator.session_id().unwrap_or_default();
                    return Err(SessionError::SessionNotFound(id.to_string()));
                },
                _ => {},
            }
        }
    }

    /// Block until a `RosterChanged` event says the host could start.
    pub async fn wait_until_startable(&mut self) -> Result<(), SessionError> {
        loop {
            match self.events.recv().await {
                Some(SessionEvent::RosterChanged { readiness, .. }) if readiness.can_start() => {
                    return Ok(());
                },
                Some(SessionEvent::SessionClosed) | None => {
                    return Err(SessionError::NotInSession);
                },
                Some(_) => {},
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use eggdash_hunt::HuntConfig;

    fn quick_config() -> HuntConfig {
        HuntConfig {
            round_secs: 3,
            countdown_labels: vec!["Go".into()],
            countdown_step_secs: 0.1,
            ..HuntConfig::default()
        }
    }

    fn quick_timing() -> RoundTiming {
        RoundTiming {
            frame_period: Duration::from_millis(20),
            timer_period: Duration::from_secs(1),
        }
    }

    #[test]
    fn timing_from_config() {
        let timing = RoundTiming::from_config(&SessionConfig::default());
        assert_eq!(timing.timer_period, Duration::from_secs(1));
        let fps = 1.0 / timing.frame_period.as_secs_f32();
        assert!((fps - 60.0).abs() < 0.5);
    }

    #[test]
    fn bad_frame_rate_falls_back() {
        let config = SessionConfig {
            frame_rate: 0.0,
            timer_period_ms: 0,
            ..SessionConfig::default()
        };
        let timing = RoundTiming::from_config(&config);
        assert!(timing.frame_period > Duration::ZERO);
        assert_eq!(timing.timer_period, Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn round_runs_to_timeout() {
        let mut game = GameState::new(quick_config(), 7);
        let (_tx, rx) = watch::channel(Direction::NONE);
        let started = Instant::now();
        let score = run_round(&mut game, &rx, quick_timing(), None).await;

        assert!(game.is_ended());
        assert_eq!(score, 0);
        assert_eq!(game.time_left(), 0);
        // Countdown (0.1 s) plus three clock ticks.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(4), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn events_reach_the_sink() {
        let mut game = GameState::new(quick_config(), 7);
        let (_tx, rx) = watch::channel(Direction::RIGHT);
        let (sink, mut events) = mpsc::unbounded_channel();
        run_round(&mut game, &rx, quick_timing(), Some(&sink)).await;
        drop(sink);

        let mut seen = Vec::new();
        while let Some(event) = events.recv().await {
            seen.push(event);
        }
        assert_eq!(
            seen.first(),
            Some(&GameEvent::PhaseChanged(GamePhase::Countdown))
        );
        assert!(seen.contains(&GameEvent::PhaseChanged(GamePhase::Playing)));
        assert_eq!(
            seen.iter()
                .filter(|e| matches!(e, GameEvent::GameEnded { .. }))
                .count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn solo_round_reaches_the_leaderboard() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let leaderboard = Leaderboard::new(Arc::clone(&store), 1);
        let mut game = GameState::new(quick_config(), 5);
        let (_tx, rx) = watch::channel(Direction::NONE);

        let first = play_solo(&mut game, &rx, quick_timing(), &leaderboard, "Hop")
            .await
            .unwrap();
        assert!(first.qualified);
        assert!(first.entry.is_some());
        assert!(game.is_ended());

        // The table is full and standing still never beats the entry.
        let second = play_solo(&mut game, &rx, quick_timing(), &leaderboard, "Skip")
            .await
            .unwrap();
        assert!(!second.qualified);
        assert_eq!(second.entry, None);

        let top = leaderboard.top(5).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, "Hop");
        assert_eq!(top[0].score, first.score);
    }

    #[tokio::test(start_paused = true)]
    async fn held_input_moves_the_player() {
        let mut game = GameState::new(quick_config(), 11);
        let start_x = game.player().x;
        let (_tx, rx) = watch::channel(Direction::LEFT);
        run_round(&mut game, &rx, quick_timing(), None).await;
        assert!(game.player().x < start_x);
    }
}
