//! Random placement of obstacles and collectible waves.
//!
//! Every sampling loop here is bounded. When a collectible wave cannot be
//! placed within its attempt budget the arena is degraded (obstacles are
//! dropped down to a floor) and the wave is retried, rather than failing the
//! game.

use rand::Rng;

use crate::config::HuntConfig;
use crate::entity::{Collectible, CollectibleKind, Cosmetic, Obstacle};
use crate::geometry::Rect;

#[derive(Debug, Clone, PartialEq)]
pub enum PlacementError {
    /// The attempt budget ran out before every slot was filled. Carries the
    /// collectibles that were placed.
    InvalidPlacement {
        requested: usize,
        placed: Vec<Collectible>,
    },
}

impl std::fmt::Display for PlacementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPlacement { requested, placed } => write!(
                f,
                "placed {} of {requested} collectibles before the attempt budget ran out",
                placed.len()
            ),
        }
    }
}

impl std::error::Error for PlacementError {}

/// Which special collectibles a wave carries. Rolled once per wave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecialRoll {
    pub golden: bool,
    pub rainbow: bool,
    pub thunder: bool,
}

/// A placed wave plus how much the arena had to shrink to fit it.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnedWave {
    pub collectibles: Vec<Collectible>,
    pub obstacles_removed: usize,
}

/// Arena rectangle anchored at the origin.
pub fn arena_bounds(config: &HuntConfig) -> Rect {
    Rect::new(0.0, 0.0, config.arena_width, config.arena_height)
}

/// Uniform random position for a `width`×`height` rectangle fully inside `arena`.
fn random_rect<R: Rng + ?Sized>(arena: &Rect, width: f32, height: f32, rng: &mut R) -> Rect {
    let x = arena.x + sample_span(arena.width - width, rng);
    let y = arena.y + sample_span(arena.height - height, rng);
    Rect::new(x, y, width, height)
}

/// Uniform sample in `[0, span)`, or 0 when there is no room.
fn sample_span<R: Rng + ?Sized>(span: f32, rng: &mut R) -> f32 {
    if span <= 0.0 {
        0.0
    } else {
        rng.random::<f32>() * span
    }
}

/// Proximity test on top-left corners: both axis deltas under `buffer`.
pub fn within_buffer(a: &Rect, b: &Rect, buffer: f32) -> bool {
    (a.x - b.x).abs() < buffer && (a.y - b.y).abs() < buffer
}

fn near_player_start(candidate: &Rect, start: (f32, f32), buffer: f32) -> bool {
    (candidate.x - start.0).abs() < buffer && (candidate.y - start.1).abs() < buffer
}

/// Place up to `count` obstacles one at a time.
///
/// Each candidate is resampled while it sits inside the player-start buffer or
/// within `obstacle_buffer` of an already placed obstacle. A slot that cannot
/// be filled within `obstacle_attempts` candidates ends placement early, so
/// the result may hold fewer than `count` obstacles.
pub fn place_obstacles<R: Rng + ?Sized>(
    arena: &Rect,
    player_start: (f32, f32),
    count: usize,
    config: &HuntConfig,
    rng: &mut R,
) -> Vec<Obstacle> {
    let mut placed: Vec<Obstacle> = Vec::with_capacity(count);

    for slot in 0..count {
        let mut accepted = None;
        for _ in 0..config.obstacle_attempts {
            let candidate =
                random_rect(arena, config.obstacle_width, config.obstacle_height, rng);
            if near_player_start(&candidate, player_start, config.player_buffer) {
                continue;
            }
            let crowded = placed
                .iter()
                .any(|o| within_buffer(&candidate, &o.bounds, config.obstacle_buffer));
            if !crowded {
                accepted = Some(candidate);
                break;
            }
        }

        match accepted {
            Some(bounds) => placed.push(Obstacle { bounds }),
            None => {
                tracing::warn!(
                    slot,
                    requested = count,
                    attempts = config.obstacle_attempts,
                    "Obstacle placement exhausted, arena gets fewer obstacles"
                );
                break;
            },
        }
    }

    placed
}

/// Roll the special-collectible flags for one wave.
pub fn roll_specials<R: Rng + ?Sized>(config: &HuntConfig, rng: &mut R) -> SpecialRoll {
    SpecialRoll {
        golden: rng.random_bool(usable_chance(config.golden_chance)),
        rainbow: rng.random_bool(usable_chance(config.rainbow_chance)),
        thunder: rng.random_bool(usable_chance(config.thunder_chance)),
    }
}

/// Clamp into `[0, 1]`; NaN and infinities count as never.
fn usable_chance(chance: f64) -> f64 {
    if chance.is_finite() {
        chance.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Golden takes slot 0, Rainbow slot 1, Thunder slot 2. Flags pointing past
/// the end of the wave are dropped.
pub fn assign_specials(wave: &mut [Collectible], roll: SpecialRoll) {
    let slots = [
        (roll.golden, CollectibleKind::Golden),
        (roll.rainbow, CollectibleKind::Rainbow),
        (roll.thunder, CollectibleKind::Thunder),
    ];
    for (index, (flagged, kind)) in slots.into_iter().enumerate() {
        if flagged && let Some(collectible) = wave.get_mut(index) {
            collectible.kind = kind;
        }
    }
}

/// Place one wave of `count` collectibles that avoid every obstacle and the
/// `keep_clear` rectangle, sharing `collectible_attempt_budget` candidates
/// across all slots.
pub fn place_collectibles<R: Rng + ?Sized>(
    arena: &Rect,
    obstacles: &[Obstacle],
    keep_clear: Option<&Rect>,
    count: usize,
    config: &HuntConfig,
    rng: &mut R,
) -> Result<Vec<Collectible>, PlacementError> {
    let roll = roll_specials(config, rng);
    let mut wave = Vec::with_capacity(count);
    let mut attempts = 0;

    for _ in 0..count {
        while attempts < config.collectible_attempt_budget {
            attempts += 1;
            let bounds = random_rect(
                arena,
                config.collectible_width,
                config.collectible_height,
                rng,
            );
            let blocked = obstacles.iter().any(|o| bounds.intersects(&o.bounds))
                || keep_clear.is_some_and(|r| bounds.intersects(r));
            if !blocked {
                wave.push(Collectible {
                    bounds,
                    kind: CollectibleKind::Normal,
                    cosmetic: random_cosmetic(config, rng),
                });
                break;
            }
        }
    }

    assign_specials(&mut wave, roll);

    if wave.len() < count {
        return Err(PlacementError::InvalidPlacement {
            requested: count,
            placed: wave,
        });
    }
    Ok(wave)
}

fn random_cosmetic<R: Rng + ?Sized>(config: &HuntConfig, rng: &mut R) -> Cosmetic {
    Cosmetic {
        color: rng.random_range(0..config.collectible_colors.max(1)),
        pattern: rng.random_range(0..config.collectible_patterns.max(1)),
    }
}

/// Spawn a full wave, shrinking `obstacles` after each failed pass until the
/// wave fits. Once the obstacle floor is reached, up to `wave_retry_limit`
/// further passes are made; if they all fail the largest partial wave is used.
pub fn spawn_wave<R: Rng + ?Sized>(
    arena: &Rect,
    obstacles: &mut Vec<Obstacle>,
    keep_clear: Option<&Rect>,
    config: &HuntConfig,
    rng: &mut R,
) -> SpawnedWave {
    let count = config.collectibles_per_wave;
    let mut obstacles_removed = 0;
    let mut floor_passes = 0;
    let mut best_partial: Vec<Collectible> = Vec::new();

    loop {
        match place_collectibles(arena, obstacles, keep_clear, count, config, rng) {
            Ok(collectibles) => {
                return SpawnedWave {
                    collectibles,
                    obstacles_removed,
                };
            },
            Err(PlacementError::InvalidPlacement { placed, .. }) => {
                let target = obstacles
                    .len()
                    .saturating_sub(config.obstacle_shrink_step)
                    .max(config.min_obstacles);
                if target < obstacles.len() {
                    obstacles_removed += obstacles.len() - target;
                    obstacles.truncate(target);
                    tracing::debug!(
                        remaining = obstacles.len(),
                        "Wave did not fit, removed obstacles"
                    );
                    continue;
                }

                if placed.len() > best_partial.len() {
                    best_partial = placed;
                }
                floor_passes += 1;
                if floor_passes >= config.wave_retry_limit {
                    tracing::warn!(
                        placed = best_partial.len(),
                        requested = count,
                        "Wave retry limit reached, spawning partial wave"
                    );
                    return SpawnedWave {
                        collectibles: best_partial,
                        obstacles_removed,
                    };
                }
            },
        }
    }
}
