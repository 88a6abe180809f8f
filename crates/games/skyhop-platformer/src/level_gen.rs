use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use skyhop_core::collectible::{CollectibleKind, RARE_KINDS};

use crate::geometry::{MovingPlatform, Platform, Rect};

/// Thickness of generated ground segments.
pub const PLATFORM_HEIGHT: f32 = 50.0;
/// Side length of coin and pickup hitboxes.
pub const COLLECTIBLE_SIZE: f32 = 20.0;
/// Side length of pushable boxes.
pub const BOX_SIZE: f32 = 40.0;
const SPIKE_WIDTH: f32 = 40.0;
const SPIKE_HEIGHT: f32 = 15.0;
/// Depth of a spike's top edge below ground level.
const SPIKE_DEPTH: f32 = 35.0;
const MOVING_WIDTH: f32 = 80.0;
const MOVING_HEIGHT: f32 = 20.0;
const MOVING_OFFSET_X: f32 = 60.0;
const MOVING_RISE: f32 = 100.0;
const MOVING_SPEED: f32 = 2.0;
const MOVING_RANGE: f32 = 120.0;
const COIN_HOVER: f32 = 30.0;
const PICKUP_HOVER: f32 = 60.0;
const SPAWN_PLATFORM_WIDTH: f32 = 160.0;
const FINISH_WIDTH: f32 = 40.0;
const FINISH_HEIGHT: f32 = 80.0;
const MAX_SLOPE_DELTA: f32 = 40.0;

const SLOPE_CHANCE: f64 = 0.25;
const COIN_CHANCE: f64 = 0.5;
const SPIKE_CHANCE: f64 = 0.3;
const MOVING_CHANCE: f64 = 0.2;
const BOX_CHANCE: f64 = 0.5;
const WIDE_CHANCE: f32 = 0.2;
const SHORT_CHANCE: f32 = 0.15;

/// Tunable level layout parameters, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Minimum horizontal extent of the level walk.
    pub width: f32,
    /// Surface height of unsloped ground segments.
    pub ground_y: f32,
    /// Fixed horizontal spawn position.
    pub spawn_x: f32,
    pub min_gap: f32,
    pub max_gap: f32,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            width: 2400.0,
            ground_y: 400.0,
            spawn_x: 100.0,
            min_gap: 60.0,
            max_gap: 140.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collectible {
    pub id: String,
    pub kind: CollectibleKind,
    pub bounds: Rect,
    pub collected: bool,
}

/// One generated level instance. Replaced wholesale on regeneration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level {
    pub platforms: Vec<Platform>,
    pub boxes: Vec<Rect>,
    pub collectibles: Vec<Collectible>,
    pub hazards: Vec<Rect>,
    pub finish: Rect,
    /// Left edge of the finish marker; reaching it completes the level.
    pub end_x: f32,
    /// Horizontal extent used to clamp the body.
    pub width: f32,
    pub spawn_x: f32,
    pub ground_y: f32,
    /// Random prefix shared by this level's collectible ids.
    pub tag: String,
}

impl Level {
    /// Platforms that never move (flat and sloped).
    pub fn static_platforms(&self) -> impl Iterator<Item = &Platform> {
        self.platforms.iter().filter(|p| !p.is_moving())
    }

    pub fn moving_platforms(&self) -> impl Iterator<Item = &MovingPlatform> {
        self.platforms.iter().filter_map(|p| match p {
            Platform::Moving(m) => Some(m),
            _ => None,
        })
    }

    pub fn count_kind(&self, kind: CollectibleKind) -> usize {
        self.collectibles.iter().filter(|c| c.kind == kind).count()
    }

    /// Whether a static platform spans horizontal position `x`.
    pub fn has_platform_under(&self, x: f32) -> bool {
        self.static_platforms().any(|p| p.bounds().contains_x(x))
    }

    /// Top of the spawn body for a body of the given height.
    pub fn spawn_y(&self, body_height: f32) -> f32 {
        self.ground_y - body_height
    }
}

/// Generate a reproducible level from a seed.
pub fn generate_level_seeded(seed: u64, config: &LevelConfig) -> Level {
    let mut rng = StdRng::seed_from_u64(seed);
    generate_level(&mut rng, config)
}

/// Generate a level from the given random source.
pub fn generate_level<R: Rng + ?Sized>(rng: &mut R, config: &LevelConfig) -> Level {
    let ground = config.ground_y;
    let tag = format!("{:06x}", rng.random::<u32>() & 0x00ff_ffff);
    let mut builder = LevelBuilder::new(tag.clone());

    let mut x = 0.0_f32;
    while x < config.width {
        let width = segment_width(rng);
        let platform = if rng.random_bool(SLOPE_CHANCE) {
            let delta = rng.random_range(-MAX_SLOPE_DELTA..=MAX_SLOPE_DELTA);
            Platform::Sloped {
                x,
                y: ground,
                width,
                height: PLATFORM_HEIGHT,
                end_y: ground + delta,
            }
        } else {
            Platform::Flat(Rect::new(x, ground, width, PLATFORM_HEIGHT))
        };

        if rng.random_bool(COIN_CHANCE) {
            let cx = platform.center_x();
            let surface = platform.surface_height_at(cx);
            builder.collectible(CollectibleKind::Coin, cx, surface - COIN_HOVER);
        }

        // Straddles the gap that precedes this segment.
        if x > 0.0 && rng.random_bool(MOVING_CHANCE) {
            let start_x = x - MOVING_OFFSET_X;
            builder.platforms.push(Platform::Moving(MovingPlatform {
                rect: Rect::new(start_x, ground - MOVING_RISE, MOVING_WIDTH, MOVING_HEIGHT),
                dx: MOVING_SPEED,
                range: MOVING_RANGE,
                start_x,
            }));
        }

        let wants_spike = x > 0.0 && rng.random_bool(SPIKE_CHANCE);
        builder.platforms.push(platform);

        let segment_end = x + width;
        let gap = if config.max_gap > config.min_gap {
            rng.random_range(config.min_gap..config.max_gap)
        } else {
            config.min_gap
        };
        if wants_spike {
            let spike_x = segment_end + (gap - SPIKE_WIDTH) / 2.0;
            builder.hazards.push(Rect::new(
                spike_x,
                ground + SPIKE_DEPTH,
                SPIKE_WIDTH,
                SPIKE_HEIGHT,
            ));
        }
        x = segment_end + gap;

        // Rests at the start of the next segment.
        if x < config.width - 50.0 && rng.random_bool(BOX_CHANCE) {
            builder
                .boxes
                .push(Rect::new(x + 10.0, ground - BOX_SIZE, BOX_SIZE, BOX_SIZE));
        }
    }

    builder.place_rare_pickups(rng);
    builder.ensure_spawn_platform(config);
    builder.finish(config)
}

/// Skewed width draw: mostly medium segments, some wide, a few short.
fn segment_width<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    let roll: f32 = rng.random();
    if roll < WIDE_CHANCE {
        rng.random_range(240.0..=320.0)
    } else if roll < WIDE_CHANCE + SHORT_CHANCE {
        rng.random_range(80.0..=120.0)
    } else {
        rng.random_range(140.0..=200.0)
    }
}

struct LevelBuilder {
    tag: String,
    platforms: Vec<Platform>,
    boxes: Vec<Rect>,
    collectibles: Vec<Collectible>,
    hazards: Vec<Rect>,
}

impl LevelBuilder {
    fn new(tag: String) -> Self {
        Self {
            tag,
            platforms: Vec::new(),
            boxes: Vec::new(),
            collectibles: Vec::new(),
            hazards: Vec::new(),
        }
    }

    /// Add a collectible centered on `center_x` with its bottom at `bottom`.
    fn collectible(&mut self, kind: CollectibleKind, center_x: f32, bottom: f32) {
        let id = format!("{}-{}-{}", self.tag, kind.as_str(), self.collectibles.len());
        self.collectibles.push(Collectible {
            id,
            kind,
            bounds: Rect::new(
                center_x - COLLECTIBLE_SIZE / 2.0,
                bottom - COLLECTIBLE_SIZE,
                COLLECTIBLE_SIZE,
                COLLECTIBLE_SIZE,
            ),
            collected: false,
        });
    }

    /// Place heart, doublejump and grow, in that order, each on a distinct
    /// static platform. Pickups run out silently when platforms do.
    fn place_rare_pickups<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let candidates: Vec<(f32, f32)> = self
            .platforms
            .iter()
            .filter(|p| !p.is_moving())
            .map(|p| {
                let cx = p.center_x();
                (cx, p.surface_height_at(cx))
            })
            .collect();
        let n = candidates.len();
        let mut used = vec![false; n];

        for kind in RARE_KINDS {
            let mut chosen = None;
            for _ in 0..n {
                let i = rng.random_range(0..n);
                if !used[i] {
                    chosen = Some(i);
                    break;
                }
            }
            let chosen = chosen.or_else(|| (0..n).find(|&i| !used[i]));
            let Some(i) = chosen else {
                tracing::debug!(kind = kind.as_str(), "No free platform for rare pickup");
                break;
            };
            used[i] = true;
            let (cx, surface) = candidates[i];
            self.collectible(kind, cx, surface - PICKUP_HOVER);
        }
    }

    fn ensure_spawn_platform(&mut self, config: &LevelConfig) {
        let covered = self
            .platforms
            .iter()
            .filter(|p| !p.is_moving())
            .any(|p| p.bounds().contains_x(config.spawn_x));
        if !covered {
            let x = (config.spawn_x - SPAWN_PLATFORM_WIDTH / 2.0).max(0.0);
            self.platforms.push(Platform::Flat(Rect::new(
                x,
                config.ground_y,
                SPAWN_PLATFORM_WIDTH,
                PLATFORM_HEIGHT,
            )));
        }
    }

    fn finish(self, config: &LevelConfig) -> Level {
        let last = self
            .platforms
            .iter()
            .filter(|p| !p.is_moving())
            .max_by(|a, b| a.right().total_cmp(&b.right()));
        let finish = match last {
            Some(p) => {
                let x = p.right() - FINISH_WIDTH;
                let surface = p.surface_height_at(x + FINISH_WIDTH / 2.0);
                Rect::new(x, surface - FINISH_HEIGHT, FINISH_WIDTH, FINISH_HEIGHT)
            },
            None => Rect::new(
                config.width - FINISH_WIDTH,
                config.ground_y - FINISH_HEIGHT,
                FINISH_WIDTH,
                FINISH_HEIGHT,
            ),
        };

        Level {
            platforms: self.platforms,
            boxes: self.boxes,
            collectibles: self.collectibles,
            hazards: self.hazards,
            end_x: finish.x,
            width: config.width.max(finish.right()),
            finish,
            spawn_x: config.spawn_x,
            ground_y: config.ground_y,
            tag: self.tag,
        }
    }
}
