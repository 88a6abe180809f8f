use serde::{Deserialize, Serialize};

use skyhop_core::collectible::CollectibleKind;

use crate::geometry::{Platform, Rect};
use crate::level_gen::Level;

/// Downward acceleration per reference frame.
pub const GRAVITY: f32 = 0.5;
/// Horizontal speed per reference frame.
pub const MOVE_SPEED: f32 = 4.0;
/// Upward velocity applied by a jump.
pub const JUMP_POWER: f32 = 12.0;
/// Terminal fall speed. Kept below the thinnest platform so bodies cannot
/// tunnel through a landing band in one reference frame.
pub const MAX_FALL_SPEED: f32 = 15.0;
/// Frame rate the per-frame constants are expressed in.
pub const REFERENCE_FPS: f32 = 60.0;
pub const MAX_GROW_LEVEL: u8 = 3;
pub const MAX_LIVES: u8 = 5;
pub const STARTING_LIVES: u8 = 3;

/// Body size for each grow level.
const BODY_SIZES: [(f32, f32); 4] = [(40.0, 50.0), (60.0, 75.0), (80.0, 100.0), (100.0, 125.0)];

/// Width and height of the body at a grow level (clamped to `0..=3`).
pub fn size_for_grow_level(level: u8) -> (f32, f32) {
    BODY_SIZES[level.min(MAX_GROW_LEVEL) as usize]
}

/// Configurable physics parameters, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: f32,
    pub move_speed: f32,
    pub jump_power: f32,
    pub max_fall_speed: f32,
    pub reference_fps: f32,
    /// Horizontal speed multiplier once the speed unlock is earned.
    pub speed_unlock_multiplier: f32,
    pub viewport_height: f32,
    /// Distance below the viewport at which a body counts as fallen.
    pub fall_margin: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            move_speed: MOVE_SPEED,
            jump_power: JUMP_POWER,
            max_fall_speed: MAX_FALL_SPEED,
            reference_fps: REFERENCE_FPS,
            speed_unlock_multiplier: 1.5,
            viewport_height: 600.0,
            fall_margin: 200.0,
        }
    }
}

/// Simulated state of the local player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub width: f32,
    pub height: f32,
    pub grow_level: u8,
    pub on_ground: bool,
    pub has_double_jump: bool,
    /// One-shot air jump, re-armed on landing.
    pub can_double_jump: bool,
    pub lives: u8,
    pub score: u32,
    pub speed_unlocked: bool,
    /// Jump button state on the previous step, for rising-edge detection.
    pub prev_jump: bool,
}

impl PlayerState {
    /// New body standing with its feet at `feet_y`.
    pub fn new(x: f32, feet_y: f32) -> Self {
        let (width, height) = size_for_grow_level(0);
        Self {
            x,
            y: feet_y - height,
            vx: 0.0,
            vy: 0.0,
            width,
            height,
            grow_level: 0,
            on_ground: false,
            has_double_jump: false,
            can_double_jump: false,
            lives: STARTING_LIVES,
            score: 0,
            speed_unlocked: false,
            prev_jump: false,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn feet_y(&self) -> f32 {
        self.y + self.height
    }

    /// Resize for a grow level, keeping the feet in place.
    pub fn set_grow_level(&mut self, level: u8) {
        let level = level.min(MAX_GROW_LEVEL);
        let feet = self.feet_y();
        let (width, height) = size_for_grow_level(level);
        self.grow_level = level;
        self.width = width;
        self.height = height;
        self.y = feet - height;
    }

    /// Drop the double jump and shrink back to the base size.
    pub fn clear_power_ups(&mut self) {
        self.has_double_jump = false;
        self.can_double_jump = false;
        self.set_grow_level(0);
    }

    /// Stand still at `x` with feet at `feet_y`.
    pub fn place_at(&mut self, x: f32, feet_y: f32) {
        self.x = x;
        self.y = feet_y - self.height;
        self.vx = 0.0;
        self.vy = 0.0;
        self.on_ground = false;
    }

    fn land_at(&mut self, surface: f32) {
        self.y = surface - self.height;
        self.vy = 0.0;
        self.on_ground = true;
        self.can_double_jump = self.has_double_jump;
    }
}

/// Per-step player input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Input {
    /// -1 (left), 0, +1 (right).
    pub direction: f32,
    pub jump: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectedItem {
    pub id: String,
    pub kind: CollectibleKind,
}

/// Collision outcomes of one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepEvents {
    pub landed: bool,
    pub hit_hazard: bool,
    pub collected: Vec<CollectedItem>,
    pub fell_off_world: bool,
    pub reached_finish: bool,
}

/// Advance the body by `dt` seconds against `level`. Moving platforms and
/// collected flags in `level` are updated in place.
pub fn step(
    player: &mut PlayerState,
    level: &mut Level,
    input: &Input,
    dt: f32,
    config: &PhysicsConfig,
) -> StepEvents {
    let mut events = StepEvents::default();
    let frames = if dt.is_finite() {
        (dt * config.reference_fps).max(0.0)
    } else {
        0.0
    };
    let was_grounded = player.on_ground;

    // Horizontal movement (sanitize NaN/Inf)
    let direction = if input.direction.is_finite() {
        input.direction.clamp(-1.0, 1.0)
    } else {
        0.0
    };
    let speed = if player.speed_unlocked {
        config.move_speed * config.speed_unlock_multiplier
    } else {
        config.move_speed
    };
    player.vx = direction * speed;

    // Jump on the rising edge only
    let pressed = input.jump && !player.prev_jump;
    player.prev_jump = input.jump;
    if pressed {
        if player.on_ground {
            player.vy = -config.jump_power;
            player.on_ground = false;
            player.can_double_jump = player.has_double_jump;
        } else if player.has_double_jump && player.can_double_jump {
            player.vy = -config.jump_power;
            player.can_double_jump = false;
        }
    }

    player.vy = (player.vy + config.gravity * frames).min(config.max_fall_speed);

    let prev = player.bounds();
    let dx = player.vx * frames;
    player.x += dx;
    player.y += player.vy * frames;

    // A grounded body walking downhill follows the surface instead of
    // leaving it for a frame.
    let snap = (was_grounded && player.vy >= 0.0).then(|| Snap {
        dx: dx.abs(),
        fall: config.gravity * frames,
    });

    player.on_ground = false;
    for platform in level.platforms.iter().filter(|p| !p.is_moving()) {
        try_land(player, platform, snap);
    }

    resolve_boxes(player, &level.boxes, &prev);

    for platform in level.platforms.iter_mut() {
        if let Platform::Moving(moving) = platform {
            let delta = moving.advance(frames);
            let snapshot = Platform::Moving(*moving);
            if try_land(player, &snapshot, snap) {
                player.x += delta;
            }
        }
    }

    let max_x = (level.width - player.width).max(0.0);
    player.x = player.x.clamp(0.0, max_x);

    collect_items(player, level, &mut events);

    let body = player.bounds();
    events.hit_hazard = level.hazards.iter().any(|h| body.overlaps(h));
    events.fell_off_world = player.y > config.viewport_height + config.fall_margin;
    events.reached_finish = player.x + player.width >= level.end_x;
    events.landed = player.on_ground && !was_grounded;
    events
}

/// How far above a surface a body that was grounded last step may still
/// stick to it.
#[derive(Debug, Clone, Copy)]
struct Snap {
    dx: f32,
    fall: f32,
}

/// Snap onto the platform if the body is moving down with its feet inside
/// the platform's landing band. With `snap`, the band extends upward by the
/// surface drop over the step's horizontal travel.
fn try_land(player: &mut PlayerState, platform: &Platform, snap: Option<Snap>) -> bool {
    if player.vy < 0.0 {
        return false;
    }
    let bounds = platform.bounds();
    if !player.bounds().overlaps_horizontally(&bounds) {
        return false;
    }
    let surface = platform.surface_height_at(player.x + player.width / 2.0);
    let feet = player.feet_y();
    let reach = snap.map_or(0.0, |s| platform.steepness() * s.dx + s.fall);
    if feet >= surface - reach && feet < surface + platform.thickness() {
        player.land_at(surface);
        return true;
    }
    false
}

/// Boxes are solid on every face. The face is picked from the pre-motion
/// edges.
fn resolve_boxes(player: &mut PlayerState, boxes: &[Rect], prev: &Rect) {
    for b in boxes {
        if !player.bounds().overlaps(b) {
            continue;
        }
        if prev.bottom() <= b.y {
            player.land_at(b.y);
        } else if prev.right() <= b.x {
            player.x = b.x - player.width;
        } else if prev.x >= b.right() {
            player.x = b.right();
        } else if prev.y >= b.bottom() {
            player.y = b.bottom();
            if player.vy < 0.0 {
                player.vy = 0.0;
            }
        }
    }
}

fn collect_items(player: &mut PlayerState, level: &mut Level, events: &mut StepEvents) {
    for item in level.collectibles.iter_mut().filter(|c| !c.collected) {
        if !player.bounds().overlaps(&item.bounds) {
            continue;
        }
        let consumed = match item.kind {
            CollectibleKind::Coin => {
                player.score += 1;
                true
            },
            CollectibleKind::Heart => {
                player.lives = (player.lives + 1).min(MAX_LIVES);
                true
            },
            CollectibleKind::DoubleJump => {
                if player.has_double_jump {
                    false
                } else {
                    player.has_double_jump = true;
                    player.can_double_jump = true;
                    true
                }
            },
            CollectibleKind::Grow => {
                let next = (player.grow_level + 1).min(MAX_GROW_LEVEL);
                player.set_grow_level(next);
                true
            },
        };
        if consumed {
            item.collected = true;
            events.collected.push(CollectedItem {
                id: item.id.clone(),
                kind: item.kind,
            });
        }
    }
}
