pub mod config;
pub mod geometry;
pub mod level_gen;
pub mod physics;
pub mod progression;

use rand::SeedableRng;
use rand::rngs::StdRng;

use skyhop_core::collectible::CollectibleKind;

use config::GameConfig;
use level_gen::{Level, generate_level};
use physics::{Input, PlayerState, step};
use progression::{Cooldown, GamePhase, Outcome, Progression};

/// Longest frame the world will simulate in one tick. Longer gaps (a
/// backgrounded tab, a debugger pause) are truncated.
pub const MAX_TICK_DT: f32 = 0.25;

/// Something the caller may want to react to (sounds, network, storage).
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    Collected { id: String, kind: CollectibleKind },
    Died { lives_left: u8 },
    GameOver { score: u32, new_best: bool },
    LevelComplete { level: u32 },
    LevelStarted { level: u32 },
    Respawned,
    SpeedUnlocked,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub events: Vec<WorldEvent>,
}

impl TickReport {
    /// Ids of collectibles consumed this tick.
    pub fn collected_ids(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|e| match e {
            WorldEvent::Collected { id, .. } => Some(id.as_str()),
            _ => None,
        })
    }

    pub fn level_started(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, WorldEvent::LevelStarted { .. }))
    }
}

/// The whole local simulation: level, body and progression.
pub struct World {
    config: GameConfig,
    rng: StdRng,
    level: Level,
    player: PlayerState,
    progression: Progression,
}

impl World {
    /// Fresh world with an OS-seeded level generator.
    pub fn new(config: GameConfig) -> Self {
        Self::from_rng(config, StdRng::from_os_rng())
    }

    /// Fresh world whose level sequence is reproducible from `seed`.
    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self::from_rng(config, StdRng::seed_from_u64(seed))
    }

    fn from_rng(config: GameConfig, mut rng: StdRng) -> Self {
        let level = generate_level(&mut rng, &config.level);
        Self::assemble(config, rng, level)
    }

    /// World starting on a hand-built level. Later levels are generated.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn with_level(config: GameConfig, level: Level) -> Self {
        Self::assemble(config, StdRng::seed_from_u64(0), level)
    }

    fn assemble(config: GameConfig, rng: StdRng, level: Level) -> Self {
        let mut player = PlayerState::new(level.spawn_x, level.ground_y);
        player.lives = config.progression.starting_lives;
        let progression = Progression::new(config.progression.clone());
        Self {
            config,
            rng,
            level,
            player,
            progression,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn phase(&self) -> GamePhase {
        self.progression.phase()
    }

    pub fn level_number(&self) -> u32 {
        self.progression.level_number()
    }

    pub fn best_score(&self) -> u32 {
        self.progression.best_score()
    }

    pub fn set_best_score(&mut self, best: u32) {
        self.progression.set_best_score(best);
    }

    /// Grant the speed unlock (e.g. restored from preferences).
    pub fn unlock_speed(&mut self) {
        self.player.speed_unlocked = true;
    }

    /// Advance the world by `dt` seconds. The step is split into sub-steps no
    /// longer than one reference frame; a held jump fires once.
    pub fn tick(&mut self, input: &Input, dt: f32) -> TickReport {
        let mut report = TickReport::default();
        if !dt.is_finite() || dt <= 0.0 {
            return report;
        }
        let dt = dt.min(MAX_TICK_DT);

        match self.progression.advance_cooldown(dt) {
            Cooldown::Simulate => {},
            Cooldown::Waiting | Cooldown::Halted => return report,
            Cooldown::RespawnElapsed => {
                report.events.push(WorldEvent::Respawned);
                return report;
            },
            Cooldown::TransitionElapsed => {
                self.start_next_level(&mut report);
                return report;
            },
        }

        let frame = 1.0 / self.config.physics.reference_fps.max(1.0);
        let substeps = (dt / frame).ceil().max(1.0) as u32;
        let sub_dt = dt / substeps as f32;

        for _ in 0..substeps {
            let events = step(
                &mut self.player,
                &mut self.level,
                input,
                sub_dt,
                &self.config.physics,
            );
            report
                .events
                .extend(events.collected.iter().map(|c| WorldEvent::Collected {
                    id: c.id.clone(),
                    kind: c.kind,
                }));

            let outcome = self.progression.resolve_step(
                &mut self.player,
                &events,
                self.level.spawn_x,
                self.level.ground_y,
            );
            let event = match outcome {
                Outcome::Continue => continue,
                Outcome::Died { lives_left } => WorldEvent::Died { lives_left },
                Outcome::GameOver { score, new_best } => WorldEvent::GameOver { score, new_best },
                Outcome::LevelComplete => WorldEvent::LevelComplete {
                    level: self.progression.level_number(),
                },
            };
            tracing::debug!(?event, "Progression changed");
            report.events.push(event);
            break;
        }

        report
    }

    /// Back to level 1 with full lives and zero score, from any state.
    pub fn restart(&mut self) -> TickReport {
        self.level = generate_level(&mut self.rng, &self.config.level);
        self.progression
            .restart(&mut self.player, self.level.spawn_x, self.level.ground_y);
        TickReport {
            events: vec![WorldEvent::LevelStarted {
                level: self.progression.level_number(),
            }],
        }
    }

    fn start_next_level(&mut self, report: &mut TickReport) {
        self.level = generate_level(&mut self.rng, &self.config.level);
        let unlocked = self.progression.begin_next_level(
            &mut self.player,
            self.level.spawn_x,
            self.level.ground_y,
        );
        report.events.push(WorldEvent::LevelStarted {
            level: self.progression.level_number(),
        });
        if unlocked {
            report.events.push(WorldEvent::SpeedUnlocked);
        }
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use skyhop_core::collectible::CollectibleKind;

    use crate::geometry::{Platform, Rect};
    use crate::level_gen::{Collectible, Level, PLATFORM_HEIGHT};
    use crate::physics::{Input, PlayerState};
    use crate::{World, WorldEvent};

    pub const GROUND_Y: f32 = 400.0;
    pub const SPAWN_X: f32 = 100.0;

    /// A single flat floor of the given width with nothing on it. The finish
    /// is far beyond the floor so it is never reached.
    pub fn flat_level(width: f32) -> Level {
        let finish = Rect::new(width + 10_000.0, GROUND_Y - 80.0, 40.0, 80.0);
        Level {
            platforms: vec![Platform::Flat(Rect::new(
                0.0,
                GROUND_Y,
                width.max(1.0),
                PLATFORM_HEIGHT,
            ))],
            boxes: Vec::new(),
            collectibles: Vec::new(),
            hazards: Vec::new(),
            end_x: finish.x,
            finish,
            width,
            spawn_x: SPAWN_X,
            ground_y: GROUND_Y,
            tag: "test".to_string(),
        }
    }

    /// Body standing on the level's ground at its spawn point.
    pub fn grounded_player(level: &Level) -> PlayerState {
        let mut p = PlayerState::new(level.spawn_x, level.ground_y);
        p.on_ground = true;
        p
    }

    pub fn pickup(id: &str, kind: CollectibleKind, bounds: Rect) -> Collectible {
        Collectible {
            id: id.to_string(),
            kind,
            bounds,
            collected: false,
        }
    }

    /// Run `n` ticks of the same input, returning every event.
    pub fn run_ticks(world: &mut World, input: &Input, n: usize, dt: f32) -> Vec<WorldEvent> {
        let mut all = Vec::new();
        for _ in 0..n {
            all.extend(world.tick(input, dt).events);
        }
        all
    }
}
