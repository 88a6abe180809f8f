use serde::{Deserialize, Serialize};

use crate::physics::{PlayerState, STARTING_LIVES, StepEvents};

/// Lives, cooldowns and unlock thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    pub starting_lives: u8,
    pub respawn_delay_secs: f32,
    pub transition_delay_secs: f32,
    /// Level number at which the speed unlock is earned.
    pub speed_unlock_level: u32,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            starting_lives: STARTING_LIVES,
            respawn_delay_secs: 1.0,
            transition_delay_secs: 1.5,
            speed_unlock_level: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GamePhase {
    Alive,
    Respawning { remaining: f32 },
    LevelTransition { remaining: f32 },
    GameOver,
}

/// Result of the top-of-tick cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cooldown {
    /// Run the simulator this tick.
    Simulate,
    /// Still cooling down; the body stays frozen.
    Waiting,
    RespawnElapsed,
    TransitionElapsed,
    Halted,
}

/// Outcome of feeding one simulator step into the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Died { lives_left: u8 },
    GameOver { score: u32, new_best: bool },
    LevelComplete,
}

#[derive(Debug, Clone)]
pub struct Progression {
    phase: GamePhase,
    level_number: u32,
    best_score: u32,
    config: ProgressionConfig,
}

impl Progression {
    pub fn new(config: ProgressionConfig) -> Self {
        Self {
            phase: GamePhase::Alive,
            level_number: 1,
            best_score: 0,
            config,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn level_number(&self) -> u32 {
        self.level_number
    }

    pub fn best_score(&self) -> u32 {
        self.best_score
    }

    /// Seed the best score from persisted storage.
    pub fn set_best_score(&mut self, best: u32) {
        self.best_score = best;
    }

    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    /// Decrement any running cooldown by `dt`.
    pub fn advance_cooldown(&mut self, dt: f32) -> Cooldown {
        match self.phase {
            GamePhase::Alive => Cooldown::Simulate,
            GamePhase::GameOver => Cooldown::Halted,
            GamePhase::Respawning { remaining } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    self.phase = GamePhase::Alive;
                    Cooldown::RespawnElapsed
                } else {
                    self.phase = GamePhase::Respawning { remaining };
                    Cooldown::Waiting
                }
            },
            GamePhase::LevelTransition { remaining } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    Cooldown::TransitionElapsed
                } else {
                    self.phase = GamePhase::LevelTransition { remaining };
                    Cooldown::Waiting
                }
            },
        }
    }

    /// Apply the collision outcome of one simulator step. Reaching the finish
    /// wins over a death in the same step, and a hazard plus a fall cost a
    /// single life.
    pub fn resolve_step(
        &mut self,
        player: &mut PlayerState,
        events: &StepEvents,
        spawn_x: f32,
        ground_y: f32,
    ) -> Outcome {
        if self.phase != GamePhase::Alive {
            return Outcome::Continue;
        }

        if events.reached_finish {
            self.phase = GamePhase::LevelTransition {
                remaining: self.config.transition_delay_secs,
            };
            player.vx = 0.0;
            player.vy = 0.0;
            return Outcome::LevelComplete;
        }

        if !(events.hit_hazard || events.fell_off_world) {
            return Outcome::Continue;
        }

        player.lives = player.lives.saturating_sub(1);
        if player.lives == 0 {
            self.phase = GamePhase::GameOver;
            player.vx = 0.0;
            player.vy = 0.0;
            let new_best = player.score > self.best_score;
            if new_best {
                self.best_score = player.score;
            }
            return Outcome::GameOver {
                score: player.score,
                new_best,
            };
        }

        player.clear_power_ups();
        player.place_at(spawn_x, ground_y);
        self.phase = GamePhase::Respawning {
            remaining: self.config.respawn_delay_secs,
        };
        Outcome::Died {
            lives_left: player.lives,
        }
    }

    /// Enter the next level after a transition. Power-ups, grow level, score
    /// and lives carry over. Returns true when the speed unlock is newly
    /// earned.
    pub fn begin_next_level(&mut self, player: &mut PlayerState, spawn_x: f32, ground_y: f32) -> bool {
        self.level_number += 1;
        self.phase = GamePhase::Alive;
        player.place_at(spawn_x, ground_y);
        if !player.speed_unlocked && self.level_number >= self.config.speed_unlock_level {
            player.speed_unlocked = true;
            return true;
        }
        false
    }

    /// Reset to level 1 with a fresh life count and zero score. The speed
    /// unlock is permanent and survives.
    pub fn restart(&mut self, player: &mut PlayerState, spawn_x: f32, ground_y: f32) {
        self.level_number = 1;
        self.phase = GamePhase::Alive;
        player.lives = self.config.starting_lives;
        player.score = 0;
        player.clear_power_ups();
        player.place_at(spawn_x, ground_y);
        player.prev_jump = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPAWN_X: f32 = 100.0;
    const GROUND: f32 = 400.0;

    fn hazard() -> StepEvents {
        StepEvents {
            hit_hazard: true,
            ..StepEvents::default()
        }
    }

    fn powered_player() -> PlayerState {
        let mut p = PlayerState::new(700.0, GROUND);
        p.has_double_jump = true;
        p.can_double_jump = true;
        p.set_grow_level(2);
        p
    }

    #[test]
    fn hazard_costs_one_life_and_respawns() {
        let mut prog = Progression::new(ProgressionConfig::default());
        let mut p = powered_player();
        let out = prog.resolve_step(&mut p, &hazard(), SPAWN_X, GROUND);
        assert_eq!(out, Outcome::Died { lives_left: 2 });
        assert_eq!(p.lives, 2);
        assert!(matches!(prog.phase(), GamePhase::Respawning { .. }));
        assert_eq!(p.x, SPAWN_X);
        assert_eq!(p.feet_y(), GROUND);
    }

    #[test]
    fn death_clears_power_ups_and_grow() {
        let mut prog = Progression::new(ProgressionConfig::default());
        let mut p = powered_player();
        prog.resolve_step(&mut p, &hazard(), SPAWN_X, GROUND);
        assert!(!p.has_double_jump);
        assert!(!p.can_double_jump);
        assert_eq!(p.grow_level, 0);
        assert_eq!((p.width, p.height), (40.0, 50.0));
    }

    #[test]
    fn hazard_and_fall_together_cost_one_life() {
        let mut prog = Progression::new(ProgressionConfig::default());
        let mut p = PlayerState::new(500.0, GROUND);
        let both = StepEvents {
            hit_hazard: true,
            fell_off_world: true,
            ..StepEvents::default()
        };
        prog.resolve_step(&mut p, &both, SPAWN_X, GROUND);
        assert_eq!(p.lives, 2);
    }

    #[test]
    fn respawn_cooldown_returns_to_alive() {
        let mut prog = Progression::new(ProgressionConfig::default());
        let mut p = PlayerState::new(500.0, GROUND);
        prog.resolve_step(&mut p, &hazard(), SPAWN_X, GROUND);
        assert_eq!(prog.advance_cooldown(0.5), Cooldown::Waiting);
        // Further deaths are ignored while respawning.
        prog.resolve_step(&mut p, &hazard(), SPAWN_X, GROUND);
        assert_eq!(p.lives, 2);
        assert_eq!(prog.advance_cooldown(0.6), Cooldown::RespawnElapsed);
        assert_eq!(prog.phase(), GamePhase::Alive);
    }

    #[test]
    fn last_life_ends_the_game() {
        let mut prog = Progression::new(ProgressionConfig::default());
        let mut p = PlayerState::new(500.0, GROUND);
        p.lives = 1;
        p.score = 12;
        let out = prog.resolve_step(&mut p, &hazard(), SPAWN_X, GROUND);
        assert_eq!(
            out,
            Outcome::GameOver {
                score: 12,
                new_best: true
            }
        );
        assert_eq!(prog.phase(), GamePhase::GameOver);
        assert_eq!(prog.best_score(), 12);
        assert_eq!(prog.advance_cooldown(10.0), Cooldown::Halted);
        assert_eq!(prog.phase(), GamePhase::GameOver);
    }

    #[test]
    fn lower_score_keeps_previous_best() {
        let mut prog = Progression::new(ProgressionConfig::default());
        prog.set_best_score(50);
        let mut p = PlayerState::new(500.0, GROUND);
        p.lives = 1;
        p.score = 10;
        let out = prog.resolve_step(&mut p, &hazard(), SPAWN_X, GROUND);
        assert_eq!(
            out,
            Outcome::GameOver {
                score: 10,
                new_best: false
            }
        );
        assert_eq!(prog.best_score(), 50);
    }

    #[test]
    fn finish_beats_same_step_death() {
        let mut prog = Progression::new(ProgressionConfig::default());
        let mut p = PlayerState::new(500.0, GROUND);
        let ev = StepEvents {
            hit_hazard: true,
            reached_finish: true,
            ..StepEvents::default()
        };
        assert_eq!(
            prog.resolve_step(&mut p, &ev, SPAWN_X, GROUND),
            Outcome::LevelComplete
        );
        assert_eq!(p.lives, 3);
    }

    #[test]
    fn transition_keeps_power_ups() {
        let mut prog = Progression::new(ProgressionConfig::default());
        let mut p = powered_player();
        p.score = 4;
        let ev = StepEvents {
            reached_finish: true,
            ..StepEvents::default()
        };
        prog.resolve_step(&mut p, &ev, SPAWN_X, GROUND);
        assert_eq!(prog.advance_cooldown(1.0), Cooldown::Waiting);
        assert_eq!(prog.advance_cooldown(1.0), Cooldown::TransitionElapsed);
        prog.begin_next_level(&mut p, SPAWN_X, GROUND);
        assert_eq!(prog.level_number(), 2);
        assert_eq!(prog.phase(), GamePhase::Alive);
        assert!(p.has_double_jump);
        assert_eq!(p.grow_level, 2);
        assert_eq!(p.score, 4);
        assert_eq!(p.lives, 3);
        assert_eq!(p.x, SPAWN_X);
        assert_eq!(p.feet_y(), GROUND);
    }

    #[test]
    fn speed_unlock_earned_once() {
        let cfg = ProgressionConfig {
            speed_unlock_level: 3,
            ..ProgressionConfig::default()
        };
        let mut prog = Progression::new(cfg);
        let mut p = PlayerState::new(500.0, GROUND);
        assert!(!prog.begin_next_level(&mut p, SPAWN_X, GROUND));
        assert!(prog.begin_next_level(&mut p, SPAWN_X, GROUND));
        assert!(p.speed_unlocked);
        assert!(!prog.begin_next_level(&mut p, SPAWN_X, GROUND));
    }

    #[test]
    fn restart_resets_lives_score_and_level() {
        let mut prog = Progression::new(ProgressionConfig::default());
        let mut p = powered_player();
        p.lives = 1;
        p.score = 9;
        prog.resolve_step(&mut p, &hazard(), SPAWN_X, GROUND);
        assert_eq!(prog.phase(), GamePhase::GameOver);
        prog.restart(&mut p, SPAWN_X, GROUND);
        assert_eq!(prog.phase(), GamePhase::Alive);
        assert_eq!(prog.level_number(), 1);
        assert_eq!(p.lives, 3);
        assert_eq!(p.score, 0);
        assert!(!p.has_double_jump);
        assert_eq!(p.grow_level, 0);
        assert_eq!(prog.best_score(), 9);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn each_death_costs_exactly_one_life(
                starting in 1u8..=5,
                hazards in 1usize..10,
            ) {
                let mut prog = Progression::new(ProgressionConfig::default());
                let mut p = PlayerState::new(500.0, GROUND);
                p.lives = starting;
                for _ in 0..hazards {
                    let before = p.lives;
                    let out = prog.resolve_step(&mut p, &hazard(), SPAWN_X, GROUND);
                    match out {
                        Outcome::Died { lives_left } => {
                            prop_assert_eq!(lives_left, before - 1);
                            prop_assert_eq!(prog.advance_cooldown(2.0), Cooldown::RespawnElapsed);
                        },
                        Outcome::GameOver { .. } => {
                            prop_assert_eq!(before, 1);
                            prop_assert_eq!(p.lives, 0);
                        },
                        Outcome::Continue => {
                            prop_assert_eq!(prog.phase(), GamePhase::GameOver);
                            prop_assert_eq!(p.lives, 0);
                        },
                        Outcome::LevelComplete => prop_assert!(false, "no finish reached"),
                    }
                }
            }
        }
    }
}
