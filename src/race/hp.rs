//! Stamina model: HP depletion per step and the last-spurt speed search.

use crate::race::course::Course;
use crate::race::horse::HorseStats;
use crate::race::params::{GroundCondition, Surface};
use crate::race::rng::Rng;

/// Snapshot of the solver state the HP model reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HpState {
    pub pos: f64,
    pub speed: f64,
    pub phase: u8,
    /// Position-keep pace-down consumes less HP.
    pub pace_down: bool,
}

pub trait HpPolicy: Send {
    /// Computes max HP from the horse as it stands after gate skills.
    fn init(&mut self, horse: &HorseStats);
    fn tick(&mut self, state: &HpState, dt: f64);
    fn hp(&self) -> f64;
    fn has_remaining_hp(&self) -> bool;
    /// Remaining HP as a fraction of max, clamped to `[0, 1]`.
    fn hp_ratio(&self) -> f64;
    /// Adds `modifier × maxHp`, never exceeding max HP.
    fn recover(&mut self, modifier: f64);
    /// Returns `(transition, speed)`: the position to begin the last spurt and the speed to hold.
    /// A transition of `-1` means "spurt now at `max_speed`".
    fn last_spurt_pair(&mut self, state: &HpState, max_speed: f64, base_target_speed2: f64) -> (f64, f64);
}

/// Unlimited stamina. Used for the virtual pacer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHpPolicy;

impl HpPolicy for NoopHpPolicy {
    fn init(&mut self, _horse: &HorseStats) {}

    fn tick(&mut self, _state: &HpState, _dt: f64) {}

    fn hp(&self) -> f64 {
        f64::INFINITY
    }

    fn has_remaining_hp(&self) -> bool {
        true
    }

    fn hp_ratio(&self) -> f64 {
        1.0
    }

    fn recover(&mut self, _modifier: f64) {}

    fn last_spurt_pair(&mut self, _state: &HpState, max_speed: f64, _base_target_speed2: f64) -> (f64, f64) {
        (-1.0, max_speed)
    }
}

const HP_STRATEGY_COEFFICIENT: [f64; 6] = [0.0, 0.95, 0.89, 1.0, 0.995, 0.86];
const HP_GROUND_MODIFIER: [[f64; 4]; 2] = [[1.0, 1.0, 1.02, 1.02], [1.0, 1.0, 1.01, 1.02]];
const PACE_DOWN_HP_MODIFIER: f64 = 0.6;
/// Distance before the finish the spurt search leaves as margin.
const SPURT_MARGIN: f64 = 60.0;

#[derive(Debug, Clone)]
pub struct GameHpPolicy {
    distance: f64,
    base_speed: f64,
    ground_modifier: f64,
    rng: Rng,
    max_hp: f64,
    hp: f64,
    guts_modifier: f64,
    subpar_accept_chance: u32,
}

#[derive(Debug, Clone, Copy)]
struct SpurtCandidate {
    transition: f64,
    speed: f64,
    time: f64,
}

impl GameHpPolicy {
    pub fn new(course: &Course, ground: GroundCondition, rng: Rng) -> Self {
        let surface = match course.surface {
            Surface::Turf => 0,
            Surface::Dirt => 1,
        };
        Self {
            distance: course.distance,
            base_speed: course.base_speed(),
            ground_modifier: HP_GROUND_MODIFIER[surface][ground.index()],
            rng,
            max_hp: 1.0,
            hp: 1.0,
            guts_modifier: 1.0,
            subpar_accept_chance: 0,
        }
    }

    pub fn max_hp(&self) -> f64 {
        self.max_hp
    }

    fn hp_per_second(&self, speed: f64, phase: u8, pace_down: bool) -> f64 {
        let status = if pace_down { PACE_DOWN_HP_MODIFIER } else { 1.0 };
        let guts = if phase >= 2 { self.guts_modifier } else { 1.0 };
        let x = speed - self.base_speed + 12.0;
        20.0 * x * x / 144.0 * status * self.ground_modifier * guts
    }
}

impl HpPolicy for GameHpPolicy {
    fn init(&mut self, horse: &HorseStats) {
        self.max_hp =
            0.8 * HP_STRATEGY_COEFFICIENT[horse.strategy.index()] * horse.stamina + self.distance;
        self.hp = self.max_hp;
        self.guts_modifier = 1.0 + 200.0 / (600.0 * horse.guts).sqrt();
        self.subpar_accept_chance = ((15.0 + 0.05 * horse.wisdom) * 1000.0).round() as u32;
    }

    fn tick(&mut self, state: &HpState, dt: f64) {
        self.hp -= self.hp_per_second(state.speed, state.phase, state.pace_down) * dt;
    }

    fn hp(&self) -> f64 {
        self.hp
    }

    fn has_remaining_hp(&self) -> bool {
        self.hp > 0.0
    }

    fn hp_ratio(&self) -> f64 {
        (self.hp / self.max_hp).clamp(0.0, 1.0)
    }

    fn recover(&mut self, modifier: f64) {
        self.hp = self.max_hp.min(self.hp + self.max_hp * modifier);
    }

    fn last_spurt_pair(&mut self, state: &HpState, max_speed: f64, base_target_speed2: f64) -> (f64, f64) {
        let remaining = self.distance - state.pos - SPURT_MARGIN;
        let full_spurt_hp = self.hp_per_second(max_speed, 2, false) * remaining.max(0.0) / max_speed;
        if self.hp >= full_spurt_hp {
            return (-1.0, max_speed);
        }

        let b = base_target_speed2;
        let hb = self.hp_per_second(b, 2, false);
        let mut candidates = Vec::new();
        let mut speed = max_speed - 0.1;
        while speed >= b {
            let hv = self.hp_per_second(speed, 2, false);
            let denom = b * hv - hb * speed;
            let budget = if denom > 0.0 {
                ((b * self.hp - hb * remaining) / denom).max(0.0)
            } else {
                0.0
            };
            let spurt_time = (remaining / speed).min(budget);
            let spurt_distance = spurt_time * speed;
            candidates.push(SpurtCandidate {
                transition: self.distance - spurt_distance,
                speed,
                time: (remaining - spurt_distance) / b + spurt_time,
            });
            speed -= 0.1;
        }
        if candidates.is_empty() {
            return (-1.0, max_speed);
        }

        candidates.sort_by(|a, c| a.time.total_cmp(&c.time));
        for candidate in &candidates {
            if self.rng.uniform(100_000) <= self.subpar_accept_chance {
                return (candidate.transition, candidate.speed);
            }
        }
        let worst = candidates[candidates.len() - 1];
        (worst.transition, worst.speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::race::course::tests::sample_course;
    use crate::race::horse::tests::sample_horse;
    use crate::race::horse::build_base_stats;
    use crate::race::params::Mood;

    fn policy() -> GameHpPolicy {
        let course = sample_course();
        let mut hp = GameHpPolicy::new(&course, GroundCondition::Good, Rng::new(7));
        let stats = build_base_stats(&sample_horse(), Mood::new(0).unwrap());
        hp.init(&stats);
        hp
    }

    #[test]
    fn max_hp_uses_strategy_coefficient() {
        let hp = policy();
        assert!((hp.max_hp() - (0.8 * 0.95 * 1200.0 + 2000.0)).abs() < 1e-9);
        assert!(hp.has_remaining_hp());
        assert_eq!(hp.hp_ratio(), 1.0);
    }

    #[test]
    fn recover_never_exceeds_max() {
        let mut hp = policy();
        let state = HpState {
            pos: 0.0,
            speed: 20.0,
            phase: 0,
            pace_down: false,
        };
        hp.tick(&state, 1.0);
        assert!(hp.hp() < hp.max_hp());
        hp.recover(0.5);
        assert_eq!(hp.hp(), hp.max_hp());
    }

    #[test]
    fn remaining_hp_false_at_zero() {
        let mut hp = policy();
        let state = HpState {
            pos: 0.0,
            speed: 20.0,
            phase: 0,
            pace_down: false,
        };
        let per_second = 20.0 * 12.0 * 12.0 / 144.0;
        hp.tick(&state, hp.max_hp() / per_second);
        assert!(hp.hp().abs() < 1e-6);
        hp.tick(&state, 1.0);
        assert!(!hp.has_remaining_hp());
        assert_eq!(hp.hp_ratio(), 0.0);
    }

    #[test]
    fn pace_down_consumes_less() {
        let mut normal = policy();
        let mut paced = policy();
        let mut state = HpState {
            pos: 0.0,
            speed: 21.0,
            phase: 1,
            pace_down: false,
        };
        normal.tick(&state, 1.0);
        state.pace_down = true;
        paced.tick(&state, 1.0);
        assert!(paced.hp() > normal.hp());
    }

    #[test]
    fn full_hp_spurts_immediately() {
        let mut hp = policy();
        let state = HpState {
            pos: 1400.0,
            speed: 20.0,
            phase: 2,
            pace_down: false,
        };
        assert_eq!(hp.last_spurt_pair(&state, 24.0, 20.0), (-1.0, 24.0));
    }

    #[test]
    fn low_hp_picks_slower_speed_and_later_transition() {
        let mut hp = policy();
        let drain = HpState {
            pos: 0.0,
            speed: 20.0,
            phase: 0,
            pace_down: false,
        };
        hp.tick(&drain, (hp.max_hp() - 300.0) / 20.0);
        let state = HpState {
            pos: 1400.0,
            speed: 20.0,
            phase: 2,
            pace_down: false,
        };
        let (transition, speed) = hp.last_spurt_pair(&state, 24.0, 20.0);
        assert!(speed < 24.0);
        assert!(speed >= 20.0);
        assert!(transition >= 1400.0 && transition <= 2000.0);
    }

    #[test]
    fn noop_never_runs_out() {
        let mut noop = NoopHpPolicy;
        let state = HpState {
            pos: 0.0,
            speed: 30.0,
            phase: 2,
            pace_down: false,
        };
        noop.tick(&state, 1e9);
        assert!(noop.has_remaining_hp());
        assert_eq!(noop.last_spurt_pair(&state, 25.0, 20.0), (-1.0, 25.0));
    }
}
