//! Per-trial race physics. One `RaceSolver` simulates one horse over one course with a fixed set of
//! pending skills, advancing in fixed time steps.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::conditions::{ActivateBucket, RaceState};
use crate::race::accumulator::CompensatedAccumulator;
use crate::race::course::{phase_start, Course, Slope};
use crate::race::horse::HorseStats;
use crate::race::hp::{HpPolicy, HpState};
use crate::race::rng::Rng;
use crate::race::skill::{Effect, EffectKind, PendingSkill, Perspective, Rarity};

pub const DEFAULT_TIMESTEP: f64 = 1.0 / 15.0;

const BASE_ACCEL: f64 = 0.0006;
const UPHILL_BASE_ACCEL: f64 = 0.0004;
const START_DASH_ACCEL: f64 = 24.0;
const START_SPEED: f64 = 3.0;
const HP_OUT_DECELERATION: f64 = -1.2;
const PHASE_DECELERATION: [f64; 3] = [-1.2, -0.8, -1.0];
const UNBOUNDED_SPEED: f64 = 9999.0;

const SPEED_STRATEGY_PHASE_COEF: [[f64; 3]; 6] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.98, 0.962],
    [0.978, 0.991, 0.975],
    [0.938, 0.998, 0.994],
    [0.931, 1.0, 1.0],
    [1.063, 0.962, 0.95],
];
const DISTANCE_PROFICIENCY_MODIFIER: [f64; 8] = [1.05, 1.0, 0.9, 0.8, 0.6, 0.4, 0.2, 0.1];
const ACCEL_STRATEGY_PHASE_COEF: [[f64; 3]; 6] = [
    [0.0, 0.0, 0.0],
    [1.0, 1.0, 0.996],
    [0.985, 1.0, 0.996],
    [0.975, 1.0, 1.0],
    [0.945, 1.0, 0.997],
    [1.17, 0.94, 0.956],
];
const GROUND_PROFICIENCY_MODIFIER: [f64; 8] = [1.05, 1.0, 0.9, 0.8, 0.7, 0.5, 0.3, 0.1];
const DISTANCE_ACCEL_PROFICIENCY_MODIFIER: [f64; 8] = [1.0, 1.0, 1.0, 1.0, 1.0, 0.6, 0.5, 0.4];

const SECTION_COUNT: usize = 24;
/// Position keep applies up to this many sections into the race.
const POSITION_KEEP_SECTIONS: f64 = 10.0;
const POSITION_KEEP_CHECK_INTERVAL: f64 = 2.0;
const POSITION_KEEP_MIN_GAP: [f64; 6] = [0.0, 0.0, 3.0, 6.5, 7.5, 0.0];
const POSITION_KEEP_MAX_GAP: [f64; 6] = [0.0, 0.0, 5.0, 7.0, 8.0, 0.0];
const PACE_DOWN_COEF: f64 = 0.915;
const PACE_UP_COEF: f64 = 1.04;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PositionKeep {
    Normal,
    PaceDown,
    PaceUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillEventKind {
    Activated,
    Deactivated,
}

/// Skill activation log entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillEvent {
    pub kind: SkillEventKind,
    pub skill_id: String,
    pub perspective: Perspective,
    pub t: f64,
    pub pos: f64,
}

#[derive(Debug, Clone)]
struct ActiveSkill {
    skill_id: String,
    perspective: Perspective,
    effects: Vec<(EffectKind, f64)>,
    remaining: f64,
}

/// Everything a solver needs; consumed by [RaceSolver::new].
pub struct SolverParams {
    pub horse: HorseStats,
    pub course: Arc<Course>,
    pub hp: Box<dyn HpPolicy>,
    pub rng: Rng,
    pub skills: Vec<PendingSkill>,
    /// Virtual lead horse used for position keep.
    pub pacer: Option<Box<RaceSolver>>,
    pub timestep: f64,
}

pub struct RaceSolver {
    horse: HorseStats,
    course: Arc<Course>,
    hp: Box<dyn HpPolicy>,
    rng: Rng,
    pacer: Option<Box<RaceSolver>>,
    dt: f64,

    accumulate_time: f64,
    pos: f64,
    current_speed: f64,
    accel: f64,
    target_speed: f64,
    phase: u8,
    next_phase_transition: f64,

    start_delay: f64,
    start_delay_accumulator: f64,
    is_start_dash: bool,

    last_spurt: bool,
    spurt_searched: bool,
    last_spurt_transition: f64,
    last_spurt_speed: f64,

    section_length: f64,
    section_modifier: Vec<f64>,
    hills: Vec<Slope>,
    current_hill: Option<Slope>,

    base_speed: f64,
    min_speed: f64,
    base_target_speed: [f64; 3],
    max_spurt_speed: f64,
    base_accel: [f64; 3],
    uphill_accel: [f64; 3],

    target_speed_mod: CompensatedAccumulator,
    current_speed_mod: CompensatedAccumulator,
    accel_mod: CompensatedAccumulator,

    pending: Vec<PendingSkill>,
    active: Vec<ActiveSkill>,
    pending_removal: HashSet<String>,
    used_skills: HashSet<String>,
    activate_count: [u32; 4],
    heal_count: u32,
    evolved_duration_scale: f64,

    position_keep: PositionKeep,
    next_keep_check: f64,

    events: Vec<SkillEvent>,
}

impl RaceSolver {
    pub fn new(params: SolverParams) -> Self {
        let course = params.course;
        let distance = course.distance;
        let mut hills: Vec<Slope> = course.slopes.iter().filter(|s| s.is_uphill()).copied().collect();
        hills.reverse();

        let mut solver = Self {
            horse: params.horse,
            hp: params.hp,
            rng: params.rng,
            pacer: params.pacer,
            dt: params.timestep,
            accumulate_time: 0.0,
            pos: 0.0,
            current_speed: START_SPEED,
            accel: 0.0,
            target_speed: 0.0,
            phase: 0,
            next_phase_transition: phase_start(distance, 1),
            start_delay: 0.0,
            start_delay_accumulator: 0.0,
            is_start_dash: true,
            last_spurt: false,
            spurt_searched: false,
            last_spurt_transition: -1.0,
            last_spurt_speed: 0.0,
            section_length: distance / SECTION_COUNT as f64,
            section_modifier: Vec::new(),
            hills,
            current_hill: None,
            base_speed: course.base_speed(),
            min_speed: 0.0,
            base_target_speed: [0.0; 3],
            max_spurt_speed: 0.0,
            base_accel: [0.0; 3],
            uphill_accel: [0.0; 3],
            target_speed_mod: CompensatedAccumulator::new(0.0),
            current_speed_mod: CompensatedAccumulator::new(0.0),
            accel_mod: CompensatedAccumulator::new(START_DASH_ACCEL),
            pending: params.skills,
            active: Vec::new(),
            pending_removal: HashSet::new(),
            used_skills: HashSet::new(),
            activate_count: [0; 4],
            heal_count: 0,
            evolved_duration_scale: 1.0,
            position_keep: PositionKeep::Normal,
            next_keep_check: 0.0,
            events: Vec::new(),
            course,
        };

        solver.start_delay = 0.1 * solver.rng.random();
        solver.recompute_derived();
        // Gate skills may rescale the start delay before it starts counting down.
        solver.process_skills();
        solver.start_delay_accumulator = solver.start_delay;
        solver.hp.init(&solver.horse);
        solver.section_modifier = solver.draw_section_modifiers();
        solver.update_target_speed();
        solver
    }

    fn draw_section_modifiers(&mut self) -> Vec<f64> {
        let w = self.horse.wisdom;
        let upper = (w / 5500.0) * (w * 0.1).log10();
        let mut out: Vec<f64> = (0..SECTION_COUNT)
            .map(|_| {
                let r = self.rng.random();
                self.base_speed * (upper - 0.65 + r * 0.65) / 100.0
            })
            .collect();
        out.push(0.0);
        out
    }

    fn recompute_derived(&mut self) {
        let h = &self.horse;
        let s = h.strategy.index();
        let dist_prof = DISTANCE_PROFICIENCY_MODIFIER[h.distance_aptitude.index()];
        let speed_term = (500.0 * h.speed).sqrt() * dist_prof * 0.002;
        for phase in 0..3 {
            self.base_target_speed[phase] =
                self.base_speed * SPEED_STRATEGY_PHASE_COEF[s][phase] + if phase == 2 { speed_term } else { 0.0 };
        }
        self.max_spurt_speed = (self.base_target_speed[2] + 0.01 * self.base_speed) * 1.05
            + speed_term
            + (450.0 * h.guts).powf(0.597) * 0.0001;
        self.min_speed = 0.85 * self.base_speed + (200.0 * h.guts).sqrt() * 0.001;

        let accel_scale = (500.0 * h.power).sqrt()
            * GROUND_PROFICIENCY_MODIFIER[h.surface_aptitude.index()]
            * DISTANCE_ACCEL_PROFICIENCY_MODIFIER[h.distance_aptitude.index()];
        for phase in 0..3 {
            let coef = ACCEL_STRATEGY_PHASE_COEF[s][phase];
            self.base_accel[phase] = BASE_ACCEL * accel_scale * coef;
            self.uphill_accel[phase] = UPHILL_BASE_ACCEL * accel_scale * coef;
        }
    }

    /// Advances one time step.
    pub fn step(&mut self) {
        let dt = self.dt;
        if self.start_delay_accumulator > 0.0 {
            self.start_delay_accumulator -= dt;
            self.accumulate_time += dt;
            if self.start_delay_accumulator > 0.0 {
                return;
            }
        }

        if let Some(pacer) = self.pacer.as_mut() {
            if !pacer.is_finished() {
                pacer.step();
            }
        }

        let max = self.max_speed();
        let half_v = ((self.current_speed + self.accel * dt).min(max) - self.current_speed) / 2.0;
        self.pos += (self.current_speed + half_v + self.current_speed_mod.value()) * dt;
        self.hp.tick(&self.hp_state(), dt);
        self.accumulate_time += dt;
        for skill in &mut self.active {
            skill.remaining -= dt;
        }
        self.update_hills();
        self.update_phase();
        self.process_skills();
        self.update_position_keep();
        self.update_last_spurt();
        self.update_target_speed();
        self.apply_forces();

        self.current_speed = (self.current_speed + self.accel * dt).min(self.max_speed());
        if self.is_start_dash && self.current_speed >= 0.85 * self.base_speed {
            self.is_start_dash = false;
            self.accel_mod.add(-START_DASH_ACCEL);
        }
        if !self.is_start_dash {
            self.current_speed = self.current_speed.max(self.min_speed);
        }
    }

    /// Steps until the finish line is crossed.
    pub fn run_to_finish(&mut self) {
        while !self.is_finished() {
            self.step();
        }
    }

    /// Force-deactivates every still-active skill so activation and deactivation events balance.
    pub fn cleanup(&mut self) {
        let active = std::mem::take(&mut self.active);
        for skill in active {
            self.deactivate(skill);
        }
    }

    fn max_speed(&self) -> f64 {
        if self.is_start_dash {
            self.target_speed.min(0.85 * self.base_speed)
        } else if self.current_speed > self.target_speed {
            UNBOUNDED_SPEED
        } else {
            self.target_speed
        }
    }

    fn hp_state(&self) -> HpState {
        HpState {
            pos: self.pos,
            speed: self.current_speed,
            phase: self.phase,
            pace_down: self.position_keep == PositionKeep::PaceDown,
        }
    }

    fn physics_phase(&self) -> usize {
        usize::from(self.phase.min(2))
    }

    fn update_hills(&mut self) {
        if let Some(hill) = self.current_hill {
            if self.pos >= hill.end() {
                self.current_hill = None;
            }
        }
        if self.current_hill.is_some() {
            return;
        }
        while let Some(next) = self.hills.last().copied() {
            if self.pos >= next.end() {
                self.hills.pop();
                continue;
            }
            if self.pos >= next.start {
                self.current_hill = self.hills.pop();
            }
            break;
        }
    }

    fn update_phase(&mut self) {
        while self.phase < 3 && self.pos >= self.next_phase_transition {
            self.phase += 1;
            self.next_phase_transition = if self.phase < 3 {
                phase_start(self.course.distance, self.phase + 1)
            } else {
                f64::INFINITY
            };
        }
    }

    fn process_skills(&mut self) {
        let mut i = 0;
        while i < self.active.len() {
            if self.active[i].remaining <= 0.0 {
                let skill = self.active.remove(i);
                self.deactivate(skill);
            } else {
                i += 1;
            }
        }

        let mut i = 0;
        while i < self.pending.len() {
            let skill = &self.pending[i];
            if self.pos >= skill.trigger.end || self.pending_removal.contains(&skill.skill_id) {
                self.pending.remove(i);
                continue;
            }
            if self.pos >= skill.trigger.start {
                let extra = Arc::clone(&skill.extra);
                if extra.evaluate(&*self) {
                    let skill = self.pending.remove(i);
                    self.activate(skill);
                    continue;
                }
            }
            i += 1;
        }
    }

    fn activate(&mut self, skill: PendingSkill) {
        let own = skill.perspective == Perspective::Own;
        // Logged before the effects so skills pulled in by this one appear after it.
        if own {
            self.used_skills.insert(skill.skill_id.clone());
            self.activate_count[usize::from(self.phase)] += 1;
        }
        self.events.push(SkillEvent {
            kind: SkillEventKind::Activated,
            skill_id: skill.skill_id.clone(),
            perspective: skill.perspective,
            t: self.accumulate_time,
            pos: self.pos,
        });
        let mut timed = Vec::new();
        let mut duration: f64 = 0.0;
        let mut stats_changed = false;

        for effect in skill.effects.iter() {
            let Effect { kind, modifier: m, duration: d } = *effect;
            match kind {
                EffectKind::SpeedUp => {
                    self.horse.speed = (self.horse.speed + m).max(1.0);
                    stats_changed = true;
                }
                EffectKind::StaminaUp => {
                    self.horse.stamina = (self.horse.stamina + m).max(1.0);
                    self.horse.raw_stamina = (self.horse.raw_stamina + m).max(1.0);
                }
                EffectKind::PowerUp => {
                    self.horse.power = (self.horse.power + m).max(1.0);
                    stats_changed = true;
                }
                EffectKind::GutsUp => {
                    self.horse.guts = (self.horse.guts + m).max(1.0);
                    stats_changed = true;
                }
                EffectKind::WisdomUp => {
                    self.horse.wisdom = (self.horse.wisdom + m).max(1.0);
                }
                EffectKind::MultiplyStartDelay => self.start_delay *= m,
                EffectKind::SetStartDelay => self.start_delay = m,
                EffectKind::Recovery => {
                    if own && m > 0.0 {
                        self.heal_count += 1;
                    }
                    self.hp.recover(m);
                    if self.phase >= 2 && !self.last_spurt {
                        self.spurt_searched = false;
                    }
                }
                EffectKind::ActivateRandomGold => self.activate_random_gold(m.round().max(0.0) as usize),
                EffectKind::ExtendEvolvedDuration => self.evolved_duration_scale = m,
                EffectKind::TargetSpeed => {
                    self.target_speed_mod.add(m);
                    timed.push((kind, m));
                    duration = duration.max(d);
                }
                EffectKind::Accel => {
                    self.accel_mod.add(m);
                    timed.push((kind, m));
                    duration = duration.max(d);
                }
                EffectKind::CurrentSpeed | EffectKind::CurrentSpeedWithNaturalDeceleration => {
                    self.current_speed_mod.add(m);
                    timed.push((kind, m));
                    duration = duration.max(d);
                }
            }
        }
        if stats_changed {
            self.recompute_derived();
        }
        if skill.rarity == Rarity::Evolution {
            duration *= self.evolved_duration_scale;
        }
        if !timed.is_empty() {
            self.active.push(ActiveSkill {
                skill_id: skill.skill_id,
                perspective: skill.perspective,
                effects: timed,
                remaining: duration,
            });
        }
    }

    fn deactivate(&mut self, skill: ActiveSkill) {
        for &(kind, m) in &skill.effects {
            match kind {
                EffectKind::TargetSpeed => self.target_speed_mod.add(-m),
                EffectKind::Accel => self.accel_mod.add(-m),
                EffectKind::CurrentSpeed => self.current_speed_mod.add(-m),
                EffectKind::CurrentSpeedWithNaturalDeceleration => {
                    self.current_speed_mod.add(-m);
                    self.current_speed += m;
                }
                _ => {}
            }
        }
        self.events.push(SkillEvent {
            kind: SkillEventKind::Deactivated,
            skill_id: skill.skill_id,
            perspective: skill.perspective,
            t: self.accumulate_time,
            pos: self.pos,
        });
    }

    /// Activates `n` randomly chosen pending gold/evolution skills of this horse that carry no stat-up effect.
    fn activate_random_gold(&mut self, n: usize) {
        let mut candidates: Vec<usize> = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                p.perspective == Perspective::Own
                    && p.rarity.is_high_rarity()
                    && !p.effects.iter().any(|e| e.kind.is_stat_up())
                    && !self.pending_removal.contains(&p.skill_id)
            })
            .map(|(i, _)| i)
            .collect();
        let mut rng = self.rng.fork();
        for i in (1..candidates.len()).rev() {
            let j = rng.uniform(i as u32 + 1) as usize;
            candidates.swap(i, j);
        }
        let chosen: Vec<PendingSkill> = candidates
            .into_iter()
            .take(n)
            .map(|i| self.pending[i].clone())
            .collect();
        for skill in chosen {
            self.pending_removal.insert(skill.skill_id.clone());
            self.activate(skill);
        }
    }

    fn has_active_speed_skill(&self) -> bool {
        self.active
            .iter()
            .any(|s| s.effects.iter().any(|(kind, m)| kind.is_speed_class() && *m > 0.0))
    }

    fn update_position_keep(&mut self) {
        let Some(pacer_pos) = self.pacer.as_ref().map(|p| p.pos) else {
            return;
        };
        if self.horse.strategy.is_front_runner() || self.pos >= self.section_length * POSITION_KEEP_SECTIONS {
            self.position_keep = PositionKeep::Normal;
            return;
        }
        let s = self.horse.strategy.index();
        let scale = 0.0008 * (self.course.distance - 1000.0) + 1.0;
        let min_gap = POSITION_KEEP_MIN_GAP[s] * scale;
        let max_gap = POSITION_KEEP_MAX_GAP[s] * scale;
        let gap = pacer_pos - self.pos;

        match self.position_keep {
            PositionKeep::PaceDown => {
                if gap > max_gap || self.has_active_speed_skill() {
                    self.position_keep = PositionKeep::Normal;
                }
            }
            PositionKeep::PaceUp => {
                if gap < min_gap {
                    self.position_keep = PositionKeep::Normal;
                }
            }
            PositionKeep::Normal => {
                if self.accumulate_time < self.next_keep_check {
                    return;
                }
                self.next_keep_check = self.accumulate_time + POSITION_KEEP_CHECK_INTERVAL;
                if gap < min_gap && !self.has_active_speed_skill() {
                    self.position_keep = PositionKeep::PaceDown;
                } else if gap > max_gap {
                    let chance = 20.0 * (self.horse.wisdom * 0.1).log10();
                    if self.rng.random() * 100.0 < chance {
                        self.position_keep = PositionKeep::PaceUp;
                    }
                }
            }
        }
    }

    fn update_last_spurt(&mut self) {
        if self.last_spurt || self.phase < 2 {
            return;
        }
        if !self.spurt_searched {
            let state = self.hp_state();
            let (transition, speed) =
                self.hp
                    .last_spurt_pair(&state, self.max_spurt_speed, self.base_target_speed[2]);
            self.last_spurt_transition = transition;
            self.last_spurt_speed = speed;
            self.spurt_searched = true;
        }
        if self.pos >= self.last_spurt_transition {
            self.last_spurt = true;
        }
    }

    fn update_target_speed(&mut self) {
        if !self.hp.has_remaining_hp() {
            self.target_speed = self.min_speed;
            return;
        }
        let mut target = if self.last_spurt {
            self.last_spurt_speed
        } else {
            let keep = match self.position_keep {
                PositionKeep::Normal => 1.0,
                PositionKeep::PaceDown => PACE_DOWN_COEF,
                PositionKeep::PaceUp => PACE_UP_COEF,
            };
            let section = ((self.pos / self.section_length).floor().max(0.0) as usize).min(SECTION_COUNT);
            self.base_target_speed[self.physics_phase()] * keep + self.section_modifier.get(section).copied().unwrap_or(0.0)
        };
        target += self.target_speed_mod.value();
        if let Some(hill) = self.current_hill {
            target -= hill.grade * 200.0 / self.horse.power;
            target = target.max(self.min_speed);
        }
        self.target_speed = target;
    }

    fn apply_forces(&mut self) {
        if !self.hp.has_remaining_hp() {
            self.accel = HP_OUT_DECELERATION;
            return;
        }
        let phase = self.physics_phase();
        if self.current_speed > self.target_speed {
            self.accel = PHASE_DECELERATION[phase];
            return;
        }
        let base = if self.current_hill.is_some() {
            self.uphill_accel[phase]
        } else {
            self.base_accel[phase]
        };
        self.accel = base + self.accel_mod.value();
    }

    pub fn pos(&self) -> f64 {
        self.pos
    }

    pub fn current_speed(&self) -> f64 {
        self.current_speed
    }

    pub fn target_speed(&self) -> f64 {
        self.target_speed
    }

    pub fn phase(&self) -> u8 {
        self.phase
    }

    pub fn hp(&self) -> f64 {
        self.hp.hp()
    }

    pub fn elapsed(&self) -> f64 {
        self.accumulate_time
    }

    pub fn timestep(&self) -> f64 {
        self.dt
    }

    pub fn course_distance(&self) -> f64 {
        self.course.distance
    }

    pub fn is_finished(&self) -> bool {
        self.pos >= self.course.distance
    }

    pub fn in_last_spurt(&self) -> bool {
        self.last_spurt
    }

    pub fn horse(&self) -> &HorseStats {
        &self.horse
    }

    pub fn events(&self) -> &[SkillEvent] {
        &self.events
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn net_modifiers(&self) -> (f64, f64, f64) {
        (
            self.target_speed_mod.value(),
            self.current_speed_mod.value(),
            self.accel_mod.value(),
        )
    }
}

impl RaceState for RaceSolver {
    fn accumulate_time(&self) -> f64 {
        self.accumulate_time
    }

    fn hp_ratio(&self) -> f64 {
        self.hp.hp_ratio()
    }

    fn is_last_spurt(&self) -> bool {
        self.last_spurt
    }

    fn start_delay(&self) -> f64 {
        self.start_delay
    }

    fn activate_count(&self, bucket: ActivateBucket) -> u32 {
        let [start, middle, late, last] = self.activate_count;
        match bucket {
            ActivateBucket::All => start + middle + late + last,
            ActivateBucket::Start => start,
            ActivateBucket::Middle => middle,
            ActivateBucket::EndAfter => late + last,
        }
    }

    fn heal_count(&self) -> u32 {
        self.heal_count
    }

    fn has_used_skill(&self, skill_id: &str) -> bool {
        self.used_skills.contains(skill_id)
    }

    fn used_skill_count(&self) -> usize {
        self.used_skills.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Predicate;
    use crate::race::course::tests::sample_course;
    use crate::race::horse::build_base_stats;
    use crate::race::horse::tests::sample_horse;
    use crate::race::horse::Strategy;
    use crate::race::hp::{GameHpPolicy, NoopHpPolicy};
    use crate::race::params::{GroundCondition, Mood};
    use crate::race::region::Region;

    fn pending(id: &str, start: f64, effects: Vec<Effect>) -> PendingSkill {
        PendingSkill {
            skill_id: id.into(),
            perspective: Perspective::Own,
            rarity: Rarity::White,
            trigger: Region::new(start, start + 10.0),
            extra: Arc::new(Predicate::Always),
            effects: effects.into(),
        }
    }

    fn solver(seed: u32, skills: Vec<PendingSkill>) -> RaceSolver {
        let course = Arc::new(sample_course());
        let horse = build_base_stats(&sample_horse(), Mood::default());
        let mut rng = Rng::new(seed);
        let hp_rng = rng.fork();
        RaceSolver::new(SolverParams {
            horse,
            hp: Box::new(GameHpPolicy::new(&course, GroundCondition::Good, hp_rng)),
            course,
            rng,
            skills,
            pacer: None,
            timestep: DEFAULT_TIMESTEP,
        })
    }

    fn trace(solver: &mut RaceSolver) -> Vec<(f64, f64, u8)> {
        let mut out = Vec::new();
        while !solver.is_finished() {
            solver.step();
            out.push((solver.pos(), solver.current_speed(), solver.phase()));
        }
        out
    }

    #[test]
    fn same_seed_same_trajectory() {
        let a = trace(&mut solver(3, vec![]));
        let b = trace(&mut solver(3, vec![]));
        assert_eq!(a, b);
        assert!(a.len() > 100);
    }

    #[test]
    fn phases_only_move_forward() {
        let steps = trace(&mut solver(9, vec![]));
        for pair in steps.windows(2) {
            assert!(pair[1].2 >= pair[0].2);
        }
        assert!(steps.last().unwrap().2 >= 2);
    }

    #[test]
    fn speed_never_drops_below_minimum_after_start_dash() {
        let mut s = solver(4, vec![]);
        while !s.is_finished() {
            s.step();
            if !s.is_start_dash {
                assert!(s.current_speed() >= s.min_speed - 1e-9);
            }
        }
    }

    #[test]
    fn timed_skill_expires_and_balances() {
        let effect = Effect {
            kind: EffectKind::TargetSpeed,
            modifier: 0.35,
            duration: 2.0,
        };
        let mut s = solver(5, vec![pending("speedy", 300.0, vec![effect])]);
        s.run_to_finish();
        s.cleanup();
        let activated = s.events().iter().filter(|e| e.kind == SkillEventKind::Activated).count();
        let deactivated = s.events().iter().filter(|e| e.kind == SkillEventKind::Deactivated).count();
        assert_eq!(activated, 1);
        assert_eq!(deactivated, 1);
        assert!(s.net_modifiers().0.abs() < 1e-12);
        assert!(s.has_used_skill("speedy"));
    }

    #[test]
    fn cleanup_force_deactivates() {
        let effect = Effect {
            kind: EffectKind::CurrentSpeed,
            modifier: 0.2,
            duration: 1_000.0,
        };
        let mut s = solver(6, vec![pending("long", 100.0, vec![effect])]);
        s.run_to_finish();
        assert_eq!(s.active_count(), 1);
        s.cleanup();
        assert_eq!(s.active_count(), 0);
        assert!(s.net_modifiers().1.abs() < 1e-12);
    }

    #[test]
    fn target_speed_skill_finishes_sooner() {
        let effect = Effect {
            kind: EffectKind::TargetSpeed,
            modifier: 0.35,
            duration: 6.0,
        };
        let mut base = solver(8, vec![]);
        let mut boosted = solver(8, vec![pending("boost", 1400.0, vec![effect])]);
        base.run_to_finish();
        boosted.run_to_finish();
        assert!(boosted.elapsed() <= base.elapsed());
    }

    #[test]
    fn gate_start_delay_skill_applies_before_countdown() {
        let effect = Effect {
            kind: EffectKind::SetStartDelay,
            modifier: 0.0,
            duration: 0.0,
        };
        let mut s = solver(10, vec![pending("gate", 0.0, vec![effect])]);
        assert_eq!(s.start_delay(), 0.0);
        s.step();
        assert!(s.pos() > 0.0);
    }

    #[test]
    fn pacer_enables_position_keep() {
        let course = Arc::new(sample_course());
        let mut descriptor = sample_horse();
        descriptor.strategy = Strategy::LateSurger;
        let horse = build_base_stats(&descriptor, Mood::default());
        let mut pacer_horse = horse.clone();
        pacer_horse.strategy = Strategy::FrontRunner;
        let pacer = RaceSolver::new(SolverParams {
            horse: pacer_horse,
            course: Arc::clone(&course),
            hp: Box::new(NoopHpPolicy),
            rng: Rng::new(77),
            skills: vec![],
            pacer: None,
            timestep: DEFAULT_TIMESTEP,
        });
        let mut s = RaceSolver::new(SolverParams {
            horse,
            hp: Box::new(GameHpPolicy::new(&course, GroundCondition::Good, Rng::new(2))),
            course,
            rng: Rng::new(1),
            skills: vec![],
            pacer: Some(Box::new(pacer)),
            timestep: DEFAULT_TIMESTEP,
        });
        s.run_to_finish();
        assert!(s.is_finished());
        assert_eq!(s.position_keep, PositionKeep::Normal);
    }

    #[test]
    fn random_gold_meta_effect_pulls_in_pending_gold() {
        let gold = |id: &str, effects: Vec<Effect>| PendingSkill {
            rarity: Rarity::Gold,
            ..pending(id, 1800.0, effects)
        };
        let speed = Effect {
            kind: EffectKind::TargetSpeed,
            modifier: 0.35,
            duration: 100.0,
        };
        let stat = Effect {
            kind: EffectKind::SpeedUp,
            modifier: 60.0,
            duration: 0.0,
        };
        let meta = Effect {
            kind: EffectKind::ActivateRandomGold,
            modifier: 1.0,
            duration: 0.0,
        };
        let mut s = solver(
            12,
            vec![
                pending("meta", 50.0, vec![meta]),
                gold("gold_a", vec![speed.clone()]),
                gold("gold_b", vec![speed.clone()]),
                gold("stat_gold", vec![stat]),
                pending("white", 1800.0, vec![speed]),
            ],
        );
        while s.events().is_empty() && !s.is_finished() {
            s.step();
        }

        let activated: Vec<&str> = s
            .events()
            .iter()
            .filter(|e| e.kind == SkillEventKind::Activated)
            .map(|e| e.skill_id.as_str())
            .collect();
        assert_eq!(activated.len(), 2);
        assert_eq!(activated[0], "meta");
        assert!(activated[1] == "gold_a" || activated[1] == "gold_b");
        assert!(s.events().iter().all(|e| e.pos == s.events()[0].pos));
        assert!((s.net_modifiers().0 - 0.35).abs() < 1e-12);
        assert!(s.has_used_skill(activated[1]));
        assert!(!s.has_used_skill("stat_gold"));

        let chosen = activated[1].to_string();
        s.run_to_finish();
        let again = s
            .events()
            .iter()
            .filter(|e| e.kind == SkillEventKind::Activated && e.skill_id == chosen)
            .count();
        assert_eq!(again, 1);
    }
}
