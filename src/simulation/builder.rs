//! Turns a horse, course and skill list into a restartable sequence of per-trial solvers.
//!
//! A [SolverBuilder] is an immutable configuration. `with_*` methods derive a new configuration
//! from an old one, so the two sides of a comparison share everything but the skill list.
//! [SolverBuilder::build] resolves skills, draws every trial's trigger positions up front, and
//! returns a [TrialCursor] that hands out one [RaceSolver] per trial.

use std::sync::Arc;

use tracing::debug;

use crate::conditions::{resolve_skill, ConditionContext, ConditionTable, ResolveOptions};
use crate::data::SkillCatalog;
use crate::race::{
    build_adjusted_stats, build_base_stats, Course, EffectKind, EffectTarget, GameHpPolicy,
    GroundCondition, HorseDescriptor, HorseStats, HpPolicy, InvariantError, Mood, NoopHpPolicy,
    Perspective, RaceParameters, RaceSolver, Rarity, Region, Rng, SkillAlternative,
    SkillDescriptor, SkillEffect, SkillTrigger, SolverParams, Strategy, DATA_UNIT_SCALE,
    DEFAULT_TIMESTEP,
};
use crate::simulation::BuildError;

const EXTRA_HOOK_CONDITION: &str = "phase>=2&is_lastspurt==1";
/// Long enough to last until the finish on any course.
const EXTRA_HOOK_DURATION: f64 = 10_000.0 * DATA_UNIT_SCALE;
const STAT_THRESHOLD: f64 = 1200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HpMode {
    Game,
    Unlimited,
}

#[derive(Debug, Clone)]
pub struct SolverBuilder {
    course: Arc<Course>,
    params: RaceParameters,
    horse: HorseDescriptor,
    skills: Vec<(String, Perspective)>,
    seed: u32,
    timestep: f64,
    pacer: bool,
    extra_hooks: bool,
    hp: HpMode,
}

impl SolverBuilder {
    /// The horse's own equipped skills are registered with the `Own` perspective.
    pub fn new(course: Arc<Course>, horse: HorseDescriptor) -> Self {
        let skills = horse.skills.iter().map(|id| (id.clone(), Perspective::Own)).collect();
        Self {
            course,
            params: RaceParameters::default(),
            horse,
            skills,
            seed: 0,
            timestep: DEFAULT_TIMESTEP,
            pacer: true,
            extra_hooks: true,
            hp: HpMode::Game,
        }
    }

    pub fn with_seed(self, seed: u32) -> Self {
        Self { seed, ..self }
    }

    pub fn with_params(self, params: RaceParameters) -> Self {
        Self { params, ..self }
    }

    pub fn with_mood(self, mood: Mood) -> Self {
        let params = self.params.with_mood(mood);
        Self { params, ..self }
    }

    pub fn with_timestep(self, timestep: f64) -> Self {
        Self { timestep, ..self }
    }

    /// Adds a skill unless the same id is already registered.
    pub fn with_skill(mut self, id: impl Into<String>, perspective: Perspective) -> Self {
        let id = id.into();
        if !self.skills.iter().any(|(existing, _)| *existing == id) {
            self.skills.push((id, perspective));
        }
        self
    }

    pub fn without_pacer(self) -> Self {
        Self { pacer: false, ..self }
    }

    pub fn with_extra_hooks(self, extra_hooks: bool) -> Self {
        Self { extra_hooks, ..self }
    }

    pub fn with_hp(self, hp: HpMode) -> Self {
        Self { hp, ..self }
    }

    pub fn course(&self) -> &Arc<Course> {
        &self.course
    }

    pub fn horse(&self) -> &HorseDescriptor {
        &self.horse
    }

    pub fn params(&self) -> &RaceParameters {
        &self.params
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn skill_ids(&self, perspective: Perspective) -> impl Iterator<Item = &str> {
        self.skills
            .iter()
            .filter(move |(_, p)| *p == perspective)
            .map(|(id, _)| id.as_str())
    }

    /// Final stats after mood, overcap, course and ground adjustment.
    pub fn adjusted_stats(&self) -> HorseStats {
        let base = build_base_stats(&self.horse, self.params.mood);
        build_adjusted_stats(&base, &self.course, self.params.ground)
    }

    /// Resolves every skill and samples `trials` trigger positions per trigger.
    pub fn build(
        &self,
        table: &ConditionTable,
        catalog: &SkillCatalog,
        trials: usize,
    ) -> Result<TrialCursor, BuildError> {
        self.course.validate()?;
        let stats = self.adjusted_stats();
        let ctx = ConditionContext {
            course: &self.course,
            horse: &stats,
            params: &self.params,
        };

        let mut triggers = Vec::new();
        for (id, perspective) in &self.skills {
            let skill = catalog
                .get(id)
                .ok_or_else(|| InvariantError::UnknownSkill(id.clone()))?;
            let options = match perspective {
                Perspective::Own => ResolveOptions::own(),
                Perspective::Other => ResolveOptions::other(),
            };
            triggers.extend(resolve_skill(table, skill, &ctx, options)?);
        }
        if self.extra_hooks {
            for hook in extra_hooks(&stats, self.course.distance) {
                triggers.extend(resolve_skill(table, &hook, &ctx, ResolveOptions::own())?);
            }
        }
        // Both sides of a comparison must consume the sampling stream identically.
        triggers.sort_by(|a, b| a.skill_id.cmp(&b.skill_id));

        let mut master = Rng::new(self.seed);
        let pacer_master = master.fork();
        let samples: Vec<Vec<Region>> = triggers
            .iter()
            .map(|t| t.sample_policy.sample(&t.regions, trials, &mut master))
            .collect();

        let pacer_horse = self.pacer.then(|| HorseStats {
            strategy: Strategy::FrontRunner,
            ..stats.clone()
        });

        debug!(
            seed = self.seed,
            trials,
            triggers = triggers.len(),
            "solver builder ready"
        );
        Ok(TrialCursor {
            course: Arc::clone(&self.course),
            horse: stats,
            pacer_horse,
            ground: self.params.ground,
            hp: self.hp,
            timestep: self.timestep,
            triggers,
            samples,
            snapshot: (master.state(), pacer_master.state()),
            master,
            pacer_master,
            index: 0,
            trials,
        })
    }
}

/// Pseudo-skills derived from stat totals past the in-game diminishing-returns threshold.
fn extra_hooks(stats: &HorseStats, distance: f64) -> Vec<SkillDescriptor> {
    let mut hooks = Vec::new();
    if stats.raw_stamina > STAT_THRESHOLD {
        let factor = stamina_duel_distance_factor(distance);
        let bonus = (stats.raw_stamina - STAT_THRESHOLD).sqrt() * 0.0085 * factor;
        if bonus > 0.0 {
            hooks.push(hook("extra:stamina_duel", EffectKind::TargetSpeed, bonus));
        }
    }
    if stats.power > STAT_THRESHOLD {
        let bonus = (stats.power - STAT_THRESHOLD).sqrt() * 0.001;
        hooks.push(hook("extra:power_reserve", EffectKind::Accel, bonus));
    }
    hooks
}

fn stamina_duel_distance_factor(distance: f64) -> f64 {
    match distance {
        d if d < 2101.0 => 0.0,
        d if d < 2201.0 => 0.5,
        d if d < 2401.0 => 1.0,
        d if d < 2601.0 => 1.2,
        _ => 1.5,
    }
}

fn hook(id: &str, kind: EffectKind, modifier: f64) -> SkillDescriptor {
    SkillDescriptor {
        id: id.to_string(),
        name: None,
        rarity: Rarity::White,
        alternatives: vec![SkillAlternative {
            precondition: String::new(),
            condition: EXTRA_HOOK_CONDITION.to_string(),
            base_duration: EXTRA_HOOK_DURATION,
            effects: vec![SkillEffect {
                kind,
                modifier: modifier * DATA_UNIT_SCALE,
                target: EffectTarget::Own,
            }],
        }],
    }
}

/// Lazy, restartable sequence of trial solvers.
///
/// Each call to [TrialCursor::next] snapshots the RNG streams before drawing the trial's forks.
/// `next(true)` restores that snapshot and rebuilds the previous trial with identical randomness.
pub struct TrialCursor {
    course: Arc<Course>,
    horse: HorseStats,
    pacer_horse: Option<HorseStats>,
    ground: GroundCondition,
    hp: HpMode,
    timestep: f64,
    triggers: Vec<SkillTrigger>,
    samples: Vec<Vec<Region>>,
    master: Rng,
    pacer_master: Rng,
    snapshot: (u64, u64),
    index: usize,
    trials: usize,
}

impl TrialCursor {
    /// The next trial's solver, or the previous one again when `redo` is set.
    pub fn next(&mut self, redo: bool) -> Option<RaceSolver> {
        if redo && self.index > 0 {
            self.index -= 1;
            self.master = Rng::from_state(self.snapshot.0);
            self.pacer_master = Rng::from_state(self.snapshot.1);
        }
        if self.index >= self.trials {
            return None;
        }
        self.snapshot = (self.master.state(), self.pacer_master.state());
        let hp_rng = self.master.fork();
        let solver_rng = self.master.fork();
        let pacer_rng = self.pacer_master.fork();

        let trial = self.index;
        let skills = self
            .triggers
            .iter()
            .zip(&self.samples)
            .filter_map(|(trigger, samples)| samples.get(trial).map(|r| trigger.pending(*r)))
            .collect();

        let pacer = self.pacer_horse.as_ref().map(|horse| {
            Box::new(RaceSolver::new(SolverParams {
                horse: horse.clone(),
                course: Arc::clone(&self.course),
                hp: Box::new(NoopHpPolicy),
                rng: pacer_rng,
                skills: Vec::new(),
                pacer: None,
                timestep: self.timestep,
            }))
        });
        let hp: Box<dyn HpPolicy> = match self.hp {
            HpMode::Game => Box::new(GameHpPolicy::new(&self.course, self.ground, hp_rng)),
            HpMode::Unlimited => Box::new(NoopHpPolicy),
        };

        self.index += 1;
        Some(RaceSolver::new(SolverParams {
            horse: self.horse.clone(),
            course: Arc::clone(&self.course),
            hp,
            rng: solver_rng,
            skills,
            pacer,
            timestep: self.timestep,
        }))
    }

    /// Trials handed out so far.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.trials
    }

    pub fn is_empty(&self) -> bool {
        self.trials == 0
    }

    pub fn triggers(&self) -> &[SkillTrigger] {
        &self.triggers
    }
}
