//! Race physics: course geometry, horse stats, skill records, HP model and the per-frame solver.

pub mod accumulator;
pub mod course;
pub mod horse;
pub mod hp;
pub mod params;
pub mod region;
pub mod rng;
pub mod skill;
pub mod solver;

use thiserror::Error;

pub use accumulator::CompensatedAccumulator;
pub use course::{Corner, Course, Slope, StatKind, Straight, Turn};
pub use horse::{build_adjusted_stats, build_base_stats, Aptitude, HorseDescriptor, HorseStats, Strategy};
pub use hp::{GameHpPolicy, HpPolicy, HpState, NoopHpPolicy};
pub use params::{GroundCondition, Grade, Mood, RaceParameters, Season, Surface, TimeOfDay, Weather};
pub use region::{Region, RegionList};
pub use rng::Rng;
pub use skill::{
    Effect, EffectKind, EffectTarget, PendingSkill, Perspective, Rarity, SkillAlternative,
    SkillDescriptor, SkillEffect, SkillMeta, SkillTrigger, DATA_UNIT_SCALE,
};
pub use solver::{RaceSolver, SkillEvent, SkillEventKind, SolverParams, DEFAULT_TIMESTEP};

/// Precondition failures in input data. These abort the current build or evaluation and are never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantError {
    #[error("course {kind} must be sorted by start (entry {index} starts at {start} before {previous})")]
    Unsorted {
        kind: &'static str,
        index: usize,
        start: f64,
        previous: f64,
    },
    #[error("{field} value {value} is out of range")]
    OutOfRange { field: &'static str, value: i64 },
    #[error("course distance must be positive (got {0})")]
    NonPositiveDistance(f64),
    #[error("unknown skill id '{0}'")]
    UnknownSkill(String),
}
