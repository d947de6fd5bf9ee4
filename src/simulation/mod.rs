//! Comparison harness: solver construction per trial, paired runs, aggregation and export.

pub mod builder;
pub mod compare;
pub mod export;
pub mod stats;

use thiserror::Error;

use crate::conditions::ConditionError;
use crate::race::InvariantError;

pub use builder::{HpMode, SolverBuilder, TrialCursor};
pub use compare::{
    compare_single, compare_skill, mood_sweep_seeds, paired_builders, rank_skills, run_comparison, run_pair,
    CompareRequest, CompareResponse, Comparison, RepresentativeRuns, RunRecord, Scenario, Trajectory,
    DEFAULT_CI_WIDTH, DEFAULT_SAMPLES, LENGTH_SCALE, MAX_REDO_SWAPS,
};
pub use export::{export_runs_csv, write_runs_csv, ExportError};
pub use stats::{confidence_interval, mean, median, rank_results, sort_deltas, summarize, RankedSkill, SkillResult, Summary};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error(transparent)]
    Condition(#[from] ConditionError),
    #[error(transparent)]
    Invariant(#[from] InvariantError),
    #[error("a comparison needs at least one trial")]
    NoTrials,
}
