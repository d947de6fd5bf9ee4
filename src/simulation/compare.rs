//! Paired comparison harness: baseline horse vs. the same horse with extra skills, trial by trial.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::conditions::ConditionTable;
use crate::data::SkillCatalog;
use crate::parallel::{batch_ranges, run_parallel_jobs, WorkerPool};
use crate::race::{Course, HorseDescriptor, Mood, Perspective, RaceParameters, RaceSolver, Rng, SkillEvent};
use crate::simulation::builder::{SolverBuilder, TrialCursor};
use crate::simulation::stats::{mean, median, rank_results, sort_deltas, summarize, RankedSkill, SkillResult, Summary};
use crate::simulation::BuildError;

/// Course distance units per game length unit.
pub const LENGTH_SCALE: f64 = 2.5;
/// Consecutive stability swaps allowed for a single trial before its measurement is accepted.
pub const MAX_REDO_SWAPS: u32 = 8;
pub const DEFAULT_SAMPLES: usize = 500;
pub const DEFAULT_CI_WIDTH: f64 = 95.0;
const RANK_BATCH: usize = 16;

fn default_samples() -> usize {
    DEFAULT_SAMPLES
}

fn default_ci_width() -> f64 {
    DEFAULT_CI_WIDTH
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareRequest {
    pub course: Course,
    #[serde(default)]
    pub params: RaceParameters,
    pub horse: HorseDescriptor,
    pub skill: String,
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default)]
    pub seed: u32,
    #[serde(default)]
    pub mood_sweep: bool,
    #[serde(default = "default_ci_width")]
    pub ci_width: f64,
    #[serde(default)]
    pub raw: bool,
}

/// Either the sorted deltas or their summary with the skill id echoed back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CompareResponse {
    Raw(Vec<f64>),
    Summary {
        skill: String,
        #[serde(flatten)]
        summary: Summary,
    },
}

/// Per-step samples of one solver.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trajectory {
    pub t: Vec<f64>,
    pub pos: Vec<f64>,
    pub v: Vec<f64>,
    pub hp: Vec<f64>,
}

impl Trajectory {
    fn record(&mut self, solver: &RaceSolver) {
        self.t.push(solver.elapsed());
        self.pos.push(solver.pos());
        self.v.push(solver.current_speed());
        self.hp.push(solver.hp());
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub trial: usize,
    pub delta: f64,
    pub standard: Trajectory,
    pub compare: Trajectory,
    pub standard_events: Vec<SkillEvent>,
    pub compare_events: Vec<SkillEvent>,
}

/// The min, max, closest-to-mean and closest-to-median trials.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepresentativeRuns {
    pub min: Option<RunRecord>,
    pub max: Option<RunRecord>,
    pub mean: Option<RunRecord>,
    pub median: Option<RunRecord>,
}

impl RepresentativeRuns {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &RunRecord)> {
        [
            ("min", self.min.as_ref()),
            ("max", self.max.as_ref()),
            ("mean", self.mean.as_ref()),
            ("median", self.median.as_ref()),
        ]
        .into_iter()
        .filter_map(|(label, run)| run.map(|r| (label, r)))
    }

    /// Stores `record` in every slot it improves on. Mean/median slots are only filled once
    /// `targets` are known. The record is cloned only when it lands in more than one slot.
    fn offer(&mut self, record: RunRecord, targets: Option<(f64, f64)>) {
        let delta = record.delta;
        let closer = |slot: &Option<RunRecord>, target: f64| {
            slot.as_ref()
                .map_or(true, |old| (delta - target).abs() < (old.delta - target).abs())
        };
        let wants = [
            self.min.as_ref().map_or(true, |old| delta < old.delta),
            self.max.as_ref().map_or(true, |old| delta > old.delta),
            targets.is_some_and(|(mean, _)| closer(&self.mean, mean)),
            targets.is_some_and(|(_, median)| closer(&self.median, median)),
        ];
        let mut slots: Vec<&mut Option<RunRecord>> = [&mut self.min, &mut self.max, &mut self.mean, &mut self.median]
            .into_iter()
            .zip(wants)
            .filter_map(|(slot, want)| want.then_some(slot))
            .collect();
        if let Some(last) = slots.pop() {
            for slot in slots {
                *slot = Some(record.clone());
            }
            *last = Some(record);
        }
    }

    /// Combines runs from several comparisons, re-picking mean/median against the pooled targets.
    fn merge(parts: Vec<RepresentativeRuns>, mean_target: f64, median_target: f64) -> RepresentativeRuns {
        let mut merged = RepresentativeRuns::default();
        for part in parts {
            for record in [part.min, part.max, part.mean, part.median].into_iter().flatten() {
                merged.offer(record, Some((mean_target, median_target)));
            }
        }
        merged
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// Sorted ascending.
    pub deltas: Vec<f64>,
    pub runs: RepresentativeRuns,
    /// Total stability redos across all trials.
    pub redos: usize,
}

impl Comparison {
    pub fn summary(&self, ci_width: f64) -> Option<Summary> {
        summarize(&self.deltas, ci_width)
    }
}

struct Measurement {
    gap: f64,
    standard: Trajectory,
    compare: Trajectory,
    standard_events: Vec<SkillEvent>,
    compare_events: Vec<SkillEvent>,
}

/// Steps the leading solver to the finish, then the trailing one up to the same elapsed time.
fn measure(standard: RaceSolver, compare: RaceSolver, swapped: bool) -> Measurement {
    let (mut lead, mut trail) = if swapped { (standard, compare) } else { (compare, standard) };
    let mut lead_path = Trajectory::default();
    let mut trail_path = Trajectory::default();
    lead_path.record(&lead);
    trail_path.record(&trail);

    while !lead.is_finished() {
        lead.step();
        lead_path.record(&lead);
    }
    while trail.elapsed() < lead.elapsed() {
        trail.step();
        trail_path.record(&trail);
    }
    let trail_pos = trail.pos();
    while !trail.is_finished() {
        trail.step();
        trail_path.record(&trail);
    }
    lead.cleanup();
    trail.cleanup();

    let gap = lead.pos() - trail_pos;
    let lead_events = lead.events().to_vec();
    let trail_events = trail.events().to_vec();
    if swapped {
        Measurement {
            gap,
            standard: lead_path,
            compare: trail_path,
            standard_events: lead_events,
            compare_events: trail_events,
        }
    } else {
        Measurement {
            gap,
            standard: trail_path,
            compare: lead_path,
            standard_events: trail_events,
            compare_events: lead_events,
        }
    }
}

/// Runs every trial of two cursors in lock-step. Deltas are `(compare - standard) / LENGTH_SCALE`.
///
/// When the side expected to lead is not ahead (or the gap is NaN), the roles are swapped and
/// the same trial is replayed with identical randomness. The swap carries over to later trials.
/// After [`MAX_REDO_SWAPS`] replays of one trial the last measurement is accepted with a warning.
pub fn run_comparison(standard: &mut TrialCursor, compare: &mut TrialCursor) -> Comparison {
    let n = standard.len().min(compare.len());
    let cutoff = (n * 8 / 10).max(n.saturating_sub(200));
    let mut deltas = Vec::with_capacity(n);
    let mut runs = RepresentativeRuns::default();
    let mut targets: Option<(f64, f64)> = None;
    let mut swapped = false;
    let mut redos = 0;

    for trial in 0..n {
        if deltas.len() == cutoff {
            let mut sorted = deltas.clone();
            sort_deltas(&mut sorted);
            targets = Some((mean(&sorted), median(&sorted)));
        }

        let mut redo = false;
        let mut swaps = 0;
        let measured = loop {
            let (Some(s), Some(c)) = (standard.next(redo), compare.next(redo)) else {
                break None;
            };
            let m = measure(s, c, swapped);
            if m.gap >= 0.0 {
                break Some(m);
            }
            if swaps >= MAX_REDO_SWAPS {
                warn!(trial, swaps, gap = m.gap, "trial never stabilised; accepting last measurement");
                break Some(m);
            }
            swapped = !swapped;
            swaps += 1;
            redos += 1;
            redo = true;
            debug!(trial, gap = m.gap, swapped, "unstable ordering, replaying trial");
        };
        let Some(m) = measured else {
            break;
        };

        let sign = if swapped { -1.0 } else { 1.0 };
        let mut delta = sign * m.gap / LENGTH_SCALE;
        if delta.is_nan() {
            warn!(trial, "NaN distance gap recorded as zero");
            delta = 0.0;
        }
        deltas.push(delta);

        let record = RunRecord {
            trial,
            delta,
            standard: m.standard,
            compare: m.compare,
            standard_events: m.standard_events,
            compare_events: m.compare_events,
        };
        runs.offer(record, targets);
    }

    sort_deltas(&mut deltas);
    Comparison { deltas, runs, redos }
}

/// Builders for a comparison between two horses on the same course. Each side also carries the
/// skills only the other side has, with the `Other` perspective.
pub fn paired_builders(
    course: Arc<Course>,
    params: &RaceParameters,
    uma1: &HorseDescriptor,
    uma2: &HorseDescriptor,
    seed: u32,
) -> (SolverBuilder, SolverBuilder) {
    let side = |own: &HorseDescriptor, other: &HorseDescriptor| {
        other
            .skills
            .iter()
            .filter(|id| !own.skills.contains(id))
            .fold(
                SolverBuilder::new(Arc::clone(&course), own.clone())
                    .with_params(params.clone())
                    .with_seed(seed),
                |builder, id| builder.with_skill(id.clone(), Perspective::Other),
            )
    };
    (side(uma1, uma2), side(uma2, uma1))
}

/// Builds both cursors and runs the comparison.
pub fn run_pair(
    standard: &SolverBuilder,
    compare: &SolverBuilder,
    table: &ConditionTable,
    catalog: &SkillCatalog,
    samples: usize,
) -> Result<Comparison, BuildError> {
    let mut standard = standard.build(table, catalog, samples)?;
    let mut compare = compare.build(table, catalog, samples)?;
    Ok(run_comparison(&mut standard, &mut compare))
}

/// One horse on one course: everything a comparison needs besides the skill under test.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub course: Arc<Course>,
    pub params: RaceParameters,
    pub horse: HorseDescriptor,
    pub samples: usize,
    pub seed: u32,
}

impl Scenario {
    fn for_mood(&self, mood: Mood, seed: u32) -> Scenario {
        Scenario {
            params: self.params.with_mood(mood),
            seed,
            ..self.clone()
        }
    }
}

/// Baseline horse vs. the same horse with `skill` added.
pub fn compare_single(
    scenario: &Scenario,
    skill: &str,
    table: &ConditionTable,
    catalog: &SkillCatalog,
) -> Result<Comparison, BuildError> {
    let mut with_skill = scenario.horse.clone();
    if !with_skill.skills.iter().any(|s| s == skill) {
        with_skill.skills.push(skill.to_string());
    }
    let (standard, compare) = paired_builders(
        Arc::clone(&scenario.course),
        &scenario.params,
        &scenario.horse,
        &with_skill,
        scenario.seed,
    );
    run_pair(&standard, &compare, table, catalog, scenario.samples)
}

/// Seeds for the mood sweep, one per mood, derived from the request seed.
pub fn mood_sweep_seeds(seed: u32) -> Vec<(Mood, u32)> {
    let mut seeder = Rng::new(seed);
    Mood::ALL.iter().map(|&mood| (mood, seeder.int32())).collect()
}

/// Full request handling: optional mood sweep on the worker pool, then summary or raw output.
pub fn compare_skill(
    request: &CompareRequest,
    table: &ConditionTable,
    catalog: &SkillCatalog,
    pool: &WorkerPool,
) -> Result<(CompareResponse, Comparison), BuildError> {
    if request.samples == 0 {
        return Err(BuildError::NoTrials);
    }
    request.course.validate()?;
    let scenario = Scenario {
        course: Arc::new(request.course.clone()),
        params: request.params.clone(),
        horse: request.horse.clone(),
        samples: request.samples,
        seed: request.seed,
    };
    info!(
        skill = %request.skill,
        samples = request.samples,
        seed = request.seed,
        mood_sweep = request.mood_sweep,
        "comparison started"
    );

    let comparison = if request.mood_sweep {
        let jobs = mood_sweep_seeds(request.seed);
        let parts = run_parallel_jobs(&jobs, pool, |&(mood, seed)| {
            compare_single(&scenario.for_mood(mood, seed), &request.skill, table, catalog)
        })
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

        let mut deltas: Vec<f64> = parts.iter().flat_map(|p| p.deltas.iter().copied()).collect();
        sort_deltas(&mut deltas);
        let redos = parts.iter().map(|p| p.redos).sum();
        let runs = RepresentativeRuns::merge(
            parts.into_iter().map(|p| p.runs).collect(),
            mean(&deltas),
            median(&deltas),
        );
        Comparison { deltas, runs, redos }
    } else {
        compare_single(&scenario, &request.skill, table, catalog)?
    };

    let response = if request.raw {
        CompareResponse::Raw(comparison.deltas.clone())
    } else {
        let summary = comparison.summary(request.ci_width).ok_or(BuildError::NoTrials)?;
        CompareResponse::Summary {
            skill: request.skill.clone(),
            summary,
        }
    };
    info!(
        skill = %request.skill,
        trials = comparison.deltas.len(),
        redos = comparison.redos,
        "comparison finished"
    );
    Ok((response, comparison))
}

/// Compares each candidate skill against the baseline horse in parallel and ranks the results.
/// An empty candidate list means every catalog skill the horse does not already have.
pub fn rank_skills(
    scenario: &Scenario,
    candidates: &[String],
    ci_width: f64,
    table: &ConditionTable,
    catalog: &SkillCatalog,
    pool: &WorkerPool,
) -> Result<Vec<RankedSkill>, BuildError> {
    if scenario.samples == 0 {
        return Err(BuildError::NoTrials);
    }
    let candidates: Vec<String> = if candidates.is_empty() {
        catalog.ids().map(str::to_string).collect()
    } else {
        candidates.to_vec()
    };
    let candidates: Vec<String> = candidates
        .into_iter()
        .filter(|id| !scenario.horse.skills.contains(id))
        .collect();

    let total = candidates.len();
    let mut results = Vec::with_capacity(total);
    for (start, end) in batch_ranges(total, total.div_ceil(RANK_BATCH)) {
        let batch = run_parallel_jobs(&candidates[start..end], pool, |skill| {
            let comparison = compare_single(scenario, skill, table, catalog)?;
            let summary = comparison.summary(ci_width).ok_or(BuildError::NoTrials)?;
            Ok::<_, BuildError>(SkillResult {
                skill: skill.clone(),
                summary,
            })
        });
        for result in batch {
            results.push(result?);
        }
        info!(done = end, total, "ranking progress");
    }
    Ok(rank_results(results, catalog))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::race::course::tests::sample_course;
    use crate::race::horse::tests::sample_horse;
    use crate::race::{EffectKind, EffectTarget, Rarity, SkillAlternative, SkillDescriptor, SkillEffect};

    fn catalog() -> SkillCatalog {
        let speed = SkillDescriptor {
            id: "speed".into(),
            name: Some("Final Push".into()),
            rarity: Rarity::White,
            alternatives: vec![SkillAlternative {
                precondition: String::new(),
                condition: "phase>=2".into(),
                base_duration: 50_000.0,
                effects: vec![SkillEffect {
                    kind: EffectKind::TargetSpeed,
                    modifier: 3500.0,
                    target: EffectTarget::Own,
                }],
            }],
        };
        SkillCatalog::new(vec![speed], vec![])
    }

    #[test]
    fn identical_sides_give_zero_deltas() {
        let course = Arc::new(sample_course());
        let horse = sample_horse();
        let (a, b) = paired_builders(course, &RaceParameters::default(), &horse, &horse, 5);
        let result = run_pair(&a, &b, &ConditionTable::standard(), &catalog(), 10).unwrap();
        assert_eq!(result.deltas.len(), 10);
        assert!(result.deltas.iter().all(|d| *d == 0.0));
        assert_eq!(result.redos, 0);
    }

    #[test]
    fn paired_builders_cross_register_other_skills() {
        let course = Arc::new(sample_course());
        let horse = sample_horse();
        let mut plus = horse.clone();
        plus.skills.push("speed".into());
        let (standard, compare) = paired_builders(course, &RaceParameters::default(), &horse, &plus, 1);
        assert_eq!(standard.skill_ids(Perspective::Other).collect::<Vec<_>>(), vec!["speed"]);
        assert!(compare.skill_ids(Perspective::Own).any(|s| s == "speed"));
        assert_eq!(compare.skill_ids(Perspective::Other).count(), 0);
    }

    fn record(trial: usize, delta: f64) -> RunRecord {
        RunRecord {
            trial,
            delta,
            standard: Trajectory::default(),
            compare: Trajectory::default(),
            standard_events: vec![],
            compare_events: vec![],
        }
    }

    #[test]
    fn offered_runs_fill_only_improved_slots() {
        let mut runs = RepresentativeRuns::default();
        runs.offer(record(0, 1.0), None);
        assert_eq!(runs.min.as_ref().map(|r| r.trial), Some(0));
        assert_eq!(runs.max.as_ref().map(|r| r.trial), Some(0));
        assert!(runs.mean.is_none() && runs.median.is_none());

        runs.offer(record(1, 3.0), Some((2.0, 2.5)));
        runs.offer(record(2, 2.4), Some((2.0, 2.5)));
        runs.offer(record(3, 2.9), Some((2.0, 2.5)));
        let trials: Vec<(&str, usize)> = runs.iter().map(|(label, r)| (label, r.trial)).collect();
        assert_eq!(trials, vec![("min", 0), ("max", 1), ("mean", 2), ("median", 2)]);
    }

    #[test]
    fn representative_runs_are_recorded() {
        let scenario = Scenario {
            course: Arc::new(sample_course()),
            params: RaceParameters::default(),
            horse: sample_horse(),
            samples: 12,
            seed: 11,
        };
        let result = compare_single(&scenario, "speed", &ConditionTable::standard(), &catalog()).unwrap();
        let min = result.runs.min.as_ref().unwrap();
        let max = result.runs.max.as_ref().unwrap();
        assert_eq!(min.delta, result.deltas[0]);
        assert_eq!(max.delta, result.deltas[result.deltas.len() - 1]);
        assert!(result.runs.mean.is_some() && result.runs.median.is_some());
        assert!(!min.compare.is_empty());
        assert!(min.compare_events.iter().any(|e| e.skill_id == "speed"));
    }

    #[test]
    fn response_shapes() {
        let request = CompareRequest {
            course: sample_course(),
            params: RaceParameters::default(),
            horse: sample_horse(),
            skill: "speed".into(),
            samples: 8,
            seed: 3,
            mood_sweep: false,
            ci_width: 90.0,
            raw: false,
        };
        let table = ConditionTable::standard();
        let pool = WorkerPool::with_workers(2);
        let (summary, _) = compare_skill(&request, &table, &catalog(), &pool).unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["skill"], "speed");
        assert!(json.get("ciLower").is_some());

        let raw_request = CompareRequest { raw: true, ..request.clone() };
        let (raw, _) = compare_skill(&raw_request, &table, &catalog(), &pool).unwrap();
        match raw {
            CompareResponse::Raw(deltas) => assert_eq!(deltas.len(), 8),
            other => panic!("expected raw deltas, got {other:?}"),
        }

        let empty = CompareRequest { samples: 0, ..request };
        assert!(matches!(
            compare_skill(&empty, &table, &catalog(), &pool),
            Err(BuildError::NoTrials)
        ));
    }

    #[test]
    fn mood_sweep_concatenates_every_mood() {
        let request = CompareRequest {
            course: sample_course(),
            params: RaceParameters::default(),
            horse: sample_horse(),
            skill: "speed".into(),
            samples: 4,
            seed: 9,
            mood_sweep: true,
            ci_width: 95.0,
            raw: true,
        };
        let (_, comparison) = compare_skill(
            &request,
            &ConditionTable::standard(),
            &catalog(),
            &WorkerPool::with_workers(2),
        )
        .unwrap();
        assert_eq!(comparison.deltas.len(), 4 * Mood::ALL.len());
        assert!(comparison.deltas.windows(2).all(|w| w[0] <= w[1]));
        let seeds = mood_sweep_seeds(9);
        assert_eq!(seeds.len(), Mood::ALL.len());
        assert_ne!(seeds[0].1, seeds[1].1);
    }
}
