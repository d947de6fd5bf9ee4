//! The `Condition` trait and the registry of named conditions.

use std::collections::HashMap;

use crate::conditions::operators::{ActivateBucket, Comparator, Predicate, RuntimeValue};
use crate::conditions::policy::{Distribution, SamplePolicy};
use crate::conditions::ConditionError;
use crate::race::course::{phase_end, phase_region, phase_start, Course, Turn};
use crate::race::horse::HorseStats;
use crate::race::params::RaceParameters;
use crate::race::region::{Region, RegionList};
use crate::race::InvariantError;

/// Everything a static filter may look at.
#[derive(Debug, Clone, Copy)]
pub struct ConditionContext<'a> {
    pub course: &'a Course,
    pub horse: &'a HorseStats,
    pub params: &'a RaceParameters,
}

/// Result of applying a filter: narrowed regions plus whatever must still be checked live.
#[derive(Debug, Clone, PartialEq)]
pub struct Filtered {
    pub regions: RegionList,
    pub predicate: Predicate,
}

impl Filtered {
    pub fn regions(regions: RegionList) -> Self {
        Self {
            regions,
            predicate: Predicate::Always,
        }
    }
}

/// A named condition: one filter per comparator plus the policy used to sample its regions.
/// Comparators a condition does not define fail with `UnsupportedComparator`.
pub trait Condition: Send + Sync {
    fn name(&self) -> &str;

    fn sample_policy(&self) -> SamplePolicy;

    fn filter_eq(&self, _regions: &RegionList, _arg: i32, _ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        Err(self.unsupported(Comparator::Eq))
    }

    fn filter_ne(&self, _regions: &RegionList, _arg: i32, _ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        Err(self.unsupported(Comparator::Ne))
    }

    fn filter_lt(&self, _regions: &RegionList, _arg: i32, _ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        Err(self.unsupported(Comparator::Lt))
    }

    fn filter_le(&self, _regions: &RegionList, _arg: i32, _ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        Err(self.unsupported(Comparator::Le))
    }

    fn filter_gt(&self, _regions: &RegionList, _arg: i32, _ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        Err(self.unsupported(Comparator::Gt))
    }

    fn filter_ge(&self, _regions: &RegionList, _arg: i32, _ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        Err(self.unsupported(Comparator::Ge))
    }

    fn unsupported(&self, cmp: Comparator) -> ConditionError {
        ConditionError::UnsupportedComparator {
            condition: self.name().to_string(),
            cmp,
        }
    }

    fn filter(
        &self,
        cmp: Comparator,
        regions: &RegionList,
        arg: i32,
        ctx: &ConditionContext<'_>,
    ) -> Result<Filtered, ConditionError> {
        match cmp {
            Comparator::Eq => self.filter_eq(regions, arg, ctx),
            Comparator::Ne => self.filter_ne(regions, arg, ctx),
            Comparator::Lt => self.filter_lt(regions, arg, ctx),
            Comparator::Le => self.filter_le(regions, arg, ctx),
            Comparator::Gt => self.filter_gt(regions, arg, ctx),
            Comparator::Ge => self.filter_ge(regions, arg, ctx),
        }
    }
}

/// Leaves regions untouched for every comparator. Used for conditions that depend on other
/// racers; the sample policy stands in for their activation latency.
struct Noop {
    name: &'static str,
    policy: SamplePolicy,
}

impl Condition for Noop {
    fn name(&self) -> &str {
        self.name
    }
    fn sample_policy(&self) -> SamplePolicy {
        self.policy
    }
    fn filter_eq(&self, r: &RegionList, _: i32, _: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        Ok(Filtered::regions(r.clone()))
    }
    fn filter_ne(&self, r: &RegionList, _: i32, _: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        Ok(Filtered::regions(r.clone()))
    }
    fn filter_lt(&self, r: &RegionList, _: i32, _: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        Ok(Filtered::regions(r.clone()))
    }
    fn filter_le(&self, r: &RegionList, _: i32, _: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        Ok(Filtered::regions(r.clone()))
    }
    fn filter_gt(&self, r: &RegionList, _: i32, _: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        Ok(Filtered::regions(r.clone()))
    }
    fn filter_ge(&self, r: &RegionList, _: i32, _: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        Ok(Filtered::regions(r.clone()))
    }
}

type ValueFn = fn(&ConditionContext<'_>) -> i32;

/// A value fixed for the whole race: the regions survive whole or not at all.
struct StaticValue {
    name: &'static str,
    value: ValueFn,
}

impl StaticValue {
    fn keep_if(&self, cmp: Comparator, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        if cmp.holds((self.value)(ctx), arg) {
            Ok(Filtered::regions(r.clone()))
        } else {
            Ok(Filtered::regions(RegionList::new()))
        }
    }
}

impl Condition for StaticValue {
    fn name(&self) -> &str {
        self.name
    }
    fn sample_policy(&self) -> SamplePolicy {
        SamplePolicy::Immediate
    }
    fn filter_eq(&self, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.keep_if(Comparator::Eq, r, arg, ctx)
    }
    fn filter_ne(&self, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.keep_if(Comparator::Ne, r, arg, ctx)
    }
    fn filter_lt(&self, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.keep_if(Comparator::Lt, r, arg, ctx)
    }
    fn filter_le(&self, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.keep_if(Comparator::Le, r, arg, ctx)
    }
    fn filter_gt(&self, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.keep_if(Comparator::Gt, r, arg, ctx)
    }
    fn filter_ge(&self, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.keep_if(Comparator::Ge, r, arg, ctx)
    }
}

/// A value only known during the race: regions pass through and a predicate is attached.
struct Runtime {
    name: &'static str,
    value: RuntimeValue,
}

impl Runtime {
    fn defer(&self, cmp: Comparator, r: &RegionList, arg: i32) -> Result<Filtered, ConditionError> {
        Ok(Filtered {
            regions: r.clone(),
            predicate: Predicate::Compare {
                value: self.value,
                cmp,
                arg,
            },
        })
    }
}

impl Condition for Runtime {
    fn name(&self) -> &str {
        self.name
    }
    fn sample_policy(&self) -> SamplePolicy {
        SamplePolicy::Immediate
    }
    fn filter_eq(&self, r: &RegionList, arg: i32, _: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.defer(Comparator::Eq, r, arg)
    }
    fn filter_ne(&self, r: &RegionList, arg: i32, _: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.defer(Comparator::Ne, r, arg)
    }
    fn filter_lt(&self, r: &RegionList, arg: i32, _: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.defer(Comparator::Lt, r, arg)
    }
    fn filter_le(&self, r: &RegionList, arg: i32, _: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.defer(Comparator::Le, r, arg)
    }
    fn filter_gt(&self, r: &RegionList, arg: i32, _: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.defer(Comparator::Gt, r, arg)
    }
    fn filter_ge(&self, r: &RegionList, arg: i32, _: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.defer(Comparator::Ge, r, arg)
    }
}

/// `is_used_skill_id==N`: fires once skill `N` has been used in this trial.
struct UsedSkill;

impl Condition for UsedSkill {
    fn name(&self) -> &str {
        "is_used_skill_id"
    }
    fn sample_policy(&self) -> SamplePolicy {
        SamplePolicy::Immediate
    }
    fn filter_eq(&self, r: &RegionList, arg: i32, _: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        Ok(Filtered {
            regions: r.clone(),
            predicate: Predicate::UsedSkill(arg.to_string()),
        })
    }
}

type RegionFn = fn(&RegionList, i32, &ConditionContext<'_>) -> Result<RegionList, ConditionError>;

/// Geometric condition: each supported comparator maps the candidate regions to a narrower set.
struct Spatial {
    name: &'static str,
    policy: SamplePolicy,
    eq: Option<RegionFn>,
    ne: Option<RegionFn>,
    lt: Option<RegionFn>,
    le: Option<RegionFn>,
    gt: Option<RegionFn>,
    ge: Option<RegionFn>,
}

impl Spatial {
    fn eq_only(name: &'static str, policy: SamplePolicy, eq: RegionFn) -> Self {
        Self {
            name,
            policy,
            eq: Some(eq),
            ne: None,
            lt: None,
            le: None,
            gt: None,
            ge: None,
        }
    }

    fn run(&self, f: Option<RegionFn>, cmp: Comparator, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        match f {
            Some(f) => Ok(Filtered::regions(f(r, arg, ctx)?)),
            None => Err(self.unsupported(cmp)),
        }
    }
}

impl Condition for Spatial {
    fn name(&self) -> &str {
        self.name
    }
    fn sample_policy(&self) -> SamplePolicy {
        self.policy
    }
    fn filter_eq(&self, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.run(self.eq, Comparator::Eq, r, arg, ctx)
    }
    fn filter_ne(&self, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.run(self.ne, Comparator::Ne, r, arg, ctx)
    }
    fn filter_lt(&self, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.run(self.lt, Comparator::Lt, r, arg, ctx)
    }
    fn filter_le(&self, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.run(self.le, Comparator::Le, r, arg, ctx)
    }
    fn filter_gt(&self, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.run(self.gt, Comparator::Gt, r, arg, ctx)
    }
    fn filter_ge(&self, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.run(self.ge, Comparator::Ge, r, arg, ctx)
    }
}

/// `order` / `order_rate`: decided by the optional finishing-order constraint, otherwise a no-op.
struct Order {
    name: &'static str,
    rate: bool,
}

const DEFAULT_FIELD_SIZE: u32 = 9;

impl Order {
    fn keep_if(&self, cmp: Comparator, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        let Some((lo, hi)) = ctx.params.order_range else {
            return Ok(Filtered::regions(r.clone()));
        };
        let threshold = if self.rate {
            let field = ctx.params.field_size.unwrap_or(DEFAULT_FIELD_SIZE);
            (f64::from(field) * f64::from(arg) / 100.0).ceil() as i64
        } else {
            i64::from(arg)
        };
        let (lo, hi) = (i64::from(lo), i64::from(hi));
        // Some order inside the constrained range must satisfy the comparison.
        let possible = match cmp {
            Comparator::Eq => lo <= threshold && threshold <= hi,
            Comparator::Ne => !(lo == hi && lo == threshold),
            Comparator::Lt => lo < threshold,
            Comparator::Le => lo <= threshold,
            Comparator::Gt => hi > threshold,
            Comparator::Ge => hi >= threshold,
        };
        if possible {
            Ok(Filtered::regions(r.clone()))
        } else {
            Ok(Filtered::regions(RegionList::new()))
        }
    }
}

impl Condition for Order {
    fn name(&self) -> &str {
        self.name
    }
    fn sample_policy(&self) -> SamplePolicy {
        SamplePolicy::Random
    }
    fn filter_eq(&self, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.keep_if(Comparator::Eq, r, arg, ctx)
    }
    fn filter_ne(&self, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.keep_if(Comparator::Ne, r, arg, ctx)
    }
    fn filter_lt(&self, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.keep_if(Comparator::Lt, r, arg, ctx)
    }
    fn filter_le(&self, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.keep_if(Comparator::Le, r, arg, ctx)
    }
    fn filter_gt(&self, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.keep_if(Comparator::Gt, r, arg, ctx)
    }
    fn filter_ge(&self, r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        self.keep_if(Comparator::Ge, r, arg, ctx)
    }
}

/// Gaps of `parts` (sorted) inside `whole`.
fn complement(parts: &[Region], whole: Region) -> Vec<Region> {
    let mut out = Vec::with_capacity(parts.len() + 1);
    let mut cursor = whole.start;
    for part in parts {
        if part.start > cursor {
            out.push(Region::new(cursor, part.start.min(whole.end)));
        }
        cursor = cursor.max(part.end);
    }
    if cursor < whole.end {
        out.push(Region::new(cursor, whole.end));
    }
    out
}

fn check_phase(arg: i32) -> Result<u8, ConditionError> {
    u8::try_from(arg)
        .ok()
        .filter(|p| *p <= 3)
        .ok_or_else(|| {
            InvariantError::OutOfRange {
                field: "phase",
                value: i64::from(arg),
            }
            .into()
        })
}

fn bounded(r: &RegionList, start: f64, end: f64) -> RegionList {
    r.clamp_to(&Region::new(start, end))
}

fn corner_regions(ctx: &ConditionContext<'_>) -> Vec<Region> {
    ctx.course.corners.iter().map(|c| c.region()).collect()
}

fn straight_regions(ctx: &ConditionContext<'_>) -> Vec<Region> {
    ctx.course.straights.iter().map(|s| s.region()).collect()
}

/// Corners numbered `n` where the final corner is 4 and numbering counts down, wrapping from 1 to 4.
fn numbered_corners(ctx: &ConditionContext<'_>, n: i32) -> Vec<Region> {
    let corners = &ctx.course.corners;
    let mut out: Vec<Region> = corners
        .iter()
        .rev()
        .enumerate()
        .filter(|(i, _)| 4 - (*i as i32 % 4) == n)
        .map(|(_, c)| c.region())
        .collect();
    out.reverse();
    out
}

fn phase_eq(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    let p = check_phase(arg)?;
    Ok(r.clamp_to(&phase_region(ctx.course.distance, p)))
}

fn phase_ne(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    let p = check_phase(arg)?;
    let phase = phase_region(ctx.course.distance, p);
    Ok(r.intersect_all(&complement(&[phase], ctx.course.whole())))
}

fn phase_lt(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    let p = check_phase(arg)?;
    Ok(bounded(r, 0.0, phase_start(ctx.course.distance, p)))
}

fn phase_le(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    let p = check_phase(arg)?;
    Ok(bounded(r, 0.0, phase_end(ctx.course.distance, p)))
}

fn phase_gt(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    let p = check_phase(arg)?;
    Ok(bounded(r, phase_end(ctx.course.distance, p), ctx.course.distance))
}

fn phase_ge(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    let p = check_phase(arg)?;
    Ok(bounded(r, phase_start(ctx.course.distance, p), ctx.course.distance))
}

fn phase_first_half(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    let phase = phase_region(ctx.course.distance, check_phase(arg)?);
    Ok(bounded(r, phase.start, phase.start + phase.len() / 2.0))
}

fn phase_later_half(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    let phase = phase_region(ctx.course.distance, check_phase(arg)?);
    Ok(bounded(r, phase.start + phase.len() / 2.0, phase.end))
}

fn phase_first_quarter(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    let phase = phase_region(ctx.course.distance, check_phase(arg)?);
    Ok(bounded(r, phase.start, phase.start + phase.len() / 4.0))
}

fn phase_corners(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    let phase = phase_region(ctx.course.distance, check_phase(arg)?);
    Ok(r.clamp_to(&phase).intersect_all(&corner_regions(ctx)))
}

fn phase_straights(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    let phase = phase_region(ctx.course.distance, check_phase(arg)?);
    Ok(r.clamp_to(&phase).intersect_all(&straight_regions(ctx)))
}

fn rate_point(ctx: &ConditionContext<'_>, arg: i32) -> f64 {
    ctx.course.distance * f64::from(arg) / 100.0
}

fn distance_rate_after(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    Ok(bounded(r, rate_point(ctx, arg), ctx.course.distance))
}

fn distance_rate_before(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    Ok(bounded(r, 0.0, rate_point(ctx, arg)))
}

fn remain_at_most(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    let d = ctx.course.distance;
    Ok(bounded(r, d - f64::from(arg), d))
}

fn remain_at_least(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    let d = ctx.course.distance;
    Ok(bounded(r, 0.0, d - f64::from(arg)))
}

fn remain_exactly(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    let start = ctx.course.distance - f64::from(arg);
    Ok(bounded(r, start, start + 1.0))
}

fn remain_not(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    let start = ctx.course.distance - f64::from(arg);
    let gaps = complement(&[Region::new(start, start + 1.0)], ctx.course.whole());
    Ok(r.intersect_all(&gaps))
}

fn corner_eq(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    if arg == 0 {
        Ok(r.intersect_all(&complement(&corner_regions(ctx), ctx.course.whole())))
    } else {
        Ok(r.intersect_all(&numbered_corners(ctx, arg)))
    }
}

fn corner_ne(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    if arg == 0 {
        Ok(r.intersect_all(&corner_regions(ctx)))
    } else {
        let gaps = complement(&numbered_corners(ctx, arg), ctx.course.whole());
        Ok(r.intersect_all(&gaps))
    }
}

fn corner_random(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    Ok(r.intersect_all(&numbered_corners(ctx, arg)))
}

fn all_corners(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    if arg == 1 {
        Ok(r.intersect_all(&corner_regions(ctx)))
    } else {
        Ok(RegionList::new())
    }
}

fn final_corner(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    let d = ctx.course.distance;
    Ok(match (ctx.course.final_corner(), arg) {
        (Some(fc), 1) => bounded(r, fc.start, d),
        (Some(fc), 0) => bounded(r, 0.0, fc.start),
        (None, 0) => r.clone(),
        _ => RegionList::new(),
    })
}

fn final_corner_later_half(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    Ok(match (ctx.course.final_corner(), arg) {
        (Some(fc), 1) => bounded(r, fc.start + fc.length / 2.0, fc.end()),
        _ => RegionList::new(),
    })
}

fn final_corner_whole(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    Ok(match (ctx.course.final_corner(), arg) {
        (Some(fc), 1) => r.clamp_to(&fc.region()),
        _ => RegionList::new(),
    })
}

fn last_straight(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    Ok(match (ctx.course.last_straight(), arg) {
        (Some(s), 1) => r.clamp_to(&s.region()),
        (Some(s), 0) => r.intersect_all(&complement(&[s.region()], ctx.course.whole())),
        (None, 0) => r.clone(),
        _ => RegionList::new(),
    })
}

fn last_straight_onetime(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    Ok(match (ctx.course.last_straight(), arg) {
        (Some(s), 1) => bounded(r, s.start, s.start + 10.0),
        _ => RegionList::new(),
    })
}

fn all_straights(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    if arg == 1 {
        Ok(r.intersect_all(&straight_regions(ctx)))
    } else {
        Ok(RegionList::new())
    }
}

fn straight_front_type(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    let matching: Vec<Region> = ctx
        .course
        .straights
        .iter()
        .filter(|s| s.front_type == arg)
        .map(|s| s.region())
        .collect();
    Ok(r.intersect_all(&matching))
}

fn slopes_where(ctx: &ConditionContext<'_>, uphill: bool) -> Vec<Region> {
    ctx.course
        .slopes
        .iter()
        .filter(|s| s.grade != 0.0 && s.is_uphill() == uphill)
        .map(|s| s.region())
        .collect()
}

/// 0 = flat, 1 = uphill, 2 = downhill.
fn slope(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    match arg {
        0 => {
            let slopes: Vec<Region> = ctx.course.slopes.iter().map(|s| s.region()).collect();
            Ok(r.intersect_all(&complement(&slopes, ctx.course.whole())))
        }
        1 => Ok(r.intersect_all(&slopes_where(ctx, true))),
        2 => Ok(r.intersect_all(&slopes_where(ctx, false))),
        value => Err(InvariantError::OutOfRange {
            field: "slope",
            value: i64::from(value),
        }
        .into()),
    }
}

fn up_slopes(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    Ok(if arg == 1 {
        r.intersect_all(&slopes_where(ctx, true))
    } else {
        RegionList::new()
    })
}

fn down_slopes(r: &RegionList, arg: i32, ctx: &ConditionContext<'_>) -> Result<RegionList, ConditionError> {
    Ok(if arg == 1 {
        r.intersect_all(&slopes_where(ctx, false))
    } else {
        RegionList::new()
    })
}

/// Owned registry of named conditions. Build once and share by reference.
pub struct ConditionTable {
    entries: HashMap<String, Box<dyn Condition>>,
}

impl ConditionTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Adds or replaces a condition under its own name.
    pub fn insert(&mut self, condition: Box<dyn Condition>) {
        self.entries.insert(condition.name().to_string(), condition);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Condition> {
        self.entries.get(name).map(|c| c.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn add(&mut self, name: &'static str, condition: Box<dyn Condition>) {
        self.entries.insert(name.to_string(), condition);
    }

    fn add_static(&mut self, name: &'static str, value: ValueFn) {
        self.add(name, Box::new(StaticValue { name, value }));
    }

    fn add_runtime(&mut self, name: &'static str, value: RuntimeValue) {
        self.add(name, Box::new(Runtime { name, value }));
    }

    fn add_spatial(&mut self, spatial: Spatial) {
        self.add(spatial.name, Box::new(spatial));
    }

    fn add_noop(&mut self, name: &'static str, policy: SamplePolicy) {
        self.add(name, Box::new(Noop { name, policy }));
    }

    /// The full catalogue of conditions used by skill data.
    pub fn standard() -> Self {
        let mut t = Self::empty();

        t.add_static("base_speed", |c| c.horse.speed as i32);
        t.add_static("base_stamina", |c| c.horse.stamina as i32);
        t.add_static("base_power", |c| c.horse.power as i32);
        t.add_static("base_guts", |c| c.horse.guts as i32);
        t.add_static("base_wiz", |c| c.horse.wisdom as i32);
        t.add_static("course_distance", |c| c.course.distance as i32);
        t.add_static("distance_type", |c| c.course.distance_type());
        t.add_static("grade", |c| c.params.grade as i32);
        t.add_static("ground_condition", |c| c.params.ground as i32);
        t.add_static("ground_type", |c| c.course.surface as i32);
        t.add_static("is_basis_distance", |c| i32::from(c.course.is_basis_distance()));
        t.add_static("motivation", |c| c.params.mood.motivation());
        t.add_static("popularity", |c| c.params.popularity as i32);
        t.add_static("rotation", |c| match c.course.turn {
            Turn::Right => 1,
            Turn::Left => 2,
            Turn::Straight => 4,
        });
        t.add_static("running_style", |c| c.horse.strategy.condition_code());
        t.add_static("season", |c| c.params.season as i32);
        t.add_static("time", |c| c.params.time as i32);
        t.add_static("track_id", |c| c.course.track_id as i32);
        t.add_static("weather", |c| c.params.weather as i32);

        t.add_runtime("accumulatetime", RuntimeValue::AccumulateTime);
        t.add_runtime("hp_per", RuntimeValue::HpPercent);
        t.add_runtime("is_lastspurt", RuntimeValue::IsLastSpurt);
        t.add_runtime("is_badstart", RuntimeValue::IsBadStart);
        t.add_runtime("activate_count_all", RuntimeValue::ActivateCount(ActivateBucket::All));
        t.add_runtime("activate_count_start", RuntimeValue::ActivateCount(ActivateBucket::Start));
        t.add_runtime("activate_count_middle", RuntimeValue::ActivateCount(ActivateBucket::Middle));
        t.add_runtime("activate_count_end_after", RuntimeValue::ActivateCount(ActivateBucket::EndAfter));
        t.add_runtime("activate_count_heal", RuntimeValue::ActivateCountHeal);
        t.add_runtime("is_activate_other_skill_detail", RuntimeValue::OtherSkillActivated);
        t.add("is_used_skill_id", Box::new(UsedSkill));

        t.add_spatial(Spatial {
            name: "phase",
            policy: SamplePolicy::Immediate,
            eq: Some(phase_eq),
            ne: Some(phase_ne),
            lt: Some(phase_lt),
            le: Some(phase_le),
            gt: Some(phase_gt),
            ge: Some(phase_ge),
        });
        t.add_spatial(Spatial::eq_only("phase_random", SamplePolicy::Random, phase_eq));
        t.add_spatial(Spatial::eq_only("phase_firsthalf_random", SamplePolicy::Random, phase_first_half));
        t.add_spatial(Spatial::eq_only("phase_laterhalf_random", SamplePolicy::Random, phase_later_half));
        t.add_spatial(Spatial::eq_only("phase_firstquarter_random", SamplePolicy::Random, phase_first_quarter));
        t.add_spatial(Spatial::eq_only("phase_corner_random", SamplePolicy::Random, phase_corners));
        t.add_spatial(Spatial::eq_only("phase_straight_random", SamplePolicy::StraightRandom, phase_straights));
        t.add_spatial(Spatial {
            name: "distance_rate",
            policy: SamplePolicy::Immediate,
            eq: None,
            ne: None,
            lt: Some(distance_rate_before),
            le: Some(distance_rate_before),
            gt: Some(distance_rate_after),
            ge: Some(distance_rate_after),
        });
        t.add_spatial(Spatial::eq_only("distance_rate_after_random", SamplePolicy::Random, distance_rate_after));
        t.add_spatial(Spatial {
            name: "remain_distance",
            policy: SamplePolicy::Immediate,
            eq: Some(remain_exactly),
            ne: Some(remain_not),
            lt: Some(remain_at_most),
            le: Some(remain_at_most),
            gt: Some(remain_at_least),
            ge: Some(remain_at_least),
        });
        t.add_spatial(Spatial {
            name: "corner",
            policy: SamplePolicy::Immediate,
            eq: Some(corner_eq),
            ne: Some(corner_ne),
            lt: None,
            le: None,
            gt: None,
            ge: None,
        });
        t.add_spatial(Spatial::eq_only("corner_random", SamplePolicy::Random, corner_random));
        t.add_spatial(Spatial::eq_only("all_corner_random", SamplePolicy::AllCornerRandom, all_corners));
        t.add_spatial(Spatial::eq_only("is_finalcorner", SamplePolicy::Immediate, final_corner));
        t.add_spatial(Spatial::eq_only("is_finalcorner_laterhalf", SamplePolicy::Immediate, final_corner_later_half));
        t.add_spatial(Spatial::eq_only("is_finalcorner_random", SamplePolicy::Random, final_corner_whole));
        t.add_spatial(Spatial::eq_only("is_last_straight", SamplePolicy::Immediate, last_straight));
        t.add_spatial(Spatial::eq_only("is_last_straight_onetime", SamplePolicy::Immediate, last_straight_onetime));
        t.add_spatial(Spatial::eq_only("straight_random", SamplePolicy::StraightRandom, all_straights));
        t.add_spatial(Spatial::eq_only("straight_front_type", SamplePolicy::Immediate, straight_front_type));
        t.add_spatial(Spatial::eq_only("slope", SamplePolicy::Immediate, slope));
        t.add_spatial(Spatial::eq_only("up_slope_random", SamplePolicy::Random, up_slopes));
        t.add_spatial(Spatial::eq_only("down_slope_random", SamplePolicy::Random, down_slopes));

        t.add("order", Box::new(Order { name: "order", rate: false }));
        t.add("order_rate", Box::new(Order { name: "order_rate", rate: true }));

        let erlang = SamplePolicy::Distribution(Distribution::Erlang { k: 3, lambda: 2.0 });
        let log_normal = SamplePolicy::Distribution(Distribution::LogNormal { mu: 0.0, sigma: 0.5 });
        let uniform = SamplePolicy::Distribution(Distribution::Uniform);
        for name in ["change_order_onetime", "is_overtake", "overtake_target_time", "is_move_lane"] {
            t.add_noop(name, erlang);
        }
        for name in [
            "blocked_front",
            "blocked_side_continuetime",
            "behind_near_lane_time",
            "infront_near_lane_time",
        ] {
            t.add_noop(name, log_normal);
        }
        for name in ["near_count", "compete_fight_count", "temptation_count"] {
            t.add_noop(name, uniform);
        }
        for name in [
            "bashin_diff_behind",
            "bashin_diff_infront",
            "distance_diff_rate",
            "distance_diff_top",
        ] {
            t.add_noop(name, SamplePolicy::Random);
        }
        t
    }
}

impl Default for ConditionTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::race::course::tests::sample_course;
    use crate::race::horse::tests::sample_horse;
    use crate::race::horse::build_base_stats;
    use crate::race::params::Mood;

    fn with_ctx<R>(f: impl FnOnce(&ConditionContext<'_>) -> R) -> R {
        let course = sample_course();
        let horse = build_base_stats(&sample_horse(), Mood::default());
        let params = RaceParameters::default();
        let ctx = ConditionContext {
            course: &course,
            horse: &horse,
            params: &params,
        };
        f(&ctx)
    }

    fn whole(ctx: &ConditionContext<'_>) -> RegionList {
        RegionList::single(ctx.course.whole())
    }

    #[test]
    fn complement_fills_gaps() {
        let gaps = complement(
            &[Region::new(100.0, 150.0), Region::new(500.0, 550.0)],
            Region::new(0.0, 2000.0),
        );
        assert_eq!(
            gaps,
            vec![
                Region::new(0.0, 100.0),
                Region::new(150.0, 500.0),
                Region::new(550.0, 2000.0)
            ]
        );
    }

    #[test]
    fn corners_number_back_from_final() {
        with_ctx(|ctx| {
            assert_eq!(numbered_corners(ctx, 4), vec![Region::new(500.0, 550.0)]);
            assert_eq!(numbered_corners(ctx, 3), vec![Region::new(100.0, 150.0)]);
            assert!(numbered_corners(ctx, 1).is_empty());
        });
    }

    #[test]
    fn unsupported_comparator_is_an_error() {
        let table = ConditionTable::standard();
        with_ctx(|ctx| {
            let corner = table.get("corner").unwrap();
            let err = corner.filter(Comparator::Lt, &whole(ctx), 1, ctx).unwrap_err();
            assert!(matches!(err, ConditionError::UnsupportedComparator { ref condition, cmp: Comparator::Lt } if condition == "corner"));
        });
    }

    #[test]
    fn static_value_keeps_or_drops_everything() {
        let table = ConditionTable::standard();
        with_ctx(|ctx| {
            let distance_type = table.get("distance_type").unwrap();
            let kept = distance_type.filter(Comparator::Eq, &whole(ctx), 3, ctx).unwrap();
            assert_eq!(kept.regions, whole(ctx));
            let dropped = distance_type.filter(Comparator::Eq, &whole(ctx), 4, ctx).unwrap();
            assert!(dropped.regions.is_empty());
        });
    }

    #[test]
    fn runtime_condition_attaches_predicate() {
        let table = ConditionTable::standard();
        with_ctx(|ctx| {
            let hp = table.get("hp_per").unwrap();
            let out = hp.filter(Comparator::Le, &whole(ctx), 30, ctx).unwrap();
            assert_eq!(out.regions, whole(ctx));
            assert_eq!(
                out.predicate,
                Predicate::Compare {
                    value: RuntimeValue::HpPercent,
                    cmp: Comparator::Le,
                    arg: 30
                }
            );
        });
    }

    #[test]
    fn remain_distance_selects_tail() {
        let table = ConditionTable::standard();
        with_ctx(|ctx| {
            let remain = table.get("remain_distance").unwrap();
            let out = remain.filter(Comparator::Le, &whole(ctx), 200, ctx).unwrap();
            assert_eq!(out.regions.as_slice(), &[Region::new(1800.0, 2000.0)]);
        });
    }

    #[test]
    fn slope_conditions_split_up_and_down() {
        let table = ConditionTable::standard();
        with_ctx(|ctx| {
            let slope = table.get("slope").unwrap();
            let up = slope.filter(Comparator::Eq, &whole(ctx), 1, ctx).unwrap();
            assert_eq!(up.regions.as_slice(), &[Region::new(1200.0, 1300.0)]);
            let down = slope.filter(Comparator::Eq, &whole(ctx), 2, ctx).unwrap();
            assert!(down.regions.is_empty());
            let flat = slope.filter(Comparator::Eq, &whole(ctx), 0, ctx).unwrap();
            assert_eq!(flat.regions.len(), 2);
            assert!(slope.filter(Comparator::Eq, &whole(ctx), 3, ctx).is_err());
        });
    }

    #[test]
    fn order_without_constraint_is_noop() {
        let table = ConditionTable::standard();
        let course = sample_course();
        let horse = build_base_stats(&sample_horse(), Mood::default());
        let mut params = RaceParameters::default();
        let ctx = ConditionContext {
            course: &course,
            horse: &horse,
            params: &params,
        };
        let order = table.get("order").unwrap();
        let all = RegionList::single(course.whole());
        assert_eq!(order.filter(Comparator::Le, &all, 3, &ctx).unwrap().regions, all);

        params.order_range = Some((5, 9));
        let ctx = ConditionContext {
            course: &course,
            horse: &horse,
            params: &params,
        };
        assert!(order.filter(Comparator::Le, &all, 3, &ctx).unwrap().regions.is_empty());
        assert_eq!(order.filter(Comparator::Ge, &all, 6, &ctx).unwrap().regions, all);
        let rate = table.get("order_rate").unwrap();
        // 9 horses, 50% -> order 5
        assert_eq!(rate.filter(Comparator::Le, &all, 50, &ctx).unwrap().regions, all);
        assert!(rate.filter(Comparator::Le, &all, 40, &ctx).unwrap().regions.is_empty());
    }

    #[test]
    fn catalogue_has_field_dependent_noops() {
        let table = ConditionTable::standard();
        for name in ["blocked_front", "is_overtake", "near_count", "bashin_diff_behind"] {
            let c = table.get(name).unwrap();
            assert_ne!(c.sample_policy(), SamplePolicy::Immediate);
        }
        assert!(table.get("no_such_condition").is_none());
    }
}
