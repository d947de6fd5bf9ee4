//! Sample policies: turn candidate regions into one concrete trigger region per trial.

use crate::conditions::ConditionError;
use crate::race::region::{Region, RegionList};
use crate::race::rng::Rng;

/// Width of a sampled trigger region.
pub const TRIGGER_WIDTH: f64 = 10.0;
const MAX_CORNER_TRIGGERS: usize = 4;

/// Activation-latency distributions. Draws are normalised to `[0, 1]` by the distribution's
/// mean + 3σ so a draw maps to the same position regardless of how many trials are sampled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distribution {
    Uniform,
    LogNormal { mu: f64, sigma: f64 },
    Erlang { k: u32, lambda: f64 },
}

impl Distribution {
    fn upper(self) -> f64 {
        match self {
            Distribution::Uniform => 1.0,
            Distribution::LogNormal { mu, sigma } => (mu + 3.0 * sigma).exp(),
            Distribution::Erlang { k, lambda } => {
                let k = f64::from(k);
                (k + 3.0 * k.sqrt()) / lambda
            }
        }
    }

    fn draw(self, rng: &mut Rng) -> f64 {
        let x = match self {
            Distribution::Uniform => rng.random(),
            Distribution::LogNormal { mu, sigma } => (mu + sigma * standard_normal(rng)).exp(),
            Distribution::Erlang { k, lambda } => {
                let product: f64 = (0..k).map(|_| 1.0 - rng.random()).product();
                -product.ln() / lambda
            }
        };
        (x / self.upper()).clamp(0.0, 1.0)
    }
}

/// Marsaglia polar method; one of the pair is discarded so each call consumes a whole draw.
fn standard_normal(rng: &mut Rng) -> f64 {
    loop {
        let u = 2.0 * rng.random() - 1.0;
        let v = 2.0 * rng.random() - 1.0;
        let s = u * u + v * v;
        if s > 0.0 && s < 1.0 {
            return u * (-2.0 * s.ln() / s).sqrt();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplePolicy {
    Immediate,
    Random,
    Distribution(Distribution),
    StraightRandom,
    AllCornerRandom,
}

impl SamplePolicy {
    /// Combines the policies of two sub-conditions. Immediate yields to anything; Random yields to
    /// distributions; straight/corner placement wins over both and cannot be mixed with each other.
    pub fn reconcile(self, other: SamplePolicy) -> Result<SamplePolicy, ConditionError> {
        use SamplePolicy as P;
        match (self, other) {
            (P::Immediate, p) | (p, P::Immediate) => Ok(p),
            (P::StraightRandom, P::AllCornerRandom) | (P::AllCornerRandom, P::StraightRandom) => {
                Err(ConditionError::IncompatiblePolicies {
                    left: self,
                    right: other,
                })
            }
            (P::StraightRandom, _) | (_, P::StraightRandom) => Ok(P::StraightRandom),
            (P::AllCornerRandom, _) | (_, P::AllCornerRandom) => Ok(P::AllCornerRandom),
            (P::Distribution(d), _) | (_, P::Distribution(d)) => Ok(P::Distribution(d)),
            (P::Random, P::Random) => Ok(P::Random),
        }
    }

    /// Exactly `n` trigger regions, or none when `regions` is empty.
    pub fn sample(&self, regions: &RegionList, n: usize, rng: &mut Rng) -> Vec<Region> {
        let Some(first) = regions.first().copied() else {
            return Vec::new();
        };
        match self {
            SamplePolicy::Immediate => vec![first; n],
            SamplePolicy::Random => {
                let candidates = regions.as_slice();
                let total = regions.total_len();
                (0..n)
                    .map(|_| {
                        let threshold = rng.random() * total;
                        let mut acc = 0.0;
                        let chosen = candidates
                            .iter()
                            .find(|r| {
                                acc += r.len();
                                threshold < acc
                            })
                            .unwrap_or(&candidates[candidates.len() - 1]);
                        place_in(chosen, rng.random())
                    })
                    .collect()
            }
            SamplePolicy::StraightRandom => {
                let candidates = regions.as_slice();
                (0..n)
                    .map(|_| {
                        let idx = rng.uniform(candidates.len() as u32) as usize;
                        place_in(&candidates[idx], rng.random())
                    })
                    .collect()
            }
            SamplePolicy::AllCornerRandom => {
                let sorted = regions.sorted();
                (0..n)
                    .map(|_| {
                        let placed = place_corner_triggers(&sorted, rng);
                        placed
                            .into_iter()
                            .min_by(|a, b| a.start.total_cmp(&b.start))
                            .unwrap_or(first)
                    })
                    .collect()
            }
            SamplePolicy::Distribution(dist) => {
                let sorted = regions.sorted();
                let total = regions.total_len();
                (0..n)
                    .map(|_| walk_sorted(&sorted, dist.draw(rng) * total))
                    .collect()
            }
        }
    }
}

/// A trigger inside `region` at fraction `u` of the room left for a full-width trigger.
fn place_in(region: &Region, u: f64) -> Region {
    let room = (region.len() - TRIGGER_WIDTH).max(0.0);
    let start = region.start + u * room;
    Region::new(start, (start + TRIGGER_WIDTH).min(region.end))
}

/// Maps an offset into the concatenated length of `sorted` back onto the course.
fn walk_sorted(sorted: &[Region], mut offset: f64) -> Region {
    let last = sorted.len() - 1;
    for (i, region) in sorted.iter().enumerate() {
        let len = region.len();
        if offset < len || i == last {
            let room = (len - TRIGGER_WIDTH).max(0.0);
            let start = region.start + offset.min(room);
            return Region::new(start, (start + TRIGGER_WIDTH).min(region.end));
        }
        offset -= len;
    }
    Region::EMPTY
}

/// Up to four ordered, non-overlapping triggers: each placement discards earlier candidates and
/// shrinks the chosen one to the part after the new trigger.
fn place_corner_triggers(sorted: &[Region], rng: &mut Rng) -> Vec<Region> {
    let mut candidates: Vec<Region> = sorted.to_vec();
    let mut placed = Vec::with_capacity(MAX_CORNER_TRIGGERS);
    while placed.len() < MAX_CORNER_TRIGGERS && !candidates.is_empty() {
        let idx = rng.uniform(candidates.len() as u32) as usize;
        let trigger = place_in(&candidates[idx], rng.random());
        placed.push(trigger);
        candidates.drain(..idx);
        let rest = Region::new(trigger.end, candidates[0].end);
        if rest.len() >= TRIGGER_WIDTH {
            candidates[0] = rest;
        } else {
            candidates.remove(0);
        }
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regions() -> RegionList {
        [
            Region::new(100.0, 150.0),
            Region::new(500.0, 550.0),
            Region::new(1200.0, 1400.0),
        ]
        .into_iter()
        .collect()
    }

    fn all_policies() -> Vec<SamplePolicy> {
        vec![
            SamplePolicy::Immediate,
            SamplePolicy::Random,
            SamplePolicy::StraightRandom,
            SamplePolicy::AllCornerRandom,
            SamplePolicy::Distribution(Distribution::Uniform),
            SamplePolicy::Distribution(Distribution::LogNormal { mu: 0.0, sigma: 0.5 }),
            SamplePolicy::Distribution(Distribution::Erlang { k: 3, lambda: 2.0 }),
        ]
    }

    #[test]
    fn every_policy_returns_exactly_n() {
        for policy in all_policies() {
            let mut rng = Rng::new(11);
            let out = policy.sample(&regions(), 37, &mut rng);
            assert_eq!(out.len(), 37, "{policy:?}");
            assert!(policy.sample(&RegionList::new(), 5, &mut rng).is_empty());
        }
    }

    #[test]
    fn immediate_returns_first_region() {
        let mut rng = Rng::new(1);
        let before = rng.state();
        let out = SamplePolicy::Immediate.sample(&regions(), 4, &mut rng);
        assert!(out.iter().all(|r| *r == Region::new(100.0, 150.0)));
        assert_eq!(rng.state(), before);
    }

    #[test]
    fn random_triggers_fall_inside_candidates() {
        let list = regions();
        for policy in all_policies().into_iter().skip(1) {
            let mut rng = Rng::new(99);
            for trigger in policy.sample(&list, 200, &mut rng) {
                assert!((trigger.len() - TRIGGER_WIDTH).abs() < 1e-9);
                assert!(
                    list.iter().any(|r| r.fully_contains(&trigger)),
                    "{policy:?} placed {trigger:?}"
                );
            }
        }
    }

    #[test]
    fn triggers_stay_inside_short_regions() {
        let short: RegionList = [Region::new(1500.0, 1501.0)].into_iter().collect();
        for policy in all_policies() {
            let mut rng = Rng::new(21);
            for trigger in policy.sample(&short, 20, &mut rng) {
                assert_eq!(trigger, Region::new(1500.0, 1501.0), "{policy:?}");
            }
        }
    }

    #[test]
    fn corner_triggers_are_ordered_and_disjoint() {
        let mut rng = Rng::new(5);
        for _ in 0..50 {
            let placed = place_corner_triggers(&regions().sorted(), &mut rng);
            assert!(!placed.is_empty() && placed.len() <= MAX_CORNER_TRIGGERS);
            for pair in placed.windows(2) {
                assert!(pair[0].end <= pair[1].start);
            }
        }
    }

    #[test]
    fn reconcile_precedence() {
        use SamplePolicy as P;
        let d = P::Distribution(Distribution::Uniform);
        assert_eq!(P::Immediate.reconcile(P::Random), Ok(P::Random));
        assert_eq!(P::Random.reconcile(P::Immediate), Ok(P::Random));
        assert_eq!(P::Random.reconcile(d), Ok(d));
        assert_eq!(d.reconcile(P::Random), Ok(d));
        assert_eq!(d.reconcile(P::StraightRandom), Ok(P::StraightRandom));
        assert_eq!(P::AllCornerRandom.reconcile(P::Random), Ok(P::AllCornerRandom));
        assert!(P::StraightRandom.reconcile(P::AllCornerRandom).is_err());
        assert!(P::AllCornerRandom.reconcile(P::StraightRandom).is_err());
    }

    #[test]
    fn left_distribution_wins() {
        let log = SamplePolicy::Distribution(Distribution::LogNormal { mu: 0.0, sigma: 1.0 });
        let erl = SamplePolicy::Distribution(Distribution::Erlang { k: 2, lambda: 1.0 });
        assert_eq!(log.reconcile(erl), Ok(log));
    }
}
