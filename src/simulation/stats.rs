//! Aggregation of per-trial deltas and ranking of candidate skills.

use serde::{Deserialize, Serialize};

use crate::data::SkillCatalog;

/// Summary of one comparison's sorted deltas, in game length units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

/// Sorts in place with a total order; NaN sorts last.
pub fn sort_deltas(deltas: &mut [f64]) {
    deltas.sort_by(f64::total_cmp);
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median of an already sorted slice.
pub fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 1 => sorted[n / 2],
        _ => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
    }
}

/// Central interval covering `width` percent of an already sorted slice, by percentile index.
pub fn confidence_interval(sorted: &[f64], width: f64) -> (f64, f64) {
    let n = sorted.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let w = width.clamp(0.0, 100.0);
    let lower = ((n as f64) * (100.0 - w) / 200.0).floor() as usize;
    let upper = (((n as f64) * (100.0 + w) / 200.0).ceil() as usize).saturating_sub(1);
    let lower = lower.min(n - 1);
    let upper = upper.clamp(lower, n - 1);
    (sorted[lower], sorted[upper])
}

/// `None` for an empty result set.
pub fn summarize(sorted: &[f64], ci_width: f64) -> Option<Summary> {
    let (&min, &max) = (sorted.first()?, sorted.last()?);
    let (ci_lower, ci_upper) = confidence_interval(sorted, ci_width);
    Some(Summary {
        mean: mean(sorted),
        median: median(sorted),
        min,
        max,
        ci_lower,
        ci_upper,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillResult {
    pub skill: String,
    pub summary: Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSkill {
    pub skill: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_cost: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<u32>,
    /// Mean gain per skill point; absent when the skill has no known cost.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain_per_cost: Option<f64>,
}

/// Best mean gain first; ties broken by median, then by cost efficiency.
pub fn rank_results(results: Vec<SkillResult>, catalog: &SkillCatalog) -> Vec<RankedSkill> {
    let mut ranked: Vec<RankedSkill> = results
        .into_iter()
        .map(|result| {
            let meta = catalog.meta(&result.skill);
            let base_cost = meta.map(|m| m.base_cost).filter(|c| *c > 0);
            RankedSkill {
                name: catalog.get(&result.skill).and_then(|s| s.name.clone()),
                group_id: meta.and_then(|m| m.group_id),
                gain_per_cost: base_cost.map(|c| result.summary.mean / f64::from(c)),
                base_cost,
                summary: result.summary,
                skill: result.skill,
            }
        })
        .collect();

    ranked.sort_by(|left, right| {
        right
            .summary
            .mean
            .total_cmp(&left.summary.mean)
            .then_with(|| right.summary.median.total_cmp(&left.summary.median))
            .then_with(|| {
                right
                    .gain_per_cost
                    .unwrap_or(f64::NEG_INFINITY)
                    .total_cmp(&left.gain_per_cost.unwrap_or(f64::NEG_INFINITY))
            })
    });

    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::race::SkillMeta;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn summary_of_known_values() {
        let mut deltas: Vec<f64> = (1..=10).map(f64::from).rev().collect();
        sort_deltas(&mut deltas);
        let s = summarize(&deltas, 80.0).unwrap();
        assert!(approx_eq(s.mean, 5.5, 1e-12));
        assert!(approx_eq(s.median, 5.5, 1e-12));
        assert_eq!((s.min, s.max), (1.0, 10.0));
        assert_eq!((s.ci_lower, s.ci_upper), (2.0, 9.0));
    }

    #[test]
    fn ci_is_monotonic_in_width() {
        let sorted: Vec<f64> = (0..200).map(|i| f64::from(i) * 0.5).collect();
        let (narrow_lo, narrow_hi) = confidence_interval(&sorted, 50.0);
        let (wide_lo, wide_hi) = confidence_interval(&sorted, 95.0);
        assert!(wide_lo <= narrow_lo && narrow_hi <= wide_hi);
        assert_eq!(confidence_interval(&sorted, 100.0), (0.0, 99.5));
        let (zero_lo, zero_hi) = confidence_interval(&sorted, 0.0);
        assert!(zero_lo <= zero_hi);
    }

    #[test]
    fn empty_and_single() {
        assert!(summarize(&[], 95.0).is_none());
        let s = summarize(&[2.5], 95.0).unwrap();
        assert_eq!((s.ci_lower, s.ci_upper, s.median), (2.5, 2.5, 2.5));
    }

    #[test]
    fn ranking_orders_by_mean_and_computes_efficiency() {
        let catalog = SkillCatalog::new(
            vec![],
            vec![SkillMeta {
                id: "b".into(),
                base_cost: 200,
                group_id: Some(7),
            }],
        );
        let summary = |mean: f64| Summary {
            mean,
            median: mean,
            min: mean,
            max: mean,
            ci_lower: mean,
            ci_upper: mean,
        };
        let ranked = rank_results(
            vec![
                SkillResult { skill: "a".into(), summary: summary(0.5) },
                SkillResult { skill: "b".into(), summary: summary(1.0) },
            ],
            &catalog,
        );
        assert_eq!(ranked[0].skill, "b");
        assert_eq!(ranked[0].group_id, Some(7));
        assert!(approx_eq(ranked[0].gain_per_cost.unwrap(), 0.005, 1e-12));
        assert_eq!(ranked[1].gain_per_cost, None);
    }
}
