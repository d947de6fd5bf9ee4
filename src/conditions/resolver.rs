//! Resolves a skill descriptor against one horse and course into trigger records.

use std::sync::Arc;

use tracing::debug;

use crate::conditions::operators::Predicate;
use crate::conditions::parser::parse;
use crate::conditions::policy::SamplePolicy;
use crate::conditions::table::{ConditionContext, ConditionTable};
use crate::conditions::ConditionError;
use crate::race::region::{Region, RegionList};
use crate::race::skill::{Effect, Perspective, SkillDescriptor, SkillTrigger, DATA_UNIT_SCALE};

/// Conditions that let a later alternative coexist with an earlier one.
const LAYERING_CONDITIONS: [&str; 2] = ["is_activate_other_skill_detail", "is_used_skill_id"];

/// Triggers are kept even when every effect is filtered out for the perspective, so both sides
/// of a comparison sample the same set of skills from the shared stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub perspective: Perspective,
}

impl ResolveOptions {
    pub fn own() -> Self {
        Self {
            perspective: Perspective::Own,
        }
    }

    pub fn other() -> Self {
        Self {
            perspective: Perspective::Other,
        }
    }
}

fn scaled_effects(skill: &SkillDescriptor, alt_index: usize, distance: f64, perspective: Perspective) -> Vec<Effect> {
    let alt = &skill.alternatives[alt_index];
    let duration = alt.base_duration / DATA_UNIT_SCALE * distance / 1000.0;
    alt.effects
        .iter()
        .filter(|e| e.target.applies_to(perspective))
        .map(|e| Effect {
            kind: e.kind,
            modifier: e.modifier / DATA_UNIT_SCALE,
            duration: if e.kind.is_timed() { duration } else { 0.0 },
        })
        .collect()
}

/// A trigger past the finish line: never fires, keeps the skill's RNG footprint.
fn sentinel(skill: &SkillDescriptor, distance: f64, perspective: Perspective, effects: Vec<Effect>) -> SkillTrigger {
    SkillTrigger {
        skill_id: skill.id.clone(),
        perspective,
        rarity: skill.rarity,
        sample_policy: SamplePolicy::Immediate,
        regions: RegionList::single(Region::new(distance + 100.0, distance + 110.0)),
        extra: Arc::new(Predicate::Always),
        effects: effects.into(),
    }
}

/// Evaluates each alternative in order. The first with a non-empty region set wins; later ones
/// are considered only when their condition layers on another skill's activation.
pub fn resolve_skill(
    table: &ConditionTable,
    skill: &SkillDescriptor,
    ctx: &ConditionContext<'_>,
    options: ResolveOptions,
) -> Result<Vec<SkillTrigger>, ConditionError> {
    let distance = ctx.course.distance;
    let whole = RegionList::single(ctx.course.whole());
    let mut triggers = Vec::new();

    for (index, alt) in skill.alternatives.iter().enumerate() {
        let candidates = if alt.precondition.trim().is_empty() {
            whole.clone()
        } else {
            let pre = parse(&alt.precondition, table)?.apply(&whole, ctx)?;
            let Some(first) = pre.regions.iter().map(|r| r.start).min_by(f64::total_cmp) else {
                continue;
            };
            RegionList::single(Region::new(first, distance))
        };

        let op = parse(&alt.condition, table)?;
        if !triggers.is_empty() && !LAYERING_CONDITIONS.iter().any(|c| op.mentions(c)) {
            continue;
        }
        let filtered = op.apply(&candidates, ctx)?;
        if filtered.regions.is_empty() {
            continue;
        }
        let effects = scaled_effects(skill, index, distance, options.perspective);
        triggers.push(SkillTrigger {
            skill_id: skill.id.clone(),
            perspective: options.perspective,
            rarity: skill.rarity,
            sample_policy: op.sample_policy(),
            regions: filtered.regions,
            extra: Arc::new(filtered.predicate),
            effects: effects.into(),
        });
    }

    if triggers.is_empty() && skill.alternatives.iter().any(|alt| !alt.effects.is_empty()) {
        let effects: Vec<Effect> = (0..skill.alternatives.len())
            .flat_map(|i| scaled_effects(skill, i, distance, options.perspective))
            .collect();
        debug!(skill = %skill.id, "no alternative resolved; registering sentinel trigger");
        triggers.push(sentinel(skill, distance, options.perspective, effects));
    }
    Ok(triggers)
}
