//! Skill records: descriptors as loaded from data, resolved triggers, and per-trial pending skills.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::conditions::{Predicate, SamplePolicy};
use crate::race::region::{Region, RegionList};

/// Game data stores modifiers and durations as fixed-point integers scaled by this factor.
pub const DATA_UNIT_SCALE: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    White = 1,
    Gold = 2,
    Unique = 3,
    Inherited = 4,
    Evolution = 6,
}

impl Rarity {
    /// Skills `ActivateRandomGold` may pull in.
    pub fn is_high_rarity(self) -> bool {
        matches!(self, Rarity::Gold | Rarity::Evolution)
    }
}

/// Which side of a comparison owns a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Perspective {
    #[serde(rename = "self")]
    Own,
    Other,
}

/// Which racer an effect applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectTarget {
    #[default]
    #[serde(rename = "self")]
    Own,
    Other,
    Any,
}

impl EffectTarget {
    pub fn applies_to(self, perspective: Perspective) -> bool {
        match (self, perspective) {
            (EffectTarget::Any, _) => true,
            (EffectTarget::Own, Perspective::Own) => true,
            (EffectTarget::Other, Perspective::Other) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    SpeedUp,
    StaminaUp,
    PowerUp,
    GutsUp,
    WisdomUp,
    MultiplyStartDelay,
    SetStartDelay,
    TargetSpeed,
    Accel,
    CurrentSpeed,
    CurrentSpeedWithNaturalDeceleration,
    Recovery,
    ActivateRandomGold,
    ExtendEvolvedDuration,
}

impl EffectKind {
    pub fn is_stat_up(self) -> bool {
        matches!(
            self,
            EffectKind::SpeedUp
                | EffectKind::StaminaUp
                | EffectKind::PowerUp
                | EffectKind::GutsUp
                | EffectKind::WisdomUp
        )
    }

    /// Effects that end position-keep pace-down when active.
    pub fn is_speed_class(self) -> bool {
        matches!(
            self,
            EffectKind::TargetSpeed
                | EffectKind::CurrentSpeed
                | EffectKind::CurrentSpeedWithNaturalDeceleration
        )
    }

    /// Effects that hold a modifier for a duration.
    pub fn is_timed(self) -> bool {
        matches!(
            self,
            EffectKind::TargetSpeed
                | EffectKind::Accel
                | EffectKind::CurrentSpeed
                | EffectKind::CurrentSpeedWithNaturalDeceleration
        )
    }
}

/// One effect in data units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillEffect {
    pub kind: EffectKind,
    pub modifier: f64,
    #[serde(default)]
    pub target: EffectTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillAlternative {
    #[serde(default)]
    pub precondition: String,
    pub condition: String,
    #[serde(default)]
    pub base_duration: f64,
    #[serde(default)]
    pub effects: Vec<SkillEffect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub rarity: Rarity,
    pub alternatives: Vec<SkillAlternative>,
}

/// Shop metadata used for ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMeta {
    pub id: String,
    #[serde(default)]
    pub base_cost: u32,
    #[serde(default)]
    pub group_id: Option<u32>,
}

/// An effect in simulation units. `duration` is seconds, already scaled by course distance.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub kind: EffectKind,
    pub modifier: f64,
    pub duration: f64,
}

/// A skill resolved against one (horse, course, perspective). Shared by every trial.
#[derive(Debug, Clone)]
pub struct SkillTrigger {
    pub skill_id: String,
    pub perspective: Perspective,
    pub rarity: Rarity,
    pub sample_policy: SamplePolicy,
    pub regions: RegionList,
    pub extra: Arc<Predicate>,
    pub effects: Arc<[Effect]>,
}

impl SkillTrigger {
    pub fn pending(&self, trigger: Region) -> PendingSkill {
        PendingSkill {
            skill_id: self.skill_id.clone(),
            perspective: self.perspective,
            rarity: self.rarity,
            trigger,
            extra: Arc::clone(&self.extra),
            effects: Arc::clone(&self.effects),
        }
    }
}

/// A skill waiting to fire in one trial.
#[derive(Debug, Clone)]
pub struct PendingSkill {
    pub skill_id: String,
    pub perspective: Perspective,
    pub rarity: Rarity,
    pub trigger: Region,
    pub extra: Arc<Predicate>,
    pub effects: Arc<[Effect]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_target_filters_by_perspective() {
        assert!(EffectTarget::Own.applies_to(Perspective::Own));
        assert!(!EffectTarget::Own.applies_to(Perspective::Other));
        assert!(EffectTarget::Other.applies_to(Perspective::Other));
        assert!(EffectTarget::Any.applies_to(Perspective::Own));
        assert!(EffectTarget::Any.applies_to(Perspective::Other));
    }

    #[test]
    fn descriptor_parses_from_yaml() {
        let yaml = r#"
id: "200331"
rarity: gold
alternatives:
  - precondition: ""
    condition: phase>=2&corner!=0
    base_duration: 30000
    effects:
      - { kind: target_speed, modifier: 3500 }
      - { kind: accel, modifier: 2000, target: any }
"#;
        let skill: SkillDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(skill.rarity, Rarity::Gold);
        assert_eq!(skill.alternatives[0].effects.len(), 2);
        assert_eq!(skill.alternatives[0].effects[0].target, EffectTarget::Own);
        assert_eq!(skill.alternatives[0].effects[1].target, EffectTarget::Any);
    }
}
