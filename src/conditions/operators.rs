//! Comparators, the compiled operator tree and deferred runtime predicates.

use std::fmt;

use crate::conditions::policy::SamplePolicy;
use crate::conditions::table::{Condition, ConditionContext, Filtered};
use crate::conditions::ConditionError;
use crate::race::region::RegionList;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    pub fn holds<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        match self {
            Comparator::Eq => lhs == rhs,
            Comparator::Ne => lhs != rhs,
            Comparator::Lt => lhs < rhs,
            Comparator::Le => lhs <= rhs,
            Comparator::Gt => lhs > rhs,
            Comparator::Ge => lhs >= rhs,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Activation-count buckets read by `activate_count_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivateBucket {
    All,
    Start,
    Middle,
    EndAfter,
}

/// Live solver state a deferred predicate may inspect.
pub trait RaceState {
    fn accumulate_time(&self) -> f64;
    fn hp_ratio(&self) -> f64;
    fn is_last_spurt(&self) -> bool;
    fn start_delay(&self) -> f64;
    fn activate_count(&self, bucket: ActivateBucket) -> u32;
    fn heal_count(&self) -> u32;
    fn has_used_skill(&self, skill_id: &str) -> bool;
    fn used_skill_count(&self) -> usize;
}

/// Quantities that are only known while the race is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeValue {
    AccumulateTime,
    HpPercent,
    IsLastSpurt,
    IsBadStart,
    ActivateCount(ActivateBucket),
    ActivateCountHeal,
    OtherSkillActivated,
}

/// Start delays above this count as a bad start.
const BAD_START_THRESHOLD: f64 = 0.08;

impl RuntimeValue {
    fn read(self, state: &dyn RaceState) -> f64 {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        match self {
            RuntimeValue::AccumulateTime => state.accumulate_time().floor(),
            RuntimeValue::HpPercent => (state.hp_ratio() * 100.0).floor(),
            RuntimeValue::IsLastSpurt => flag(state.is_last_spurt()),
            RuntimeValue::IsBadStart => flag(state.start_delay() > BAD_START_THRESHOLD),
            RuntimeValue::ActivateCount(bucket) => f64::from(state.activate_count(bucket)),
            RuntimeValue::ActivateCountHeal => f64::from(state.heal_count()),
            RuntimeValue::OtherSkillActivated => flag(state.used_skill_count() > 0),
        }
    }
}

/// Deferred boolean check evaluated each frame a pending skill sits inside its trigger region.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Always,
    Compare {
        value: RuntimeValue,
        cmp: Comparator,
        arg: i32,
    },
    UsedSkill(String),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::Always, p) | (p, Predicate::Always) => p,
            (a, b) => Predicate::And(Box::new(a), Box::new(b)),
        }
    }

    pub fn or(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::Always, _) | (_, Predicate::Always) => Predicate::Always,
            (a, b) => Predicate::Or(Box::new(a), Box::new(b)),
        }
    }

    pub fn evaluate(&self, state: &dyn RaceState) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Compare { value, cmp, arg } => cmp.holds(value.read(state), f64::from(*arg)),
            Predicate::UsedSkill(id) => state.has_used_skill(id),
            Predicate::And(a, b) => a.evaluate(state) && b.evaluate(state),
            Predicate::Or(a, b) => a.evaluate(state) || b.evaluate(state),
        }
    }
}

/// A parsed condition expression bound to the conditions it names.
pub enum Operator<'t> {
    Compare {
        name: String,
        condition: &'t dyn Condition,
        cmp: Comparator,
        arg: i32,
    },
    And {
        left: Box<Operator<'t>>,
        right: Box<Operator<'t>>,
        policy: SamplePolicy,
    },
    Or {
        left: Box<Operator<'t>>,
        right: Box<Operator<'t>>,
        policy: SamplePolicy,
    },
}

impl<'t> Operator<'t> {
    pub fn and(left: Operator<'t>, right: Operator<'t>) -> Result<Self, ConditionError> {
        let policy = left.sample_policy().reconcile(right.sample_policy())?;
        Ok(Operator::And {
            left: Box::new(left),
            right: Box::new(right),
            policy,
        })
    }

    pub fn or(left: Operator<'t>, right: Operator<'t>) -> Result<Self, ConditionError> {
        let policy = left.sample_policy().reconcile(right.sample_policy())?;
        Ok(Operator::Or {
            left: Box::new(left),
            right: Box::new(right),
            policy,
        })
    }

    pub fn sample_policy(&self) -> SamplePolicy {
        match self {
            Operator::Compare { condition, .. } => condition.sample_policy(),
            Operator::And { policy, .. } | Operator::Or { policy, .. } => *policy,
        }
    }

    /// AND narrows the left result with the right filter; OR unions both filters applied to the input.
    pub fn apply(&self, regions: &RegionList, ctx: &ConditionContext<'_>) -> Result<Filtered, ConditionError> {
        match self {
            Operator::Compare {
                condition, cmp, arg, ..
            } => condition.filter(*cmp, regions, *arg, ctx),
            Operator::And { left, right, .. } => {
                let l = left.apply(regions, ctx)?;
                let r = right.apply(&l.regions, ctx)?;
                Ok(Filtered {
                    regions: r.regions,
                    predicate: l.predicate.and(r.predicate),
                })
            }
            Operator::Or { left, right, .. } => {
                let l = left.apply(regions, ctx)?;
                let r = right.apply(regions, ctx)?;
                Ok(Filtered {
                    regions: l.regions.union(&r.regions),
                    predicate: l.predicate.or(r.predicate),
                })
            }
        }
    }

    /// True if any comparison in the tree names `condition`.
    pub fn mentions(&self, condition: &str) -> bool {
        match self {
            Operator::Compare { name, .. } => name == condition,
            Operator::And { left, right, .. } | Operator::Or { left, right, .. } => {
                left.mentions(condition) || right.mentions(condition)
            }
        }
    }
}

impl fmt::Debug for Operator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Compare { name, cmp, arg, .. } => write!(f, "{name}{cmp}{arg}"),
            Operator::And { left, right, .. } => write!(f, "({left:?} & {right:?})"),
            Operator::Or { left, right, .. } => write!(f, "({left:?} @ {right:?})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedState {
        time: f64,
        hp: f64,
        used: Vec<String>,
    }

    impl RaceState for FixedState {
        fn accumulate_time(&self) -> f64 {
            self.time
        }
        fn hp_ratio(&self) -> f64 {
            self.hp
        }
        fn is_last_spurt(&self) -> bool {
            false
        }
        fn start_delay(&self) -> f64 {
            0.09
        }
        fn activate_count(&self, _bucket: ActivateBucket) -> u32 {
            2
        }
        fn heal_count(&self) -> u32 {
            0
        }
        fn has_used_skill(&self, skill_id: &str) -> bool {
            self.used.iter().any(|u| u == skill_id)
        }
        fn used_skill_count(&self) -> usize {
            self.used.len()
        }
    }

    #[test]
    fn comparator_holds() {
        assert!(Comparator::Le.holds(3, 3));
        assert!(!Comparator::Lt.holds(3, 3));
        assert!(Comparator::Ne.holds(1.0, 2.0));
    }

    #[test]
    fn predicate_simplifies_always() {
        let cmp = Predicate::Compare {
            value: RuntimeValue::HpPercent,
            cmp: Comparator::Le,
            arg: 30,
        };
        assert_eq!(Predicate::Always.and(cmp.clone()), cmp);
        assert_eq!(cmp.clone().or(Predicate::Always), Predicate::Always);
    }

    #[test]
    fn predicate_reads_runtime_values() {
        let state = FixedState {
            time: 5.7,
            hp: 0.25,
            used: vec!["200331".into()],
        };
        let low_hp = Predicate::Compare {
            value: RuntimeValue::HpPercent,
            cmp: Comparator::Le,
            arg: 30,
        };
        let late = Predicate::Compare {
            value: RuntimeValue::AccumulateTime,
            cmp: Comparator::Ge,
            arg: 6,
        };
        let bad_start = Predicate::Compare {
            value: RuntimeValue::IsBadStart,
            cmp: Comparator::Eq,
            arg: 1,
        };
        assert!(low_hp.evaluate(&state));
        assert!(!late.evaluate(&state));
        assert!(low_hp.clone().or(late.clone()).evaluate(&state));
        assert!(!low_hp.and(late).evaluate(&state));
        assert!(bad_start.evaluate(&state));
        assert!(Predicate::UsedSkill("200331".into()).evaluate(&state));
        assert!(!Predicate::UsedSkill("100011".into()).evaluate(&state));
    }
}
