use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::conditions::{parse, resolve_skill, ConditionContext, ConditionError, ConditionTable, ResolveOptions};
use crate::data::Dataset;
use crate::race::{build_adjusted_stats, build_base_stats, Course, HorseDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationSeverity {
    Error,
    Warning,
    Info,
}

impl ValidationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for ValidationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationDiagnostic {
    pub severity: ValidationSeverity,
    pub context: String,
    pub message: String,
}

impl fmt::Display for ValidationDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.context, self.message)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    pub fn push(
        &mut self,
        severity: ValidationSeverity,
        context: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(ValidationDiagnostic {
            severity,
            context: context.into(),
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diag| diag.severity == ValidationSeverity::Error)
    }

    pub fn count(&self, severity: ValidationSeverity) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == severity).count()
    }
}

/// Checks a loaded dataset: course geometry, condition strings, and cross references between
/// horses, skills and skill metadata.
pub fn validate_dataset(dataset: &Dataset, table: &ConditionTable) -> ValidationReport {
    let mut report = ValidationReport::default();

    let mut course_ids = HashSet::new();
    for (index, course) in dataset.courses.iter().enumerate() {
        let context = format!("courses[{index}] id={}", course.id);
        if !course_ids.insert(course.id) {
            report.push(ValidationSeverity::Error, context.clone(), "duplicate course id");
        }
        validate_course(&mut report, &context, course);
    }

    for skill in dataset.skills.iter() {
        let context = format!("skills id='{}'", skill.id);
        if skill.alternatives.is_empty() {
            report.push(ValidationSeverity::Error, context.clone(), "skill has no alternatives");
        }
        for (alt_index, alt) in skill.alternatives.iter().enumerate() {
            let alt_context = format!("{context}.alternatives[{alt_index}]");
            if !alt.precondition.trim().is_empty() {
                check_condition(&mut report, format!("{alt_context}.precondition"), &alt.precondition, table);
            }
            check_condition(&mut report, format!("{alt_context}.condition"), &alt.condition, table);
            if alt.effects.is_empty() {
                report.push(ValidationSeverity::Warning, alt_context.clone(), "alternative has no effects");
            }
            if alt.effects.iter().any(|e| e.kind.is_timed()) && alt.base_duration <= 0.0 {
                report.push(
                    ValidationSeverity::Warning,
                    alt_context,
                    "timed effect with non-positive base_duration never lasts a frame",
                );
            }
        }
    }

    for id in dataset.skills.meta_ids() {
        if dataset.skills.get(id).is_none() {
            report.push(
                ValidationSeverity::Warning,
                format!("skill_meta id='{id}'"),
                "metadata for a skill that is not in the catalog",
            );
        }
    }

    for (index, horse) in dataset.horses.iter().enumerate() {
        let context = match &horse.name {
            Some(name) => format!("horses[{index}] name='{name}'"),
            None => format!("horses[{index}]"),
        };
        validate_horse(&mut report, &context, horse, dataset);
    }

    if let (Some(course), Some(horse)) = (dataset.courses.first(), dataset.horses.first()) {
        resolve_all(&mut report, dataset, table, course, horse);
    }

    report
}

fn validate_course(report: &mut ValidationReport, context: &str, course: &Course) {
    if let Err(err) = course.validate() {
        report.push(ValidationSeverity::Error, context, err.to_string());
        return;
    }
    for (i, corner) in course.corners.iter().enumerate() {
        if corner.length <= 0.0 || corner.end() > course.distance {
            report.push(
                ValidationSeverity::Error,
                format!("{context}.corners[{i}]"),
                format!("corner [{}, {}) lies outside the course", corner.start, corner.end()),
            );
        }
    }
    for pair in course.corners.windows(2) {
        if pair[0].end() > pair[1].start {
            report.push(
                ValidationSeverity::Warning,
                format!("{context}.corners"),
                format!("corners starting at {} and {} overlap", pair[0].start, pair[1].start),
            );
        }
    }
    for (i, slope) in course.slopes.iter().enumerate() {
        if slope.end() > course.distance {
            report.push(
                ValidationSeverity::Error,
                format!("{context}.slopes[{i}]"),
                "slope extends past the finish line",
            );
        }
    }
    if course.straights.is_empty() {
        report.push(ValidationSeverity::Info, context, "course has no straights");
    }
}

fn check_condition(report: &mut ValidationReport, context: String, text: &str, table: &ConditionTable) {
    if let Err(err) = parse(text, table) {
        report.push(ValidationSeverity::Error, context, format!("'{text}': {err}"));
    }
}

fn validate_horse(report: &mut ValidationReport, context: &str, horse: &HorseDescriptor, dataset: &Dataset) {
    for (label, value) in [
        ("speed", horse.speed),
        ("stamina", horse.stamina),
        ("power", horse.power),
        ("guts", horse.guts),
        ("wisdom", horse.wisdom),
    ] {
        if value.is_nan() || value <= 0.0 {
            report.push(
                ValidationSeverity::Error,
                format!("{context}.{label}"),
                format!("stat must be positive (got {value})"),
            );
        } else if value > 2000.0 {
            report.push(
                ValidationSeverity::Warning,
                format!("{context}.{label}"),
                format!("stat {value} is above the in-game cap"),
            );
        }
    }
    for skill in &horse.skills {
        if dataset.skills.get(skill).is_none() {
            report.push(
                ValidationSeverity::Error,
                format!("{context}.skills"),
                format!("unknown skill id '{skill}'"),
            );
        }
    }
}

/// Resolves every skill against one course and horse so comparator misuse (e.g. `corner<2` on a
/// condition without ordering) is caught before a comparison hits it.
fn resolve_all(
    report: &mut ValidationReport,
    dataset: &Dataset,
    table: &ConditionTable,
    course: &Course,
    horse: &HorseDescriptor,
) {
    let base = build_base_stats(horse, dataset.params.mood);
    let stats = build_adjusted_stats(&base, course, dataset.params.ground);
    let ctx = ConditionContext {
        course,
        horse: &stats,
        params: &dataset.params,
    };
    for skill in dataset.skills.iter() {
        match resolve_skill(table, skill, &ctx, ResolveOptions::own()) {
            Ok(_) | Err(ConditionError::Parse(_)) | Err(ConditionError::UnknownCondition(_)) => {}
            Err(err) => report.push(
                ValidationSeverity::Error,
                format!("skills id='{}'", skill.id),
                err.to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SkillCatalog;
    use crate::race::course::tests::sample_course;
    use crate::race::horse::tests::sample_horse;
    use crate::race::{EffectKind, EffectTarget, RaceParameters, Rarity, SkillAlternative, SkillDescriptor, SkillEffect, SkillMeta};
    use std::sync::Arc;

    fn skill(id: &str, condition: &str) -> SkillDescriptor {
        SkillDescriptor {
            id: id.into(),
            name: None,
            rarity: Rarity::White,
            alternatives: vec![SkillAlternative {
                precondition: String::new(),
                condition: condition.into(),
                base_duration: 30_000.0,
                effects: vec![SkillEffect {
                    kind: EffectKind::TargetSpeed,
                    modifier: 1500.0,
                    target: EffectTarget::Own,
                }],
            }],
        }
    }

    fn dataset(skills: Vec<SkillDescriptor>) -> Dataset {
        let mut horse = sample_horse();
        horse.skills = vec!["1".into(), "404".into()];
        Dataset {
            courses: vec![Arc::new(sample_course())],
            skills: SkillCatalog::new(
                skills,
                vec![
                    SkillMeta { id: "1".into(), base_cost: 100, group_id: None },
                    SkillMeta { id: "77".into(), base_cost: 120, group_id: None },
                ],
            ),
            horses: vec![horse],
            params: RaceParameters::default(),
        }
    }

    #[test]
    fn clean_skill_produces_no_skill_errors() {
        let report = validate_dataset(&dataset(vec![skill("1", "phase>=2")]), &ConditionTable::standard());
        assert!(!report
            .diagnostics
            .iter()
            .any(|d| d.severity == ValidationSeverity::Error && d.context.starts_with("skills")));
    }

    #[test]
    fn reports_parse_errors_unknown_conditions_and_unknown_skills() {
        let report = validate_dataset(
            &dataset(vec![skill("1", "phase>=2"), skill("2", "phase>="), skill("3", "moon_phase==1")]),
            &ConditionTable::standard(),
        );
        assert!(report.has_errors());
        let messages: Vec<String> = report.diagnostics.iter().map(ToString::to_string).collect();
        assert!(messages.iter().any(|m| m.contains("id='2'")));
        assert!(messages.iter().any(|m| m.contains("moon_phase")));
        assert!(messages.iter().any(|m| m.contains("unknown skill id '404'")));
        assert!(report.count(ValidationSeverity::Warning) >= 1);
    }
}
