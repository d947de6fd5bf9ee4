use racesim::conditions::{parse, resolve_skill, ConditionContext, ConditionError, ConditionTable, ResolveOptions};
use racesim::race::{
    build_adjusted_stats, build_base_stats, Aptitude, Corner, Course, EffectKind, EffectTarget, GroundCondition,
    HorseDescriptor, Mood, RaceParameters, Rarity, Region, RegionList, SkillAlternative, SkillDescriptor,
    SkillEffect, Slope, Straight, Strategy, Surface, Turn,
};

fn approx_eq(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() <= tol, "expected {b}, got {a}");
}

fn course() -> Course {
    Course {
        id: 10101,
        track_id: 10006,
        distance: 2000.0,
        surface: Surface::Turf,
        turn: Turn::Left,
        corners: vec![
            Corner {
                start: 100.0,
                length: 50.0,
            },
            Corner {
                start: 500.0,
                length: 50.0,
            },
        ],
        straights: vec![
            Straight {
                start: 0.0,
                end: 100.0,
                front_type: 1,
            },
            Straight {
                start: 150.0,
                end: 500.0,
                front_type: 2,
            },
            Straight {
                start: 550.0,
                end: 2000.0,
                front_type: 1,
            },
        ],
        slopes: vec![Slope {
            start: 1200.0,
            length: 100.0,
            grade: 2.0,
        }],
        course_set_status: vec![],
    }
}

fn horse() -> HorseDescriptor {
    HorseDescriptor {
        name: Some("Tester".into()),
        speed: 1200.0,
        stamina: 1000.0,
        power: 900.0,
        guts: 600.0,
        wisdom: 800.0,
        strategy: Strategy::PaceChaser,
        distance_aptitude: Aptitude::A,
        surface_aptitude: Aptitude::A,
        strategy_aptitude: Aptitude::A,
        skills: vec![],
    }
}

fn filter(condition: &str) -> Result<RegionList, ConditionError> {
    let table = ConditionTable::standard();
    let course = course();
    let params = RaceParameters::default();
    let stats = build_adjusted_stats(&build_base_stats(&horse(), Mood::default()), &course, GroundCondition::Good);
    let ctx = ConditionContext {
        course: &course,
        horse: &stats,
        params: &params,
    };
    let whole = RegionList::single(course.whole());
    Ok(parse(condition, &table)?.apply(&whole, &ctx)?.regions)
}

#[test]
fn phase_one_covers_middle_leg() {
    let regions = filter("phase==1").unwrap();
    assert_eq!(regions.len(), 1);
    let region = regions.first().unwrap();
    approx_eq(region.start, 2000.0 / 6.0, 1e-9);
    approx_eq(region.end, 2000.0 * 2.0 / 3.0, 1e-9);
}

#[test]
fn corner_zero_is_the_complement_of_corners() {
    let regions = filter("corner==0").unwrap();
    approx_eq(regions.total_len(), 1900.0, 1e-9);
    assert_eq!(
        regions.sorted(),
        vec![
            Region::new(0.0, 100.0),
            Region::new(150.0, 500.0),
            Region::new(550.0, 2000.0),
        ]
    );
    for corner in [Region::new(100.0, 150.0), Region::new(500.0, 550.0)] {
        assert!(regions.iter().all(|r| r.intersect(&corner).is_empty()));
    }
}

#[test]
fn conjunction_narrows_and_disjunction_widens() {
    let late = filter("phase>=2").unwrap();
    let late_uphill = filter("phase>=2&slope==1").unwrap();
    let either = filter("phase==0@phase==3").unwrap();
    approx_eq(late.total_len(), 2000.0 / 3.0, 1e-9);
    assert!(late_uphill.total_len() < late.total_len());
    approx_eq(either.total_len(), 2000.0 / 3.0, 1e-9);
}

#[test]
fn parse_errors_stay_distinct_from_unknown_names() {
    assert!(matches!(filter("phase=="), Err(ConditionError::Parse(_))));
    assert!(matches!(filter("no_such_condition==1"), Err(ConditionError::UnknownCondition(name)) if name == "no_such_condition"));
}

#[test]
fn resolver_picks_first_matching_alternative() {
    let table = ConditionTable::standard();
    let course = course();
    let params = RaceParameters::default();
    let stats = build_adjusted_stats(&build_base_stats(&horse(), Mood::default()), &course, GroundCondition::Good);
    let ctx = ConditionContext {
        course: &course,
        horse: &stats,
        params: &params,
    };
    let effect = SkillEffect {
        kind: EffectKind::TargetSpeed,
        modifier: 1500.0,
        target: EffectTarget::Own,
    };
    let skill = SkillDescriptor {
        id: "300001".into(),
        name: None,
        rarity: Rarity::White,
        alternatives: vec![
            SkillAlternative {
                precondition: String::new(),
                condition: "running_style==4".into(),
                base_duration: 30_000.0,
                effects: vec![effect.clone()],
            },
            SkillAlternative {
                precondition: String::new(),
                condition: "running_style==2&phase==1".into(),
                base_duration: 30_000.0,
                effects: vec![effect],
            },
        ],
    };

    let own = resolve_skill(&table, &skill, &ctx, ResolveOptions::own()).unwrap();
    assert_eq!(own.len(), 1);
    approx_eq(own[0].effects[0].modifier, 0.15, 1e-12);
    approx_eq(own[0].effects[0].duration, 3.0 * 2.0, 1e-12);

    let other = resolve_skill(&table, &skill, &ctx, ResolveOptions::other()).unwrap();
    assert_eq!(other.len(), 1);
    assert!(other[0].effects.is_empty());
}
