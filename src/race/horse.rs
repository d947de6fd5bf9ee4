//! Horse descriptors and the two stat-building passes (mood/overcap, then course/ground).

use serde::{Deserialize, Serialize};

use crate::race::course::{Course, StatKind};
use crate::race::params::{GroundCondition, Mood, Surface};
use crate::race::InvariantError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    FrontRunner = 1,
    PaceChaser = 2,
    LateSurger = 3,
    EndCloser = 4,
    /// Runaway variant. Matches `FrontRunner` in conditions; has its own physics coefficients.
    ExtremeFrontRunner = 5,
}

impl Strategy {
    pub fn from_code(code: i64) -> Result<Self, InvariantError> {
        match code {
            1 => Ok(Strategy::FrontRunner),
            2 => Ok(Strategy::PaceChaser),
            3 => Ok(Strategy::LateSurger),
            4 => Ok(Strategy::EndCloser),
            5 => Ok(Strategy::ExtremeFrontRunner),
            value => Err(InvariantError::OutOfRange {
                field: "strategy",
                value,
            }),
        }
    }

    /// Index into per-strategy coefficient tables (1..=5).
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn matches(self, other: Strategy) -> bool {
        self.condition_code() == other.condition_code()
    }

    /// Code seen by `running_style` conditions.
    pub fn condition_code(self) -> i32 {
        match self {
            Strategy::ExtremeFrontRunner => Strategy::FrontRunner as i32,
            s => s as i32,
        }
    }

    pub fn is_front_runner(self) -> bool {
        self.matches(Strategy::FrontRunner)
    }
}

/// Aptitude grade, `S` best to `G` worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Aptitude {
    S = 0,
    A = 1,
    B = 2,
    C = 3,
    D = 4,
    E = 5,
    F = 6,
    G = 7,
}

impl Aptitude {
    pub const fn index(self) -> usize {
        self as usize
    }
}

fn default_aptitude() -> Aptitude {
    Aptitude::A
}

/// Raw stat block as entered by the user, before any adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorseDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    pub speed: f64,
    pub stamina: f64,
    pub power: f64,
    pub guts: f64,
    pub wisdom: f64,
    pub strategy: Strategy,
    #[serde(default = "default_aptitude")]
    pub distance_aptitude: Aptitude,
    #[serde(default = "default_aptitude")]
    pub surface_aptitude: Aptitude,
    #[serde(default = "default_aptitude")]
    pub strategy_aptitude: Aptitude,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorseStats {
    pub speed: f64,
    pub stamina: f64,
    pub power: f64,
    pub guts: f64,
    pub wisdom: f64,
    pub strategy: Strategy,
    pub distance_aptitude: Aptitude,
    pub surface_aptitude: Aptitude,
    pub strategy_aptitude: Aptitude,
    /// Stamina after mood and overcap, before any skill. Read by the stamina-duel hook.
    pub raw_stamina: f64,
}

impl HorseStats {
    pub fn stat(&self, kind: StatKind) -> f64 {
        match kind {
            StatKind::Speed => self.speed,
            StatKind::Stamina => self.stamina,
            StatKind::Power => self.power,
            StatKind::Guts => self.guts,
            StatKind::Wisdom => self.wisdom,
        }
    }
}

const STAT_OVERCAP: f64 = 1200.0;

const GROUND_SPEED_MODIFIER: [[f64; 4]; 2] = [[0.0, 0.0, 0.0, -50.0], [0.0, 0.0, 0.0, -50.0]];
const GROUND_POWER_MODIFIER: [[f64; 4]; 2] = [
    [0.0, -50.0, -50.0, -50.0],
    [-100.0, -50.0, -100.0, -100.0],
];
const STRATEGY_PROFICIENCY_MODIFIER: [f64; 8] = [1.1, 1.0, 0.85, 0.75, 0.6, 0.4, 0.2, 0.1];

fn adjust_overcap(stat: f64) -> f64 {
    if stat > STAT_OVERCAP {
        STAT_OVERCAP + ((stat - STAT_OVERCAP) / 2.0).floor()
    } else {
        stat
    }
}

/// Halves the part of each stat above 1200, then applies the mood multiplier.
pub fn build_base_stats(horse: &HorseDescriptor, mood: Mood) -> HorseStats {
    let coef = mood.stat_coefficient();
    let stamina = adjust_overcap(horse.stamina) * coef;
    HorseStats {
        speed: adjust_overcap(horse.speed) * coef,
        stamina,
        power: adjust_overcap(horse.power) * coef,
        guts: adjust_overcap(horse.guts) * coef,
        wisdom: adjust_overcap(horse.wisdom) * coef,
        strategy: horse.strategy,
        distance_aptitude: horse.distance_aptitude,
        surface_aptitude: horse.surface_aptitude,
        strategy_aptitude: horse.strategy_aptitude,
        raw_stamina: stamina,
    }
}

/// Applies course-set-status, ground and strategy-aptitude adjustments. Every stat stays at least 1.
pub fn build_adjusted_stats(base: &HorseStats, course: &Course, ground: GroundCondition) -> HorseStats {
    let surface = match course.surface {
        Surface::Turf => 0,
        Surface::Dirt => 1,
    };
    let g = ground.index();
    let course_modifier = course.speed_modifier(base);
    HorseStats {
        speed: (base.speed * course_modifier + GROUND_SPEED_MODIFIER[surface][g]).max(1.0),
        stamina: base.stamina,
        power: (base.power + GROUND_POWER_MODIFIER[surface][g]).max(1.0),
        guts: base.guts,
        wisdom: (base.wisdom * STRATEGY_PROFICIENCY_MODIFIER[base.strategy_aptitude.index()]).max(1.0),
        ..base.clone()
    }
}
