//! Course descriptor and geometry helpers.

use serde::{Deserialize, Serialize};

use crate::race::horse::HorseStats;
use crate::race::params::Surface;
use crate::race::region::Region;
use crate::race::InvariantError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Corner {
    pub start: f64,
    pub length: f64,
}

impl Corner {
    pub fn end(&self) -> f64 {
        self.start + self.length
    }

    pub fn region(&self) -> Region {
        Region::new(self.start, self.end())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Straight {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub front_type: i32,
}

impl Straight {
    pub fn region(&self) -> Region {
        Region::new(self.start, self.end)
    }
}

/// `grade` is in percent; positive is uphill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Slope {
    pub start: f64,
    pub length: f64,
    pub grade: f64,
}

impl Slope {
    pub fn end(&self) -> f64 {
        self.start + self.length
    }

    pub fn region(&self) -> Region {
        Region::new(self.start, self.end())
    }

    pub fn is_uphill(&self) -> bool {
        self.grade > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Turn {
    Right = 1,
    Left = 2,
    Straight = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Speed = 1,
    Stamina = 2,
    Power = 3,
    Guts = 4,
    Wisdom = 5,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub track_id: u32,
    pub distance: f64,
    pub surface: Surface,
    #[serde(default = "default_turn")]
    pub turn: Turn,
    #[serde(default)]
    pub corners: Vec<Corner>,
    #[serde(default)]
    pub straights: Vec<Straight>,
    #[serde(default)]
    pub slopes: Vec<Slope>,
    #[serde(default)]
    pub course_set_status: Vec<StatKind>,
}

fn default_turn() -> Turn {
    Turn::Right
}

fn check_sorted(kind: &'static str, starts: impl Iterator<Item = f64>) -> Result<(), InvariantError> {
    let mut previous = f64::NEG_INFINITY;
    for (index, start) in starts.enumerate() {
        if start < previous {
            return Err(InvariantError::Unsorted {
                kind,
                index,
                start,
                previous,
            });
        }
        previous = start;
    }
    Ok(())
}

impl Course {
    /// Checks the ordering invariants the solver and the condition filters rely on. Never reorders.
    pub fn validate(&self) -> Result<(), InvariantError> {
        if self.distance.is_nan() || self.distance <= 0.0 {
            return Err(InvariantError::NonPositiveDistance(self.distance));
        }
        check_sorted("corners", self.corners.iter().map(|c| c.start))?;
        check_sorted("straights", self.straights.iter().map(|s| s.start))?;
        check_sorted("slopes", self.slopes.iter().map(|s| s.start))?;
        Ok(())
    }

    pub fn whole(&self) -> Region {
        Region::new(0.0, self.distance)
    }

    /// Course base speed in m/s.
    pub fn base_speed(&self) -> f64 {
        20.0 - (self.distance - 2000.0) / 1000.0
    }

    /// 1 = short, 2 = mile, 3 = middle, 4 = long.
    pub fn distance_type(&self) -> i32 {
        match self.distance {
            d if d <= 1400.0 => 1,
            d if d <= 1800.0 => 2,
            d if d <= 2400.0 => 3,
            _ => 4,
        }
    }

    pub fn is_basis_distance(&self) -> bool {
        (self.distance % 400.0).abs() < f64::EPSILON
    }

    pub fn final_corner(&self) -> Option<&Corner> {
        self.corners.last()
    }

    pub fn last_straight(&self) -> Option<&Straight> {
        self.straights.last()
    }

    /// Speed multiplier from the course's favoured stats.
    pub fn speed_modifier(&self, stats: &HorseStats) -> f64 {
        if self.course_set_status.is_empty() {
            return 1.0;
        }
        let bonus: f64 = self
            .course_set_status
            .iter()
            .map(|stat| {
                let value = stats.stat(*stat).min(901.0);
                (1.0 + (value / 300.01).floor()) * 0.05
            })
            .sum();
        1.0 + bonus / self.course_set_status.len() as f64
    }
}

/// Start of phase `phase` (0..=3). Phase 3 is the virtual final sixth.
pub fn phase_start(distance: f64, phase: u8) -> f64 {
    match phase {
        0 => 0.0,
        1 => distance / 6.0,
        2 => distance * 2.0 / 3.0,
        _ => distance * 5.0 / 6.0,
    }
}

pub fn phase_end(distance: f64, phase: u8) -> f64 {
    match phase {
        0 => distance / 6.0,
        1 => distance * 2.0 / 3.0,
        2 => distance * 5.0 / 6.0,
        _ => distance,
    }
}

pub fn phase_region(distance: f64, phase: u8) -> Region {
    Region::new(phase_start(distance, phase), phase_end(distance, phase))
}
