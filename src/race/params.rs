//! Race-day parameters and the small enums conditions compare against.
//!
//! Enum discriminants are the game's own numeric codes so `ground_condition==3` style conditions
//! compare against the same numbers the skill data uses.

use serde::{Deserialize, Serialize};

use crate::race::InvariantError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Turf = 1,
    Dirt = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundCondition {
    Good = 1,
    Yielding = 2,
    Soft = 3,
    Heavy = 4,
}

impl GroundCondition {
    pub const fn index(self) -> usize {
        self as usize - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    Sunny = 1,
    Cloudy = 2,
    Rainy = 3,
    Snowy = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring = 1,
    Summer = 2,
    Autumn = 3,
    Winter = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning = 1,
    Midday = 2,
    Evening = 3,
    Night = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    G1 = 100,
    G2 = 200,
    G3 = 300,
    #[serde(rename = "OP")]
    Open = 400,
    #[serde(rename = "PreOP")]
    PreOpen = 700,
    Maiden = 800,
    Debut = 900,
    Daily = 999,
}

/// Mood from -2 (awful) to +2 (great).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub struct Mood(i8);

impl Mood {
    pub const ALL: [Mood; 5] = [Mood(-2), Mood(-1), Mood(0), Mood(1), Mood(2)];
    pub const GREAT: Mood = Mood(2);

    pub fn new(value: i8) -> Result<Self, InvariantError> {
        if (-2..=2).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvariantError::OutOfRange {
                field: "mood",
                value: i64::from(value),
            })
        }
    }

    pub fn value(self) -> i8 {
        self.0
    }

    /// Stat multiplier applied to every base stat.
    pub fn stat_coefficient(self) -> f64 {
        1.0 + 0.02 * f64::from(self.0)
    }

    /// 1..=5 as used by the `motivation` condition.
    pub fn motivation(self) -> i32 {
        i32::from(self.0) + 3
    }
}

impl Default for Mood {
    fn default() -> Self {
        Self::GREAT
    }
}

impl TryFrom<i8> for Mood {
    type Error = InvariantError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        Mood::new(value)
    }
}

impl From<Mood> for i8 {
    fn from(mood: Mood) -> Self {
        mood.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceParameters {
    #[serde(default)]
    pub mood: Mood,
    #[serde(default = "default_ground")]
    pub ground: GroundCondition,
    #[serde(default = "default_weather")]
    pub weather: Weather,
    #[serde(default = "default_season")]
    pub season: Season,
    #[serde(default = "default_time")]
    pub time: TimeOfDay,
    #[serde(default = "default_grade")]
    pub grade: Grade,
    #[serde(default = "default_popularity")]
    pub popularity: u32,
    /// Inclusive range of finishing orders the horse is assumed to hold; `None` leaves order conditions random.
    #[serde(default)]
    pub order_range: Option<(u32, u32)>,
    #[serde(default)]
    pub field_size: Option<u32>,
}

fn default_ground() -> GroundCondition {
    GroundCondition::Good
}

fn default_weather() -> Weather {
    Weather::Sunny
}

fn default_season() -> Season {
    Season::Spring
}

fn default_time() -> TimeOfDay {
    TimeOfDay::Midday
}

fn default_grade() -> Grade {
    Grade::G1
}

fn default_popularity() -> u32 {
    1
}

impl Default for RaceParameters {
    fn default() -> Self {
        Self {
            mood: Mood::default(),
            ground: default_ground(),
            weather: default_weather(),
            season: default_season(),
            time: default_time(),
            grade: default_grade(),
            popularity: default_popularity(),
            order_range: None,
            field_size: None,
        }
    }
}

impl RaceParameters {
    /// Same parameters with a different mood (used by the mood sweep).
    pub fn with_mood(&self, mood: Mood) -> Self {
        Self {
            mood,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mood_rejects_out_of_range() {
        assert!(Mood::new(3).is_err());
        assert!(Mood::new(-3).is_err());
        assert_eq!(Mood::new(-2).map(Mood::motivation), Ok(1));
    }

    #[test]
    fn race_parameters_deserialize_with_defaults() {
        let params: RaceParameters = serde_yaml::from_str("ground: heavy\nmood: -1\n").unwrap();
        assert_eq!(params.ground, GroundCondition::Heavy);
        assert_eq!(params.mood.value(), -1);
        assert_eq!(params.weather, Weather::Sunny);
        assert!(params.order_range.is_none());
    }

    #[test]
    fn mood_out_of_range_fails_deserialization() {
        let parsed: Result<RaceParameters, _> = serde_yaml::from_str("mood: 5\n");
        assert!(parsed.is_err());
    }
}
