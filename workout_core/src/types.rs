//! Core domain types shared by the tracking entities.
//!
//! This module defines:
//! - Lifecycle states for sessions and planned workouts
//! - How an exercise is measured
//! - Personal metric kinds
//! - Measurement inputs for sets and the calorie model

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Lifecycle States
// ============================================================================

/// State of a tracked workout session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Planned,
    InProgress,
    Completed,
    Abandoned,
    Cancelled,
}

impl SessionStatus {
    /// States in which the session must carry an end time
    pub fn has_ended(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Abandoned)
    }
}

/// State of a scheduled workout
///
/// Kept separate from [`SessionStatus`] so a schedule can exist before any
/// tracked session does.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlannedStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
    Abandoned,
}

// ============================================================================
// Measurement Types
// ============================================================================

/// How an exercise inside a session is measured
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Repetitions,
    Weight,
    Time,
    Distance,
}

impl MetricType {
    /// Base calorie burn per minute for this kind of work
    pub fn calories_per_minute(self) -> f64 {
        match self {
            MetricType::Time => 8.0,
            MetricType::Repetitions => 6.0,
            MetricType::Distance => 10.0,
            MetricType::Weight => 7.0,
        }
    }
}

impl FromStr for MetricType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "reps" | "repetitions" => Ok(MetricType::Repetitions),
            "weight" => Ok(MetricType::Weight),
            "time" | "duration" => Ok(MetricType::Time),
            "distance" => Ok(MetricType::Distance),
            other => Err(Error::validation(format!("unknown metric type '{}'", other))),
        }
    }
}

/// Kind of personal measurement tracked over time
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserMetricType {
    Weight,
    Height,
    PersonalRecord,
}

impl UserMetricType {
    /// Unit used when none is given
    pub fn default_unit(self) -> &'static str {
        match self {
            UserMetricType::Weight => "kg",
            UserMetricType::Height => "cm",
            UserMetricType::PersonalRecord => "kg",
        }
    }
}

impl FromStr for UserMetricType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "weight" => Ok(UserMetricType::Weight),
            "height" => Ok(UserMetricType::Height),
            "pr" | "personal_record" | "personalrecord" => Ok(UserMetricType::PersonalRecord),
            other => Err(Error::validation(format!(
                "unknown user metric type '{}'",
                other
            ))),
        }
    }
}

/// Self-reported effort for a completed session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PerceivedDifficulty {
    VeryEasy,
    Easy,
    Moderate,
    Hard,
    VeryHard,
}

impl FromStr for PerceivedDifficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "very_easy" => Ok(PerceivedDifficulty::VeryEasy),
            "easy" => Ok(PerceivedDifficulty::Easy),
            "moderate" => Ok(PerceivedDifficulty::Moderate),
            "hard" => Ok(PerceivedDifficulty::Hard),
            "very_hard" => Ok(PerceivedDifficulty::VeryHard),
            other => Err(Error::validation(format!("unknown difficulty '{}'", other))),
        }
    }
}

// ============================================================================
// Set Measurements
// ============================================================================

/// Measured values for one set; every field is optional
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SetValues {
    pub repetitions: Option<u32>,
    pub weight: Option<f64>,
    pub duration_seconds: Option<u32>,
    pub distance: Option<f64>,
    pub rest_time_seconds: Option<u32>,
}

impl SetValues {
    /// True when no measurement (reps, weight, duration, distance) is present.
    /// Rest time alone does not count as a measurement.
    pub fn is_empty(&self) -> bool {
        self.repetitions.is_none()
            && self.weight.is_none()
            && self.duration_seconds.is_none()
            && self.distance.is_none()
    }

    /// Reject negative or non-finite weight and distance
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("weight", self.weight), ("distance", self.distance)] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(Error::validation(format!(
                        "{} must be a non-negative number, got {}",
                        field, v
                    )));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Calorie Model
// ============================================================================

/// Parameters of the whole-session calorie estimate
///
/// `calories = met × body_weight_kg × hours`
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct CalorieModel {
    pub met: f64,
    pub body_weight_kg: f64,
}

impl CalorieModel {
    pub const DEFAULT_MET: f64 = 5.0;
    pub const DEFAULT_BODY_WEIGHT_KG: f64 = 70.0;

    /// Same MET, different body weight
    pub fn with_body_weight(self, body_weight_kg: f64) -> Self {
        Self {
            body_weight_kg,
            ..self
        }
    }

    /// Estimated calories for a duration, rounded to the nearest integer
    pub fn estimate(&self, duration_seconds: u32) -> u32 {
        if duration_seconds == 0 {
            return 0;
        }
        let hours = f64::from(duration_seconds) / 3600.0;
        let kcal = (self.met * self.body_weight_kg * hours).round();
        if kcal <= 0.0 {
            0
        } else {
            kcal as u32
        }
    }
}

impl Default for CalorieModel {
    fn default() -> Self {
        Self {
            met: Self::DEFAULT_MET,
            body_weight_kg: Self::DEFAULT_BODY_WEIGHT_KG,
        }
    }
}
