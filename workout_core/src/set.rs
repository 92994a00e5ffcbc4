//! A single measured attempt inside a session exercise.

use crate::{Error, Result, SetValues};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const BASE_SCORE: f64 = 75.0;
const REST_BONUS: f64 = 5.0;
const LOADED_REPS_BONUS: f64 = 5.0;
const REST_WINDOW_SECONDS: std::ops::RangeInclusive<u32> = 30..=300;

/// One set of an exercise. Carries its parent exercise id, never a pointer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseSet {
    pub id: Uuid,
    pub exercise_id: Uuid,
    pub set_number: u32,
    pub repetitions: Option<u32>,
    pub weight: Option<f64>,
    pub duration_seconds: Option<u32>,
    pub distance: Option<f64>,
    pub rest_time_seconds: Option<u32>,
    pub completed_at: DateTime<Utc>,
}

impl ExerciseSet {
    pub(crate) fn new(
        exercise_id: Uuid,
        set_number: u32,
        values: SetValues,
        completed_at: DateTime<Utc>,
    ) -> Result<Self> {
        values.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            exercise_id,
            set_number,
            repetitions: values.repetitions,
            weight: values.weight,
            duration_seconds: values.duration_seconds,
            distance: values.distance,
            rest_time_seconds: values.rest_time_seconds,
            completed_at,
        })
    }

    /// Current measurements as a [`SetValues`]
    pub fn values(&self) -> SetValues {
        SetValues {
            repetitions: self.repetitions,
            weight: self.weight,
            duration_seconds: self.duration_seconds,
            distance: self.distance,
            rest_time_seconds: self.rest_time_seconds,
        }
    }

    /// Replace all measurements. Validates first, so a rejected update
    /// leaves the set untouched.
    pub(crate) fn update(&mut self, values: SetValues) -> Result<()> {
        values.validate()?;
        self.repetitions = values.repetitions;
        self.weight = values.weight;
        self.duration_seconds = values.duration_seconds;
        self.distance = values.distance;
        self.rest_time_seconds = values.rest_time_seconds;
        Ok(())
    }

    /// Weight × reps (volume), or the first present of distance, duration, reps
    pub fn primary_performance_value(&self) -> Option<f64> {
        if let (Some(weight), Some(reps)) = (self.weight, self.repetitions) {
            return Some(weight * f64::from(reps));
        }
        self.distance
            .or(self.duration_seconds.map(f64::from))
            .or(self.repetitions.map(f64::from))
    }

    /// Heuristic quality score in [0, 100]
    ///
    /// Base 75, +5 for a rest between 30 s and 5 min, +5 for a loaded set
    /// (weight and reps both recorded).
    pub fn performance_score(&self) -> f64 {
        let mut score = BASE_SCORE;

        if self
            .rest_time_seconds
            .is_some_and(|rest| REST_WINDOW_SECONDS.contains(&rest))
        {
            score += REST_BONUS;
        }

        if self.weight.is_some() && self.repetitions.is_some() {
            score += LOADED_REPS_BONUS;
        }

        score.min(100.0)
    }

    /// Volume contribution of this set (weight × reps, 0 otherwise)
    pub fn volume(&self) -> f64 {
        match (self.weight, self.repetitions) {
            (Some(weight), Some(reps)) => weight * f64::from(reps),
            _ => 0.0,
        }
    }

    pub(crate) fn check_invariants(&self, exercise_id: Uuid) -> Result<()> {
        if self.id.is_nil() {
            return Err(Error::validation("set id must not be empty"));
        }
        if self.exercise_id != exercise_id {
            return Err(Error::validation(format!(
                "set {} belongs to exercise {}, not {}",
                self.id, self.exercise_id, exercise_id
            )));
        }
        self.values().validate()
    }
}
