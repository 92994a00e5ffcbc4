//! One exercise performed within a workout session.
//!
//! A session exercise owns its sets. Set numbers form a dense `1..=N`
//! sequence: appending assigns `N + 1` and removal closes the gap, so the
//! number is a position, while the set id is the permanent identifier.

use crate::{Error, ExerciseSet, MetricType, Result, SetValues};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reference body weight the per-exercise calorie rates are calibrated for
pub const REFERENCE_BODY_WEIGHT_KG: f64 = 70.0;

/// Minutes assumed per set when no durations were recorded
const MINUTES_PER_UNTIMED_SET: f64 = 2.0;

const CONSISTENCY_BONUS: f64 = 5.0;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionExercise {
    pub(crate) id: Uuid,
    pub(crate) session_id: Uuid,
    pub(crate) exercise_id: Uuid,
    pub(crate) exercise_name: String,
    pub(crate) metric_type: MetricType,
    pub(crate) order: u32,
    pub(crate) sets: Vec<ExerciseSet>,
    pub(crate) performance_score: Option<f64>,
}

impl SessionExercise {
    pub(crate) fn new(
        session_id: Uuid,
        exercise_id: Uuid,
        exercise_name: &str,
        metric_type: MetricType,
        order: u32,
    ) -> Result<Self> {
        if exercise_id.is_nil() {
            return Err(Error::validation("exercise id must not be empty"));
        }
        let name = exercise_name.trim();
        if name.is_empty() {
            return Err(Error::validation("exercise name must not be blank"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            session_id,
            exercise_id,
            exercise_name: name.to_string(),
            metric_type,
            order,
            sets: Vec::new(),
            performance_score: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn exercise_id(&self) -> Uuid {
        self.exercise_id
    }

    /// Name as it was in the catalog when the exercise was added
    pub fn exercise_name(&self) -> &str {
        &self.exercise_name
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    /// 1-based position within the session
    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn sets(&self) -> &[ExerciseSet] {
        &self.sets
    }

    /// Manually recorded score, if any
    pub fn recorded_score(&self) -> Option<f64> {
        self.performance_score
    }

    // ------------------------------------------------------------------------
    // Set management (reached through the session root)
    // ------------------------------------------------------------------------

    pub(crate) fn add_set(&mut self, values: SetValues, now: DateTime<Utc>) -> Result<Uuid> {
        if values.is_empty() {
            return Err(Error::validation(
                "a set needs at least one of repetitions, weight, duration or distance",
            ));
        }
        let set_number = self.next_set_number()?;
        let set = ExerciseSet::new(self.id, set_number, values, now)?;
        let set_id = set.id;
        self.sets.push(set);
        tracing::debug!(
            "Added set {} (#{}) to exercise {}",
            set_id,
            set_number,
            self.exercise_name
        );
        Ok(set_id)
    }

    pub(crate) fn update_set(&mut self, set_id: Uuid, values: SetValues) -> Result<()> {
        if values.is_empty() {
            return Err(Error::validation(
                "a set needs at least one of repetitions, weight, duration or distance",
            ));
        }
        let exercise_id = self.id;
        let set = self
            .sets
            .iter_mut()
            .find(|s| s.id == set_id)
            .ok_or_else(|| missing_set(set_id, exercise_id))?;
        set.update(values)
    }

    pub(crate) fn remove_set(&mut self, set_id: Uuid) -> Result<()> {
        let index = self
            .sets
            .iter()
            .position(|s| s.id == set_id)
            .ok_or_else(|| missing_set(set_id, self.id))?;
        self.sets.remove(index);
        for (i, set) in self.sets.iter_mut().enumerate() {
            set.set_number = position_number(i)?;
        }
        Ok(())
    }

    pub(crate) fn record_score(&mut self, score: f64) -> Result<()> {
        if !(0.0..=100.0).contains(&score) {
            return Err(Error::validation(format!(
                "performance score must be within [0, 100], got {}",
                score
            )));
        }
        self.performance_score = Some(score);
        Ok(())
    }

    fn next_set_number(&self) -> Result<u32> {
        position_number(self.sets.len())
    }

    // ------------------------------------------------------------------------
    // Performance
    // ------------------------------------------------------------------------

    /// Best result across sets, measured the way this exercise is measured
    ///
    /// Weight → best volume (weight × reps), Repetitions → most reps,
    /// Time → longest duration, Distance → longest distance. When no set
    /// carries the measure for this type, the best primary value is used.
    pub fn best_performance(&self) -> Option<f64> {
        let by_type = self
            .sets
            .iter()
            .filter_map(|s| match self.metric_type {
                MetricType::Weight => match (s.weight, s.repetitions) {
                    (Some(w), Some(r)) => Some(w * f64::from(r)),
                    _ => None,
                },
                MetricType::Repetitions => s.repetitions.map(f64::from),
                MetricType::Time => s.duration_seconds.map(f64::from),
                MetricType::Distance => s.distance,
            })
            .reduce(f64::max);

        by_type.or_else(|| {
            self.sets
                .iter()
                .filter_map(ExerciseSet::primary_performance_value)
                .reduce(f64::max)
        })
    }

    /// Average set score plus a consistency bonus of up to 5 points
    ///
    /// `avg + (1 − (max − min) / 100) × 5`, never below 0. No sets scores 0.
    pub fn overall_performance_score(&self) -> f64 {
        if self.sets.is_empty() {
            return 0.0;
        }

        let scores: Vec<f64> = self.sets.iter().map(ExerciseSet::performance_score).collect();
        let avg = scores.iter().sum::<f64>() / scores.len() as f64;
        let max = scores.iter().copied().fold(f64::MIN, f64::max);
        let min = scores.iter().copied().fold(f64::MAX, f64::min);
        let consistency = (1.0 - (max - min) / 100.0) * CONSISTENCY_BONUS;

        (avg + consistency).max(0.0)
    }

    /// Score used when rating the whole session: the recorded score if one
    /// was given, the computed overall score otherwise
    pub fn score(&self) -> f64 {
        self.performance_score
            .unwrap_or_else(|| self.overall_performance_score())
    }

    /// Estimated calories for this exercise
    ///
    /// Minutes are the sum of recorded set durations, or two minutes per set
    /// when no durations were recorded. `user_weight_kg` scales the estimate
    /// relative to a 70 kg reference.
    pub fn estimate_calories_burned(&self, user_weight_kg: Option<f64>) -> f64 {
        let recorded_seconds: u32 = self.sets.iter().filter_map(|s| s.duration_seconds).sum();
        let minutes = if recorded_seconds > 0 {
            f64::from(recorded_seconds) / 60.0
        } else {
            self.sets.len() as f64 * MINUTES_PER_UNTIMED_SET
        };

        let weight_factor = user_weight_kg
            .map(|w| w / REFERENCE_BODY_WEIGHT_KG)
            .unwrap_or(1.0);

        self.metric_type.calories_per_minute() * minutes * weight_factor
    }

    /// Sum of weight × reps over all sets
    pub fn total_volume(&self) -> f64 {
        self.sets.iter().map(ExerciseSet::volume).sum()
    }

    pub(crate) fn check_invariants(&self, session_id: Uuid) -> Result<()> {
        if self.id.is_nil() || self.exercise_id.is_nil() {
            return Err(Error::validation("exercise ids must not be empty"));
        }
        if self.session_id != session_id {
            return Err(Error::validation(format!(
                "exercise {} belongs to session {}, not {}",
                self.id, self.session_id, session_id
            )));
        }
        if self.exercise_name.trim().is_empty() {
            return Err(Error::validation("exercise name must not be blank"));
        }
        if let Some(score) = self.performance_score {
            if !(0.0..=100.0).contains(&score) {
                return Err(Error::validation(format!(
                    "performance score must be within [0, 100], got {}",
                    score
                )));
            }
        }
        for (i, set) in self.sets.iter().enumerate() {
            set.check_invariants(self.id)?;
            if set.set_number != position_number(i)? {
                return Err(Error::validation(format!(
                    "set numbers of exercise {} are not contiguous",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// 1-based number for a 0-based position
pub(crate) fn position_number(index: usize) -> Result<u32> {
    u32::try_from(index + 1).map_err(|_| Error::validation("too many entries"))
}

fn missing_set(set_id: Uuid, exercise_id: Uuid) -> Error {
    Error::validation(format!(
        "set {} not found in exercise {}",
        set_id, exercise_id
    ))
}
