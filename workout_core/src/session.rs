//! Workout session aggregate.
//!
//! A session is the consistency boundary for everything performed in one
//! workout: it exclusively owns its exercises, which exclusively own their
//! sets. Children are reached only through the root, and every operation
//! either applies completely or fails without touching the session.
//!
//! ## State machine
//!
//! ```text
//! Planned ──start──▶ InProgress ──complete──▶ Completed
//!    │                   │
//!    └──cancel──▶ Cancelled └──abandon──▶ Abandoned
//! ```

use crate::session_exercise::position_number;
use crate::{
    CalorieModel, Error, MetricType, PerceivedDifficulty, Result, SessionExercise,
    SessionStatus, SetValues,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ALL_EXERCISES_HAVE_SETS_BONUS: f64 = 5.0;
const DURATION_BONUS: f64 = 3.0;
const CONSISTENCY_BONUS: f64 = 2.0;
const DURATION_BONUS_MINUTES: std::ops::RangeInclusive<f64> = 20.0..=120.0;
const CONSISTENCY_SPREAD: f64 = 15.0;

/// Parameters for creating a session
#[derive(Clone, Debug, Default)]
pub struct NewSession {
    pub user_id: Uuid,
    pub workout_id: Uuid,
    /// When set, the session starts out Planned instead of InProgress
    pub planned_date: Option<DateTime<Utc>>,
    pub is_from_program: bool,
    pub program_id: Option<Uuid>,
}

/// A tracked workout session (aggregate root)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "WorkoutSessionRecord")]
pub struct WorkoutSession {
    id: Uuid,
    user_id: Uuid,
    workout_id: Uuid,
    planned_date: Option<DateTime<Utc>>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    status: SessionStatus,
    total_duration_seconds: Option<u32>,
    calories_estimated: Option<u32>,
    perceived_difficulty: Option<PerceivedDifficulty>,
    notes: Option<String>,
    is_from_program: bool,
    program_id: Option<Uuid>,
    exercises: Vec<SessionExercise>,
}

/// Stored shape of a session
///
/// Deserialization goes through this record and [`WorkoutSession::rehydrate`],
/// so a loaded session satisfies the same invariants as a freshly built one.
#[derive(Clone, Debug, Deserialize)]
pub struct WorkoutSessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub workout_id: Uuid,
    pub planned_date: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub total_duration_seconds: Option<u32>,
    pub calories_estimated: Option<u32>,
    pub perceived_difficulty: Option<PerceivedDifficulty>,
    pub notes: Option<String>,
    pub is_from_program: bool,
    pub program_id: Option<Uuid>,
    #[serde(default)]
    pub exercises: Vec<SessionExercise>,
}

impl TryFrom<WorkoutSessionRecord> for WorkoutSession {
    type Error = Error;

    fn try_from(record: WorkoutSessionRecord) -> Result<Self> {
        WorkoutSession::rehydrate(record)
    }
}

impl WorkoutSession {
    /// Create a session. With a planned date it starts Planned; otherwise it
    /// starts InProgress at `now`.
    pub fn new(params: NewSession, now: DateTime<Utc>) -> Result<Self> {
        if params.user_id.is_nil() {
            return Err(Error::validation("user id must not be empty"));
        }
        if params.workout_id.is_nil() {
            return Err(Error::validation("workout id must not be empty"));
        }
        check_program(params.is_from_program, params.program_id)?;

        let (status, start_time) = match params.planned_date {
            Some(_) => (SessionStatus::Planned, None),
            None => (SessionStatus::InProgress, Some(now)),
        };

        let session = Self {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            workout_id: params.workout_id,
            planned_date: params.planned_date,
            start_time,
            end_time: None,
            status,
            total_duration_seconds: None,
            calories_estimated: None,
            perceived_difficulty: None,
            notes: None,
            is_from_program: params.is_from_program,
            program_id: params.program_id,
            exercises: Vec::new(),
        };

        tracing::debug!("Created session {} in state {:?}", session.id, status);
        Ok(session)
    }

    /// Rebuild a session from storage, re-checking every invariant
    pub fn rehydrate(record: WorkoutSessionRecord) -> Result<Self> {
        let session = Self {
            id: record.id,
            user_id: record.user_id,
            workout_id: record.workout_id,
            planned_date: record.planned_date,
            start_time: record.start_time,
            end_time: record.end_time,
            status: record.status,
            total_duration_seconds: record.total_duration_seconds,
            calories_estimated: record.calories_estimated,
            perceived_difficulty: record.perceived_difficulty,
            notes: record.notes,
            is_from_program: record.is_from_program,
            program_id: record.program_id,
            exercises: record.exercises,
        };
        session.check_invariants()?;
        Ok(session)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn workout_id(&self) -> Uuid {
        self.workout_id
    }

    pub fn planned_date(&self) -> Option<DateTime<Utc>> {
        self.planned_date
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn total_duration_seconds(&self) -> Option<u32> {
        self.total_duration_seconds
    }

    pub fn calories_estimated(&self) -> Option<u32> {
        self.calories_estimated
    }

    pub fn perceived_difficulty(&self) -> Option<PerceivedDifficulty> {
        self.perceived_difficulty
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn is_from_program(&self) -> bool {
        self.is_from_program
    }

    pub fn program_id(&self) -> Option<Uuid> {
        self.program_id
    }

    /// Exercises in session order
    pub fn exercises(&self) -> &[SessionExercise] {
        &self.exercises
    }

    pub fn exercise(&self, exercise_id: Uuid) -> Option<&SessionExercise> {
        self.exercises.iter().find(|e| e.id == exercise_id)
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Planned → InProgress
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.require_status(SessionStatus::Planned, "start")?;
        self.status = SessionStatus::InProgress;
        self.start_time = Some(now);
        tracing::debug!("Session {} started", self.id);
        Ok(())
    }

    /// InProgress → Completed
    ///
    /// Records the end time, the rounded duration and the calorie estimate
    /// produced by `calories`.
    pub fn complete(
        &mut self,
        difficulty: PerceivedDifficulty,
        notes: Option<&str>,
        calories: &CalorieModel,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.require_status(SessionStatus::InProgress, "complete")?;
        let start = self
            .start_time
            .ok_or_else(|| Error::validation("cannot complete a session that never started"))?;
        let duration = elapsed_seconds(start, now)?;

        self.status = SessionStatus::Completed;
        self.end_time = Some(now);
        self.total_duration_seconds = Some(duration);
        self.perceived_difficulty = Some(difficulty);
        self.calories_estimated = Some(calories.estimate(duration));
        if let Some(notes) = notes {
            self.append_note(notes);
        }

        tracing::debug!(
            "Session {} completed after {}s ({} kcal)",
            self.id,
            duration,
            self.calories_estimated.unwrap_or_default()
        );
        Ok(())
    }

    /// InProgress → Abandoned. The reason, if any, is appended to the notes.
    pub fn abandon(&mut self, reason: Option<&str>, now: DateTime<Utc>) -> Result<()> {
        self.require_status(SessionStatus::InProgress, "abandon")?;
        let duration = match self.start_time {
            Some(start) => Some(elapsed_seconds(start, now)?),
            None => None,
        };

        self.status = SessionStatus::Abandoned;
        self.end_time = Some(now);
        self.total_duration_seconds = duration;
        if let Some(reason) = reason {
            self.append_note(&format!("Abandoned: {}", reason));
        }

        tracing::debug!("Session {} abandoned", self.id);
        Ok(())
    }

    /// Planned → Cancelled. The reason, if any, is appended to the notes.
    pub fn cancel(&mut self, reason: Option<&str>) -> Result<()> {
        self.require_status(SessionStatus::Planned, "cancel")?;
        self.status = SessionStatus::Cancelled;
        if let Some(reason) = reason {
            self.append_note(&format!("Cancelled: {}", reason));
        }
        tracing::debug!("Session {} cancelled", self.id);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Exercise and set management (InProgress only)
    // ------------------------------------------------------------------------

    /// Append an exercise at position `count + 1`
    ///
    /// `exercise_name` is a snapshot of the catalog name. When `initial`
    /// carries any measurement, a first set is recorded with it.
    /// Returns the id of the new session exercise.
    pub fn add_exercise(
        &mut self,
        exercise_id: Uuid,
        exercise_name: &str,
        metric_type: MetricType,
        initial: SetValues,
        now: DateTime<Utc>,
    ) -> Result<Uuid> {
        self.require_status(SessionStatus::InProgress, "add exercises to")?;

        let order = position_number(self.exercises.len())?;
        let mut exercise =
            SessionExercise::new(self.id, exercise_id, exercise_name, metric_type, order)?;
        if !initial.is_empty() {
            exercise.add_set(initial, now)?;
        }

        let id = exercise.id;
        tracing::debug!(
            "Added exercise '{}' at position {} to session {}",
            exercise.exercise_name,
            order,
            self.id
        );
        self.exercises.push(exercise);
        Ok(id)
    }

    /// Remove an exercise and renumber the rest to `1..=N`, keeping order
    pub fn remove_exercise(&mut self, exercise_id: Uuid) -> Result<()> {
        self.require_status(SessionStatus::InProgress, "remove exercises from")?;
        let index = self.exercise_index(exercise_id)?;
        let removed = self.exercises.remove(index);
        for (i, exercise) in self.exercises.iter_mut().enumerate() {
            exercise.order = position_number(i)?;
        }
        tracing::debug!(
            "Removed exercise '{}' from session {}",
            removed.exercise_name,
            self.id
        );
        Ok(())
    }

    /// Record a set on one of the session's exercises; returns the set id
    pub fn add_set(
        &mut self,
        exercise_id: Uuid,
        values: SetValues,
        now: DateTime<Utc>,
    ) -> Result<Uuid> {
        self.require_status(SessionStatus::InProgress, "add sets to")?;
        self.exercise_mut(exercise_id)?.add_set(values, now)
    }

    pub fn update_set(&mut self, exercise_id: Uuid, set_id: Uuid, values: SetValues) -> Result<()> {
        self.require_status(SessionStatus::InProgress, "update sets of")?;
        self.exercise_mut(exercise_id)?.update_set(set_id, values)
    }

    pub fn remove_set(&mut self, exercise_id: Uuid, set_id: Uuid) -> Result<()> {
        self.require_status(SessionStatus::InProgress, "remove sets from")?;
        self.exercise_mut(exercise_id)?.remove_set(set_id)
    }

    /// Record a manual score in [0, 100] for one exercise
    pub fn set_exercise_score(&mut self, exercise_id: Uuid, score: f64) -> Result<()> {
        self.require_status(SessionStatus::InProgress, "score exercises of")?;
        self.exercise_mut(exercise_id)?.record_score(score)
    }

    // ------------------------------------------------------------------------
    // Performance
    // ------------------------------------------------------------------------

    /// Session duration in minutes, once it has one
    pub fn duration_minutes(&self) -> Option<f64> {
        self.total_duration_seconds
            .map(|secs| f64::from(secs) / 60.0)
    }

    /// Calorie estimate for the recorded duration (0 without one)
    pub fn estimate_calories(&self, calories: &CalorieModel) -> u32 {
        calories.estimate(self.total_duration_seconds.unwrap_or(0))
    }

    /// Whole-session score in [0, 100]
    ///
    /// 0 unless Completed with at least one exercise. Otherwise the average
    /// exercise score, +5 when every exercise has a set, +3 for a duration
    /// between 20 and 120 minutes, +2 when exercise scores lie within 15
    /// points of each other.
    pub fn calculate_performance_score(&self) -> f64 {
        if self.status != SessionStatus::Completed || self.exercises.is_empty() {
            return 0.0;
        }

        let scores: Vec<f64> = self.exercises.iter().map(SessionExercise::score).collect();
        let mut score = scores.iter().sum::<f64>() / scores.len() as f64;

        if self.exercises.iter().all(|e| !e.sets.is_empty()) {
            score += ALL_EXERCISES_HAVE_SETS_BONUS;
        }

        if self
            .duration_minutes()
            .is_some_and(|m| DURATION_BONUS_MINUTES.contains(&m))
        {
            score += DURATION_BONUS;
        }

        let max = scores.iter().copied().fold(f64::MIN, f64::max);
        let min = scores.iter().copied().fold(f64::MAX, f64::min);
        if max - min <= CONSISTENCY_SPREAD {
            score += CONSISTENCY_BONUS;
        }

        score.min(100.0)
    }

    /// Read-only overview of the session and each of its exercises
    pub fn performance_summary(&self) -> PerformanceSummary {
        let exercises: Vec<ExerciseSummary> = self
            .exercises
            .iter()
            .map(|e| ExerciseSummary {
                exercise_id: e.id,
                exercise_name: e.exercise_name.clone(),
                metric_type: e.metric_type,
                order: e.order,
                set_count: e.sets.len(),
                best_performance: e.best_performance(),
                score: e.score(),
                total_volume: e.total_volume(),
                estimated_calories: e.estimate_calories_burned(None),
            })
            .collect();

        PerformanceSummary {
            session_id: self.id,
            workout_id: self.workout_id,
            status: self.status,
            start_time: self.start_time,
            end_time: self.end_time,
            total_duration_seconds: self.total_duration_seconds,
            calories_estimated: self.calories_estimated,
            perceived_difficulty: self.perceived_difficulty,
            exercise_count: exercises.len(),
            total_sets: exercises.iter().map(|e| e.set_count).sum(),
            total_volume: exercises.iter().map(|e| e.total_volume).sum(),
            performance_score: self.calculate_performance_score(),
            exercises,
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn require_status(&self, expected: SessionStatus, action: &str) -> Result<()> {
        if self.status != expected {
            return Err(Error::validation(format!(
                "cannot {} session {} in state {:?} (requires {:?})",
                action, self.id, self.status, expected
            )));
        }
        Ok(())
    }

    fn exercise_index(&self, exercise_id: Uuid) -> Result<usize> {
        self.exercises
            .iter()
            .position(|e| e.id == exercise_id)
            .ok_or_else(|| {
                Error::validation(format!(
                    "exercise {} not found in session {}",
                    exercise_id, self.id
                ))
            })
    }

    fn exercise_mut(&mut self, exercise_id: Uuid) -> Result<&mut SessionExercise> {
        let index = self.exercise_index(exercise_id)?;
        Ok(&mut self.exercises[index])
    }

    fn append_note(&mut self, note: &str) {
        let note = note.trim();
        if note.is_empty() {
            return;
        }
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, note),
            _ => note.to_string(),
        });
    }

    fn check_invariants(&self) -> Result<()> {
        if self.id.is_nil() || self.user_id.is_nil() || self.workout_id.is_nil() {
            return Err(Error::validation(format!(
                "session {} has an empty identifier",
                self.id
            )));
        }
        check_program(self.is_from_program, self.program_id)?;

        if self.end_time.is_some() != self.status.has_ended() {
            return Err(Error::validation(format!(
                "session {} in state {:?} has inconsistent end time",
                self.id, self.status
            )));
        }

        let needs_start = matches!(
            self.status,
            SessionStatus::InProgress | SessionStatus::Completed
        );
        if needs_start && self.start_time.is_none() {
            return Err(Error::validation(format!(
                "session {} in state {:?} has no start time",
                self.id, self.status
            )));
        }

        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if end < start {
                return Err(Error::validation(format!(
                    "session {} ends before it starts",
                    self.id
                )));
            }
        }

        if self.status == SessionStatus::Completed && self.total_duration_seconds.is_none() {
            return Err(Error::validation(format!(
                "completed session {} has no duration",
                self.id
            )));
        }

        for (i, exercise) in self.exercises.iter().enumerate() {
            exercise.check_invariants(self.id)?;
            if exercise.order != position_number(i)? {
                return Err(Error::validation(format!(
                    "exercise order of session {} is not contiguous",
                    self.id
                )));
            }
        }

        Ok(())
    }
}

/// Per-session overview returned by [`WorkoutSession::performance_summary`]
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PerformanceSummary {
    pub session_id: Uuid,
    pub workout_id: Uuid,
    pub status: SessionStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_duration_seconds: Option<u32>,
    pub calories_estimated: Option<u32>,
    pub perceived_difficulty: Option<PerceivedDifficulty>,
    pub exercise_count: usize,
    pub total_sets: usize,
    pub total_volume: f64,
    pub performance_score: f64,
    pub exercises: Vec<ExerciseSummary>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ExerciseSummary {
    pub exercise_id: Uuid,
    pub exercise_name: String,
    pub metric_type: MetricType,
    pub order: u32,
    pub set_count: usize,
    pub best_performance: Option<f64>,
    pub score: f64,
    pub total_volume: f64,
    pub estimated_calories: f64,
}

/// Program data is consistent when the flag is set exactly when a non-nil
/// program id is present. Shared by sessions and planned workouts.
pub(crate) fn check_program(is_from_program: bool, program_id: Option<Uuid>) -> Result<()> {
    match (is_from_program, program_id) {
        (_, Some(id)) if id.is_nil() => Err(Error::validation("program id must not be empty")),
        (true, None) => Err(Error::validation("workout from a program needs a program id")),
        (false, Some(id)) => Err(Error::validation(format!(
            "program id {} given for a workout not from a program",
            id
        ))),
        _ => Ok(()),
    }
}

/// Whole seconds between two instants, rounded to nearest
fn elapsed_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<u32> {
    let millis = (end - start).num_milliseconds();
    if millis < 0 {
        return Err(Error::validation("end time is before start time"));
    }
    let secs = (millis as f64 / 1000.0).round();
    u32::try_from(secs as u64).map_err(|_| Error::validation("session duration is too long"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 18, 0, 0).unwrap()
    }

    fn params(planned: bool) -> NewSession {
        NewSession {
            user_id: Uuid::new_v4(),
            workout_id: Uuid::new_v4(),
            planned_date: planned.then(|| t0() + Duration::days(1)),
            ..Default::default()
        }
    }

    fn in_progress() -> WorkoutSession {
        WorkoutSession::new(params(false), t0()).unwrap()
    }

    fn session_in(status: SessionStatus) -> WorkoutSession {
        let model = CalorieModel::default();
        match status {
            SessionStatus::Planned => WorkoutSession::new(params(true), t0()).unwrap(),
            SessionStatus::InProgress => in_progress(),
            SessionStatus::Completed => {
                let mut s = in_progress();
                s.complete(PerceivedDifficulty::Moderate, None, &model, t0() + Duration::minutes(10))
                    .unwrap();
                s
            }
            SessionStatus::Abandoned => {
                let mut s = in_progress();
                s.abandon(None, t0() + Duration::minutes(5)).unwrap();
                s
            }
            SessionStatus::Cancelled => {
                let mut s = WorkoutSession::new(params(true), t0()).unwrap();
                s.cancel(None).unwrap();
                s
            }
        }
    }

    const ALL_STATES: [SessionStatus; 5] = [
        SessionStatus::Planned,
        SessionStatus::InProgress,
        SessionStatus::Completed,
        SessionStatus::Abandoned,
        SessionStatus::Cancelled,
    ];

    fn squat_values() -> SetValues {
        SetValues {
            repetitions: Some(5),
            weight: Some(100.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_construction_state() {
        let planned = WorkoutSession::new(params(true), t0()).unwrap();
        assert_eq!(planned.status(), SessionStatus::Planned);
        assert_eq!(planned.start_time(), None);

        let live = in_progress();
        assert_eq!(live.status(), SessionStatus::InProgress);
        assert_eq!(live.start_time(), Some(t0()));
    }

    #[test]
    fn test_construction_rejects_empty_ids() {
        let mut p = params(false);
        p.user_id = Uuid::nil();
        assert!(WorkoutSession::new(p, t0()).unwrap_err().is_validation());

        let mut p = params(false);
        p.workout_id = Uuid::nil();
        assert!(WorkoutSession::new(p, t0()).unwrap_err().is_validation());

        let mut p = params(false);
        p.is_from_program = true;
        assert!(WorkoutSession::new(p, t0()).unwrap_err().is_validation());
    }

    #[test]
    fn test_program_fields_must_agree() {
        let mut p = params(false);
        p.program_id = Some(Uuid::new_v4());
        assert!(WorkoutSession::new(p, t0()).unwrap_err().is_validation());

        let mut p = params(false);
        p.is_from_program = true;
        p.program_id = Some(Uuid::nil());
        assert!(WorkoutSession::new(p, t0()).unwrap_err().is_validation());

        let mut p = params(false);
        p.is_from_program = true;
        p.program_id = Some(Uuid::new_v4());
        assert!(WorkoutSession::new(p, t0()).is_ok());

        // Stored data follows the same rule
        let mut value = serde_json::to_value(in_progress()).unwrap();
        value["program_id"] = serde_json::Value::String(Uuid::new_v4().to_string());
        assert!(serde_json::from_value::<WorkoutSession>(value).is_err());
    }

    #[test]
    fn test_transition_table() {
        let model = CalorieModel::default();
        let later = t0() + Duration::hours(1);

        for state in ALL_STATES {
            let mut s = session_in(state);
            let before = s.clone();
            let result = s.start(later);
            assert_eq!(result.is_ok(), state == SessionStatus::Planned, "start from {:?}", state);
            if result.is_err() {
                assert_eq!(s, before);
            }

            let mut s = session_in(state);
            let before = s.clone();
            let result = s.complete(PerceivedDifficulty::Hard, None, &model, later);
            assert_eq!(result.is_ok(), state == SessionStatus::InProgress, "complete from {:?}", state);
            if result.is_err() {
                assert_eq!(s, before);
            }

            let mut s = session_in(state);
            let before = s.clone();
            let result = s.abandon(Some("tired"), later);
            assert_eq!(result.is_ok(), state == SessionStatus::InProgress, "abandon from {:?}", state);
            if result.is_err() {
                assert_eq!(s, before);
            }

            let mut s = session_in(state);
            let before = s.clone();
            let result = s.cancel(Some("busy"));
            assert_eq!(result.is_ok(), state == SessionStatus::Planned, "cancel from {:?}", state);
            if result.is_err() {
                assert_eq!(s, before);
            }
        }
    }

    #[test]
    fn test_end_time_only_when_ended() {
        for state in ALL_STATES {
            let s = session_in(state);
            assert_eq!(s.end_time().is_some(), state.has_ended(), "{:?}", state);
        }
    }

    #[test]
    fn test_start_then_complete_records_duration_and_calories() {
        let mut s = WorkoutSession::new(params(true), t0()).unwrap();
        let start = t0() + Duration::minutes(3);
        s.start(start).unwrap();

        let end = start + Duration::seconds(2700) + Duration::milliseconds(600);
        s.complete(PerceivedDifficulty::Hard, Some("felt strong"), &CalorieModel::default(), end)
            .unwrap();

        assert!(s.end_time().unwrap() > s.start_time().unwrap());
        assert_eq!(s.total_duration_seconds(), Some(2701));
        // round(5.0 × 70 × 2701 / 3600) = round(262.6)
        assert_eq!(s.calories_estimated(), Some(263));
        assert_eq!(s.perceived_difficulty(), Some(PerceivedDifficulty::Hard));
        assert_eq!(s.notes(), Some("felt strong"));
    }

    #[test]
    fn test_complete_with_injected_body_weight() {
        let mut s = in_progress();
        let model = CalorieModel::default().with_body_weight(80.0);
        s.complete(PerceivedDifficulty::Easy, None, &model, t0() + Duration::minutes(30))
            .unwrap();
        // 5.0 × 80 × 0.5
        assert_eq!(s.calories_estimated(), Some(200));
        assert_eq!(s.estimate_calories(&CalorieModel::default()), 175);
    }

    #[test]
    fn test_empty_session_scenario() {
        let mut s = in_progress();
        s.complete(
            PerceivedDifficulty::Moderate,
            None,
            &CalorieModel::default(),
            t0() + Duration::minutes(30),
        )
        .unwrap();

        assert_eq!(s.total_duration_seconds(), Some(1800));
        assert_eq!(s.calories_estimated(), Some(175));
        assert_eq!(s.calculate_performance_score(), 0.0);
    }

    #[test]
    fn test_complete_before_start_time_fails() {
        let mut s = in_progress();
        let before = s.clone();
        let result = s.complete(
            PerceivedDifficulty::Easy,
            None,
            &CalorieModel::default(),
            t0() - Duration::seconds(1),
        );
        assert!(result.unwrap_err().is_validation());
        assert_eq!(s, before);
    }

    #[test]
    fn test_abandon_records_reason_and_duration() {
        let mut s = in_progress();
        s.abandon(Some("gym closing"), t0() + Duration::minutes(12))
            .unwrap();
        assert_eq!(s.status(), SessionStatus::Abandoned);
        assert_eq!(s.total_duration_seconds(), Some(720));
        assert_eq!(s.notes(), Some("Abandoned: gym closing"));
        assert_eq!(s.calories_estimated(), None);
    }

    #[test]
    fn test_add_exercise_requires_in_progress() {
        for state in ALL_STATES {
            if state == SessionStatus::InProgress {
                continue;
            }
            let mut s = session_in(state);
            let result = s.add_exercise(
                Uuid::new_v4(),
                "Deadlift",
                MetricType::Weight,
                squat_values(),
                t0(),
            );
            assert!(result.unwrap_err().is_validation(), "{:?}", state);
            assert!(s.exercises().is_empty());
        }
    }

    #[test]
    fn test_add_exercise_assigns_order_and_seeds_set() {
        let mut s = in_progress();
        let squat = s
            .add_exercise(Uuid::new_v4(), " Back Squat ", MetricType::Weight, squat_values(), t0())
            .unwrap();
        let plank = s
            .add_exercise(Uuid::new_v4(), "Plank", MetricType::Time, SetValues::default(), t0())
            .unwrap();

        let squat = s.exercise(squat).unwrap();
        assert_eq!(squat.order(), 1);
        assert_eq!(squat.exercise_name(), "Back Squat");
        assert_eq!(squat.sets().len(), 1);
        assert_eq!(squat.sets()[0].set_number, 1);

        let plank = s.exercise(plank).unwrap();
        assert_eq!(plank.order(), 2);
        assert!(plank.sets().is_empty());
    }

    #[test]
    fn test_add_exercise_with_invalid_input_leaves_list_unchanged() {
        let mut s = in_progress();
        assert!(s
            .add_exercise(Uuid::nil(), "Row", MetricType::Weight, SetValues::default(), t0())
            .is_err());
        assert!(s
            .add_exercise(Uuid::new_v4(), "", MetricType::Weight, SetValues::default(), t0())
            .is_err());
        let bad_set = SetValues {
            weight: Some(-5.0),
            repetitions: Some(5),
            ..Default::default()
        };
        assert!(s
            .add_exercise(Uuid::new_v4(), "Row", MetricType::Weight, bad_set, t0())
            .is_err());
        assert!(s.exercises().is_empty());
    }

    #[test]
    fn test_remove_exercise_renumbers_preserving_order() {
        let mut s = in_progress();
        let ids: Vec<Uuid> = ["A", "B", "C", "D"]
            .iter()
            .map(|name| {
                s.add_exercise(Uuid::new_v4(), name, MetricType::Repetitions, SetValues::default(), t0())
                    .unwrap()
            })
            .collect();

        s.remove_exercise(ids[1]).unwrap();
        s.remove_exercise(ids[3]).unwrap();

        let remaining: Vec<(&str, u32)> = s
            .exercises()
            .iter()
            .map(|e| (e.exercise_name(), e.order()))
            .collect();
        assert_eq!(remaining, vec![("A", 1), ("C", 2)]);

        assert!(s.remove_exercise(ids[1]).unwrap_err().is_validation());
    }

    #[test]
    fn test_set_operations_through_root() {
        let mut s = in_progress();
        let ex = s
            .add_exercise(Uuid::new_v4(), "Bench", MetricType::Weight, SetValues::default(), t0())
            .unwrap();

        let first = s.add_set(ex, squat_values(), t0()).unwrap();
        let second = s.add_set(ex, squat_values(), t0()).unwrap();
        s.update_set(
            ex,
            second,
            SetValues {
                repetitions: Some(3),
                weight: Some(110.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(s.exercise(ex).unwrap().best_performance(), Some(500.0));

        s.remove_set(ex, first).unwrap();
        let sets = s.exercise(ex).unwrap().sets();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].id, second);
        assert_eq!(sets[0].set_number, 1);

        assert!(s.add_set(Uuid::new_v4(), squat_values(), t0()).is_err());
        assert!(s.remove_set(ex, Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_sets_frozen_after_completion() {
        let mut s = in_progress();
        let ex = s
            .add_exercise(Uuid::new_v4(), "Bench", MetricType::Weight, squat_values(), t0())
            .unwrap();
        s.complete(
            PerceivedDifficulty::Moderate,
            None,
            &CalorieModel::default(),
            t0() + Duration::minutes(40),
        )
        .unwrap();

        assert!(s.add_set(ex, squat_values(), t0()).unwrap_err().is_validation());
        assert!(s.remove_exercise(ex).unwrap_err().is_validation());
        assert!(s.set_exercise_score(ex, 50.0).unwrap_err().is_validation());
    }

    #[test]
    fn test_score_with_consistency_and_duration_bonus() {
        let mut s = in_progress();
        for (name, score) in [("Squat", 80.0), ("Press", 82.0)] {
            let ex = s
                .add_exercise(Uuid::new_v4(), name, MetricType::Weight, SetValues::default(), t0())
                .unwrap();
            s.set_exercise_score(ex, score).unwrap();
        }
        s.complete(
            PerceivedDifficulty::Moderate,
            None,
            &CalorieModel::default(),
            t0() + Duration::minutes(45),
        )
        .unwrap();

        // 81 avg + 2 consistency + 3 duration; no set bonus
        assert!((s.calculate_performance_score() - 86.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_with_all_bonuses_from_sets() {
        let mut s = in_progress();
        let rested = SetValues {
            rest_time_seconds: Some(90),
            ..squat_values()
        };
        for name in ["Squat", "Press"] {
            s.add_exercise(Uuid::new_v4(), name, MetricType::Weight, rested.clone(), t0())
                .unwrap();
        }
        s.complete(
            PerceivedDifficulty::Hard,
            None,
            &CalorieModel::default(),
            t0() + Duration::minutes(60),
        )
        .unwrap();

        // Each exercise: one 85-point set + 5 consistency = 90; then +5 +3 +2
        assert_eq!(s.calculate_performance_score(), 100.0);
    }

    #[test]
    fn test_score_without_bonuses() {
        let mut s = in_progress();
        for (name, score) in [("Squat", 40.0), ("Press", 90.0)] {
            let ex = s
                .add_exercise(Uuid::new_v4(), name, MetricType::Weight, SetValues::default(), t0())
                .unwrap();
            s.set_exercise_score(ex, score).unwrap();
        }
        s.complete(
            PerceivedDifficulty::Moderate,
            None,
            &CalorieModel::default(),
            t0() + Duration::minutes(10),
        )
        .unwrap();

        assert!((s.calculate_performance_score() - 65.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_zero_unless_completed() {
        let mut s = in_progress();
        s.add_exercise(Uuid::new_v4(), "Squat", MetricType::Weight, squat_values(), t0())
            .unwrap();
        assert_eq!(s.calculate_performance_score(), 0.0);

        s.abandon(None, t0() + Duration::minutes(30)).unwrap();
        assert_eq!(s.calculate_performance_score(), 0.0);
    }

    #[test]
    fn test_performance_summary() {
        let mut s = in_progress();
        let ex = s
            .add_exercise(Uuid::new_v4(), "Squat", MetricType::Weight, SetValues::default(), t0())
            .unwrap();
        s.add_set(
            ex,
            SetValues {
                repetitions: Some(10),
                weight: Some(50.0),
                ..Default::default()
            },
            t0(),
        )
        .unwrap();
        s.add_set(
            ex,
            SetValues {
                repetitions: Some(8),
                weight: Some(60.0),
                ..Default::default()
            },
            t0(),
        )
        .unwrap();
        s.complete(
            PerceivedDifficulty::Moderate,
            None,
            &CalorieModel::default(),
            t0() + Duration::minutes(30),
        )
        .unwrap();

        let summary = s.performance_summary();
        assert_eq!(summary.status, SessionStatus::Completed);
        assert_eq!(summary.exercise_count, 1);
        assert_eq!(summary.total_sets, 2);
        assert!((summary.total_volume - 980.0).abs() < 1e-9);
        assert_eq!(summary.exercises[0].best_performance, Some(500.0));
        assert_eq!(summary.performance_score, s.calculate_performance_score());
    }

    #[test]
    fn test_rehydrate_roundtrip() {
        let mut s = in_progress();
        let ex = s
            .add_exercise(Uuid::new_v4(), "Squat", MetricType::Weight, squat_values(), t0())
            .unwrap();
        s.add_set(ex, squat_values(), t0()).unwrap();

        let json = serde_json::to_string(&s).unwrap();
        let loaded: WorkoutSession = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, s);
    }

    #[test]
    fn test_rehydrate_rejects_broken_invariants() {
        let s = session_in(SessionStatus::Completed);
        let mut value = serde_json::to_value(&s).unwrap();
        value["end_time"] = serde_json::Value::Null;
        assert!(serde_json::from_value::<WorkoutSession>(value).is_err());

        let mut s = in_progress();
        for name in ["A", "B"] {
            s.add_exercise(Uuid::new_v4(), name, MetricType::Repetitions, SetValues::default(), t0())
                .unwrap();
        }
        let mut value = serde_json::to_value(&s).unwrap();
        value["exercises"][1]["order"] = serde_json::json!(5);
        assert!(serde_json::from_value::<WorkoutSession>(value).is_err());
    }
}
