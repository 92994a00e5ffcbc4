//! Application service over the store and catalog.
//!
//! Every mutating call runs as one store transaction: load the aggregate,
//! apply a single transition, write it back. A failed transition leaves the
//! store untouched.

use crate::catalog::ExerciseCatalog;
use crate::history;
use crate::queue::JsonlQueue;
use crate::store::{Repository, Store, StoreData};
use crate::sync::{MetricSynchronizer, SyncReport};
use crate::{
    CalorieModel, Error, MetricType, NewSession, PerceivedDifficulty, PerformanceSummary,
    PlannedStatus, PlannedWorkout, Result, SetValues, UserMetric, UserMetricType,
    WorkoutSession,
};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

pub struct Tracker<S, C> {
    store: S,
    catalog: C,
    calories: CalorieModel,
    use_recorded_weight: bool,
    synchronizer: MetricSynchronizer,
}

impl<S: Store, C: ExerciseCatalog> Tracker<S, C> {
    pub fn new(store: S, catalog: C) -> Self {
        Self {
            store,
            catalog,
            calories: CalorieModel::default(),
            use_recorded_weight: false,
            synchronizer: MetricSynchronizer::default(),
        }
    }

    pub fn with_calorie_model(mut self, calories: CalorieModel) -> Self {
        self.calories = calories;
        self
    }

    /// Estimate calories with the user's latest Weight metric when known
    pub fn with_recorded_body_weight(mut self, enabled: bool) -> Self {
        self.use_recorded_weight = enabled;
        self
    }

    pub fn with_synchronizer(mut self, synchronizer: MetricSynchronizer) -> Self {
        self.synchronizer = synchronizer;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn snapshot(&self) -> Result<StoreData> {
        self.store.snapshot()
    }

    // ------------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------------

    pub fn session(&self, session_id: Uuid) -> Result<WorkoutSession> {
        self.store.snapshot()?.load(session_id)
    }

    /// Create a session (Planned with a date, else InProgress); returns its id
    pub fn start_session(&mut self, params: NewSession, now: DateTime<Utc>) -> Result<Uuid> {
        let session = WorkoutSession::new(params, now)?;
        let id = session.id();
        let status = session.status();
        self.store.transact(|data| data.add(session))?;
        tracing::info!("Created session {} ({:?})", id, status);
        Ok(id)
    }

    /// Planned → InProgress
    pub fn begin_session(&mut self, session_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        self.with_session(session_id, |session| session.start(now))?;
        tracing::info!("Started session {}", session_id);
        Ok(())
    }

    /// Add a catalog exercise to a session, snapshotting its name
    pub fn add_exercise(
        &mut self,
        session_id: Uuid,
        exercise_id: Uuid,
        metric_type: MetricType,
        initial: SetValues,
        now: DateTime<Utc>,
    ) -> Result<Uuid> {
        let entry = self.catalog.lookup(exercise_id).ok_or(Error::NotFound {
            kind: "catalog exercise",
            id: exercise_id,
        })?;
        let id = self.with_session(session_id, |session| {
            session.add_exercise(entry.id, &entry.name, metric_type, initial, now)
        })?;
        tracing::info!("Added '{}' to session {}", entry.name, session_id);
        Ok(id)
    }

    pub fn remove_exercise(&mut self, session_id: Uuid, exercise_id: Uuid) -> Result<()> {
        self.with_session(session_id, |session| session.remove_exercise(exercise_id))
    }

    pub fn add_set(
        &mut self,
        session_id: Uuid,
        exercise_id: Uuid,
        values: SetValues,
        now: DateTime<Utc>,
    ) -> Result<Uuid> {
        self.with_session(session_id, |session| {
            session.add_set(exercise_id, values, now)
        })
    }

    pub fn update_set(
        &mut self,
        session_id: Uuid,
        exercise_id: Uuid,
        set_id: Uuid,
        values: SetValues,
    ) -> Result<()> {
        self.with_session(session_id, |session| {
            session.update_set(exercise_id, set_id, values)
        })
    }

    pub fn remove_set(&mut self, session_id: Uuid, exercise_id: Uuid, set_id: Uuid) -> Result<()> {
        self.with_session(session_id, |session| session.remove_set(exercise_id, set_id))
    }

    pub fn set_exercise_score(
        &mut self,
        session_id: Uuid,
        exercise_id: Uuid,
        score: f64,
    ) -> Result<()> {
        self.with_session(session_id, |session| {
            session.set_exercise_score(exercise_id, score)
        })
    }

    /// InProgress → Completed; a linked planned workout completes with it
    pub fn complete_session(
        &mut self,
        session_id: Uuid,
        difficulty: PerceivedDifficulty,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PerformanceSummary> {
        let base = self.calories;
        let use_recorded_weight = self.use_recorded_weight;

        let summary = self.store.transact(|data| {
            let mut session: WorkoutSession = data.load(session_id)?;
            let calories = if use_recorded_weight {
                calorie_model_for(data, session.user_id(), base)
            } else {
                base
            };
            session.complete(difficulty, notes, &calories, now)?;
            let summary = session.performance_summary();
            data.update(session)?;
            update_linked_plan(data, session_id, PlannedWorkout::mark_as_completed)?;
            Ok(summary)
        })?;

        tracing::info!(
            "Completed session {} (score {:.1}, {} kcal)",
            session_id,
            summary.performance_score,
            summary.calories_estimated.unwrap_or_default()
        );
        Ok(summary)
    }

    /// InProgress → Abandoned; a linked planned workout is abandoned too
    pub fn abandon_session(
        &mut self,
        session_id: Uuid,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.store.transact(|data| {
            let mut session: WorkoutSession = data.load(session_id)?;
            session.abandon(reason, now)?;
            data.update(session)?;
            update_linked_plan(data, session_id, PlannedWorkout::mark_as_abandoned)
        })?;
        tracing::info!("Abandoned session {}", session_id);
        Ok(())
    }

    /// Planned → Cancelled
    pub fn cancel_session(&mut self, session_id: Uuid, reason: Option<&str>) -> Result<()> {
        self.with_session(session_id, |session| session.cancel(reason))?;
        tracing::info!("Cancelled session {}", session_id);
        Ok(())
    }

    pub fn session_summary(&self, session_id: Uuid) -> Result<PerformanceSummary> {
        Ok(self.session(session_id)?.performance_summary())
    }

    // ------------------------------------------------------------------------
    // Planned workouts
    // ------------------------------------------------------------------------

    pub fn planned_workout(&self, planned_id: Uuid) -> Result<PlannedWorkout> {
        self.store.snapshot()?.load(planned_id)
    }

    pub fn schedule_workout(
        &mut self,
        user_id: Uuid,
        workout_id: Uuid,
        date: NaiveDate,
        program_id: Option<Uuid>,
    ) -> Result<Uuid> {
        let planned = PlannedWorkout::new(user_id, workout_id, date, program_id)?;
        let id = planned.id();
        self.store.transact(|data| data.add(planned))?;
        tracing::info!("Scheduled workout {} for {}", id, date);
        Ok(id)
    }

    /// Track a new InProgress session for a planned workout and link the two
    pub fn start_planned_workout(&mut self, planned_id: Uuid, now: DateTime<Utc>) -> Result<Uuid> {
        let session_id = self.store.transact(|data| {
            let mut planned: PlannedWorkout = data.load(planned_id)?;
            let session = WorkoutSession::new(
                NewSession {
                    user_id: planned.user_id(),
                    workout_id: planned.workout_id(),
                    planned_date: None,
                    is_from_program: planned.is_from_program(),
                    program_id: planned.program_id(),
                },
                now,
            )?;
            let session_id = session.id();
            planned.mark_as_started(session_id)?;
            data.add(session)?;
            data.update(planned)?;
            Ok(session_id)
        })?;
        tracing::info!(
            "Started planned workout {} as session {}",
            planned_id,
            session_id
        );
        Ok(session_id)
    }

    pub fn complete_planned_workout(&mut self, planned_id: Uuid) -> Result<()> {
        self.with_planned(planned_id, PlannedWorkout::mark_as_completed)
    }

    pub fn abandon_planned_workout(&mut self, planned_id: Uuid) -> Result<()> {
        self.with_planned(planned_id, PlannedWorkout::mark_as_abandoned)
    }

    pub fn cancel_planned_workout(&mut self, planned_id: Uuid) -> Result<()> {
        self.with_planned(planned_id, PlannedWorkout::cancel)
    }

    pub fn reschedule_planned_workout(&mut self, planned_id: Uuid, date: NaiveDate) -> Result<()> {
        self.with_planned(planned_id, |planned| planned.reschedule(date))
    }

    /// A user's planned workouts, by scheduled date
    pub fn planned_workouts(&self, user_id: Uuid) -> Result<Vec<PlannedWorkout>> {
        let data = self.store.snapshot()?;
        let mut planned: Vec<PlannedWorkout> = data
            .planned_workouts()
            .filter(|p| p.user_id() == user_id)
            .cloned()
            .collect();
        planned.sort_by_key(|p| p.scheduled_date());
        Ok(planned)
    }

    // ------------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------------

    pub fn record_metric(
        &mut self,
        user_id: Uuid,
        metric_type: UserMetricType,
        value: f64,
        unit: Option<&str>,
        recorded_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<Uuid> {
        let metric = UserMetric::new(user_id, metric_type, value, unit, recorded_at, notes)?;
        let id = metric.id();
        self.store.transact(|data| data.add(metric))?;
        tracing::info!("Recorded {:?} metric {} = {}", metric_type, id, value);
        Ok(id)
    }

    pub fn update_metric_value(&mut self, metric_id: Uuid, value: f64) -> Result<()> {
        self.with_metric(metric_id, |metric| metric.update_value(value))
    }

    pub fn update_metric_recorded_at(
        &mut self,
        metric_id: Uuid,
        recorded_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_metric(metric_id, |metric| {
            metric.update_recorded_at(recorded_at);
            Ok(())
        })
    }

    /// A user's metrics of one kind, oldest first
    pub fn metrics(&self, user_id: Uuid, metric_type: UserMetricType) -> Result<Vec<UserMetric>> {
        let data = self.store.snapshot()?;
        Ok(history::metric_history(data.metrics(), user_id, metric_type)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Apply every pending measurement event in `queue`
    pub fn sync_measurements(&mut self, queue: &JsonlQueue) -> Result<SyncReport> {
        let report = self.synchronizer.drain(queue, &mut self.store)?;
        tracing::info!(
            "Synchronized {} event(s), {} duplicate(s), {} rejected",
            report.applied,
            report.duplicates,
            report.rejected.len()
        );
        Ok(report)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn with_session<R>(
        &mut self,
        session_id: Uuid,
        f: impl FnOnce(&mut WorkoutSession) -> Result<R>,
    ) -> Result<R> {
        self.store.transact(|data| {
            let mut session: WorkoutSession = data.load(session_id)?;
            let result = f(&mut session)?;
            data.update(session)?;
            Ok(result)
        })
    }

    fn with_planned(
        &mut self,
        planned_id: Uuid,
        f: impl FnOnce(&mut PlannedWorkout) -> Result<()>,
    ) -> Result<()> {
        self.store.transact(|data| {
            let mut planned: PlannedWorkout = data.load(planned_id)?;
            f(&mut planned)?;
            tracing::info!("Planned workout {} is now {:?}", planned_id, planned.status());
            data.update(planned)
        })
    }

    fn with_metric(
        &mut self,
        metric_id: Uuid,
        f: impl FnOnce(&mut UserMetric) -> Result<()>,
    ) -> Result<()> {
        self.store.transact(|data| {
            let mut metric: UserMetric = data.load(metric_id)?;
            f(&mut metric)?;
            data.update(metric)
        })
    }
}

/// Calorie model using the user's latest recorded weight, if any
fn calorie_model_for(data: &StoreData, user_id: Uuid, base: CalorieModel) -> CalorieModel {
    match history::latest_metric(data.metrics(), user_id, UserMetricType::Weight) {
        Some(weight) if weight.value() > 0.0 => base.with_body_weight(weight.value()),
        _ => base,
    }
}

/// Move the planned workout linked to `session_id` along with the session
fn update_linked_plan(
    data: &mut StoreData,
    session_id: Uuid,
    transition: fn(&mut PlannedWorkout) -> Result<()>,
) -> Result<()> {
    let Some(mut planned) = data.planned_for_session(session_id).cloned() else {
        return Ok(());
    };
    if planned.status() != PlannedStatus::InProgress {
        tracing::warn!(
            "Planned workout {} linked to session {} is {:?}, leaving it",
            planned.id(),
            session_id,
            planned.status()
        );
        return Ok(());
    }
    transition(&mut planned)?;
    data.update(planned)
}
